//! Benchmarks for class linking and dispatch.
//!
//! Measures:
//! - Linking a deep single-inheritance chain
//! - Linking a wide hierarchy level by level in parallel
//! - Vtable and itable selection on linked classes

extern crate vmdispatch;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::{hint::black_box, sync::Arc};
use vmdispatch::prelude::*;

fn root(registry: &ClassRegistry) -> ClassRc {
    ClassBuilder::new("java/lang/Object")
        .public()
        .methods([
            MethodSpec::new("equals", "(Ljava/lang/Object;)Z").public(),
            MethodSpec::new("hashCode", "()I").public(),
            MethodSpec::new("toString", "()Ljava/lang/String;").public(),
            MethodSpec::new("clone", "()Ljava/lang/Object;").protected(),
            MethodSpec::new("finalize", "()V").protected(),
        ])
        .build(registry)
        .unwrap()
}

/// A chain of `depth` classes, each overriding one inherited method and adding one.
fn deep_chain(depth: usize) -> (Arc<ClassRegistry>, ClassRc) {
    let registry = Arc::new(ClassRegistry::new());
    let mut current = root(&registry);
    for level in 0..depth {
        let mut builder = ClassBuilder::new(format!("bench/Level{level}"))
            .public()
            .extends(&current)
            .method(MethodSpec::new(format!("m{level}"), "()V").public());
        if level > 0 {
            builder = builder.method(MethodSpec::new(format!("m{}", level - 1), "()V").public());
        }
        current = builder.build(&registry).unwrap();
    }
    (registry, current)
}

/// `width` classes per level over `levels` levels, all implementing two interfaces.
fn wide_hierarchy(levels: usize, width: usize) -> Arc<ClassRegistry> {
    let registry = Arc::new(ClassRegistry::new());
    let object = root(&registry);
    let sized = ClassBuilder::new("bench/Sized")
        .interface()
        .public()
        .method(MethodSpec::new("size", "()I").public().abstract_())
        .build(&registry)
        .unwrap();
    let named = ClassBuilder::new("bench/Named")
        .interface()
        .public()
        .method(MethodSpec::new("name", "()Ljava/lang/String;").public().abstract_())
        .method(MethodSpec::new("describe", "()Ljava/lang/String;").public().code(&[1]))
        .build(&registry)
        .unwrap();

    let mut parent = object;
    for level in 0..levels {
        let mut first = None;
        for index in 0..width {
            let class = ClassBuilder::new(format!("bench/C{level}_{index}"))
                .public()
                .extends(&parent)
                .implements(&sized)
                .implements(&named)
                .methods([
                    MethodSpec::new("size", "()I").public(),
                    MethodSpec::new("name", "()Ljava/lang/String;").public(),
                ])
                .build(&registry)
                .unwrap();
            first.get_or_insert(class);
        }
        parent = first.unwrap();
    }
    registry
}

fn bench_link_deep_chain(c: &mut Criterion) {
    c.bench_function("link_deep_chain_64", |b| {
        b.iter_batched(
            || deep_chain(64),
            |(registry, leaf)| {
                let linker = Linker::new(registry);
                linker.link_class(&leaf).unwrap();
                black_box(leaf.vtable_length())
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_link_all_wide(c: &mut Criterion) {
    c.bench_function("link_all_8x32", |b| {
        b.iter_batched(
            || wide_hierarchy(8, 32),
            |registry| {
                let classes = registry.all_classes();
                let linker = Linker::new(registry);
                black_box(linker.link_all(&classes).unwrap())
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_select(c: &mut Criterion) {
    let registry = wide_hierarchy(4, 4);
    let classes = registry.all_classes();
    let linker = Linker::new(registry.clone());
    linker.link_all(&classes).unwrap();

    let named = registry.get_by_name("bench/Named", LoaderId::BOOTSTRAP).unwrap();
    let receiver = registry.get_by_name("bench/C3_0", LoaderId::BOOTSTRAP).unwrap();
    let vtable = receiver.vtable().unwrap();
    let itable = receiver.itable().unwrap();
    let slot = vtable.len() - 1;

    c.bench_function("vtable_select", |b| {
        b.iter(|| black_box(vtable.select(&receiver, black_box(slot)).unwrap()));
    });
    c.bench_function("itable_select", |b| {
        b.iter(|| black_box(itable.select(&receiver, &named, black_box(0)).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_link_deep_chain,
    bench_link_all_wide,
    bench_select
);
criterion_main!(benches);
