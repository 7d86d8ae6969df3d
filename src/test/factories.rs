//! Class hierarchy factories.
//!
//! Every fixture starts from [`root_class`], a root class shaped like `java/lang/Object`
//! whose linked vtable has exactly [`ROOT_VTABLE_LENGTH`] entries.

use std::sync::Arc;

use crate::runtime::{
    linker::Linker,
    typesystem::{ClassBuilder, ClassRc, ClassRegistry, LoaderId, MethodSpec},
};

/// Vtable length of the fixture root class
pub const ROOT_VTABLE_LENGTH: usize = 5;

/// Define the root class: five virtual methods plus non-virtual members that must stay out
/// of the vtable.
pub fn root_class(registry: &ClassRegistry) -> ClassRc {
    ClassBuilder::new("java/lang/Object")
        .public()
        .methods([
            MethodSpec::new("<init>", "()V").public(),
            MethodSpec::new("equals", "(Ljava/lang/Object;)Z").public(),
            MethodSpec::new("hashCode", "()I").public().native(),
            MethodSpec::new("toString", "()Ljava/lang/String;").public(),
            MethodSpec::new("clone", "()Ljava/lang/Object;").protected().native(),
            MethodSpec::new("finalize", "()V").protected(),
            MethodSpec::new("getClass", "()Ljava/lang/Class;").public().final_().native(),
            MethodSpec::new("registerNatives", "()V").private().static_().native(),
            MethodSpec::new("<clinit>", "()V").static_(),
        ])
        .build(registry)
        .expect("root class")
}

/// Define an interface declaring public abstract methods.
pub fn interface(
    registry: &ClassRegistry,
    name: &str,
    supers: &[&ClassRc],
    methods: &[(&str, &str)],
) -> ClassRc {
    let mut builder = ClassBuilder::new(name).interface().public();
    for parent in supers {
        builder = builder.implements(parent);
    }
    for (method, signature) in methods {
        builder = builder.method(MethodSpec::new(*method, *signature).public().abstract_());
    }
    builder.build(registry).expect("interface")
}

/// Define a public class in the bootstrap loader.
pub fn class(
    registry: &ClassRegistry,
    name: &str,
    super_class: &ClassRc,
    interfaces: &[&ClassRc],
    methods: Vec<MethodSpec>,
) -> ClassRc {
    class_in(registry, name, LoaderId::BOOTSTRAP, super_class, interfaces, methods)
}

/// Define a public class in `loader`.
pub fn class_in(
    registry: &ClassRegistry,
    name: &str,
    loader: LoaderId,
    super_class: &ClassRc,
    interfaces: &[&ClassRc],
    methods: Vec<MethodSpec>,
) -> ClassRc {
    let mut builder = ClassBuilder::new(name)
        .public()
        .loader(loader)
        .extends(super_class)
        .methods(methods);
    for interface in interfaces {
        builder = builder.implements(interface);
    }
    builder.build(registry).expect("class")
}

/// A registry holding only the root class, and a linker over it with the root linked.
pub fn linked_root() -> (Linker, ClassRc) {
    let registry = Arc::new(ClassRegistry::new());
    let object = root_class(&registry);
    let linker = Linker::new(registry);
    linker.link_class(&object).expect("link root");
    (linker, object)
}
