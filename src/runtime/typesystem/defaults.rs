//! Default-method selection.
//!
//! A class inherits a concrete interface method (a *default method*) when neither the class
//! nor any of its superclasses declares an instance method with the same name and signature,
//! and the maximally-specific interface declarations of that method reduce to exactly one
//! concrete body. The selected bodies keep their interface as holder; they are entered into
//! the inheriting class's vtable with an index recorded per class, never on the shared method.

use std::sync::Arc;

use crate::runtime::{
    method::{MethodList, MethodRc},
    typesystem::{find_method_in, ClassRc, LookupFlags},
};

/// Compute the default methods a class inherits.
///
/// ## Arguments
/// * `class_methods`         - Methods declared by the class
/// * `super_class`           - The superclass, if any
/// * `transitive_interfaces` - Every interface the class implements
///
/// Returns the selected default bodies in the order their name and signature are first met
/// while walking the interfaces.
pub(crate) fn find_default_methods(
    class_methods: &[MethodRc],
    super_class: Option<&ClassRc>,
    transitive_interfaces: &[ClassRc],
) -> MethodList {
    let mut visited: Vec<(&str, &str)> = Vec::new();
    let mut selected = Vec::new();

    let candidates: Vec<MethodRc> = transitive_interfaces
        .iter()
        .flat_map(|interface| interface.methods())
        .filter(|method| !method.is_static() && !method.is_private() && !method.is_initializer())
        .collect();

    for method in &candidates {
        let key = (method.name.as_str(), method.signature.as_str());
        if visited.contains(&key) {
            continue;
        }
        visited.push(key);

        if find_method_in(class_methods, key.0, key.1, LookupFlags::SKIP_STATIC).is_some() {
            continue;
        }

        let declared_by_super = super_class.is_some_and(|parent| {
            std::iter::once(parent)
                .chain(parent.supers())
                .any(|class| {
                    class
                        .find_local_method(
                            key.0,
                            key.1,
                            LookupFlags::SKIP_STATIC | LookupFlags::SKIP_PRIVATE,
                        )
                        .is_some()
                })
        });
        if declared_by_super {
            continue;
        }

        if let Some(default) = maximally_specific(&candidates, key.0, key.1) {
            selected.push(default);
        }
    }

    selected
}

/// Reduce the declarations of `name` + `signature` to the maximally-specific ones and return
/// the single survivor if it is concrete.
fn maximally_specific(candidates: &[MethodRc], name: &str, signature: &str) -> Option<MethodRc> {
    let matching: Vec<&MethodRc> = candidates
        .iter()
        .filter(|method| method.matches(name, signature))
        .collect();

    let mut survivors: Vec<&MethodRc> = Vec::new();
    for method in &matching {
        let Some(holder) = method.holder() else {
            continue;
        };
        let shadowed = matching.iter().any(|other| {
            other.holder().is_some_and(|other_holder| {
                !Arc::ptr_eq(&other_holder, &holder) && other_holder.implements_interface(&holder)
            })
        });
        if !shadowed && !survivors.iter().any(|known| Arc::ptr_eq(known, method)) {
            survivors.push(method);
        }
    }

    match survivors.as_slice() {
        [only] if !only.is_abstract() => Some(Arc::clone(only)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        runtime::typesystem::{ClassBuilder, ClassRegistry, MethodSpec},
        test::factories::{interface, root_class},
    };

    #[test]
    fn test_single_default_is_inherited() {
        let registry = ClassRegistry::new();
        let object = root_class(&registry);
        let greeter = ClassBuilder::new("app/Greeter")
            .interface()
            .method(MethodSpec::new("greet", "()V").public().code(&[1]))
            .build(&registry)
            .unwrap();

        let class = ClassBuilder::new("app/Impl")
            .extends(&object)
            .implements(&greeter)
            .build(&registry)
            .unwrap();

        let defaults = class.default_methods();
        assert_eq!(defaults.len(), 1);
        assert!(defaults[0].is_held_by(&greeter));
        assert!(defaults[0].is_default_method());
    }

    #[test]
    fn test_class_method_wins() {
        let registry = ClassRegistry::new();
        let object = root_class(&registry);
        let greeter = ClassBuilder::new("app/Greeter")
            .interface()
            .method(MethodSpec::new("greet", "()V").public().code(&[1]))
            .build(&registry)
            .unwrap();

        let local = ClassBuilder::new("app/Local")
            .extends(&object)
            .implements(&greeter)
            .method(MethodSpec::new("greet", "()V").public())
            .build(&registry)
            .unwrap();
        assert!(local.default_methods().is_empty());

        let base = ClassBuilder::new("app/Base")
            .extends(&object)
            .method(MethodSpec::new("greet", "()V").public())
            .build(&registry)
            .unwrap();
        let inherited = ClassBuilder::new("app/Inherited")
            .extends(&base)
            .implements(&greeter)
            .build(&registry)
            .unwrap();
        assert!(inherited.default_methods().is_empty());
    }

    #[test]
    fn test_more_specific_interface_wins() {
        let registry = ClassRegistry::new();
        let object = root_class(&registry);
        let general = ClassBuilder::new("app/General")
            .interface()
            .method(MethodSpec::new("m", "()V").public().code(&[1]))
            .build(&registry)
            .unwrap();
        let specific = ClassBuilder::new("app/Specific")
            .interface()
            .implements(&general)
            .method(MethodSpec::new("m", "()V").public().code(&[2]))
            .build(&registry)
            .unwrap();

        let class = ClassBuilder::new("app/C")
            .extends(&object)
            .implements(&general)
            .implements(&specific)
            .build(&registry)
            .unwrap();

        let defaults = class.default_methods();
        assert_eq!(defaults.len(), 1);
        assert!(defaults[0].is_held_by(&specific));
    }

    #[test]
    fn test_conflicts_and_abstract_redeclarations_select_nothing() {
        let registry = ClassRegistry::new();
        let object = root_class(&registry);
        let left = ClassBuilder::new("app/Left")
            .interface()
            .method(MethodSpec::new("m", "()V").public().code(&[1]))
            .build(&registry)
            .unwrap();
        let right = ClassBuilder::new("app/Right")
            .interface()
            .method(MethodSpec::new("m", "()V").public().code(&[2]))
            .build(&registry)
            .unwrap();
        let conflict = ClassBuilder::new("app/Conflict")
            .extends(&object)
            .implements(&left)
            .implements(&right)
            .build(&registry)
            .unwrap();
        assert!(conflict.default_methods().is_empty());

        let reabstracted = interface(&registry, "app/Reabstract", &[&left], &[("m", "()V")]);
        let class = ClassBuilder::new("app/Abstracted")
            .extends(&object)
            .implements(&reabstracted)
            .build(&registry)
            .unwrap();
        assert!(class.default_methods().is_empty());
    }
}
