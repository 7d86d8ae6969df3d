//! Method lookup used by the dispatch table builders.
//!
//! The builders never walk class hierarchies themselves; they ask a [`MethodResolver`] for
//! the three lookups the linking rules are phrased in. [`HierarchyResolver`] answers them from
//! the [`crate::runtime::typesystem::Class`] model, and a host runtime with its own lookup
//! caches can substitute an implementation through
//! [`crate::runtime::linker::Linker::with_resolver`].

use crate::runtime::{
    method::MethodRc,
    typesystem::{Class, LookupFlags},
};

/// Method lookup collaborator.
///
/// All implementations must be thread-safe; one resolver is shared by every linking worker.
pub trait MethodResolver: Send + Sync {
    /// Finds `name` + `signature` in `class` or its superclass chain.
    ///
    /// Every kind of method is a candidate (static, private and overpass included); the
    /// closest declaration wins.
    fn lookup_method(&self, class: &Class, name: &str, signature: &str) -> Option<MethodRc>;

    /// Finds a public instance method declared by any of `class`'s transitive interfaces.
    ///
    /// # Arguments
    ///
    /// * `class` - Class whose interfaces are searched
    /// * `name` - Method name
    /// * `signature` - Method descriptor
    /// * `skip_defaults` - Ignore concrete interface methods
    fn lookup_method_in_all_interfaces(
        &self,
        class: &Class,
        name: &str,
        signature: &str,
        skip_defaults: bool,
    ) -> Option<MethodRc>;

    /// Selects the implementation an interface call on a `class` receiver would run.
    ///
    /// Searches the superclass chain for an instance method, stepping past static
    /// declarations, and falls back to the default methods `class` inherits.
    fn lookup_instance_method_in_classes(
        &self,
        class: &Class,
        name: &str,
        signature: &str,
    ) -> Option<MethodRc>;
}

/// [`MethodResolver`] over the in-memory class model.
#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchyResolver;

impl MethodResolver for HierarchyResolver {
    fn lookup_method(&self, class: &Class, name: &str, signature: &str) -> Option<MethodRc> {
        class.lookup_method(name, signature)
    }

    fn lookup_method_in_all_interfaces(
        &self,
        class: &Class,
        name: &str,
        signature: &str,
        skip_defaults: bool,
    ) -> Option<MethodRc> {
        class.lookup_method_in_all_interfaces(name, signature, skip_defaults)
    }

    fn lookup_instance_method_in_classes(
        &self,
        class: &Class,
        name: &str,
        signature: &str,
    ) -> Option<MethodRc> {
        let mut result = class.lookup_method(name, signature);
        // A static declaration hides nothing from instance dispatch; continue above its holder
        while let Some(found) = result.as_ref().filter(|method| method.is_static()) {
            let next = found
                .holder()
                .and_then(|holder| holder.super_class.clone())
                .and_then(|parent| parent.lookup_method(name, signature));
            if next.is_none() {
                result = None;
                break;
            }
            result = next;
        }

        result.or_else(|| {
            class
                .find_default_method(name, signature)
                .filter(|method| !method.is_static())
        })
    }
}

/// Local lookup helper shared with the override rules: `true` if `class` declares an
/// instance, non-private `name` + `signature`.
pub(crate) fn declares_instance_method(class: &Class, name: &str, signature: &str) -> bool {
    class
        .find_local_method(
            name,
            signature,
            LookupFlags::SKIP_STATIC | LookupFlags::SKIP_PRIVATE,
        )
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        runtime::typesystem::{ClassBuilder, ClassRegistry, MethodSpec},
        test::factories::root_class,
    };

    #[test]
    fn test_instance_lookup_skips_statics() {
        let registry = ClassRegistry::new();
        let object = root_class(&registry);
        let base = ClassBuilder::new("app/Base")
            .extends(&object)
            .method(MethodSpec::new("run", "()V").public())
            .build(&registry)
            .unwrap();
        let derived = ClassBuilder::new("app/Derived")
            .extends(&base)
            .method(MethodSpec::new("run", "()V").public().static_())
            .build(&registry)
            .unwrap();

        let resolver = HierarchyResolver;
        let plain = resolver.lookup_method(&derived, "run", "()V").unwrap();
        assert!(plain.is_static());

        let instance = resolver
            .lookup_instance_method_in_classes(&derived, "run", "()V")
            .unwrap();
        assert!(!instance.is_static());
        assert!(instance.is_held_by(&base));
    }

    #[test]
    fn test_instance_lookup_falls_back_to_defaults() {
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

        let resolver = HierarchyResolver;
        let selected = resolver
            .lookup_instance_method_in_classes(&class, "greet", "()V")
            .unwrap();
        assert!(selected.is_default_method());
        assert!(resolver
            .lookup_method_in_all_interfaces(&class, "greet", "()V", true)
            .is_none());
        assert!(resolver
            .lookup_method_in_all_interfaces(&class, "greet", "()V", false)
            .is_some());
        assert!(declares_instance_method(&greeter, "greet", "()V"));
    }
}
