//! Override and miranda rules.
//!
//! These predicates decide, for one method at a time, whether it may take over an inherited
//! vtable slot, whether it needs a slot of its own, and whether an interface method is left
//! unimplemented by a class (a *miranda* method). The sizing pass and the fill pass of
//! [`super::vtable`] both go through them, so the length reserved by the first pass is the
//! length the second one fills.

use crate::{
    runtime::{
        diagnostics::DiagnosticCategory,
        dispatch::LinkContext,
        method::{Method, MethodList, MethodRc},
        resolution::declares_instance_method,
        typesystem::{find_method_in, ClassFlags, ClassRc, LoaderId, LookupFlags},
    },
    Error, Result,
};

/// Whether a method in class `target_class_name` (defined by `target_loader`) overrides
/// `super_method`.
///
/// Private methods are never overridden; public and protected ones always are;
/// package-private ones only from the same runtime package.
#[must_use]
pub fn is_override(super_method: &Method, target_loader: LoaderId, target_class_name: &str) -> bool {
    if super_method.is_private() {
        return false;
    }
    if super_method.is_public() || super_method.is_protected() {
        return true;
    }
    super_method
        .holder()
        .is_some_and(|holder| holder.is_same_class_package(target_loader, target_class_name))
}

/// Look for an ancestor slot that `target` may override through an inaccessible
/// intermediate declaration.
///
/// Starting at `initial_super` (the holder of the entry found at `vtable_index`), walks up
/// the superclass chain and inspects the entry each ancestor has at the same index. Returns
/// the holder of the first entry `target` overrides, `None` once the chain (or the ancestor's
/// table) ends.
///
/// ## Arguments
/// * `ctx`               - Builder context
/// * `initial_super`     - Holder of the entry currently in the slot
/// * `target`            - The method looking for a slot
/// * `vtable_index`      - The slot under consideration
/// * `target_loader`     - Defining loader of `target`
/// * `target_class_name` - Name of the class declaring `target`
///
/// # Errors
/// Returns [`Error::NotLinked`] if an ancestor has no vtable, and [`Error::Inconsistent`] if
/// the ancestor entry at `vtable_index` does not share `target`'s identity.
pub fn find_transitive_override(
    ctx: &LinkContext<'_>,
    initial_super: &ClassRc,
    target: &Method,
    vtable_index: usize,
    target_loader: LoaderId,
    target_class_name: &str,
) -> Result<Option<ClassRc>> {
    let mut current = initial_super.clone();
    loop {
        let Some(ancestor) = current.super_class.clone() else {
            return Ok(None);
        };
        let Some(ancestor_vtable) = ancestor.vtable() else {
            return Err(Error::NotLinked(ancestor.name.clone()));
        };
        if vtable_index >= ancestor_vtable.len() {
            return Ok(None);
        }
        let Some(super_method) = ancestor_vtable.method_at(vtable_index) else {
            return Ok(None);
        };
        if !super_method.same_identity(target) {
            return Err(inconsistency!(
                "vtable entry {} of {} is {}, expected {}",
                vtable_index,
                ancestor.name,
                super_method.name_and_sig(),
                target.name_and_sig()
            ));
        }

        if is_override(&super_method, target_loader, target_class_name) {
            ctx.trace(
                ctx.config.trace_vtables,
                DiagnosticCategory::Override,
                "transitive override",
                |d| {
                    d.with_class(target_class_name)
                        .with_method(super_method.display_name())
                        .with_index(vtable_index)
                },
            );
            return Ok(super_method.holder());
        }
        current = ancestor;
    }
}

/// Whether `method`, declared by a class with the given identity, needs a slot of its own.
///
/// ## Arguments
/// * `ctx`         - Builder context
/// * `method`      - The declared method
/// * `super_class` - Superclass of the declaring class, `None` for the root
/// * `loader`      - Defining loader of the declaring class
/// * `class_name`  - Name of the declaring class
/// * `class_flags` - Flags of the declaring class
#[must_use]
pub fn needs_new_vtable_entry(
    ctx: &LinkContext<'_>,
    method: &Method,
    super_class: Option<&ClassRc>,
    loader: LoaderId,
    class_name: &str,
    class_flags: ClassFlags,
) -> bool {
    if class_flags.contains(ClassFlags::INTERFACE) {
        return false;
    }

    if method.is_default_method()
        || method.is_static()
        || method.is_private()
        || method.is_initializer()
    {
        return false;
    }

    if method.is_final_method(class_flags) {
        return false;
    }

    let Some(super_class) = super_class else {
        return true;
    };

    // Overriding is impossible from outside the package, and a same-package override is
    // still given a fresh slot for subclasses in other packages
    if method.is_package_private() {
        return true;
    }

    let mut found_package_private = false;
    let mut current = Some(super_class.clone());
    while let Some(class) = current {
        let Some(super_method) = ctx
            .resolver
            .lookup_method(&class, &method.name, &method.signature)
        else {
            break;
        };
        let Some(holder) = super_method.holder() else {
            break;
        };

        if !super_method.is_static() && !super_method.is_private() {
            if is_override(&super_method, loader, class_name) {
                // Only the transitive search reaches past a closer inaccessible declaration
                return found_package_private && !ctx.config.transitive_overrides;
            }
            found_package_private = true;
        }
        current = holder.super_class.clone();
    }

    if found_package_private {
        return true;
    }

    // An abstract superclass may already have reserved a miranda slot for this method
    if super_class.has_miranda_methods()
        && ctx
            .resolver
            .lookup_method_in_all_interfaces(super_class, &method.name, &method.signature, false)
            .is_some()
    {
        return false;
    }

    true
}

/// Whether the interface method `method` is left unimplemented.
///
/// A method is a miranda when it is neither static, private nor an overpass, and no
/// instance declaration of it exists in the class, its default methods or its superclasses.
///
/// ## Arguments
/// * `method`          - The interface method
/// * `class_methods`   - Methods declared by the class
/// * `default_methods` - Default methods the class inherits; `None` ignores defaults
/// * `super_class`     - Superclass of the class
#[must_use]
pub fn is_miranda(
    method: &Method,
    class_methods: &[MethodRc],
    default_methods: Option<&[MethodRc]>,
    super_class: Option<&ClassRc>,
) -> bool {
    if method.is_static() || method.is_private() || method.is_overpass() {
        return false;
    }

    let (name, signature) = (method.name.as_str(), method.signature.as_str());
    if find_method_in(
        class_methods,
        name,
        signature,
        LookupFlags::SKIP_STATIC | LookupFlags::SKIP_PRIVATE,
    )
    .is_some()
    {
        return false;
    }

    if default_methods.is_some_and(|defaults| {
        find_method_in(defaults, name, signature, LookupFlags::empty()).is_some()
    }) {
        return false;
    }

    let mut current = super_class;
    while let Some(class) = current {
        if declares_instance_method(class, name, signature) {
            return false;
        }
        current = class.super_class.as_ref();
    }

    true
}

/// Collect the *new* miranda methods of a class.
///
/// Walks each local interface followed by its transitive interfaces and keeps every miranda
/// not already reachable through the superclass's interfaces. Results are deduplicated by
/// name and signature and ordered by discovery.
///
/// ## Arguments
/// * `ctx`              - Builder context
/// * `super_class`      - Superclass of the class
/// * `class_methods`    - Methods declared by the class
/// * `default_methods`  - Default methods the class inherits; `None` ignores defaults
/// * `local_interfaces` - Interfaces the class declares
#[must_use]
pub fn get_mirandas(
    ctx: &LinkContext<'_>,
    super_class: Option<&ClassRc>,
    class_methods: &[MethodRc],
    default_methods: Option<&[MethodRc]>,
    local_interfaces: &[ClassRc],
) -> MethodList {
    let mut new_mirandas = MethodList::new();

    for interface in local_interfaces {
        let walk = std::iter::once(interface).chain(interface.transitive_interfaces.iter());
        for candidate in walk {
            add_new_mirandas_to_list(
                ctx,
                &mut new_mirandas,
                &candidate.methods(),
                class_methods,
                default_methods,
                super_class,
            );
        }
    }

    new_mirandas
}

fn add_new_mirandas_to_list(
    ctx: &LinkContext<'_>,
    new_mirandas: &mut MethodList,
    interface_methods: &[MethodRc],
    class_methods: &[MethodRc],
    default_methods: Option<&[MethodRc]>,
    super_class: Option<&ClassRc>,
) {
    for method in interface_methods {
        if new_mirandas
            .iter()
            .any(|known| known.same_identity(method))
        {
            continue;
        }

        if !is_miranda(method, class_methods, default_methods, super_class) {
            continue;
        }

        let inherited = super_class.is_some_and(|parent| {
            ctx.resolver
                .lookup_method_in_all_interfaces(parent, &method.name, &method.signature, false)
                .is_some()
        });
        if !inherited {
            new_mirandas.push(method.clone());
        }
    }
}
