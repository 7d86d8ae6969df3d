//! Virtual dispatch tables.
//!
//! A [`VTable`] is an array of method slots. Slot `i` of a class holds the method a virtual
//! call with vtable index `i` runs on a receiver of that class. A class's table always begins
//! with its superclass's table; the entries a class contributes follow in this order:
//!
//! 1. Declared methods that override nothing (or whose override is invisible to some
//!    subclass) in declaration order.
//! 2. Default methods that override nothing.
//! 3. Miranda placeholders for interface methods no class in the hierarchy declares. Only
//!    non-interface classes get them.
//!
//! Building is split in [`compute_vtable_size`] and [`build_vtable`]. The sizing pass ignores
//! default methods when looking for mirandas, so a default that ends up with its own slot
//! finds it already reserved; a slot that is reserved but not needed stays empty.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use vmdispatch::prelude::*;
//!
//! let registry = Arc::new(ClassRegistry::new());
//! let object = ClassBuilder::new("java/lang/Object")
//!     .public()
//!     .method(MethodSpec::new("hashCode", "()I").public())
//!     .build(&registry)?;
//! let point = ClassBuilder::new("geom/Point")
//!     .extends(&object)
//!     .method(MethodSpec::new("hashCode", "()I").public())
//!     .method(MethodSpec::new("norm", "()D").public())
//!     .build(&registry)?;
//!
//! let linker = Linker::new(registry).with_config(LinkerConfig::minimal());
//! linker.link_class(&point)?;
//!
//! let vtable = point.vtable().unwrap();
//! assert_eq!(vtable.len(), 2);
//! assert!(vtable.method_at(0).unwrap().is_held_by(&point));
//! assert_eq!(vtable.select(&point, 1)?.name, "norm");
//! # Ok::<(), vmdispatch::Error>(())
//! ```

use std::{fmt, sync::RwLock};

use crate::{
    runtime::{
        diagnostics::DiagnosticCategory,
        dispatch::{
            overrides::{find_transitive_override, get_mirandas, is_override, needs_new_vtable_entry},
            LinkContext,
        },
        method::{DispatchIndex, Method, MethodList, MethodRc},
        typesystem::Class,
    },
    Error, Result,
};

/// A class's virtual dispatch table.
///
/// The length is fixed when the table is built. Entries are only replaced afterwards, by
/// class redefinition; a slot reserved but never filled stays empty.
pub struct VTable {
    entries: Box<[RwLock<Option<MethodRc>>]>,
}

impl VTable {
    pub(crate) fn from_entries(entries: Vec<Option<MethodRc>>) -> Self {
        VTable {
            entries: entries.into_iter().map(RwLock::new).collect(),
        }
    }

    /// Number of slots
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` for a table without slots
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The method in slot `index`, `None` for an empty or out-of-range slot
    #[must_use]
    pub fn method_at(&self, index: usize) -> Option<MethodRc> {
        self.entries
            .get(index)
            .and_then(|entry| read_lock!(entry).clone())
    }

    /// A snapshot of every slot
    #[must_use]
    pub fn entries(&self) -> Vec<Option<MethodRc>> {
        self.entries
            .iter()
            .map(|entry| read_lock!(entry).clone())
            .collect()
    }

    /// Replace the method in slot `index`.
    ///
    /// # Errors
    /// Returns [`Error::Inconsistent`] if `index` is past the end of the table.
    pub(crate) fn put_method_at(&self, index: usize, method: MethodRc) -> Result<()> {
        let Some(entry) = self.entries.get(index) else {
            return Err(inconsistency!(
                "vtable index {} out of bounds for length {}",
                index,
                self.entries.len()
            ));
        };
        *write_lock!(entry) = Some(method);
        Ok(())
    }

    /// Select the method a virtual call through slot `index` runs on a `receiver`.
    ///
    /// # Errors
    /// Returns [`Error::AbstractMethod`] if the slot is empty or holds an abstract method
    /// (including a miranda placeholder), and [`Error::Inconsistent`] for an index past the
    /// end of the table.
    pub fn select(&self, receiver: &Class, index: usize) -> Result<MethodRc> {
        if index >= self.entries.len() {
            return Err(inconsistency!(
                "vtable index {} out of bounds for {} (length {})",
                index,
                receiver.name,
                self.entries.len()
            ));
        }

        match self.method_at(index) {
            Some(method) if !method.is_abstract() => Ok(method),
            Some(method) => Err(Error::AbstractMethod {
                class: receiver.name.clone(),
                method: method.name_and_sig(),
            }),
            None => Err(Error::AbstractMethod {
                class: receiver.name.clone(),
                method: format!("<vtable slot {index}>"),
            }),
        }
    }

    /// The slot holding a miranda placeholder (or the interface method itself) for
    /// `name` + `signature`. Searches from the end of the table.
    #[must_use]
    pub fn index_of_miranda(&self, name: &str, signature: &str) -> Option<usize> {
        (0..self.entries.len()).rev().find(|&index| {
            self.method_at(index).is_some_and(|method| {
                method.matches(name, signature)
                    && (method.is_miranda()
                        || method.holder().is_some_and(|holder| holder.is_interface()))
            })
        })
    }

    /// `true` if slot `index` holds a miranda placeholder
    #[must_use]
    pub fn is_miranda_entry_at(&self, index: usize) -> bool {
        self.method_at(index)
            .is_some_and(|method| method.is_miranda())
    }

    /// The first slot referencing a method a redefinition has replaced
    #[must_use]
    pub fn find_old_entry(&self) -> Option<(usize, MethodRc)> {
        self.entries
            .iter()
            .enumerate()
            .find_map(|(index, entry)| {
                read_lock!(entry)
                    .as_ref()
                    .filter(|method| method.is_old())
                    .map(|method| (index, method.clone()))
            })
    }

    /// Check the table of `class` against its superclass and its own entries.
    ///
    /// Every slot shared with the superclass must hold a method with the same name and
    /// signature as the superclass's slot, and every entry must be held by `class` or one of
    /// its supertypes.
    ///
    /// # Errors
    /// Returns [`Error::Inconsistent`] for a mismatched inherited slot and
    /// [`Error::Linkage`] for an entry held by an unrelated class.
    pub fn verify(&self, class: &Class) -> Result<()> {
        if let Some(super_vtable) = class.super_class.as_ref().and_then(|s| s.vtable()) {
            if super_vtable.len() > self.len() {
                return Err(inconsistency!(
                    "vtable of {} is shorter than its superclass's",
                    class.name
                ));
            }
            for index in 0..super_vtable.len() {
                if let (Some(ours), Some(theirs)) =
                    (self.method_at(index), super_vtable.method_at(index))
                {
                    if !ours.same_identity(&theirs) {
                        return Err(inconsistency!(
                            "mismatched name/signature of vtable entries {} in {}: {} vs {}",
                            index,
                            class.name,
                            ours.name_and_sig(),
                            theirs.name_and_sig()
                        ));
                    }
                }
            }
        }

        for (index, method) in self.entries().into_iter().enumerate() {
            let Some(method) = method else {
                continue;
            };
            let related = method
                .holder()
                .is_some_and(|holder| class.is_subtype_of(&holder));
            if !related {
                return Err(Error::Linkage {
                    class: class.name.clone(),
                    message: format!(
                        "vtable entry {} holds {} which is not inherited",
                        index,
                        method.display_name()
                    ),
                });
            }
        }

        Ok(())
    }
}

impl fmt::Debug for VTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VTable")
            .field("length", &self.len())
            .finish()
    }
}

impl fmt::Display for VTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "vtable (length = {}):", self.len())?;
        for (index, entry) in self.entries().iter().enumerate() {
            match entry {
                Some(method) => {
                    let marker = if method.is_miranda() {
                        " [miranda]"
                    } else if method.is_default_method() {
                        " [default]"
                    } else {
                        ""
                    };
                    writeln!(f, "  {:>4}: {}{}", index, method.display_name(), marker)?;
                }
                None => writeln!(f, "  {:>4}: <empty>", index)?,
            }
        }
        Ok(())
    }
}

/// Result of the sizing pass.
#[derive(Debug, Clone)]
pub struct VTableSize {
    /// Total slots, inherited prefix included
    pub length: usize,
    /// Length of the superclass's table
    pub super_length: usize,
    /// Interface methods reserved as new miranda slots, defaults not yet considered
    pub new_mirandas: MethodList,
}

/// Result of the fill pass.
#[derive(Debug)]
pub struct VTableLayout {
    /// The finished table
    pub table: VTable,
    /// Slot of each default method, parallel to the class's default-method list
    pub default_vtable_indices: Vec<usize>,
    /// Placeholders appended for miranda methods
    pub mirandas: MethodList,
}

/// Compute the vtable length of `class`.
///
/// The superclass must be linked. The root class must match the configured base length.
///
/// # Errors
/// Returns [`Error::NotLinked`] for an unlinked superclass and [`Error::InvalidRootClass`]
/// for a root of the wrong length.
pub fn compute_vtable_size(ctx: &LinkContext<'_>, class: &Class) -> Result<VTableSize> {
    let super_class = class.super_class.as_ref();
    let super_length = match super_class {
        Some(parent) => parent
            .vtable()
            .map(VTable::len)
            .ok_or_else(|| Error::NotLinked(parent.name.clone()))?,
        None => 0,
    };

    let methods = class.methods();
    let declared = methods
        .iter()
        .filter(|method| {
            needs_new_vtable_entry(ctx, method, super_class, class.loader, &class.name, class.flags)
        })
        .count();

    let new_mirandas = get_mirandas(ctx, super_class, &methods, None, &class.local_interfaces);
    let mut length = super_length + declared;
    if !class.is_interface() {
        length += new_mirandas.len();
    }

    if super_class.is_none() {
        if let Some(expected) = ctx.config.base_vtable_length {
            if length != expected {
                return Err(Error::InvalidRootClass {
                    class: class.name.clone(),
                    expected,
                    actual: length,
                });
            }
        }
    }

    Ok(VTableSize {
        length,
        super_length,
        new_mirandas,
    })
}

/// Fill the vtable of `class` and assign the dispatch index of each declared method.
///
/// ## Arguments
/// * `ctx`   - Builder context
/// * `class` - The class being linked; its superclass is linked
/// * `size`  - Result of [`compute_vtable_size`] for `class`
///
/// # Errors
/// Returns [`Error::LoaderConstraint`] when an override crosses incompatible loaders,
/// [`Error::Inconsistent`] when the fill outgrows the sizing pass, and the errors of
/// [`VTable::verify`] when verification is enabled.
pub fn build_vtable(ctx: &LinkContext<'_>, class: &Class, size: &VTableSize) -> Result<VTableLayout> {
    let mut slots: Vec<Option<MethodRc>> = vec![None; size.length];
    if let Some(parent) = class.super_class.as_ref() {
        let inherited = parent
            .vtable()
            .ok_or_else(|| Error::NotLinked(parent.name.clone()))?
            .entries();
        if inherited.len() > slots.len() {
            return Err(inconsistency!(
                "vtable of {} is shorter than its superclass's",
                class.name
            ));
        }
        slots[..inherited.len()].clone_from_slice(&inherited);
    }

    let mut filler = VTableFiller {
        ctx,
        class,
        slots,
        initialized: size.super_length,
        super_length: size.super_length,
        default_override: None,
    };

    for method in class.methods() {
        if filler.update_inherited(&method, None)? {
            let index = filler.append(method.clone())?;
            method.set_dispatch_index(DispatchIndex::Virtual(index));
            ctx.trace(ctx.config.trace_vtables, DiagnosticCategory::VTable, "adding", |d| {
                d.with_class(&class.name)
                    .with_method(method.name_and_sig())
                    .with_index(index)
                    .with_flags(format!("{:?}", method.flags_access))
            });
        }
    }

    let defaults = class.default_methods();
    let mut default_vtable_indices = vec![0; defaults.len()];
    for (position, method) in defaults.iter().enumerate() {
        if filler.update_inherited(method, Some(position))? {
            let index = filler.append(method.clone())?;
            default_vtable_indices[position] = index;
            ctx.trace(
                ctx.config.trace_vtables,
                DiagnosticCategory::DefaultMethod,
                "adding default",
                |d| {
                    d.with_class(&class.name)
                        .with_method(method.display_name())
                        .with_index(index)
                },
            );
        } else if let Some(index) = filler.default_override {
            default_vtable_indices[position] = index;
        }
    }

    let mut mirandas = MethodList::new();
    if !class.is_interface() {
        let methods = class.methods();
        let pending = get_mirandas(
            ctx,
            class.super_class.as_ref(),
            &methods,
            Some(&defaults),
            &class.local_interfaces,
        );
        for interface_method in pending {
            let index = filler.initialized;
            let placeholder =
                Method::miranda(ctx.registry.next_miranda_token(), &interface_method, index);
            filler.append(placeholder.clone())?;
            ctx.trace(ctx.config.trace_vtables, DiagnosticCategory::Miranda, "fill in mirandas", |d| {
                d.with_class(&class.name)
                    .with_method(interface_method.display_name())
                    .with_index(index)
            });
            mirandas.push(placeholder);
        }
    }

    let table = VTable::from_entries(filler.slots);
    if ctx.config.verify_tables {
        table.verify(class)?;
    }

    Ok(VTableLayout {
        table,
        default_vtable_indices,
        mirandas,
    })
}

/// Mutable state of one fill pass.
struct VTableFiller<'c, 'a> {
    ctx: &'c LinkContext<'a>,
    class: &'c Class,
    slots: Vec<Option<MethodRc>>,
    initialized: usize,
    super_length: usize,
    /// Last inherited slot the current default method took over
    default_override: Option<usize>,
}

impl VTableFiller<'_, '_> {
    fn append(&mut self, method: MethodRc) -> Result<usize> {
        let index = self.initialized;
        let Some(slot) = self.slots.get_mut(index) else {
            return Err(inconsistency!(
                "vtable of {} overflows its computed length {}",
                self.class.name,
                self.slots.len()
            ));
        };
        *slot = Some(method);
        self.initialized += 1;
        Ok(index)
    }

    /// Place `target` over every inherited slot it overrides. Returns `true` if `target`
    /// still needs a slot of its own.
    ///
    /// `default_position` is `Some` for default methods; their dispatch index is never
    /// written, only the per-class index list.
    fn update_inherited(&mut self, target: &MethodRc, default_position: Option<usize>) -> Result<bool> {
        let ctx = self.ctx;
        let class = self.class;
        let is_default = default_position.is_some();
        self.default_override = None;

        if !is_default {
            target.set_dispatch_index(DispatchIndex::NonVirtual);
        }

        if target.is_static() || target.is_initializer() || target.is_private() {
            return Ok(false);
        }

        let mut allocate_new = true;
        if target.is_final_method(class.flags) {
            allocate_new = false;
        } else if class.is_interface() {
            allocate_new = false;
            if !is_default {
                // The itable builder assigns the interface index
                target.set_dispatch_index(DispatchIndex::Unassigned);
            }
        }

        if class.super_class.is_none() {
            return Ok(allocate_new);
        }

        let target_holder = target.holder();
        let target_loader = target_holder.as_ref().map_or(class.loader, |h| h.loader);
        let target_class_name = target_holder
            .as_ref()
            .map_or_else(|| class.name.clone(), |h| h.name.clone());

        for index in 0..self.super_length {
            let Some(super_method) = self.slots[index].clone() else {
                continue;
            };
            if !super_method.same_identity(target) {
                continue;
            }
            let Some(mut super_holder) = super_method.holder() else {
                continue;
            };

            let mut overrides = is_default
                || is_override(&super_method, target_loader, &target_class_name);
            if !overrides && ctx.config.transitive_overrides && !super_method.is_private() {
                if let Some(holder) = find_transitive_override(
                    ctx,
                    &super_holder,
                    target,
                    index,
                    target_loader,
                    &target_class_name,
                )? {
                    super_holder = holder;
                    overrides = true;
                }
            }

            if !overrides {
                ctx.trace(ctx.config.trace_vtables, DiagnosticCategory::Override, "NOT overriding", |d| {
                    d.with_class(&class.name)
                        .with_method(super_method.display_name())
                        .with_index(index)
                });
                continue;
            }

            if !target.is_package_private() {
                allocate_new = false;
            }

            if ctx.config.check_loader_constraints && target_loader != super_holder.loader {
                if let Some(type_name) = ctx.constraints.check_signature_loaders(
                    &target.signature,
                    target_loader,
                    super_holder.loader,
                ) {
                    ctx.diagnostics.error(
                        DiagnosticCategory::LoaderConstraint,
                        format!(
                            "{} overriding {} in {}",
                            target.display_name(),
                            super_method.display_name(),
                            class.name
                        ),
                    );
                    return Err(Error::LoaderConstraint {
                        class: class.name.clone(),
                        method: target.name_and_sig(),
                        type_name,
                        loader: target_loader,
                        other_loader: super_holder.loader,
                    });
                }
            }

            self.slots[index] = Some(target.clone());
            if is_default {
                self.default_override = Some(index);
            } else {
                target.set_dispatch_index(DispatchIndex::Virtual(index));
            }
            ctx.trace(ctx.config.trace_vtables, DiagnosticCategory::Override, "overriding", |d| {
                d.with_class(&class.name)
                    .with_method(target.display_name())
                    .with_index(index)
            });
        }

        Ok(allocate_new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        runtime::{
            config::LinkerConfig,
            method::RevisionState,
            typesystem::{ClassBuilder, ClassRegistry, LookupFlags, MethodSpec},
        },
        runtime::linker::Linker,
        test::factories::{class, interface, linked_root, root_class, ROOT_VTABLE_LENGTH},
    };
    use std::sync::Arc;

    #[test]
    fn test_root_vtable() {
        let (_linker, object) = linked_root();
        let vtable = object.vtable().unwrap();
        assert_eq!(vtable.len(), ROOT_VTABLE_LENGTH);

        let names: Vec<_> = vtable
            .entries()
            .into_iter()
            .map(|m| m.unwrap().name.clone())
            .collect();
        assert_eq!(names, vec!["equals", "hashCode", "toString", "clone", "finalize"]);

        let get_class = object
            .find_local_method("getClass", "()Ljava/lang/Class;", LookupFlags::empty())
            .unwrap();
        assert_eq!(get_class.dispatch_index(), DispatchIndex::NonVirtual);
    }

    #[test]
    fn test_root_length_is_checked() {
        let registry = Arc::new(ClassRegistry::new());
        let object = ClassBuilder::new("java/lang/Object")
            .method(MethodSpec::new("hashCode", "()I").public())
            .build(&registry)
            .unwrap();
        let linker = Linker::new(registry);

        match linker.link_class(&object) {
            Err(Error::InvalidRootClass {
                expected, actual, ..
            }) => {
                assert_eq!(expected, ROOT_VTABLE_LENGTH);
                assert_eq!(actual, 1);
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(!object.is_linked());
    }

    #[test]
    fn test_override_reuses_slot() {
        let (linker, object) = linked_root();
        let registry = linker.registry();
        let point = class(
            registry,
            "app/Point",
            &object,
            &[],
            vec![
                MethodSpec::new("hashCode", "()I").public(),
                MethodSpec::new("norm", "()D").public(),
            ],
        );
        linker.link_class(&point).unwrap();

        let vtable = point.vtable().unwrap();
        assert_eq!(vtable.len(), ROOT_VTABLE_LENGTH + 1);
        assert!(vtable.method_at(1).unwrap().is_held_by(&point));
        assert_eq!(vtable.method_at(5).unwrap().name, "norm");
        assert_eq!(point.methods()[0].vtable_index(), Some(1));
        assert_eq!(point.methods()[1].vtable_index(), Some(5));
        assert_eq!(point.methods()[1].dispatch_index().to_string(), "vtable[5]");
    }

    #[test]
    fn test_final_and_private_methods_take_no_slot() {
        let (linker, object) = linked_root();
        let registry = linker.registry();
        let sealed = class(
            registry,
            "app/Sealed",
            &object,
            &[],
            vec![
                MethodSpec::new("fixed", "()V").public().final_(),
                MethodSpec::new("hidden", "()V").private(),
                MethodSpec::new("toString", "()Ljava/lang/String;").public().final_(),
            ],
        );
        linker.link_class(&sealed).unwrap();

        assert_eq!(sealed.vtable_length(), ROOT_VTABLE_LENGTH);
        let methods = sealed.methods();
        assert_eq!(methods[0].dispatch_index(), DispatchIndex::NonVirtual);
        assert_eq!(methods[1].dispatch_index(), DispatchIndex::NonVirtual);
        // A final override still takes over the inherited slot
        assert_eq!(methods[2].vtable_index(), Some(2));
        assert!(sealed.vtable().unwrap().method_at(2).unwrap().is_held_by(&sealed));
    }

    #[test]
    fn test_miranda_placeholder_for_abstract_class() {
        let (linker, object) = linked_root();
        let registry = linker.registry();
        let shape = interface(registry, "app/Shape", &[], &[("area", "()D")]);
        let base = ClassBuilder::new("app/AbstractShape")
            .abstract_()
            .extends(&object)
            .implements(&shape)
            .build(registry)
            .unwrap();
        linker.link_class(&base).unwrap();

        let vtable = base.vtable().unwrap();
        assert_eq!(vtable.len(), ROOT_VTABLE_LENGTH + 1);
        assert!(vtable.is_miranda_entry_at(ROOT_VTABLE_LENGTH));
        assert_eq!(vtable.index_of_miranda("area", "()D"), Some(ROOT_VTABLE_LENGTH));
        assert_eq!(base.mirandas().len(), 1);
        assert!(base.mirandas()[0].is_held_by(&shape));
        assert!(matches!(
            vtable.select(&base, ROOT_VTABLE_LENGTH),
            Err(Error::AbstractMethod { .. })
        ));

        // The subclass implements the miranda and takes over its slot
        let square = class(
            registry,
            "app/Square",
            &base,
            &[],
            vec![MethodSpec::new("area", "()D").public()],
        );
        linker.link_class(&square).unwrap();
        assert_eq!(square.vtable_length(), ROOT_VTABLE_LENGTH + 1);
        assert_eq!(square.methods()[0].vtable_index(), Some(ROOT_VTABLE_LENGTH));
        assert!(!square.has_miranda_methods());
    }

    #[test]
    fn test_default_method_slots() {
        let (linker, object) = linked_root();
        let registry = linker.registry();
        let greeter = ClassBuilder::new("app/Greeter")
            .interface()
            .method(MethodSpec::new("greet", "()V").public().code(&[1]))
            .build(registry)
            .unwrap();
        let first = class(registry, "app/First", &object, &[&greeter], vec![]);
        linker.link_class(&first).unwrap();

        assert_eq!(first.vtable_length(), ROOT_VTABLE_LENGTH + 1);
        assert_eq!(first.default_vtable_indices(), &[ROOT_VTABLE_LENGTH]);
        let default = first.vtable().unwrap().method_at(ROOT_VTABLE_LENGTH).unwrap();
        assert!(default.is_held_by(&greeter));
        // Defaults keep their own dispatch index; the slot lives on the class
        assert!(!default.has_vtable_index());

        let second = class(registry, "app/Second", &first, &[], vec![]);
        linker.link_class(&second).unwrap();
        assert_eq!(second.vtable_length(), ROOT_VTABLE_LENGTH + 1);
    }

    #[test]
    fn test_verify_rejects_unrelated_entries() {
        let registry = ClassRegistry::new();
        let object = root_class(&registry);
        let stranger = ClassBuilder::new("app/Stranger")
            .extends(&object)
            .method(MethodSpec::new("hashCode", "()I").public())
            .build(&registry)
            .unwrap();
        let other = ClassBuilder::new("app/Other")
            .extends(&object)
            .build(&registry)
            .unwrap();

        let table = VTable::from_entries(vec![Some(stranger.methods()[0].clone())]);
        assert!(matches!(table.verify(&other), Err(Error::Linkage { .. })));
        assert!(table.verify(&stranger).is_ok());
    }

    #[test]
    fn test_find_old_entry_and_display() {
        let registry = ClassRegistry::new();
        let object = root_class(&registry);
        let method = object
            .find_local_method("toString", "()Ljava/lang/String;", LookupFlags::empty())
            .unwrap();
        let table = VTable::from_entries(vec![Some(method.clone()), None]);
        assert!(table.find_old_entry().is_none());

        method.set_revision(RevisionState::Old);
        assert_eq!(table.find_old_entry().map(|(index, _)| index), Some(0));

        let dump = table.to_string();
        assert!(dump.contains("length = 2"));
        assert!(dump.contains("java/lang/Object.toString"));
        assert!(dump.contains("<empty>"));
    }

    #[test]
    fn test_minimal_config_accepts_any_root() {
        let registry = Arc::new(ClassRegistry::new());
        let object = ClassBuilder::new("java/lang/Object")
            .build(&registry)
            .unwrap();
        let linker = Linker::new(registry).with_config(LinkerConfig::minimal());
        linker.link_class(&object).unwrap();
        assert_eq!(object.vtable_length(), 0);
    }
}
