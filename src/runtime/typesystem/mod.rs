//! Class model consumed by the dispatch table builders.
//!
//! This module provides the class descriptor the linker operates on: a single-inheritance
//! class (or interface) with an ordered method list, its local and transitive interfaces,
//! the default methods it inherits from those interfaces, and, once linked, its virtual and
//! interface dispatch tables.
//!
//! # Key Components
//!
//! - [`Class`]: The class descriptor
//! - [`ClassRegistry`]: Concurrent registry of every defined class
//! - [`ClassBuilder`] / [`MethodSpec`]: Fluent construction of classes and their methods
//! - [`ClassRef`]: Weak back-reference held by methods
//! - [`LoaderId`], [`ClassFlags`], [`LookupFlags`]: Identity and flag types
//!
//! # Class Lifecycle
//!
//! 1. **Definition**: [`ClassBuilder::build`] creates the descriptor, assigns tokens,
//!    computes the transitive interface closure and the default-method list, and registers
//!    the class.
//! 2. **Linking**: [`crate::runtime::linker::Linker::link_class`] builds the virtual table,
//!    then the interface table, and installs both. Tables are installed exactly once.
//! 3. **Redefinition**: [`crate::runtime::linker::Linker::redefine_class`] swaps the method
//!    list and rewrites table entries in place.
//!
//! # Examples
//!
//! ```rust
//! use vmdispatch::prelude::*;
//!
//! let registry = ClassRegistry::new();
//! let object = ClassBuilder::new("java/lang/Object")
//!     .public()
//!     .method(MethodSpec::new("hashCode", "()I").public())
//!     .build(&registry)?;
//!
//! let point = ClassBuilder::new("geom/Point")
//!     .public()
//!     .extends(&object)
//!     .method(MethodSpec::new("hashCode", "()I").public())
//!     .build(&registry)?;
//!
//! assert!(point.is_subtype_of(&object));
//! assert_eq!(point.package(), "geom");
//! # Ok::<(), vmdispatch::Error>(())
//! ```

mod base;
mod builder;
mod defaults;
mod registry;

pub use base::{package_of, ClassFlags, ClassRef, LoaderId, LookupFlags, CLASS_FLAGS_MASK};
pub use builder::{ClassBuilder, MethodSpec};
pub use registry::ClassRegistry;

use std::{
    fmt,
    sync::{Arc, Mutex, OnceLock, RwLock},
};

use crate::{
    runtime::{
        dispatch::{ITable, VTable},
        method::{MethodList, MethodRc},
        token::Token,
    },
    Error, Result,
};

/// A reference-counted [`Class`]
pub type ClassRc = Arc<Class>;
/// An ordered list of classes
pub type ClassList = Vec<ClassRc>;

/// Tables produced by linking, installed on the class in one step.
pub(crate) struct LinkedTables {
    pub vtable: VTable,
    pub default_vtable_indices: Vec<usize>,
    pub mirandas: MethodList,
    pub itable: ITable,
}

/// A loaded class or interface.
///
/// The identity fields are fixed at definition time. The method list and default-method
/// list may be replaced by redefinition; the dispatch tables are installed once by the
/// linker and afterwards only their entries change.
pub struct Class {
    /// Runtime token
    pub token: Token,
    /// Internal name, `/`-separated (e.g. `java/lang/Object`)
    pub name: String,
    /// Defining loader
    pub loader: LoaderId,
    /// Access flags
    pub flags: ClassFlags,
    /// Superclass; `None` only for the root class
    pub super_class: Option<ClassRc>,
    /// Directly implemented (or, for interfaces, extended) interfaces, in declaration order
    pub local_interfaces: ClassList,
    /// Every interface implemented directly or indirectly, duplicates removed
    pub transitive_interfaces: ClassList,
    methods: RwLock<MethodList>,
    default_methods: RwLock<MethodList>,
    default_vtable_indices: OnceLock<Vec<usize>>,
    mirandas: OnceLock<MethodList>,
    vtable: OnceLock<VTable>,
    itable: OnceLock<ITable>,
    pub(crate) init_lock: Mutex<()>,
}

impl Class {
    pub(crate) fn new(
        token: Token,
        name: String,
        loader: LoaderId,
        flags: ClassFlags,
        super_class: Option<ClassRc>,
        local_interfaces: ClassList,
        transitive_interfaces: ClassList,
        methods: MethodList,
        default_methods: MethodList,
    ) -> Self {
        Class {
            token,
            name,
            loader,
            flags,
            super_class,
            local_interfaces,
            transitive_interfaces,
            methods: RwLock::new(methods),
            default_methods: RwLock::new(default_methods),
            default_vtable_indices: OnceLock::new(),
            mirandas: OnceLock::new(),
            vtable: OnceLock::new(),
            itable: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// `true` for interfaces
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags.contains(ClassFlags::INTERFACE)
    }

    /// `true` for abstract classes and interfaces
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(ClassFlags::ABSTRACT)
    }

    /// `true` for final classes
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.flags.contains(ClassFlags::FINAL)
    }

    /// `true` for public classes
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.flags.contains(ClassFlags::PUBLIC)
    }

    /// The package part of the class name
    #[must_use]
    pub fn package(&self) -> &str {
        package_of(&self.name)
    }

    /// `true` if a class named `class_name` defined by `loader` shares this class's runtime
    /// package
    #[must_use]
    pub fn is_same_class_package(&self, loader: LoaderId, class_name: &str) -> bool {
        self.loader == loader && self.package() == package_of(class_name)
    }

    /// A snapshot of the declared methods, in declaration order
    #[must_use]
    pub fn methods(&self) -> MethodList {
        read_lock!(self.methods).clone()
    }

    /// Number of declared methods
    #[must_use]
    pub fn method_count(&self) -> usize {
        read_lock!(self.methods).len()
    }

    /// A snapshot of the default methods this class inherits
    #[must_use]
    pub fn default_methods(&self) -> MethodList {
        read_lock!(self.default_methods).clone()
    }

    /// Vtable index of each default method, in `default_methods` order (empty until linked)
    #[must_use]
    pub fn default_vtable_indices(&self) -> &[usize] {
        self.default_vtable_indices
            .get()
            .map_or(&[], Vec::as_slice)
    }

    /// Miranda placeholders this class introduced into its vtable (empty until linked)
    #[must_use]
    pub fn mirandas(&self) -> &[MethodRc] {
        self.mirandas.get().map_or(&[], Vec::as_slice)
    }

    /// `true` if linking appended miranda placeholders to this class's vtable
    #[must_use]
    pub fn has_miranda_methods(&self) -> bool {
        !self.mirandas().is_empty()
    }

    /// The virtual dispatch table, once linked
    #[must_use]
    pub fn vtable(&self) -> Option<&VTable> {
        self.vtable.get()
    }

    /// The interface dispatch table, once linked
    #[must_use]
    pub fn itable(&self) -> Option<&ITable> {
        self.itable.get()
    }

    /// Length of the virtual table, 0 while unlinked
    #[must_use]
    pub fn vtable_length(&self) -> usize {
        self.vtable.get().map_or(0, VTable::len)
    }

    /// `true` once both dispatch tables are installed
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.itable.get().is_some()
    }

    /// Iterate the superclass chain, starting at the direct superclass
    pub fn supers(&self) -> impl Iterator<Item = &ClassRc> {
        std::iter::successors(self.super_class.as_ref(), |class| class.super_class.as_ref())
    }

    /// `true` if `other` is this class, one of its superclasses or one of its interfaces
    #[must_use]
    pub fn is_subtype_of(&self, other: &Class) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if other.is_interface() {
            return self.implements_interface(other);
        }
        self.supers().any(|class| std::ptr::eq(class.as_ref(), other))
    }

    /// `true` if `interface` is among this class's transitive interfaces
    #[must_use]
    pub fn implements_interface(&self, interface: &Class) -> bool {
        self.transitive_interfaces
            .iter()
            .any(|candidate| std::ptr::eq(candidate.as_ref(), interface))
    }

    /// Find a method declared by this class.
    ///
    /// ## Arguments
    /// * `name`      - Method name
    /// * `signature` - Method descriptor
    /// * `flags`     - Kinds of methods to ignore
    #[must_use]
    pub fn find_local_method(
        &self,
        name: &str,
        signature: &str,
        flags: LookupFlags,
    ) -> Option<MethodRc> {
        find_method_in(&read_lock!(self.methods), name, signature, flags)
    }

    /// Find a method by name and signature in this class or, failing that, its superclasses.
    ///
    /// Static, private and overpass methods are all candidates; the closest declaration wins.
    #[must_use]
    pub fn lookup_method(&self, name: &str, signature: &str) -> Option<MethodRc> {
        if let Some(found) = self.find_local_method(name, signature, LookupFlags::empty()) {
            return Some(found);
        }
        self.supers()
            .find_map(|class| class.find_local_method(name, signature, LookupFlags::empty()))
    }

    /// Find a public instance method by name and signature declared by any transitive
    /// interface.
    ///
    /// ## Arguments
    /// * `skip_defaults` - Ignore concrete (default) interface methods
    #[must_use]
    pub fn lookup_method_in_all_interfaces(
        &self,
        name: &str,
        signature: &str,
        skip_defaults: bool,
    ) -> Option<MethodRc> {
        self.transitive_interfaces.iter().find_map(|interface| {
            interface
                .find_local_method(name, signature, LookupFlags::SKIP_STATIC)
                .filter(|method| method.is_public())
                .filter(|method| !skip_defaults || !method.is_default_method())
        })
    }

    /// Find a default method this class inherits
    #[must_use]
    pub fn find_default_method(&self, name: &str, signature: &str) -> Option<MethodRc> {
        find_method_in(
            &read_lock!(self.default_methods),
            name,
            signature,
            LookupFlags::empty(),
        )
    }

    /// The current method declared with `idnum`
    #[must_use]
    pub fn method_with_idnum(&self, idnum: u16) -> Option<MethodRc> {
        read_lock!(self.methods)
            .iter()
            .find(|method| method.idnum == idnum)
            .cloned()
    }

    /// Swap the declared methods, returning the previous list
    pub(crate) fn replace_methods(&self, methods: MethodList) -> MethodList {
        std::mem::replace(&mut *write_lock!(self.methods), methods)
    }

    /// Replace `old` with `new` in the default-method list at the entry recorded for
    /// `vtable_index`. Returns `true` if the list changed.
    pub(crate) fn replace_default_method(
        &self,
        vtable_index: usize,
        old: &MethodRc,
        new: &MethodRc,
    ) -> bool {
        let Some(position) = self
            .default_vtable_indices()
            .iter()
            .position(|&index| index == vtable_index)
        else {
            return false;
        };

        let mut defaults = write_lock!(self.default_methods);
        match defaults.get_mut(position) {
            Some(slot) if Arc::ptr_eq(slot, old) => {
                *slot = new.clone();
                true
            }
            _ => false,
        }
    }

    /// Install the tables produced by linking.
    ///
    /// # Errors
    /// Returns [`Error::AlreadyLinked`] if tables were installed before.
    pub(crate) fn install_tables(&self, tables: LinkedTables) -> Result<()> {
        if self.vtable.get().is_some() {
            return Err(Error::AlreadyLinked(self.name.clone()));
        }

        let _ = self
            .default_vtable_indices
            .set(tables.default_vtable_indices);
        let _ = self.mirandas.set(tables.mirandas);
        let _ = self.vtable.set(tables.vtable);
        if self.itable.set(tables.itable).is_err() {
            return Err(Error::AlreadyLinked(self.name.clone()));
        }
        Ok(())
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("token", &self.token)
            .field("name", &self.name)
            .field("loader", &self.loader)
            .field("flags", &self.flags)
            .field("super", &self.super_class.as_ref().map(|s| &s.name))
            .field("methods", &self.method_count())
            .field("linked", &self.is_linked())
            .finish()
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Search `methods` for `name` + `signature`, honouring `flags`.
pub(crate) fn find_method_in(
    methods: &[MethodRc],
    name: &str,
    signature: &str,
    flags: LookupFlags,
) -> Option<MethodRc> {
    methods
        .iter()
        .filter(|method| method.matches(name, signature))
        .find(|method| {
            !((flags.contains(LookupFlags::SKIP_OVERPASS) && method.is_overpass())
                || (flags.contains(LookupFlags::SKIP_STATIC) && method.is_static())
                || (flags.contains(LookupFlags::SKIP_PRIVATE) && method.is_private()))
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::factories::{interface, root_class};

    #[test]
    fn test_supers_and_subtyping() {
        let registry = ClassRegistry::new();
        let object = root_class(&registry);
        let base = ClassBuilder::new("app/Base")
            .public()
            .extends(&object)
            .build(&registry)
            .unwrap();
        let derived = ClassBuilder::new("app/Derived")
            .public()
            .extends(&base)
            .build(&registry)
            .unwrap();

        let chain: Vec<_> = derived.supers().map(|c| c.name.as_str()).collect();
        assert_eq!(chain, vec!["app/Base", "java/lang/Object"]);
        assert!(derived.is_subtype_of(&object));
        assert!(derived.is_subtype_of(&derived));
        assert!(!base.is_subtype_of(&derived));
    }

    #[test]
    fn test_transitive_interface_order() {
        let registry = ClassRegistry::new();
        let object = root_class(&registry);
        let a = interface(&registry, "app/A", &[], &[("a", "()V")]);
        let b = interface(&registry, "app/B", &[&a], &[("b", "()V")]);
        let c = interface(&registry, "app/C", &[], &[("c", "()V")]);

        let base = ClassBuilder::new("app/Base")
            .extends(&object)
            .implements(&c)
            .build(&registry)
            .unwrap();
        let derived = ClassBuilder::new("app/Derived")
            .extends(&base)
            .implements(&b)
            .implements(&c)
            .build(&registry)
            .unwrap();

        let names: Vec<_> = derived
            .transitive_interfaces
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(names, vec!["app/C", "app/B", "app/A"]);
        assert!(derived.implements_interface(&a));
        assert!(!object.implements_interface(&a));
    }

    #[test]
    fn test_interface_super_is_root() {
        let registry = ClassRegistry::new();
        let object = root_class(&registry);
        let runnable = interface(&registry, "java/lang/Runnable", &[], &[("run", "()V")]);

        let super_class = runnable.super_class.as_ref().unwrap();
        assert!(Arc::ptr_eq(super_class, &object));
        assert!(runnable.is_interface());
        assert!(runnable.is_abstract());
    }

    #[test]
    fn test_method_lookup() {
        let registry = ClassRegistry::new();
        let object = root_class(&registry);
        let base = ClassBuilder::new("app/Base")
            .extends(&object)
            .method(MethodSpec::new("helper", "()V").private())
            .method(MethodSpec::new("util", "()V").public().static_())
            .build(&registry)
            .unwrap();

        assert!(base
            .find_local_method("helper", "()V", LookupFlags::SKIP_PRIVATE)
            .is_none());
        assert!(base
            .find_local_method("helper", "()V", LookupFlags::empty())
            .is_some());
        assert!(base
            .find_local_method("util", "()V", LookupFlags::SKIP_STATIC)
            .is_none());

        let inherited = base.lookup_method("hashCode", "()I").unwrap();
        assert!(inherited.is_held_by(&object));
        assert!(base.lookup_method("missing", "()V").is_none());
    }

    #[test]
    fn test_same_class_package() {
        let registry = ClassRegistry::new();
        let object = root_class(&registry);
        let a = ClassBuilder::new("p1/A")
            .extends(&object)
            .loader(LoaderId(1))
            .build(&registry)
            .unwrap();

        assert!(a.is_same_class_package(LoaderId(1), "p1/Other"));
        assert!(!a.is_same_class_package(LoaderId(2), "p1/Other"));
        assert!(!a.is_same_class_package(LoaderId(1), "p2/Other"));
    }
}
