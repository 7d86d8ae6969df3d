//! Method descriptors.
//!
//! A [`Method`] is the unit the dispatch tables are made of. It carries an immutable identity
//! (name, signature, declaring class and declaration ordinal) and two pieces of mutable
//! dispatch metadata: the [`DispatchIndex`] assigned by the table builders and the
//! [`RevisionState`] maintained by class redefinition.
//!
//! # Key Components
//!
//! - [`Method`] - The method descriptor
//! - [`MethodRc`] / [`MethodList`] - Shared handles used by classes and tables
//! - [`types`] - Access flags, modifiers, dispatch indices and revision states
//!
//! # Identity
//!
//! Two methods have the same *identity* when they share their name and signature. Dispatch
//! table slots are matched by identity, never by pointer, and a redefined body replaces an
//! old one only when both share identity and `idnum`.
//!
//! # Thread Safety
//!
//! `Method` is [`Send`] and [`Sync`]. The holder back-reference is written once when the
//! owning class is created; the dispatch index and revision state sit behind their own
//! locks and are only written by the builders and the redefinition path.

pub mod types;

use std::sync::{Arc, OnceLock, RwLock};

pub use types::*;

use crate::runtime::{
    token::Token,
    typesystem::{Class, ClassFlags, ClassRc, ClassRef},
};

/// Name of instance initializers
pub const OBJECT_INITIALIZER_NAME: &str = "<init>";
/// Name of class initializers
pub const CLASS_INITIALIZER_NAME: &str = "<clinit>";

/// A reference-counted [`Method`]
pub type MethodRc = Arc<Method>;
/// An ordered list of methods, as declared by a class
pub type MethodList = Vec<MethodRc>;

/// A method declared by (or synthesized for) a class.
///
/// Methods are created by [`crate::runtime::typesystem::ClassBuilder`] when a class is
/// defined, and by the vtable builder for miranda placeholders. Their dispatch index is
/// assigned when the declaring class is linked.
#[derive(Debug)]
pub struct Method {
    /// Runtime token of the method
    pub token: Token,
    /// Declaration ordinal; a redefined replacement shares the `idnum` of the body it replaces
    pub idnum: u16,
    /// Simple name, e.g. `toString`
    pub name: String,
    /// Descriptor, e.g. `()Ljava/lang/String;`
    pub signature: String,
    /// Access level
    pub flags_access: MethodAccessFlags,
    /// Modifiers
    pub flags_modifiers: MethodModifiers,
    /// Opaque method body; compared to decide whether a redefined body is equivalent
    pub code: Box<[u8]>,
    holder: OnceLock<ClassRef>,
    dispatch: RwLock<DispatchIndex>,
    revision: RwLock<RevisionState>,
}

impl Method {
    /// Create a new method descriptor without a holder.
    ///
    /// The holder is attached once the declaring class exists, see [`Method::set_holder`].
    ///
    /// ## Arguments
    /// * `token`     - Runtime token of the method
    /// * `idnum`     - Declaration ordinal inside the holder
    /// * `name`      - Simple name
    /// * `signature` - Method descriptor
    /// * `flags`     - Raw access word; split into access level and modifiers
    /// * `code`      - Method body
    pub fn new(
        token: Token,
        idnum: u16,
        name: impl Into<String>,
        signature: impl Into<String>,
        flags: u32,
        code: &[u8],
    ) -> Self {
        Method {
            token,
            idnum,
            name: name.into(),
            signature: signature.into(),
            flags_access: MethodAccessFlags::from_method_flags(flags),
            flags_modifiers: MethodModifiers::from_method_flags(flags),
            code: code.into(),
            holder: OnceLock::new(),
            dispatch: RwLock::new(DispatchIndex::Unassigned),
            revision: RwLock::new(RevisionState::Current),
        }
    }

    /// Synthesize a miranda placeholder for `interface_method`.
    ///
    /// The placeholder carries the interface method's name and signature, is public and
    /// abstract, and is held by the interface that declares the method. It receives the
    /// vtable index of the slot it is appended at.
    ///
    /// ## Arguments
    /// * `token`            - Token for the placeholder
    /// * `interface_method` - The unimplemented interface method
    /// * `index`            - Slot in the introducing class's vtable
    #[must_use]
    pub fn miranda(token: Token, interface_method: &Method, index: usize) -> MethodRc {
        let method = Method {
            token,
            idnum: interface_method.idnum,
            name: interface_method.name.clone(),
            signature: interface_method.signature.clone(),
            flags_access: MethodAccessFlags::PUBLIC,
            flags_modifiers: MethodModifiers::ABSTRACT | MethodModifiers::MIRANDA,
            code: Box::default(),
            holder: OnceLock::new(),
            dispatch: RwLock::new(DispatchIndex::Virtual(index)),
            revision: RwLock::new(RevisionState::Current),
        };
        if let Some(holder) = interface_method.holder.get() {
            let _ = method.holder.set(holder.clone());
        }

        Arc::new(method)
    }

    /// Attach the declaring class. Only the first call has an effect.
    pub fn set_holder(&self, holder: &ClassRc) {
        let _ = self.holder.set(ClassRef::new(holder));
    }

    /// The declaring class, `None` if it was not attached yet or has been dropped
    #[must_use]
    pub fn holder(&self) -> Option<ClassRc> {
        self.holder.get().and_then(ClassRef::upgrade)
    }

    /// `true` if the method is declared by `class`
    #[must_use]
    pub fn is_held_by(&self, class: &Class) -> bool {
        self.holder.get().is_some_and(|holder| holder.points_to(class))
    }

    /// `name` followed by `signature`, e.g. `toString()Ljava/lang/String;`
    #[must_use]
    pub fn name_and_sig(&self) -> String {
        format!("{}{}", self.name, self.signature)
    }

    /// `Holder.name(sig)` for diagnostics and error messages
    #[must_use]
    pub fn display_name(&self) -> String {
        let holder = self
            .holder
            .get()
            .and_then(ClassRef::name)
            .unwrap_or_else(|| String::from("<unknown>"));
        format!("{}.{}{}", holder, self.name, self.signature)
    }

    /// `true` if both methods have the same name and signature
    #[must_use]
    pub fn same_identity(&self, other: &Method) -> bool {
        self.name == other.name && self.signature == other.signature
    }

    /// `true` if the method matches `name` and `signature`
    #[must_use]
    pub fn matches(&self, name: &str, signature: &str) -> bool {
        self.name == name && self.signature == signature
    }

    /// Explicitly public
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.flags_access.contains(MethodAccessFlags::PUBLIC)
    }

    /// Explicitly private
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.flags_access.contains(MethodAccessFlags::PRIVATE)
    }

    /// Explicitly protected
    #[must_use]
    pub fn is_protected(&self) -> bool {
        self.flags_access.contains(MethodAccessFlags::PROTECTED)
    }

    /// No access modifier: visible inside the runtime package only
    #[must_use]
    pub fn is_package_private(&self) -> bool {
        self.flags_access.is_package_private()
    }

    /// Static method
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags_modifiers.contains(MethodModifiers::STATIC)
    }

    /// Declared final
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.flags_modifiers.contains(MethodModifiers::FINAL)
    }

    /// Declared abstract (includes miranda placeholders)
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags_modifiers.contains(MethodModifiers::ABSTRACT)
    }

    /// Synthesized bridge for default-method dispatch
    #[must_use]
    pub fn is_overpass(&self) -> bool {
        self.flags_modifiers.contains(MethodModifiers::OVERPASS)
    }

    /// Placeholder synthesized for an unimplemented interface method
    #[must_use]
    pub fn is_miranda(&self) -> bool {
        self.flags_modifiers.contains(MethodModifiers::MIRANDA)
    }

    /// `<init>` or `<clinit>`
    #[must_use]
    pub fn is_initializer(&self) -> bool {
        self.name == OBJECT_INITIALIZER_NAME || self.name == CLASS_INITIALIZER_NAME
    }

    /// A concrete instance method declared by an interface
    #[must_use]
    pub fn is_default_method(&self) -> bool {
        !self.is_abstract()
            && !self.is_static()
            && self.holder().is_some_and(|holder| holder.is_interface())
    }

    /// Whether the method can be bound statically.
    ///
    /// A method is final when it, or its class, is declared final. Overpasses and default
    /// methods are never final: they are inherited into classes whose finality they do not
    /// share.
    #[must_use]
    pub fn is_final_method(&self, class_flags: ClassFlags) -> bool {
        if self.is_overpass() || self.is_default_method() {
            return false;
        }
        self.is_final() || class_flags.contains(ClassFlags::FINAL)
    }

    /// The currently assigned dispatch index
    #[must_use]
    pub fn dispatch_index(&self) -> DispatchIndex {
        *read_lock!(self.dispatch)
    }

    /// The virtual table index, if one is assigned
    #[must_use]
    pub fn vtable_index(&self) -> Option<usize> {
        self.dispatch_index().vtable_index()
    }

    /// The interface table index, if one is assigned
    #[must_use]
    pub fn itable_index(&self) -> Option<usize> {
        self.dispatch_index().itable_index()
    }

    /// `true` if the method has a virtual table slot
    #[must_use]
    pub fn has_vtable_index(&self) -> bool {
        self.vtable_index().is_some()
    }

    /// `true` if the method has an interface table slot
    #[must_use]
    pub fn has_itable_index(&self) -> bool {
        self.itable_index().is_some()
    }

    pub(crate) fn set_dispatch_index(&self, index: DispatchIndex) {
        *write_lock!(self.dispatch) = index;
    }

    /// The current revision state
    #[must_use]
    pub fn revision(&self) -> RevisionState {
        *read_lock!(self.revision)
    }

    /// `true` once a redefinition replaced or removed this body
    #[must_use]
    pub fn is_old(&self) -> bool {
        self.revision().is_old()
    }

    /// `true` for bodies that may never run again
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.revision().is_retired()
    }

    pub(crate) fn set_revision(&self, state: RevisionState) {
        *write_lock!(self.revision) = state;
    }
}
