//! Method flags, dispatch indices and revision states.
//!
//! This module defines the bitflags used to describe a method's access level and modifiers,
//! and the small state types the linker attaches to every method.
//!
//! # Key Types
//! - [`MethodAccessFlags`], [`MethodModifiers`]: Attribute flags, extracted from raw access words
//! - [`DispatchIndex`]: Tagged table index assigned by the vtable and itable builders
//! - [`RevisionState`]: Where a method body stands with respect to class redefinition

use std::fmt;

use bitflags::bitflags;
use strum::{Display, EnumIter};

/// Bits of a raw access word that carry the access level
pub const METHOD_ACCESS_MASK: u32 = 0x0007;

// Method attributes split into logical groups
bitflags! {
    #[derive(PartialEq, Eq, Debug, Clone, Copy)]
    /// Access level of a method.
    ///
    /// A method with none of these bits set is package-private: it is visible to, and may
    /// only be overridden from, classes of the same runtime package.
    pub struct MethodAccessFlags: u32 {
        /// Accessible from everywhere
        const PUBLIC = 0x0001;
        /// Accessible only inside the declaring class
        const PRIVATE = 0x0002;
        /// Accessible from subclasses and the declaring package
        const PROTECTED = 0x0004;
    }
}

impl MethodAccessFlags {
    /// Extracts the access level from a raw access word.
    #[must_use]
    pub fn from_method_flags(flags: u32) -> Self {
        let access = flags & METHOD_ACCESS_MASK;
        Self::from_bits_truncate(access)
    }

    /// `true` when no explicit access level is set.
    #[must_use]
    pub fn is_package_private(&self) -> bool {
        self.is_empty()
    }
}

bitflags! {
    #[derive(PartialEq, Eq, Debug, Clone, Copy)]
    /// Modifiers of a method.
    ///
    /// The low bits follow the class-file encoding. `OVERPASS` and `MIRANDA` are runtime
    /// bits: overpasses are bridge bodies synthesized by default-method processing, mirandas
    /// are the placeholders synthesized by the vtable builder.
    pub struct MethodModifiers: u32 {
        /// Class-level method, never dispatched virtually
        const STATIC = 0x0008;
        /// Cannot be overridden
        const FINAL = 0x0010;
        /// Invocation takes the receiver's monitor
        const SYNCHRONIZED = 0x0020;
        /// Compiler-generated bridge
        const BRIDGE = 0x0040;
        /// Implemented outside the managed runtime
        const NATIVE = 0x0100;
        /// No body
        const ABSTRACT = 0x0400;
        /// Not present in source
        const SYNTHETIC = 0x1000;
        /// Synthesized bridge generated for default-method dispatch
        const OVERPASS = 0x0001_0000;
        /// Placeholder for an unimplemented interface method
        const MIRANDA = 0x0002_0000;
    }
}

impl MethodModifiers {
    /// Extracts the modifiers from a raw access word.
    #[must_use]
    pub fn from_method_flags(flags: u32) -> Self {
        let modifiers = flags & !METHOD_ACCESS_MASK;
        Self::from_bits_truncate(modifiers)
    }
}

/// Slot assigned to a method by the dispatch table builders.
///
/// A method carries at most one of a virtual or interface index. Static, private and
/// initializer methods end up [`DispatchIndex::NonVirtual`] (or stay unassigned if their
/// class is never linked).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DispatchIndex {
    /// Not yet visited by a builder
    #[default]
    Unassigned,
    /// Dispatched statically, no table entry
    NonVirtual,
    /// Index into the declaring class's virtual table
    Virtual(usize),
    /// Index into the declaring interface's segment of an interface table
    Interface(usize),
}

impl DispatchIndex {
    /// Returns the virtual table index, if one is assigned.
    #[must_use]
    pub fn vtable_index(&self) -> Option<usize> {
        match self {
            DispatchIndex::Virtual(index) => Some(*index),
            _ => None,
        }
    }

    /// Returns the interface table index, if one is assigned.
    #[must_use]
    pub fn itable_index(&self) -> Option<usize> {
        match self {
            DispatchIndex::Interface(index) => Some(*index),
            _ => None,
        }
    }

    /// `true` until a builder has visited the method.
    #[must_use]
    pub fn is_unassigned(&self) -> bool {
        matches!(self, DispatchIndex::Unassigned)
    }
}

impl fmt::Display for DispatchIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchIndex::Unassigned => write!(f, "unassigned"),
            DispatchIndex::NonVirtual => write!(f, "nonvirtual"),
            DispatchIndex::Virtual(index) => write!(f, "vtable[{}]", index),
            DispatchIndex::Interface(index) => write!(f, "itable[{}]", index),
        }
    }
}

/// Lifecycle of a method body with respect to class redefinition.
///
/// `Old` bodies were replaced by an equivalent body sharing their `idnum`; `Obsolete` and
/// `Deleted` bodies have no equivalent replacement and are permanently retired. A table
/// that still references a retired body after adjustment is corrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter)]
pub enum RevisionState {
    /// The body installed on its holder
    #[default]
    Current,
    /// Replaced by an equivalent body
    Old,
    /// Replaced by a body that is not equivalent
    Obsolete,
    /// Removed by the redefinition with no replacement
    Deleted,
}

impl RevisionState {
    /// `true` once a redefinition replaced or removed the body.
    #[must_use]
    pub fn is_old(&self) -> bool {
        !matches!(self, RevisionState::Current)
    }

    /// `true` for bodies that may never be executed again.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        matches!(self, RevisionState::Obsolete | RevisionState::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_access_extraction() {
        let raw = 0x0001 | 0x0010 | 0x0400;
        let access = MethodAccessFlags::from_method_flags(raw);
        assert_eq!(access, MethodAccessFlags::PUBLIC);

        let modifiers = MethodModifiers::from_method_flags(raw);
        assert!(modifiers.contains(MethodModifiers::FINAL));
        assert!(modifiers.contains(MethodModifiers::ABSTRACT));
        assert!(!modifiers.contains(MethodModifiers::STATIC));

        assert!(MethodAccessFlags::from_method_flags(0x0008).is_package_private());
    }

    #[test]
    fn test_dispatch_index() {
        assert!(DispatchIndex::default().is_unassigned());
        assert_eq!(DispatchIndex::Virtual(4).vtable_index(), Some(4));
        assert_eq!(DispatchIndex::Virtual(4).itable_index(), None);
        assert_eq!(DispatchIndex::Interface(1).itable_index(), Some(1));
        assert_eq!(DispatchIndex::NonVirtual.vtable_index(), None);
        assert_eq!(format!("{}", DispatchIndex::Virtual(3)), "vtable[3]");
    }

    #[test]
    fn test_revision_states() {
        let retired: Vec<_> = RevisionState::iter().filter(|s| s.is_retired()).collect();
        assert_eq!(retired, vec![RevisionState::Obsolete, RevisionState::Deleted]);

        assert!(!RevisionState::Current.is_old());
        assert!(RevisionState::Old.is_old());
        assert!(!RevisionState::Old.is_retired());
        assert_eq!(RevisionState::Obsolete.to_string(), "Obsolete");
    }
}
