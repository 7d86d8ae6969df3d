//! Core building blocks shared by the class model.
//!
//! This module holds the small value types that the [`crate::runtime::typesystem::Class`]
//! descriptor is assembled from: the weak [`ClassRef`] used for method back-references, the
//! [`LoaderId`] that identifies a defining loader, and the flag sets describing a class and a
//! method lookup.

use std::{
    fmt,
    sync::{Arc, Weak},
};

use bitflags::bitflags;

use crate::runtime::{
    token::Token,
    typesystem::{Class, ClassRc},
};

/// A weak reference to a [`Class`].
///
/// Methods point back at their declaring class through a `ClassRef` so that the
/// class → method → class cycle does not keep either alive. The class owns its methods;
/// a method whose class was dropped has no holder.
#[derive(Clone, Debug)]
pub struct ClassRef {
    weak_ref: Weak<Class>,
}

impl ClassRef {
    /// Create a new `ClassRef` from a strong reference
    pub fn new(strong_ref: &ClassRc) -> Self {
        Self {
            weak_ref: Arc::downgrade(strong_ref),
        }
    }

    /// Get a strong reference to the class, returns None if the class has been dropped
    #[must_use]
    pub fn upgrade(&self) -> Option<ClassRc> {
        self.weak_ref.upgrade()
    }

    /// Get a strong reference to the class, panicking if it has been dropped
    ///
    /// # Panics
    /// Panics if the class has been dropped
    #[must_use]
    pub fn expect(&self, msg: &str) -> ClassRc {
        self.weak_ref.upgrade().expect(msg)
    }

    /// Check if the referenced class is still alive
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.weak_ref.strong_count() > 0
    }

    /// `true` if this reference points at `class`
    #[must_use]
    pub fn points_to(&self, class: &Class) -> bool {
        std::ptr::eq(self.weak_ref.as_ptr(), class)
    }

    /// Get the token of the referenced class (if still alive)
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        self.upgrade().map(|c| c.token)
    }

    /// Get the name of the referenced class (if still alive)
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.upgrade().map(|c| c.name.clone())
    }
}

impl From<ClassRc> for ClassRef {
    fn from(strong_ref: ClassRc) -> Self {
        Self::new(&strong_ref)
    }
}

/// Identity of a defining class loader.
///
/// Two classes belong to the same runtime package only if their names share a package
/// prefix *and* they were defined by the same loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LoaderId(pub u32);

impl LoaderId {
    /// The loader that defines the root class and the core library
    pub const BOOTSTRAP: LoaderId = LoaderId(0);

    /// `true` for the bootstrap loader
    #[must_use]
    pub fn is_bootstrap(&self) -> bool {
        *self == Self::BOOTSTRAP
    }
}

impl fmt::Display for LoaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bootstrap() {
            write!(f, "'bootstrap'")
        } else {
            write!(f, "'loader#{}'", self.0)
        }
    }
}

/// Bits of a raw class access word understood by the linker
pub const CLASS_FLAGS_MASK: u32 = 0x1611;

bitflags! {
    #[derive(PartialEq, Eq, Debug, Clone, Copy)]
    /// Access flags of a class or interface
    pub struct ClassFlags: u32 {
        /// Visible outside its package
        const PUBLIC = 0x0001;
        /// Cannot be subclassed; every method is implicitly final
        const FINAL = 0x0010;
        /// Declared as an interface
        const INTERFACE = 0x0200;
        /// Cannot be instantiated
        const ABSTRACT = 0x0400;
        /// Not present in source
        const SYNTHETIC = 0x1000;
    }
}

impl ClassFlags {
    /// Extracts the flags the linker cares about from a raw access word.
    #[must_use]
    pub fn from_class_flags(flags: u32) -> Self {
        Self::from_bits_truncate(flags & CLASS_FLAGS_MASK)
    }
}

bitflags! {
    #[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
    /// Filters applied while searching a method list by name and signature
    pub struct LookupFlags: u32 {
        /// Ignore synthesized overpass bridges
        const SKIP_OVERPASS = 0x0001;
        /// Ignore static methods
        const SKIP_STATIC = 0x0002;
        /// Ignore private methods
        const SKIP_PRIVATE = 0x0004;
    }
}

/// Returns the runtime package of an internal class name (`a/b/C` → `a/b`).
///
/// Classes in the unnamed package return the empty string.
#[must_use]
pub fn package_of(class_name: &str) -> &str {
    match class_name.rfind('/') {
        Some(pos) => &class_name[..pos],
        None => "",
    }
}
