//! Dispatch table construction.
//!
//! This module builds the two per-class dispatch structures of the runtime:
//!
//! - [`VTable`]: one slot per virtual method. A class's table starts with a copy of its
//!   superclass's table; overriding methods replace inherited slots and everything else is
//!   appended. Unimplemented interface methods of abstract classes get *miranda*
//!   placeholders so that every virtual call site has a slot to dispatch through.
//! - [`ITable`]: a header of `(interface, offset)` entries terminated by an empty entry,
//!   followed by one block of method entries per implemented interface. Each block is indexed
//!   by the interface-local index assigned to the interface's methods.
//!
//! Both tables are built in two passes. The sizing pass ([`vtable::compute_vtable_size`],
//! [`itable::compute_itable_size`]) is pure; the fill pass writes dispatch indices on the
//! class's methods and produces the finished table. Redefinition later patches entries in
//! place through [`revision`].
//!
//! # Key Components
//!
//! - [`LinkContext`] - Collaborators and configuration shared by every builder
//! - [`overrides`] - The override, new-slot and miranda rules
//! - [`vtable`] - Virtual table sizing, fill, selection and verification
//! - [`itable`] - Interface table sizing, index assignment, fill and selection
//! - [`revision`] - In-place entry replacement after redefinition
//!
//! # Thread Safety
//!
//! Builders take the class's `init_lock` through the linker and only read other classes,
//! whose tables are immutable apart from entry replacement during redefinition. Table
//! entries sit behind per-entry locks.

pub mod itable;
pub mod overrides;
pub mod revision;
pub mod vtable;

pub use itable::{ITable, ItableEntry, ItableOffsetEntry};
pub use revision::TableAdjustments;
pub use vtable::{VTable, VTableLayout, VTableSize};

use crate::runtime::{
    config::LinkerConfig,
    constraints::LoaderConstraints,
    diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics},
    resolution::MethodResolver,
    typesystem::ClassRegistry,
};

/// Everything a table builder needs besides the class it works on.
pub struct LinkContext<'a> {
    /// Source of miranda placeholder tokens and of the classes redefinition walks
    pub registry: &'a ClassRegistry,
    /// Active configuration
    pub config: &'a LinkerConfig,
    /// Loader-compatibility collaborator
    pub constraints: &'a dyn LoaderConstraints,
    /// Method lookup collaborator
    pub resolver: &'a dyn MethodResolver,
    /// Trace sink
    pub diagnostics: &'a Diagnostics,
}

impl<'a> LinkContext<'a> {
    /// Bundle the collaborators for one builder invocation.
    pub fn new(
        registry: &'a ClassRegistry,
        config: &'a LinkerConfig,
        constraints: &'a dyn LoaderConstraints,
        resolver: &'a dyn MethodResolver,
        diagnostics: &'a Diagnostics,
    ) -> Self {
        LinkContext {
            registry,
            config,
            constraints,
            resolver,
            diagnostics,
        }
    }

    /// Record an info-level step if `enabled`. Context is only attached when it is kept.
    pub(crate) fn trace<F>(
        &self,
        enabled: bool,
        category: DiagnosticCategory,
        message: &str,
        decorate: F,
    ) where
        F: FnOnce(Diagnostic) -> Diagnostic,
    {
        if enabled {
            self.diagnostics.push(decorate(Diagnostic::new(
                DiagnosticSeverity::Info,
                category,
                message,
            )));
        }
    }
}
