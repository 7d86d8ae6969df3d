//! # vmdispatch Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! of the vmdispatch library. Import this module to get quick access to the essential
//! types for defining, linking and redefining classes.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all vmdispatch operations
pub use crate::Error;

/// The result type used throughout vmdispatch
pub use crate::Result;

/// Runtime token identifying classes and methods
pub use crate::runtime::token::Token;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Drives linking and redefinition
pub use crate::runtime::linker::{Linker, RedefinitionReport};

/// Configuration presets for the linker
pub use crate::runtime::config::LinkerConfig;

// ================================================================================================
// Type System
// ================================================================================================

/// Classes and their handles
pub use crate::runtime::typesystem::{Class, ClassList, ClassRc, ClassRef};

/// Class definition helpers
pub use crate::runtime::typesystem::{ClassBuilder, MethodSpec};

/// Class storage, loaders and flags
pub use crate::runtime::typesystem::{ClassFlags, ClassRegistry, LoaderId, LookupFlags};

/// Methods and their dispatch metadata
pub use crate::runtime::method::{
    DispatchIndex, Method, MethodAccessFlags, MethodList, MethodModifiers, MethodRc,
    RevisionState,
};

// ================================================================================================
// Dispatch Tables
// ================================================================================================

/// Vtable and itable types
pub use crate::runtime::dispatch::{
    ITable, ItableEntry, ItableOffsetEntry, LinkContext, TableAdjustments, VTable, VTableLayout, VTableSize,
};

// ================================================================================================
// Pluggable Services and Reporting
// ================================================================================================

/// Loader-constraint checking
pub use crate::runtime::constraints::{LoaderConstraintTable, LoaderConstraints, NoLoaderConstraints};

/// Method lookup used by the vtable builder
pub use crate::runtime::resolution::{HierarchyResolver, MethodResolver};

/// Diagnostics collected while linking
pub use crate::runtime::diagnostics::{
    Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics,
};

/// Linking counters
pub use crate::runtime::statistics::{LinkStatistics, LinkStats};
