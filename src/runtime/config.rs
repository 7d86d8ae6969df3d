//! Linker configuration
//!
//! This module provides the options that control how the [`crate::runtime::linker::Linker`]
//! builds dispatch tables: which semantic checks run, the expected shape of the root class,
//! and which trace records are collected.

/// Configuration for linking classes.
///
/// `LinkerConfig` is a plain `Copy` value handed to the linker at construction. The presets
/// cover the common cases; individual fields can be adjusted afterwards.
///
/// # Examples
///
/// ```rust
/// use vmdispatch::runtime::config::LinkerConfig;
///
/// let config = LinkerConfig {
///     trace_itables: true,
///     ..LinkerConfig::production()
/// };
/// assert!(config.check_loader_constraints);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct LinkerConfig {
    /// Consult the loader-compatibility collaborator whenever an override or an interface
    /// implementation crosses loaders
    pub check_loader_constraints: bool,

    /// Let a method override a superclass method through an intermediate package-private
    /// declaration from another package
    pub transitive_overrides: bool,

    /// Required vtable length of the root class; `None` accepts any length
    pub base_vtable_length: Option<usize>,

    /// Verify each finished vtable against its superclass and its own entries
    pub verify_tables: bool,

    /// Record vtable construction steps in the diagnostics sink
    pub trace_vtables: bool,

    /// Record itable construction steps in the diagnostics sink
    pub trace_itables: bool,

    /// Record table adjustments made by class redefinition
    pub trace_redefinition: bool,

    /// Maximum superclass / superinterface nesting the linker follows
    pub max_hierarchy_depth: usize,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            check_loader_constraints: true,
            transitive_overrides: true,
            base_vtable_length: Some(5),
            verify_tables: true,
            trace_vtables: false,
            trace_itables: false,
            trace_redefinition: false,
            max_hierarchy_depth: 256,
        }
    }
}

impl LinkerConfig {
    /// Creates a configuration with every optional check disabled.
    ///
    /// Loader constraints are not consulted and the root class may have any length.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            check_loader_constraints: false,
            transitive_overrides: true,
            base_vtable_length: None,
            verify_tables: false,
            trace_vtables: false,
            trace_itables: false,
            trace_redefinition: false,
            max_hierarchy_depth: 256,
        }
    }

    /// Creates the configuration a production runtime links with.
    #[must_use]
    pub fn production() -> Self {
        Self {
            check_loader_constraints: true,
            transitive_overrides: true,
            base_vtable_length: Some(5),
            verify_tables: false, // Sizing and fill share one code path
            trace_vtables: false,
            trace_itables: false,
            trace_redefinition: false,
            max_hierarchy_depth: 256,
        }
    }

    /// Creates a configuration with every check enabled and tracing off.
    #[must_use]
    pub fn strict() -> Self {
        Self::default()
    }

    /// Creates a configuration with every check and every trace enabled.
    #[must_use]
    pub fn diagnostic() -> Self {
        Self {
            trace_vtables: true,
            trace_itables: true,
            trace_redefinition: true,
            ..Self::strict()
        }
    }

    /// Replaces the required root vtable length.
    #[must_use]
    pub fn with_base_vtable_length(mut self, length: Option<usize>) -> Self {
        self.base_vtable_length = length;
        self
    }
}
