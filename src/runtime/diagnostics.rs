//! Diagnostics collection for linking and redefinition.
//!
//! The table builders record what they do (slots added, overrides taken or refused, miranda
//! placeholders appended, itable entries bound) in a shared [`Diagnostics`] sink when the
//! matching trace option of [`crate::runtime::config::LinkerConfig`] is enabled. Every record
//! is also forwarded to the `log` facade, so a host that installed a logger sees the same
//! stream without reading the sink.
//!
//! The [`Diagnostics`] container uses `boxcar::Vec` for lock-free append operations, so
//! classes linked in parallel report into one sink without synchronization.
//!
//! # Key Components
//!
//! - [`Diagnostics`] - Thread-safe container for diagnostic entries
//! - [`Diagnostic`] - Individual entry with severity and linking context
//! - [`DiagnosticSeverity`] - Severity level (Info, Warning, Error)
//! - [`DiagnosticCategory`] - Which builder produced the entry
//!
//! # Usage Examples
//!
//! ```rust
//! use vmdispatch::runtime::diagnostics::{Diagnostic, Diagnostics, DiagnosticCategory, DiagnosticSeverity};
//!
//! let diagnostics = Diagnostics::new();
//! diagnostics.push(
//!     Diagnostic::new(DiagnosticSeverity::Info, DiagnosticCategory::VTable, "adding method")
//!         .with_class("app/Point")
//!         .with_method("hashCode()I")
//!         .with_index(5),
//! );
//!
//! for entry in diagnostics.by_category(DiagnosticCategory::VTable) {
//!     println!("{entry}");
//! }
//! assert_eq!(diagnostics.count(), 1);
//! ```
//!
//! # Thread Safety
//!
//! All types in this module are [`Send`] and [`Sync`].

use std::fmt::{self, Write};

use strum::Display;

/// Severity level of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticSeverity {
    /// Trace of a normal construction step.
    Info,

    /// Something unusual that did not stop linking.
    ///
    /// Examples: a package-private method that could not be overridden from another package.
    Warning,

    /// A failure that aborted linking or redefinition of a class.
    Error,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Info => write!(f, "INFO"),
            DiagnosticSeverity::Warning => write!(f, "WARN"),
            DiagnosticSeverity::Error => write!(f, "ERROR"),
        }
    }
}

/// Category indicating which part of the linker produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum DiagnosticCategory {
    /// Virtual table sizing and fill.
    VTable,

    /// Interface table sizing, index assignment and fill.
    ITable,

    /// Miranda placeholder creation.
    Miranda,

    /// Default-method slot assignment.
    DefaultMethod,

    /// Override decisions between a method and an inherited slot.
    Override,

    /// Loader-compatibility checks.
    LoaderConstraint,

    /// Table adjustments made by class redefinition.
    Redefinition,

    /// Anything else (class linked, batch summaries).
    General,
}

/// A single diagnostic entry with linking context.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level of this diagnostic.
    pub severity: DiagnosticSeverity,

    /// Category indicating the source of this diagnostic.
    pub category: DiagnosticCategory,

    /// Human-readable description.
    pub message: String,

    /// Class whose tables were being built.
    pub class: Option<String>,

    /// Method involved, as `name` + `signature` or `Holder.name(sig)`.
    pub method: Option<String>,

    /// Table index involved.
    pub index: Option<usize>,

    /// Flags of the method involved, rendered for display.
    pub flags: Option<String>,
}

impl Diagnostic {
    /// Creates a new diagnostic entry.
    ///
    /// # Arguments
    ///
    /// * `severity` - Severity level of the diagnostic
    /// * `category` - Category of the diagnostic source
    /// * `message` - Human-readable description
    pub fn new(
        severity: DiagnosticSeverity,
        category: DiagnosticCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            class: None,
            method: None,
            index: None,
            flags: None,
        }
    }

    /// Adds the class being linked.
    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Adds the method involved.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Adds the table index involved.
    #[must_use]
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Adds the flags of the method involved.
    #[must_use]
    pub fn with_flags(mut self, flags: impl Into<String>) -> Self {
        self.flags = Some(flags.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.category, self.message)?;

        if let Some(class) = &self.class {
            write!(f, " (class: {class})")?;
        }

        if let Some(method) = &self.method {
            write!(f, " (method: {method})")?;
        }

        if let Some(index) = self.index {
            write!(f, " (index: {index})")?;
        }

        if let Some(flags) = &self.flags {
            write!(f, " (flags: {flags})")?;
        }

        Ok(())
    }
}

/// Thread-safe container for collecting diagnostic entries.
///
/// Uses `boxcar::Vec` internally for lock-free concurrent append operations.
#[derive(Debug)]
pub struct Diagnostics {
    entries: boxcar::Vec<Diagnostic>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    /// Creates a new empty diagnostics container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: boxcar::Vec::new(),
        }
    }

    /// Adds an informational diagnostic.
    ///
    /// # Arguments
    ///
    /// * `category` - Category of the diagnostic
    /// * `message` - Description of the step
    pub fn info(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(DiagnosticSeverity::Info, category, message));
    }

    /// Adds a warning diagnostic.
    pub fn warning(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(
            DiagnosticSeverity::Warning,
            category,
            message,
        ));
    }

    /// Adds an error diagnostic.
    pub fn error(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(
            DiagnosticSeverity::Error,
            category,
            message,
        ));
    }

    /// Adds a diagnostic entry and forwards it to the `log` facade.
    ///
    /// Info entries are logged at `trace` level, warnings at `warn` and errors at `error`.
    pub fn push(&self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            DiagnosticSeverity::Info => log::trace!("{diagnostic}"),
            DiagnosticSeverity::Warning => log::warn!("{diagnostic}"),
            DiagnosticSeverity::Error => log::error!("{diagnostic}"),
        }
        self.entries.push(diagnostic);
    }

    /// Returns true if any diagnostics have been collected.
    pub fn has_any(&self) -> bool {
        self.entries.count() > 0
    }

    /// Returns true if any error-level diagnostics have been collected.
    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, d)| d.severity == DiagnosticSeverity::Error)
    }

    /// Returns true if any warning-level diagnostics have been collected.
    pub fn has_warnings(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, d)| d.severity == DiagnosticSeverity::Warning)
    }

    /// Returns the total number of diagnostics.
    pub fn count(&self) -> usize {
        self.entries.count()
    }

    /// Returns the number of diagnostics with `severity`.
    pub fn count_of(&self, severity: DiagnosticSeverity) -> usize {
        self.entries
            .iter()
            .filter(|(_, d)| d.severity == severity)
            .count()
    }

    /// Returns an iterator over all diagnostics, in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().map(|(_, d)| d)
    }

    /// Returns diagnostics filtered by category.
    pub fn by_category(&self, category: DiagnosticCategory) -> Vec<&Diagnostic> {
        self.entries
            .iter()
            .filter(|(_, d)| d.category == category)
            .map(|(_, d)| d)
            .collect()
    }

    /// Returns diagnostics recorded for the class named `class`.
    pub fn for_class(&self, class: &str) -> Vec<&Diagnostic> {
        self.entries
            .iter()
            .filter(|(_, d)| d.class.as_deref() == Some(class))
            .map(|(_, d)| d)
            .collect()
    }

    /// Formats a summary of the warnings and errors for display.
    pub fn summary(&self) -> String {
        let mut output = String::new();

        let error_count = self.count_of(DiagnosticSeverity::Error);
        let warning_count = self.count_of(DiagnosticSeverity::Warning);
        let info_count = self.count_of(DiagnosticSeverity::Info);

        let _ = writeln!(
            output,
            "Diagnostics: {} error(s), {} warning(s), {} info(s)",
            error_count, warning_count, info_count
        );

        for severity in [DiagnosticSeverity::Error, DiagnosticSeverity::Warning] {
            for diag in self.iter().filter(|d| d.severity == severity) {
                let _ = writeln!(output, "  {diag}");
            }
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_diagnostic_with_context() {
        let diag = Diagnostic::new(
            DiagnosticSeverity::Info,
            DiagnosticCategory::Override,
            "overriding",
        )
        .with_class("app/B")
        .with_method("m()V")
        .with_index(5)
        .with_flags("PUBLIC");

        assert_eq!(diag.class.as_deref(), Some("app/B"));
        assert_eq!(diag.index, Some(5));

        let display = diag.to_string();
        assert!(display.contains("INFO"));
        assert!(display.contains("Override"));
        assert!(display.contains("(class: app/B)"));
        assert!(display.contains("(index: 5)"));
    }

    #[test]
    fn test_diagnostics_container() {
        let diagnostics = Diagnostics::new();
        assert!(!diagnostics.has_any());

        diagnostics.info(DiagnosticCategory::VTable, "adding");
        diagnostics.warning(DiagnosticCategory::Override, "not overriding");
        diagnostics.error(DiagnosticCategory::LoaderConstraint, "violation");

        assert_eq!(diagnostics.count(), 3);
        assert_eq!(diagnostics.count_of(DiagnosticSeverity::Error), 1);
        assert!(diagnostics.has_errors());
        assert!(diagnostics.has_warnings());
        assert_eq!(diagnostics.by_category(DiagnosticCategory::VTable).len(), 1);

        let summary = diagnostics.summary();
        assert!(summary.contains("1 error(s), 1 warning(s), 1 info(s)"));
        assert!(summary.contains("violation"));
        assert!(!summary.contains("adding"));
    }

    #[test]
    fn test_diagnostics_thread_safety() {
        let diagnostics = Arc::new(Diagnostics::new());
        let mut handles = vec![];

        for i in 0..10 {
            let diag_clone = Arc::clone(&diagnostics);
            handles.push(thread::spawn(move || {
                diag_clone.push(
                    Diagnostic::new(DiagnosticSeverity::Info, DiagnosticCategory::ITable, "bound")
                        .with_class(format!("app/C{i}")),
                );
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(diagnostics.count(), 10);
        assert_eq!(diagnostics.for_class("app/C3").len(), 1);
    }
}
