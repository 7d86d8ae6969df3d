//! Linking statistics.
//!
//! [`LinkStatistics`] accumulates table sizes across every class a linker processes. Counters
//! are atomics so parallel linking workers update them without locking; [`LinkStatistics::snapshot`]
//! returns a plain [`LinkStats`] value for reporting.

use std::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Running totals updated by the linker.
#[derive(Debug, Default)]
pub struct LinkStatistics {
    classes_linked: AtomicUsize,
    vtable_entries: AtomicUsize,
    miranda_entries: AtomicUsize,
    itable_classes: AtomicUsize,
    itable_words: AtomicUsize,
    entries_adjusted: AtomicUsize,
}

impl LinkStatistics {
    /// Create zeroed statistics
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a linked class.
    ///
    /// ## Arguments
    /// * `vtable_length` - Slots in the class's vtable
    /// * `mirandas`      - Miranda placeholders the class introduced
    /// * `itable_words`  - Size of the class's itable in words, 0 for none
    pub(crate) fn record_class(&self, vtable_length: usize, mirandas: usize, itable_words: usize) {
        self.classes_linked.fetch_add(1, Ordering::Relaxed);
        self.vtable_entries
            .fetch_add(vtable_length, Ordering::Relaxed);
        self.miranda_entries.fetch_add(mirandas, Ordering::Relaxed);
        if itable_words > 0 {
            self.itable_classes.fetch_add(1, Ordering::Relaxed);
            self.itable_words.fetch_add(itable_words, Ordering::Relaxed);
        }
    }

    /// Record table entries rewritten by a redefinition
    pub(crate) fn record_adjusted(&self, entries: usize) {
        self.entries_adjusted.fetch_add(entries, Ordering::Relaxed);
    }

    /// A consistent-enough copy of the counters
    #[must_use]
    pub fn snapshot(&self) -> LinkStats {
        LinkStats {
            classes_linked: self.classes_linked.load(Ordering::Relaxed),
            vtable_entries: self.vtable_entries.load(Ordering::Relaxed),
            miranda_entries: self.miranda_entries.load(Ordering::Relaxed),
            itable_classes: self.itable_classes.load(Ordering::Relaxed),
            itable_words: self.itable_words.load(Ordering::Relaxed),
            entries_adjusted: self.entries_adjusted.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter
    pub fn reset(&self) {
        self.classes_linked.store(0, Ordering::Relaxed);
        self.vtable_entries.store(0, Ordering::Relaxed);
        self.miranda_entries.store(0, Ordering::Relaxed);
        self.itable_classes.store(0, Ordering::Relaxed);
        self.itable_words.store(0, Ordering::Relaxed);
        self.entries_adjusted.store(0, Ordering::Relaxed);
    }
}

impl fmt::Display for LinkStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.snapshot())
    }
}

/// Point-in-time copy of [`LinkStatistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Classes whose tables were installed
    pub classes_linked: usize,
    /// Sum of vtable lengths
    pub vtable_entries: usize,
    /// Miranda placeholders appended
    pub miranda_entries: usize,
    /// Classes with a non-empty itable
    pub itable_classes: usize,
    /// Sum of itable sizes, in words
    pub itable_words: usize,
    /// Table entries rewritten by redefinition
    pub entries_adjusted: usize,
}

impl LinkStats {
    /// Average vtable length over linked classes
    #[must_use]
    pub fn average_vtable_length(&self) -> f64 {
        if self.classes_linked == 0 {
            return 0.0;
        }
        self.vtable_entries as f64 / self.classes_linked as f64
    }
}

impl fmt::Display for LinkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Classes linked:   {}", self.classes_linked)?;
        writeln!(
            f,
            "Vtable entries:   {} (avg {:.1} per class)",
            self.vtable_entries,
            self.average_vtable_length()
        )?;
        writeln!(f, "Miranda entries:  {}", self.miranda_entries)?;
        writeln!(
            f,
            "Itables:          {} classes, {} words",
            self.itable_classes, self.itable_words
        )?;
        write!(f, "Entries adjusted: {}", self.entries_adjusted)
    }
}
