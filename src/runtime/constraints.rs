//! Loader-compatibility checks.
//!
//! When a method overrides (or implements) a method whose holder was defined by another
//! loader, both loaders must resolve every class named in the shared signature to the same
//! class. The table builders delegate that question to a [`LoaderConstraints`]
//! implementation and turn a reported mismatch into
//! [`crate::Error::LoaderConstraint`].
//!
//! # Key Components
//!
//! - [`LoaderConstraints`] - The collaborator trait
//! - [`NoLoaderConstraints`] - Accepts every pair of loaders
//! - [`LoaderConstraintTable`] - Records known conflicts per loader pair and type name
//! - [`signature_class_names`] - Class names referenced by a method descriptor

use std::collections::HashSet;

use dashmap::DashMap;

use crate::runtime::typesystem::LoaderId;

/// Loader-compatibility collaborator.
pub trait LoaderConstraints: Send + Sync {
    /// Checks that `loader` and `other_loader` agree on every class named by `signature`.
    ///
    /// # Arguments
    ///
    /// * `signature` - Method descriptor shared by both methods
    /// * `loader` - Defining loader of the overriding or implementing method
    /// * `other_loader` - Defining loader of the overridden or interface method
    ///
    /// Returns the name of the first type the loaders disagree on, `None` when compatible.
    fn check_signature_loaders(
        &self,
        signature: &str,
        loader: LoaderId,
        other_loader: LoaderId,
    ) -> Option<String>;
}

/// Accepts every pair of loaders.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLoaderConstraints;

impl LoaderConstraints for NoLoaderConstraints {
    fn check_signature_loaders(&self, _: &str, _: LoaderId, _: LoaderId) -> Option<String> {
        None
    }
}

/// Known conflicts between pairs of loaders.
///
/// A host records that two loaders resolved a class name to different classes with
/// [`LoaderConstraintTable::add_conflict`]; linking then rejects any cross-loader binding
/// whose signature names that class.
///
/// # Examples
///
/// ```rust
/// use vmdispatch::runtime::constraints::{LoaderConstraints, LoaderConstraintTable};
/// use vmdispatch::runtime::typesystem::LoaderId;
///
/// let table = LoaderConstraintTable::new();
/// table.add_conflict("app/Shared", LoaderId(1), LoaderId(2));
///
/// let failed = table.check_signature_loaders("(Lapp/Shared;)V", LoaderId(2), LoaderId(1));
/// assert_eq!(failed.as_deref(), Some("app/Shared"));
/// assert!(table.check_signature_loaders("()V", LoaderId(1), LoaderId(2)).is_none());
/// ```
#[derive(Debug, Default)]
pub struct LoaderConstraintTable {
    conflicts: DashMap<(LoaderId, LoaderId), HashSet<String>>,
}

impl LoaderConstraintTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: LoaderId, b: LoaderId) -> (LoaderId, LoaderId) {
        if a.0 <= b.0 {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Record that `loader` and `other_loader` resolve `type_name` to different classes.
    pub fn add_conflict(&self, type_name: impl Into<String>, loader: LoaderId, other_loader: LoaderId) {
        self.conflicts
            .entry(Self::key(loader, other_loader))
            .or_default()
            .insert(type_name.into());
    }

    /// Forget every conflict between `loader` and `other_loader`
    pub fn clear_pair(&self, loader: LoaderId, other_loader: LoaderId) {
        self.conflicts.remove(&Self::key(loader, other_loader));
    }

    /// Number of recorded conflicts
    pub fn len(&self) -> usize {
        self.conflicts.iter().map(|entry| entry.value().len()).sum()
    }

    /// `true` if no conflicts are recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LoaderConstraints for LoaderConstraintTable {
    fn check_signature_loaders(
        &self,
        signature: &str,
        loader: LoaderId,
        other_loader: LoaderId,
    ) -> Option<String> {
        if loader == other_loader {
            return None;
        }

        let conflicts = self.conflicts.get(&Self::key(loader, other_loader))?;
        signature_class_names(signature)
            .into_iter()
            .find(|name| conflicts.contains(*name))
            .map(str::to_string)
    }
}

/// Class names referenced by a method descriptor, in order of appearance.
///
/// Array types contribute their element class; primitive types contribute nothing.
///
/// ```rust
/// use vmdispatch::runtime::constraints::signature_class_names;
///
/// let names = signature_class_names("(I[Ljava/lang/String;J)Lapp/Result;");
/// assert_eq!(names, vec!["java/lang/String", "app/Result"]);
/// ```
#[must_use]
pub fn signature_class_names(signature: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = signature;
    while let Some(start) = rest.find('L') {
        let after = &rest[start + 1..];
        let Some(end) = after.find(';') else {
            break;
        };
        names.push(&after[..end]);
        rest = &after[end + 1..];
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_class_names() {
        assert!(signature_class_names("()V").is_empty());
        assert!(signature_class_names("(IJZ)D").is_empty());
        assert_eq!(
            signature_class_names("(Ljava/lang/Object;[[Lapp/Item;)Ljava/lang/String;"),
            vec!["java/lang/Object", "app/Item", "java/lang/String"]
        );
        assert_eq!(signature_class_names("(Lbroken"), Vec::<&str>::new());
    }

    #[test]
    fn test_conflicts_are_symmetric() {
        let table = LoaderConstraintTable::new();
        assert!(table.is_empty());
        table.add_conflict("app/Shared", LoaderId(4), LoaderId(2));
        assert_eq!(table.len(), 1);

        assert!(table
            .check_signature_loaders("(Lapp/Shared;)V", LoaderId(2), LoaderId(4))
            .is_some());
        assert!(table
            .check_signature_loaders("(Lapp/Shared;)V", LoaderId(4), LoaderId(2))
            .is_some());
        assert!(table
            .check_signature_loaders("(Lapp/Shared;)V", LoaderId(4), LoaderId(4))
            .is_none());
        assert!(table
            .check_signature_loaders("(Lapp/Other;)V", LoaderId(2), LoaderId(4))
            .is_none());

        table.clear_pair(LoaderId(2), LoaderId(4));
        assert!(table.is_empty());
    }

    #[test]
    fn test_no_constraints() {
        assert!(NoLoaderConstraints
            .check_signature_loaders("(Lapp/Shared;)V", LoaderId(1), LoaderId(2))
            .is_none());
    }
}
