//! Concurrent registry of defined classes.
//!
//! The [`ClassRegistry`] owns a strong reference to every class defined through a
//! [`crate::runtime::typesystem::ClassBuilder`]. It is the source of runtime tokens and the
//! set of classes the linker walks when a redefinition has to patch every dispatch table
//! that may reference a redefined holder's methods.
//!
//! # Storage
//!
//! - Classes are stored in a `crossbeam_skiplist::SkipMap` keyed by [`Token`], so iteration
//!   follows definition order and lookups never block.
//! - A `dashmap::DashMap` indexes tokens by class name; the same name may be defined once
//!   per loader.
//! - Token rows are handed out from atomic counters, one per token kind.
//!
//! # Thread Safety
//!
//! All operations take `&self` and are safe to call from concurrent linking workers.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    OnceLock,
};

use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;

use crate::{
    runtime::{
        token::Token,
        typesystem::{ClassRc, LoaderId},
    },
    Error, Result,
};

/// Registry of every class known to the runtime.
pub struct ClassRegistry {
    /// Token => Class
    classes: SkipMap<Token, ClassRc>,
    /// Name => Tokens, one per defining loader
    classes_by_name: DashMap<String, Vec<Token>>,
    /// The class without a superclass
    root: OnceLock<ClassRc>,
    next_class_row: AtomicU32,
    next_method_row: AtomicU32,
    next_miranda_row: AtomicU32,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        ClassRegistry {
            classes: SkipMap::new(),
            classes_by_name: DashMap::new(),
            root: OnceLock::new(),
            next_class_row: AtomicU32::new(1),
            next_method_row: AtomicU32::new(1),
            next_miranda_row: AtomicU32::new(1),
        }
    }

    fn next_row(counter: &AtomicU32, kind: u8) -> Token {
        let row = counter.fetch_add(1, Ordering::Relaxed);
        debug_assert!(row <= 0x00FF_FFFF, "ran out of rows for token kind {kind:#04x}");
        Token::from_parts(kind, row)
    }

    pub(crate) fn next_class_token(&self) -> Token {
        Self::next_row(&self.next_class_row, Token::CLASS)
    }

    pub(crate) fn next_method_token(&self) -> Token {
        Self::next_row(&self.next_method_row, Token::METHOD)
    }

    pub(crate) fn next_miranda_token(&self) -> Token {
        Self::next_row(&self.next_miranda_row, Token::MIRANDA)
    }

    /// Register a class.
    ///
    /// # Errors
    /// Returns [`Error::ClassInsert`] if the same loader already defined a class with this
    /// name, or if a second root class is registered.
    pub fn insert(&self, class: &ClassRc) -> Result<()> {
        if class.super_class.is_none() && self.root.get().is_some() {
            return Err(Error::ClassInsert(format!(
                "{} would be a second root class",
                class.name
            )));
        }

        {
            let mut tokens = self.classes_by_name.entry(class.name.clone()).or_default();
            let duplicate = tokens.iter().any(|token| {
                self.classes
                    .get(token)
                    .is_some_and(|entry| entry.value().loader == class.loader)
            });
            if duplicate {
                return Err(Error::ClassInsert(format!(
                    "{} already defined by loader {}",
                    class.name, class.loader
                )));
            }
            tokens.push(class.token);
        }

        if class.super_class.is_none() {
            let _ = self.root.set(class.clone());
        }
        self.classes.insert(class.token, class.clone());
        Ok(())
    }

    /// Get a class by token
    #[must_use]
    pub fn get(&self, token: &Token) -> Option<ClassRc> {
        self.classes.get(token).map(|entry| entry.value().clone())
    }

    /// Get the class named `name` as defined by `loader`
    #[must_use]
    pub fn get_by_name(&self, name: &str, loader: LoaderId) -> Option<ClassRc> {
        self.classes_by_name.get(name).and_then(|tokens| {
            tokens
                .iter()
                .filter_map(|token| self.get(token))
                .find(|class| class.loader == loader)
        })
    }

    /// The root class, once it is defined
    #[must_use]
    pub fn root(&self) -> Option<ClassRc> {
        self.root.get().cloned()
    }

    /// Count of classes in the registry
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Returns an iterator over all classes in the registry
    pub fn iter(&self) -> crossbeam_skiplist::map::Iter<'_, Token, ClassRc> {
        self.classes.iter()
    }

    /// Get all classes in the registry, in definition order
    pub fn all_classes(&self) -> Vec<ClassRc> {
        self.classes
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}
