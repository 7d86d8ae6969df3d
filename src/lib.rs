// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # vmdispatch
//!
//! [![Crates.io](https://img.shields.io/crates/v/vmdispatch.svg)](https://crates.io/crates/vmdispatch)
//! [![Documentation](https://docs.rs/vmdispatch/badge.svg)](https://docs.rs/vmdispatch)
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/vmdispatch/blob/main/LICENSE-APACHE)
//!
//! Virtual and interface dispatch tables for a class-based managed runtime.
//!
//! `vmdispatch` models the linking step of a single-inheritance runtime with multiply
//! inherited interfaces. For every class it computes the virtual method table (vtable) and
//! the interface method table (itable), including package-private override rules,
//! transitive overrides, miranda placeholders for unimplemented interface methods, default
//! methods, and loader-constraint checks. Linked tables can be patched in place after a
//! class is redefined.
//!
//! ## Features
//!
//! - **📐 Exact table sizing** - Vtable and itable sizes are computed before anything is filled in
//! - **🔁 Override semantics** - Accessibility-aware overriding, including package-private methods across packages
//! - **🧩 Interfaces** - Miranda placeholders, default methods and itable blocks per implemented interface
//! - **🔒 Loader constraints** - Pluggable checks when an override crosses class loaders
//! - **⚡ Parallel linking** - Independent classes of one hierarchy level are linked concurrently
//! - **♻️ Redefinition** - Old and obsolete method bodies are swapped out of every linked table
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use vmdispatch::prelude::*;
//!
//! let registry = Arc::new(ClassRegistry::new());
//! let object = ClassBuilder::new("java/lang/Object")
//!     .public()
//!     .method(MethodSpec::new("toString", "()Ljava/lang/String;").public())
//!     .build(&registry)?;
//! let shape = ClassBuilder::new("demo/Shape")
//!     .interface()
//!     .public()
//!     .method(MethodSpec::new("area", "()D").public().abstract_())
//!     .build(&registry)?;
//! let square = ClassBuilder::new("demo/Square")
//!     .public()
//!     .extends(&object)
//!     .implements(&shape)
//!     .method(MethodSpec::new("area", "()D").public())
//!     .build(&registry)?;
//!
//! // The minimal preset accepts a root class of any vtable length
//! let linker = Linker::new(registry).with_config(LinkerConfig::minimal());
//! linker.link_class(&square)?;
//!
//! let area = square.find_local_method("area", "()D", LookupFlags::empty()).unwrap();
//! assert_eq!(area.vtable_index(), Some(1));
//!
//! let itable = square.itable().unwrap();
//! let selected = itable.select(&square, &shape, 0)?;
//! assert!(Arc::ptr_eq(&selected, &area));
//! # Ok::<(), vmdispatch::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`runtime::typesystem`] - Classes, methods and the class registry
//! - [`runtime::dispatch`] - Vtable and itable sizing, construction and selection
//! - [`runtime::linker`] - Linking order, parallel linking and class redefinition
//! - [`Error`] and [`Result`] - Error handling
//!
//! ### Linking
//!
//! Linking a class proceeds in fixed phases:
//!
//! 1. Link the superclass and every local interface
//! 2. Compute the vtable size, including miranda placeholders
//! 3. Copy the superclass vtable, apply overrides and append new entries, defaults and mirandas
//! 4. Assign itable indices (interfaces) or fill one itable block per transitive interface (classes)
//! 5. Verify the tables and publish them on the class
//!
//! ### Redefinition
//!
//! [`runtime::linker::Linker::redefine_class`] replaces a class's method bodies. Methods keep
//! their declaration ordinal (`idnum`), and every linked class whose tables reference a
//! replaced body is patched to the new one. Afterwards no table references an old method.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result):
//!
//! ```rust,no_run
//! use vmdispatch::{prelude::*, Error};
//!
//! # fn run(linker: &Linker, class: &ClassRc) {
//! match linker.link_class(class) {
//!     Ok(()) => println!("linked {}", class.name),
//!     Err(Error::LoaderConstraint { method, type_name, .. }) => {
//!         println!("{} violates a loader constraint on {}", method, type_name)
//!     }
//!     Err(Error::InvalidRootClass { expected, actual, .. }) => {
//!         println!("root vtable has {} entries, expected {}", actual, expected)
//!     }
//!     Err(e) => println!("Other error: {}", e),
//! }
//! # }
//! ```
#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use vmdispatch::prelude::*;
///
/// let registry = ClassRegistry::new();
/// let object = ClassBuilder::new("java/lang/Object").public().build(&registry)?;
/// assert!(object.super_class.is_none());
/// # Ok::<(), vmdispatch::Error>(())
/// ```
pub mod prelude;

/// Classes, methods, dispatch tables and the linker
pub mod runtime;

/// `vmdispatch` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `vmdispatch` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

/// Main entry point for linking classes
pub use runtime::linker::Linker;
