//! Dispatch table construction for a class-based runtime.
//!
//! This module contains everything needed to turn a set of defined classes into linked
//! classes with virtual and interface dispatch tables.
//!
//! # Key Components
//!
//! - [`typesystem`] - Classes, the class registry and the builder used to define classes
//! - [`method`] - Method descriptors, access flags and dispatch indices
//! - [`dispatch`] - Vtable and itable sizing, building, selection and redefinition upkeep
//! - [`linker`] - The [`linker::Linker`] that drives linking and redefinition
//! - [`resolution`] / [`constraints`] - Pluggable method lookup and loader-constraint checks
//! - [`config`], [`diagnostics`], [`statistics`] - Linker configuration and reporting
//!
//! # Linking Order
//!
//! A class is linked after its superclass and all of its local interfaces. [`linker::Linker`]
//! enforces this by linking supertypes on demand, and [`linker::Linker::link_all`] links
//! independent classes of the same hierarchy depth in parallel.

pub mod config;
pub mod constraints;
pub mod diagnostics;
pub mod dispatch;
pub mod linker;
pub mod method;
pub mod resolution;
pub mod statistics;
pub mod token;
pub mod typesystem;
