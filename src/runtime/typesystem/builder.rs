//! Builder for classes and their methods.
//!
//! This module provides [`ClassBuilder`], a fluent API for defining classes and interfaces,
//! and [`MethodSpec`], the description of one declared method. Building a class assigns its
//! runtime tokens, computes its transitive interface closure and its default methods, and
//! registers it in a [`ClassRegistry`].
//!
//! # Example
//!
//! ```rust
//! use vmdispatch::prelude::*;
//!
//! let registry = ClassRegistry::new();
//! let object = ClassBuilder::new("java/lang/Object").public().build(&registry)?;
//! let greeter = ClassBuilder::new("demo/Greeter")
//!     .interface()
//!     .public()
//!     .method(MethodSpec::new("greet", "()Ljava/lang/String;").public().abstract_())
//!     .build(&registry)?;
//!
//! let english = ClassBuilder::new("demo/English")
//!     .public()
//!     .extends(&object)
//!     .implements(&greeter)
//!     .method(MethodSpec::new("greet", "()Ljava/lang/String;").public().code(&[0xb0]))
//!     .build(&registry)?;
//!
//! assert_eq!(english.transitive_interfaces.len(), 1);
//! # Ok::<(), vmdispatch::Error>(())
//! ```

use std::sync::Arc;

use crate::{
    runtime::{
        method::{Method, MethodList, MethodModifiers, METHOD_ACCESS_MASK},
        typesystem::{
            defaults::find_default_methods, Class, ClassFlags, ClassList, ClassRc, ClassRegistry,
            LoaderId,
        },
    },
    Error, Result,
};

/// Description of a method to declare on a class.
///
/// Methods start out package-private with no modifiers; the access setters replace the
/// access level, the modifier setters accumulate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpec {
    /// Simple name
    pub name: String,
    /// Method descriptor
    pub signature: String,
    /// Raw access word
    pub flags: u32,
    /// Method body
    pub code: Vec<u8>,
}

impl MethodSpec {
    /// Start describing a package-private method
    pub fn new(name: impl Into<String>, signature: impl Into<String>) -> Self {
        MethodSpec {
            name: name.into(),
            signature: signature.into(),
            flags: 0,
            code: Vec::new(),
        }
    }

    fn access(mut self, access: u32) -> Self {
        self.flags = (self.flags & !METHOD_ACCESS_MASK) | access;
        self
    }

    fn modifier(mut self, modifier: MethodModifiers) -> Self {
        self.flags |= modifier.bits();
        self
    }

    /// Make the method public
    #[must_use]
    pub fn public(self) -> Self {
        self.access(0x0001)
    }

    /// Make the method private
    #[must_use]
    pub fn private(self) -> Self {
        self.access(0x0002)
    }

    /// Make the method protected
    #[must_use]
    pub fn protected(self) -> Self {
        self.access(0x0004)
    }

    /// Clear the access level, making the method package-private
    #[must_use]
    pub fn package_private(self) -> Self {
        self.access(0)
    }

    /// Mark the method static
    #[must_use]
    pub fn static_(self) -> Self {
        self.modifier(MethodModifiers::STATIC)
    }

    /// Mark the method final
    #[must_use]
    pub fn final_(self) -> Self {
        self.modifier(MethodModifiers::FINAL)
    }

    /// Mark the method abstract
    #[must_use]
    pub fn abstract_(self) -> Self {
        self.modifier(MethodModifiers::ABSTRACT)
    }

    /// Mark the method native
    #[must_use]
    pub fn native(self) -> Self {
        self.modifier(MethodModifiers::NATIVE)
    }

    /// Mark the method as a synthesized default-method bridge
    #[must_use]
    pub fn overpass(self) -> Self {
        self.modifier(MethodModifiers::OVERPASS | MethodModifiers::SYNTHETIC)
    }

    /// Set the raw access word, replacing everything set so far
    #[must_use]
    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Set the method body
    #[must_use]
    pub fn code(mut self, code: &[u8]) -> Self {
        self.code = code.to_vec();
        self
    }

    pub(crate) fn into_method(self, registry: &ClassRegistry, idnum: u16) -> Method {
        Method::new(
            registry.next_method_token(),
            idnum,
            self.name,
            self.signature,
            self.flags,
            &self.code,
        )
    }
}

/// Fluent builder for [`Class`] descriptors.
///
/// The only class without a superclass is the root of the hierarchy. Interfaces always
/// extend the root class, which therefore has to be built first.
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    name: String,
    loader: LoaderId,
    flags: ClassFlags,
    super_class: Option<ClassRc>,
    interfaces: ClassList,
    methods: Vec<MethodSpec>,
}

impl ClassBuilder {
    /// Start defining a class with the given internal name
    pub fn new(name: impl Into<String>) -> Self {
        ClassBuilder {
            name: name.into(),
            loader: LoaderId::BOOTSTRAP,
            flags: ClassFlags::empty(),
            super_class: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Set the defining loader (bootstrap by default)
    #[must_use]
    pub fn loader(mut self, loader: LoaderId) -> Self {
        self.loader = loader;
        self
    }

    /// Make the class public
    #[must_use]
    pub fn public(mut self) -> Self {
        self.flags |= ClassFlags::PUBLIC;
        self
    }

    /// Make the class final
    #[must_use]
    pub fn final_(mut self) -> Self {
        self.flags |= ClassFlags::FINAL;
        self
    }

    /// Make the class abstract
    #[must_use]
    pub fn abstract_(mut self) -> Self {
        self.flags |= ClassFlags::ABSTRACT;
        self
    }

    /// Define an interface instead of a class
    #[must_use]
    pub fn interface(mut self) -> Self {
        self.flags |= ClassFlags::INTERFACE | ClassFlags::ABSTRACT;
        self
    }

    /// Replace the class flags
    #[must_use]
    pub fn flags(mut self, flags: ClassFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the superclass
    #[must_use]
    pub fn extends(mut self, super_class: &ClassRc) -> Self {
        self.super_class = Some(super_class.clone());
        self
    }

    /// Add a local interface (a superinterface, when defining an interface)
    #[must_use]
    pub fn implements(mut self, interface: &ClassRc) -> Self {
        self.interfaces.push(interface.clone());
        self
    }

    /// Declare a method
    #[must_use]
    pub fn method(mut self, method: MethodSpec) -> Self {
        self.methods.push(method);
        self
    }

    /// Declare several methods
    #[must_use]
    pub fn methods(mut self, methods: impl IntoIterator<Item = MethodSpec>) -> Self {
        self.methods.extend(methods);
        self
    }

    /// Create the class and register it.
    ///
    /// # Errors
    /// Returns [`Error::ClassInsert`] if the hierarchy is invalid (a class implementing a
    /// non-interface, extending an interface or a final class, an interface defined before
    /// the root class, a second root class), if it declares more methods than a `u16` idnum
    /// can number, or if the name is already taken by the same loader.
    pub fn build(self, registry: &ClassRegistry) -> Result<ClassRc> {
        let is_interface = self.flags.contains(ClassFlags::INTERFACE);

        let super_class = if is_interface {
            let Some(root) = registry.root() else {
                return Err(Error::ClassInsert(format!(
                    "interface {} defined before the root class",
                    self.name
                )));
            };
            if let Some(declared) = &self.super_class {
                if !Arc::ptr_eq(declared, &root) {
                    return Err(Error::ClassInsert(format!(
                        "interface {} must extend the root class {}",
                        self.name, root.name
                    )));
                }
            }
            Some(root)
        } else {
            self.super_class
        };

        match &super_class {
            Some(parent) if parent.is_interface() || parent.is_final() => {
                return Err(Error::ClassInsert(format!(
                    "{} cannot extend {}",
                    self.name, parent.name
                )));
            }
            None if registry.root().is_some() => {
                return Err(Error::ClassInsert(format!(
                    "{} has no superclass but the root class is already defined",
                    self.name
                )));
            }
            _ => {}
        }

        if let Some(bad) = self.interfaces.iter().find(|i| !i.is_interface()) {
            return Err(Error::ClassInsert(format!(
                "{} cannot implement class {}",
                self.name, bad.name
            )));
        }

        let transitive_interfaces = compute_transitive_interfaces(&super_class, &self.interfaces);

        if u16::try_from(self.methods.len().saturating_sub(1)).is_err() {
            return Err(Error::ClassInsert(format!(
                "{} declares {} methods, more than idnums can number",
                self.name,
                self.methods.len()
            )));
        }
        let methods: MethodList = (0..=u16::MAX)
            .zip(self.methods)
            .map(|(idnum, spec)| Arc::new(spec.into_method(registry, idnum)))
            .collect();

        let default_methods = if is_interface {
            Vec::new()
        } else {
            find_default_methods(&methods, super_class.as_ref(), &transitive_interfaces)
        };

        let class = Arc::new(Class::new(
            registry.next_class_token(),
            self.name,
            self.loader,
            self.flags,
            super_class,
            self.interfaces,
            transitive_interfaces,
            methods,
            default_methods,
        ));
        for method in class.methods() {
            method.set_holder(&class);
        }

        registry.insert(&class)?;
        Ok(class)
    }
}

/// Superclass closure first, then each local interface followed by its own closure.
fn compute_transitive_interfaces(super_class: &Option<ClassRc>, locals: &[ClassRc]) -> ClassList {
    let mut result: ClassList = Vec::new();
    let mut append = |interface: &ClassRc| {
        if !result.iter().any(|known| Arc::ptr_eq(known, interface)) {
            result.push(interface.clone());
        }
    };

    if let Some(parent) = super_class {
        parent.transitive_interfaces.iter().for_each(&mut append);
    }
    for local in locals {
        append(local);
        local.transitive_interfaces.iter().for_each(&mut append);
    }

    result
}
