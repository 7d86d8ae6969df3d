use thiserror::Error;

use crate::runtime::typesystem::LoaderId;

macro_rules! inconsistency {
    // Single string version
    ($msg:expr) => {
        crate::Error::Inconsistent {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Inconsistent {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Linking errors come in two flavours. Errors raised while building a class's tables
/// ([`Error::Linkage`], [`Error::LoaderConstraint`], [`Error::InvalidRootClass`]) are fatal to
/// that class: the class is left unlinked and its tables are not installed. Errors raised by the
/// call-time selection helpers ([`Error::AbstractMethod`], [`Error::IllegalAccess`]) are the
/// deferred outcome of a successfully built table and describe what an invocation through that
/// slot would throw.
///
/// # Error Categories
///
/// ## Link-time Errors
/// - [`Error::Linkage`] - A table violated its shape invariants
/// - [`Error::LoaderConstraint`] - Two loaders disagree on a type named by a signature
/// - [`Error::InvalidRootClass`] - The root class has an unexpected vtable length
/// - [`Error::HierarchyTooDeep`] - The superclass / superinterface nesting exceeded the limit
///
/// ## Invocation Errors
/// - [`Error::AbstractMethod`] - The selected slot has no concrete implementation
/// - [`Error::IllegalAccess`] - The selected implementation is not public
///
/// ## Redefinition Errors
/// - [`Error::RetiredMethod`] - A table still references a permanently retired body
/// - [`Error::IncompatibleRedefinition`] - Old and new bodies do not share identity
///
/// ## Lifecycle Errors
/// - [`Error::AlreadyLinked`], [`Error::NotLinked`], [`Error::ClassInsert`]
///
/// ## Internal Errors
/// - [`Error::Inconsistent`] - A builder invariant broke; never recovered
///
/// # Examples
///
/// ```rust,no_run
/// use vmdispatch::{Error, prelude::*};
///
/// # fn link(linker: &Linker, class: &ClassRc) {
/// match linker.link_class(class) {
///     Ok(()) => println!("linked {}", class.name),
///     Err(Error::LoaderConstraint { class, method, type_name, .. }) => {
///         eprintln!("loader constraint violated in {}.{} for {}", class, method, type_name);
///     }
///     Err(Error::Inconsistent { message, file, line }) => {
///         eprintln!("builder bug: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("link failed: {}", e),
/// }
/// # }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Link-time errors
    /// A dispatch table violated one of its shape invariants.
    ///
    /// Raised for malformed interface-table terminators and for tables whose
    /// length does not match the sizing pass. Fatal to the class being linked.
    #[error("LinkageError in {class}: {message}")]
    Linkage {
        /// Name of the class whose table is malformed
        class: String,
        /// What was wrong with the table
        message: String,
    },

    /// A loader constraint was violated while binding a table slot.
    ///
    /// The overriding (or implementing) method and the method it is bound against were
    /// defined by different loaders, and those loaders resolve one of the types named by
    /// the shared signature to different classes.
    ///
    /// # Fields
    ///
    /// * `class` - Class whose table was being built
    /// * `method` - Name and signature of the method being bound
    /// * `type_name` - Type in the signature the loaders disagree on
    /// * `loader` / `other_loader` - The two loaders involved
    #[error(
        "LinkageError: loader constraint violation in {class} for {method}: \
         loader {loader} and loader {other_loader} have different Class objects for the type {type_name}"
    )]
    LoaderConstraint {
        /// Class whose table was being built
        class: String,
        /// Name and signature of the method being bound
        method: String,
        /// Type the loaders disagree on
        type_name: String,
        /// Defining loader of the overriding / implementing method
        loader: LoaderId,
        /// Defining loader of the overridden / interface method
        other_loader: LoaderId,
    },

    /// The root class of the hierarchy produced a virtual table of the wrong length.
    ///
    /// Every class shares the root's table as its prefix, so the root's length is part
    /// of the runtime's compatibility contract and a mismatch is rejected outright.
    #[error("Root class {class} has a vtable of length {actual}, expected {expected}")]
    InvalidRootClass {
        /// Name of the root class
        class: String,
        /// Configured base length
        expected: usize,
        /// Length computed for the class
        actual: usize,
    },

    /// The superclass / superinterface nesting exceeded the configured depth.
    ///
    /// The associated value shows the depth limit that was reached.
    #[error("Class hierarchy exceeds the maximum depth allowed - {0}")]
    HierarchyTooDeep(usize),

    // Invocation errors
    /// The selected dispatch slot has no concrete implementation.
    #[error("AbstractMethodError: {class}.{method}")]
    AbstractMethod {
        /// Receiver class the selection was made on
        class: String,
        /// Name and signature of the selected method
        method: String,
    },

    /// The selected implementation is not accessible through the interface call.
    #[error("IllegalAccessError: {class}.{method} is not public")]
    IllegalAccess {
        /// Receiver class the selection was made on
        class: String,
        /// Name and signature of the non-public implementation
        method: String,
    },

    // Redefinition errors
    /// A dispatch table still references a permanently retired method body.
    #[error("{class} still references retired method {method} at {table} index {index}")]
    RetiredMethod {
        /// Class owning the table
        class: String,
        /// Name and signature of the retired method
        method: String,
        /// `"vtable"` or `"itable"`
        table: &'static str,
        /// Offending entry
        index: usize,
    },

    /// An old and a new method body cannot replace each other.
    ///
    /// Replacement requires both bodies to share their holder, name and signature, and a
    /// redefinition may not add or remove virtual methods.
    #[error("Incompatible redefinition of {class}: {message}")]
    IncompatibleRedefinition {
        /// Class being redefined
        class: String,
        /// What made the redefinition incompatible
        message: String,
    },

    // Lifecycle errors
    /// The class already has installed tables.
    #[error("Class {0} is already linked")]
    AlreadyLinked(String),

    /// The class (or one of its supertypes) has not been linked yet.
    #[error("Class {0} is not linked")]
    NotLinked(String),

    /// Failed to insert a class into the `ClassRegistry`.
    ///
    /// Occurs when a class with the same name and defining loader is already registered.
    #[error("Failed to insert class into ClassRegistry - {0}")]
    ClassInsert(String),

    // Internal errors
    /// An internal consistency check failed.
    ///
    /// This indicates a bug in one of the table builders (a fill pass outgrowing its
    /// sizing pass, an inherited prefix that no longer matches the superclass). It is
    /// never recovered; linking of the affected class is aborted.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the broken invariant
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Inconsistent - {file}:{line}: {message}")]
    Inconsistent {
        /// The message to be printed for the Inconsistent error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },
}
