//! Runtime tokens identifying classes and methods.
//!
//! Every class and method handed to the linker carries a [`Token`]: a 32-bit value whose
//! high byte names the kind of entity and whose low 24 bits are a 1-based row inside that
//! kind. The [`crate::runtime::typesystem::ClassRegistry`] hands out class tokens as classes
//! are registered; method tokens are assigned by the
//! [`crate::runtime::typesystem::ClassBuilder`] as methods are declared.
//!
//! # Token Format
//!
//! ```text
//! 31    24 23                    0
//! +-------+-----------------------+
//! | kind  |          row          |
//! +-------+-----------------------+
//! ```
//!
//! | Kind   | Meaning                                   |
//! |--------|-------------------------------------------|
//! | `0x01` | Class or interface                        |
//! | `0x02` | Declared method                           |
//! | `0x03` | Miranda placeholder synthesized by linking |
//!
//! # Examples
//!
//! ```rust
//! use vmdispatch::runtime::token::Token;
//!
//! let token = Token::new(0x0200_0005);
//! assert_eq!(token.kind(), Token::METHOD);
//! assert_eq!(token.row(), 5);
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};

/// A runtime token referencing a class, a method or a synthesized placeholder.
///
/// Tokens are cheap `Copy` handles used as registry keys and in diagnostics. A token
/// with value 0 is the null token and never names a live entity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Token(pub u32);

impl Token {
    /// Kind byte of class tokens
    pub const CLASS: u8 = 0x01;
    /// Kind byte of declared method tokens
    pub const METHOD: u8 = 0x02;
    /// Kind byte of miranda placeholder tokens
    pub const MIRANDA: u8 = 0x03;

    /// Creates a new `Token` from a raw 32-bit value.
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Builds a token from its kind byte and row.
    ///
    /// Rows wider than 24 bits are truncated.
    #[must_use]
    pub fn from_parts(kind: u8, row: u32) -> Self {
        Token((u32::from(kind) << 24) | (row & 0x00FF_FFFF))
    }

    /// Returns the raw 32-bit value.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the kind byte (bits 24-31).
    #[must_use]
    pub fn kind(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the row (bits 0-23).
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns `true` for the null token.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, kind: 0x{:02x}, row: {})",
            self.0,
            self.kind(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}
