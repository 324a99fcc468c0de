//! Protocol error types.

use thiserror::Error;

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing names and types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The name was empty where a name was required.
    #[error("empty domain name")]
    EmptyName,

    /// A label between two dots was empty.
    #[error("empty label in {name:?}")]
    EmptyLabel {
        /// The offending name.
        name: String,
    },

    /// Label exceeds maximum length of 63 bytes.
    #[error("label too long: {length} bytes exceeds maximum of 63")]
    LabelTooLong {
        /// Actual label length.
        length: usize,
    },

    /// Name exceeds maximum length of 253 bytes.
    #[error("name too long: {length} bytes exceeds maximum of 253")]
    NameTooLong {
        /// Actual name length.
        length: usize,
    },

    /// Name contains whitespace or control characters.
    #[error("invalid character {ch:?} in name {name:?}")]
    InvalidCharacter {
        /// The offending character.
        ch: char,
        /// The offending name.
        name: String,
    },

    /// Unrecognized record or query type mnemonic.
    #[error("unknown record type: {0}")]
    UnknownType(String),
}
