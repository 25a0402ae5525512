//! Error types for register file lookups

use kstring::KString;
use std::fmt;
use thiserror::Error;

/// Result type alias for register file operations
pub type Result<T> = std::result::Result<T, Error>;

/// The level of the register hierarchy an error refers to
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Kind {
    Block,
    Register,
    Field,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Kind::Block => "register block",
                Kind::Register => "register",
                Kind::Field => "field",
            }
        )
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// A name, address or bit range lookup didn't match anything
    #[error("{kind} `{key}` not found")]
    NotFound {
        /// What we were looking for
        kind: Kind,
        /// The name, address or bit range that was being resolved
        key: KString,
    },

    /// An index past the end of a collection
    #[error("{kind} index {index} out of range (have {count})")]
    OutOfRange {
        kind: Kind,
        index: u32,
        count: u32,
    },

    /// Counts or offsets in the file point outside of it
    #[error("Malformed register file: {0}")]
    Malformed(String),

    #[error("File IO error")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn not_found(kind: Kind, key: impl Into<KString>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }
}
