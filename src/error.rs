//! Error types for device access

use crate::codec::ByteOrder;
use thiserror::Error;

/// Result type alias for device operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A width and byte order combination the codec can't express
    #[error("Unsupported encoding: {width} byte {order} values")]
    UnsupportedEncoding { width: usize, order: ByteOrder },

    #[error("We expected a byte order, but got back something invalid: {0}")]
    BadByteOrder(String),

    /// The transport reported a failure, carrying the bus address and width of the access
    #[error("Transport transaction failed accessing {width} bytes at {addr:#x}")]
    Transport {
        addr: u64,
        width: usize,
        #[source]
        source: anyhow::Error,
    },

    /// Resolving a register or field failed
    #[error(transparent)]
    Catalog(#[from] regfile::Error),
}
