//! Error type shared by the compressor, the block decoder and the stream layer.
//!
//! Compression errors are recoverable by the caller (store the block uncompressed, retry with
//! a larger buffer). Format errors end the decode call that raised them; anything already
//! written to the output buffer must be discarded.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Working buffers for the compressor could not be allocated.
    #[error("out of memory: {0}")]
    Memory(String),

    /// The encoded block would not fit in the caller's output buffer.
    #[error("output buffer too small ({capacity} bytes)")]
    OutputTooSmall { capacity: usize },

    /// The input exceeds the size that a single (raw) block can describe.
    #[error("input of {size} bytes is too large for a single block (max {max})")]
    InputTooLarge { size: usize, max: usize },

    /// Raw blocks have no way to store data uncompressed.
    #[error("input is incompressible and raw blocks don't support uncompressed data")]
    RawUncompressed,

    /// Invalid compressed data: bad header, truncated field or an out of bounds copy.
    #[error("invalid compressed data: {0}")]
    Format(String),

    /// Invalid parameters given to the compressor or the stream layer.
    #[error("config error: {0}")]
    Config(String),

    /// The parsed tokens do not describe the block they were made for.
    #[error("compression error: {0}")]
    Compression(String),

    /// The dictionary file could not be used.
    #[error("dictionary error: {0}")]
    Dictionary(String),

    /// Propagated I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Shorthand for building a [`Error::Format`].
pub(crate) fn format_error(msg: &str) -> Error {
    Error::Format(msg.to_string())
}

/// Empty `buf` and make room for `len` elements, reporting failure as [`Error::Memory`].
pub(crate) fn reserve<T>(buf: &mut Vec<T>, len: usize, what: &str) -> Result<()> {
    buf.clear();
    buf.try_reserve(len)
        .map_err(|e| Error::Memory(format!("{} ({} entries): {}", what, len, e)))
}
