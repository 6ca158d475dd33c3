//! The tools module wraps the block compressor for use on whole streams and files.
//!
//! The tools are:
//! - cli: Command line interface for LZSA.
//! - dictionary: Loading dictionary files.
//! - frame: Stream and block headers of framed streams.
//! - stream: Compressing and decompressing streams and files block by block.
//!
pub mod cli;
pub mod dictionary;
pub mod frame;
pub mod stream;

pub use dictionary::load_dictionary;
pub use stream::{
    compress_file, compress_stream, decompress_file, decompress_stream, StreamOptions,
    StreamStats,
};
