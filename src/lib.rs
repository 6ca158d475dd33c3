//! LZSA block compression in Rust.
//!
//! Compresses data into the LZSA1 and LZSA2 block formats: byte-aligned LZ77 formats built for
//! very fast decompression on small machines. Matches are found with a suffix array, and every
//! block is parsed optimally for the smallest encoding of the chosen format. LZSA2 blocks can
//! reuse the previous match offset, which the compressor prices with a second parse.
//!
//! Basic usage to compress a file is as follows:
//!
//! `$> lzsa -f 2 test.txt`
//!
//! This will compress the file and create the file test.txt.lzsa.
//!
//! The library works at two levels: [`Compressor`] and [`expand_block`] handle single blocks
//! with optional history, [`compress_stream`] and [`decompress_stream`] handle framed streams.
//!
pub mod bitstream;
pub mod compression;
pub mod error;
pub mod suffix_index;
pub mod tools;

pub use compression::{
    expand_block, expand_raw_block, CommandStats, CompressionFlags, Compressor, FormatVersion,
    Token,
};
pub use error::{Error, Result};
pub use tools::{
    compress_file, compress_stream, decompress_file, decompress_stream, load_dictionary,
    StreamOptions, StreamStats,
};
