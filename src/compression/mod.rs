//! The compression module holds the block compressor and the block decoder.
//!
//! Compressing a block happens in the following steps:
//! - Suffix index: sort every suffix of the window (history plus block) and group them into
//!   nested lcp-intervals.
//! - Match finding: walk the intervals once, collecting up to eight earlier occurrences for every
//!   position of the block.
//! - Optimal parsing: find the sequence of literal runs and matches with the fewest encoded bits.
//! - Repeat offsets (version 2 only): price matches that reuse the previous offset, and parse
//!   again.
//! - Token encoding: write the commands in the version 1 or version 2 format, counting literal
//!   runs, offsets and match lengths on the way.
//!
//! Decompression is a single pass over the commands of the block.
//!
pub mod compressor;
pub mod decompress;
pub mod encoder;
pub mod format;
pub mod parser;
pub mod repmatch;
pub mod stats;

pub use compressor::Compressor;
pub use decompress::{expand_block, expand_raw_block};
pub use format::{CompressionFlags, FormatVersion, Token};
pub use stats::{CommandStats, SafeDistance};
