//! The bitstream module forms the I/O subsystem for compressed blocks.
//!
//! Both block formats are built from whole bytes, 16 bit words and (in version 2) nibbles.
//! The writer fills a fixed capacity buffer and reports overflow instead of growing it, and
//! the reader never reads past the end of the block it was given.
//!
pub mod reader;
pub mod writer;
