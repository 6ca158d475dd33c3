//! Stream framing.
//!
//! A framed stream is a 3 byte header, then every block behind a 3 byte block header, then a
//! 3 byte footer:
//!
//! - Stream header: magic `0x7b 0x9e`, then the format version as `(version - 1) << 5`.
//! - Block header: 24 bit little-endian. Bit 23 set means the block is stored uncompressed, the
//!   low 23 bits are the stored size.
//! - Footer: a block header of zero.

use crate::compression::FormatVersion;
use crate::error::{format_error, Error, Result};

pub const MAGIC: [u8; 2] = [0x7b, 0x9e];
pub const FRAME_HEADER_SIZE: usize = 3;
pub const BLOCK_HEADER_SIZE: usize = 3;
pub const FRAME_FOOTER: [u8; BLOCK_HEADER_SIZE] = [0, 0, 0];

const UNCOMPRESSED_BIT: u32 = 0x80_0000;
const SIZE_MASK: u32 = UNCOMPRESSED_BIT - 1;

/// What a block header announces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockHeader {
    Compressed(usize),
    Uncompressed(usize),
    /// The footer: no more blocks.
    End,
}

pub fn encode_frame_header(format: FormatVersion) -> [u8; FRAME_HEADER_SIZE] {
    [MAGIC[0], MAGIC[1], (format.number() - 1) << 5]
}

pub fn decode_frame_header(header: &[u8; FRAME_HEADER_SIZE]) -> Result<FormatVersion> {
    if header[..2] != MAGIC {
        return Err(format_error("not an LZSA stream (bad magic number)"));
    }
    if header[2] & 0x1f != 0 {
        return Err(Error::Format(format!(
            "reserved bits set in stream header ({:#04x})",
            header[2]
        )));
    }
    FormatVersion::from_number((header[2] >> 5) + 1)
        .map_err(|_| Error::Format(format!("unknown format version {}", (header[2] >> 5) + 1)))
}

pub fn encode_block_header(header: BlockHeader) -> Result<[u8; BLOCK_HEADER_SIZE]> {
    let value = match header {
        BlockHeader::Compressed(size) => checked_size(size)?,
        BlockHeader::Uncompressed(size) => checked_size(size)? | UNCOMPRESSED_BIT,
        BlockHeader::End => 0,
    };
    let bytes = value.to_le_bytes();
    Ok([bytes[0], bytes[1], bytes[2]])
}

fn checked_size(size: usize) -> Result<u32> {
    match u32::try_from(size) {
        Ok(value) if value != 0 && value <= SIZE_MASK => Ok(value),
        _ => Err(Error::Config(format!("block size {} can't be framed", size))),
    }
}

pub fn decode_block_header(header: &[u8; BLOCK_HEADER_SIZE]) -> BlockHeader {
    let value = u32::from_le_bytes([header[0], header[1], header[2], 0]);
    let size = (value & SIZE_MASK) as usize;
    if value & UNCOMPRESSED_BIT != 0 {
        BlockHeader::Uncompressed(size)
    } else if size == 0 {
        BlockHeader::End
    } else {
        BlockHeader::Compressed(size)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn frame_header() {
        assert_eq!(encode_frame_header(FormatVersion::V1), [0x7b, 0x9e, 0x00]);
        assert_eq!(encode_frame_header(FormatVersion::V2), [0x7b, 0x9e, 0x20]);
        assert_eq!(
            decode_frame_header(&[0x7b, 0x9e, 0x20]).unwrap(),
            FormatVersion::V2
        );
        assert!(decode_frame_header(&[0x7b, 0x9f, 0x20]).is_err());
        assert!(decode_frame_header(&[0x7b, 0x9e, 0x40]).is_err());
        assert!(decode_frame_header(&[0x7b, 0x9e, 0x21]).is_err());
    }

    #[test]
    fn block_headers() {
        let header = encode_block_header(BlockHeader::Compressed(0x1234)).unwrap();
        assert_eq!(header, [0x34, 0x12, 0x00]);
        assert_eq!(decode_block_header(&header), BlockHeader::Compressed(0x1234));

        let header = encode_block_header(BlockHeader::Uncompressed(0xffff)).unwrap();
        assert_eq!(header, [0xff, 0xff, 0x80]);
        assert_eq!(decode_block_header(&header), BlockHeader::Uncompressed(0xffff));

        assert_eq!(encode_block_header(BlockHeader::End).unwrap(), FRAME_FOOTER);
        assert_eq!(decode_block_header(&FRAME_FOOTER), BlockHeader::End);
        assert!(encode_block_header(BlockHeader::Compressed(0)).is_err());
        assert!(encode_block_header(BlockHeader::Compressed(1 << 23)).is_err());
    }
}
