//! Format versions, limits and the bit cost of every field of a command.
//!
//! Both formats describe a block as a list of commands. Each command is a token byte, an
//! optional literal count extension, the literals, and (except for the last command of a block)
//! a match offset and a match length extension. Version 1 is byte oriented. Version 2 packs
//! small fields into nibbles and can reuse the previous match offset.

use crate::error::{Error, Result};

/// Largest number of bytes compressed as a single block (and the literal count ceiling).
pub const MAX_BLOCK_SIZE: usize = 0xFFFF;
/// Largest match offset any format can express.
pub const MAX_OFFSET: usize = 0xFFFF;
/// Match lengths are tracked in 15 bits while finding matches.
pub const LCP_BITS: u32 = 15;
/// Longest match the match finder reports.
pub const LCP_MAX: usize = 1 << (LCP_BITS - 1);
/// Candidate matches kept per position.
pub const NMATCHES_PER_OFFSET: usize = 8;
/// Matches at least this long are taken whole rather than trimmed.
pub const LEAVE_ALONE_MATCH_SIZE: usize = 1000;
/// Extra cost charged for every match, against flipping between literals and matches.
pub const MODESWITCH_PENALTY: u32 = 1;
/// Highest accepted minimum match size.
pub const MAX_MIN_MATCH_SIZE: usize = 5;

pub const MIN_MATCH_SIZE_V1: usize = 3;
pub const LITERALS_RUN_LEN_V1: usize = 7;
pub const MATCH_RUN_LEN_V1: usize = 15;

pub const MIN_MATCH_SIZE_V2: usize = 2;
pub const LITERALS_RUN_LEN_V2: usize = 3;
pub const MATCH_RUN_LEN_V2: usize = 7;

/// Version 1 extension byte announcing `256 + next byte` literals.
pub const V1_LITERALS_EXT_256: u8 = 249;
/// Version 1 extension byte announcing a 16-bit literal count.
pub const V1_LITERALS_EXT_16BIT: u8 = 250;
/// Version 1 extension byte announcing a 16-bit match length (0 marks the end of data).
pub const V1_MATCH_EXT_16BIT: u8 = 238;
/// Version 1 extension byte announcing a `256 + next byte` match length.
pub const V1_MATCH_EXT_256: u8 = 239;

/// Version 2 literal extension byte announcing a 16-bit literal count.
pub const V2_LITERALS_EXT_16BIT: u8 = 239;
/// Version 2 match extension byte that ends a raw block.
pub const V2_MATCH_EXT_EOD: u8 = 232;
/// Version 2 match extension byte announcing a 16-bit match length.
pub const V2_MATCH_EXT_16BIT: u8 = 233;

/// Largest offsets of the version 2 offset classes. Offsets are stored negated, so the
/// 9-bit class starts where the 5-bit one ends but still tops out at 512.
pub const V2_OFFSET_5BIT_MAX: usize = 32;
pub const V2_OFFSET_9BIT_MAX: usize = 512;
pub const V2_OFFSET_13BIT_MAX: usize = V2_OFFSET_9BIT_MAX + 8192;

/// Bitstream format of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormatVersion {
    V1,
    V2,
}

impl FormatVersion {
    /// Map a user facing version number (1 or 2) to a format.
    pub fn from_number(version: u8) -> Result<Self> {
        match version {
            1 => Ok(FormatVersion::V1),
            2 => Ok(FormatVersion::V2),
            other => Err(Error::Config(format!(
                "unsupported format version {} (expected 1 or 2)",
                other
            ))),
        }
    }

    pub fn number(self) -> u8 {
        match self {
            FormatVersion::V1 => 1,
            FormatVersion::V2 => 2,
        }
    }

    /// Shortest match the format can encode.
    pub fn min_match_floor(self) -> usize {
        match self {
            FormatVersion::V1 => MIN_MATCH_SIZE_V1,
            FormatVersion::V2 => MIN_MATCH_SIZE_V2,
        }
    }

    /// Clamp a requested minimum match size into what this format accepts.
    pub fn clamp_min_match(self, requested: usize) -> usize {
        requested.clamp(self.min_match_floor(), MAX_MIN_MATCH_SIZE)
    }

    /// Literal count ranges that share one extension cost, as (first, last, extra bits).
    pub fn literal_classes(self) -> &'static [(usize, usize, u32)] {
        match self {
            FormatVersion::V1 => &[
                (0, 6, 0),
                (7, 255, 8),
                (256, 511, 16),
                (512, MAX_BLOCK_SIZE, 24),
            ],
            FormatVersion::V2 => &[
                (0, 2, 0),
                (3, 17, 4),
                (18, 256, 12),
                (257, MAX_BLOCK_SIZE, 28),
            ],
        }
    }

    /// Bits used by the literal count beyond the token.
    pub fn literals_varlen_bits(self, literals: usize) -> u32 {
        self.literal_classes()
            .iter()
            .find(|(_, last, _)| literals <= *last)
            .map(|(_, _, bits)| *bits)
            .unwrap_or(24)
    }

    /// Bits used by the match length beyond the token.
    pub fn match_varlen_bits(self, length: usize) -> u32 {
        match self {
            FormatVersion::V1 => {
                let encoded = length.saturating_sub(MIN_MATCH_SIZE_V1);
                if encoded < MATCH_RUN_LEN_V1 {
                    0
                } else if length <= 255 {
                    8
                } else if length <= 511 {
                    16
                } else {
                    24
                }
            }
            FormatVersion::V2 => {
                let encoded = length.saturating_sub(MIN_MATCH_SIZE_V2);
                if encoded < MATCH_RUN_LEN_V2 {
                    0
                } else if encoded < MATCH_RUN_LEN_V2 + 15 {
                    4
                } else if length <= 255 {
                    12
                } else {
                    28
                }
            }
        }
    }

    /// Bits used by the match offset. Repeat matches are free in version 2.
    pub fn offset_bits(self, offset: usize, repeat: bool) -> u32 {
        match self {
            FormatVersion::V1 => {
                if offset <= 256 {
                    8
                } else {
                    16
                }
            }
            FormatVersion::V2 => {
                if repeat {
                    0
                } else if offset <= V2_OFFSET_5BIT_MAX {
                    4
                } else if offset <= V2_OFFSET_9BIT_MAX {
                    8
                } else if offset <= V2_OFFSET_13BIT_MAX {
                    12
                } else {
                    16
                }
            }
        }
    }

    /// Cost of the part of a command that every command pays: token plus literals.
    pub fn command_bits(self, literals: usize) -> u32 {
        8 + self.literals_varlen_bits(literals) + 8 * literals as u32
    }

    /// Cost of the match part of a command.
    pub fn match_bits(self, offset: usize, length: usize, repeat: bool) -> u32 {
        self.offset_bits(offset, repeat) + self.match_varlen_bits(length)
    }
}

impl std::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LZSA{}", self.number())
    }
}

/// One unit of a parsed block, in block order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    /// A run of bytes copied verbatim.
    Literals(usize),
    /// Copy `length` bytes starting `offset` bytes back. `repeat` is set when the offset
    /// equals the previous match offset in a version 2 block.
    Match {
        offset: usize,
        length: usize,
        repeat: bool,
    },
}

impl Token {
    /// Bytes of the block covered by this token.
    pub fn len(&self) -> usize {
        match *self {
            Token::Literals(count) => count,
            Token::Match { length, .. } => length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compression flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompressionFlags {
    /// Explore every candidate length for the best ratio, instead of the faster shortcut.
    pub favor_ratio: bool,
    /// Emit a single unframed block terminated by an end-of-data marker.
    pub raw_block: bool,
}

impl CompressionFlags {
    pub const FAVOR_RATIO: u32 = 1 << 0;
    pub const RAW_BLOCK: u32 = 1 << 1;

    pub fn from_bits(bits: u32) -> Self {
        Self {
            favor_ratio: bits & Self::FAVOR_RATIO != 0,
            raw_block: bits & Self::RAW_BLOCK != 0,
        }
    }

    pub fn bits(self) -> u32 {
        let mut bits = 0;
        if self.favor_ratio {
            bits |= Self::FAVOR_RATIO;
        }
        if self.raw_block {
            bits |= Self::RAW_BLOCK;
        }
        bits
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn version_numbers() {
        assert_eq!(FormatVersion::from_number(1).unwrap(), FormatVersion::V1);
        assert_eq!(FormatVersion::from_number(2).unwrap(), FormatVersion::V2);
        assert!(FormatVersion::from_number(3).is_err());
        assert_eq!(FormatVersion::V2.number(), 2);
    }

    #[test]
    fn min_match_clamp() {
        assert_eq!(FormatVersion::V1.clamp_min_match(0), 3);
        assert_eq!(FormatVersion::V2.clamp_min_match(2), 2);
        assert_eq!(FormatVersion::V2.clamp_min_match(9), 5);
    }

    #[test]
    fn literal_cost_steps() {
        let v1 = FormatVersion::V1;
        assert_eq!(v1.literals_varlen_bits(6), 0);
        assert_eq!(v1.literals_varlen_bits(7), 8);
        assert_eq!(v1.literals_varlen_bits(300), 16);
        assert_eq!(v1.literals_varlen_bits(5000), 24);
        let v2 = FormatVersion::V2;
        assert_eq!(v2.literals_varlen_bits(2), 0);
        assert_eq!(v2.literals_varlen_bits(17), 4);
        assert_eq!(v2.literals_varlen_bits(18), 12);
        assert_eq!(v2.literals_varlen_bits(257), 28);
    }

    #[test]
    fn match_cost_steps() {
        let v1 = FormatVersion::V1;
        assert_eq!(v1.match_varlen_bits(17), 0);
        assert_eq!(v1.match_varlen_bits(18), 8);
        assert_eq!(v1.match_varlen_bits(256), 16);
        assert_eq!(v1.match_varlen_bits(512), 24);
        let v2 = FormatVersion::V2;
        assert_eq!(v2.match_varlen_bits(8), 0);
        assert_eq!(v2.match_varlen_bits(9), 4);
        assert_eq!(v2.match_varlen_bits(24), 12);
        assert_eq!(v2.match_varlen_bits(256), 28);
    }

    #[test]
    fn offset_cost_steps() {
        let v2 = FormatVersion::V2;
        assert_eq!(v2.offset_bits(32, false), 4);
        assert_eq!(v2.offset_bits(33, false), 8);
        assert_eq!(v2.offset_bits(512, false), 8);
        assert_eq!(v2.offset_bits(513, false), 12);
        assert_eq!(v2.offset_bits(8704, false), 12);
        assert_eq!(v2.offset_bits(8705, false), 16);
        assert_eq!(v2.offset_bits(8705, true), 0);
        assert_eq!(FormatVersion::V1.offset_bits(256, false), 8);
        assert_eq!(FormatVersion::V1.offset_bits(257, true), 16);
    }

    #[test]
    fn flag_bits() {
        let flags = CompressionFlags::from_bits(3);
        assert!(flags.favor_ratio && flags.raw_block);
        assert_eq!(flags.bits(), 3);
        assert_eq!(CompressionFlags::default().bits(), 0);
    }
}
