//! Token encoder: turns the tokens of a parsed block into version 1 or version 2 commands.
//!
//! A command is a literal run followed by a match. Consecutive tokens are grouped into
//! commands as they come: literals accumulate until the next match, and whatever literals remain
//! after the last match form the final, literal-only command. In a raw block that final command
//! also carries the end-of-data marker in its match fields.
//!
//! Version 1 token byte: `O LLL MMMM`
//! - O: offset size (0 = one byte, 1 = two bytes)
//! - LLL: literal count, 7 = extended
//! - MMMM: match length - 3, 15 = extended
//!
//! Version 2 token byte: `XYZ LL MMM`
//! - XYZ: offset class (00Z 5-bit, 01Z 9-bit, 10Z 13-bit, 110 16-bit, 111 repeat offset)
//! - LL: literal count, 3 = extended
//! - MMM: match length - 2, 7 = extended
//!
//! Both formats store offsets negated, as 16-bit two's complement values. Version 2 keeps only
//! the low bits that differ from all ones and stores bit 8 (bit 0 for the 5-bit class),
//! inverted, in Z. The 13-bit class is biased by 512 first.

use log::trace;

use super::format::*;
use super::stats::CommandStats;
use crate::bitstream::writer::BlockWriter;
use crate::error::{Error, Result};

/// Size, command figures and decoder lead of an encoded block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncodedBlock {
    pub len: usize,
    pub commands: usize,
    pub stats: CommandStats,
    /// Largest amount by which the decoded bytes run ahead of the encoded bytes at the end of
    /// a command, counted from the start of the block.
    pub max_lead: i64,
}

/// What follows the literals of a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MatchPart {
    Copy {
        offset: usize,
        length: usize,
        repeat: bool,
    },
    /// Last command of a framed block, nothing follows the literals.
    EndOfBlock,
    /// Last command of a raw block, followed by the end-of-data marker.
    EndOfData,
}

/// Encode `tokens`, which must cover `block` exactly, into `out`.
/// Returns [`Error::OutputTooSmall`] when `out` cannot hold the result, and
/// [`Error::Compression`] when the tokens do not describe the block.
pub fn encode_block(
    format: FormatVersion,
    block: &[u8],
    tokens: &[Token],
    raw: bool,
    out: &mut [u8],
) -> Result<EncodedBlock> {
    let mut bw = BlockWriter::new(out);
    let mut cursor = 0;
    let mut literals = 0;
    let mut rep_offset = 0;
    let mut stats = CommandStats::default();
    let mut max_lead = 0_i64;

    for token in tokens {
        match *token {
            Token::Literals(count) => literals += count,
            Token::Match { offset, length, .. } => {
                check_match(format, offset, length)?;
                let run = literal_run(block, cursor, literals)?;
                if cursor + literals + length > block.len() {
                    return Err(Error::Compression(
                        "match runs past the end of the block".into(),
                    ));
                }
                // Repeat flag follows the offset actually written last
                let repeat = format == FormatVersion::V2 && offset == rep_offset;
                let part = MatchPart::Copy {
                    offset,
                    length,
                    repeat,
                };
                write_command(format, &mut bw, run, part)?;
                stats.record_literals(literals);
                stats.record_match(offset, length, repeat);
                cursor += literals + length;
                literals = 0;
                rep_offset = offset;
                max_lead = max_lead.max(cursor as i64 - bw.len() as i64);
            }
        }
    }

    let run = literal_run(block, cursor, literals)?;
    if cursor + literals != block.len() {
        return Err(Error::Compression(format!(
            "tokens cover {} of {} bytes",
            cursor + literals,
            block.len()
        )));
    }
    let last = if raw {
        MatchPart::EndOfData
    } else {
        MatchPart::EndOfBlock
    };
    write_command(format, &mut bw, run, last)?;
    stats.record_literals(literals);
    max_lead = max_lead.max(block.len() as i64 - bw.len() as i64);

    trace!(
        "\r\x1b[43mEncoded {} bytes as {} {} commands, ending at {}.    \x1b[0m",
        block.len(),
        stats.commands,
        format,
        bw.loc()
    );
    Ok(EncodedBlock {
        len: bw.len(),
        commands: stats.commands,
        stats,
        max_lead,
    })
}

fn literal_run(block: &[u8], cursor: usize, count: usize) -> Result<&[u8]> {
    if count > MAX_BLOCK_SIZE {
        return Err(Error::Compression(format!("literal run of {} bytes", count)));
    }
    block
        .get(cursor..cursor + count)
        .ok_or_else(|| Error::Compression("literal run past the end of the block".into()))
}

fn check_match(format: FormatVersion, offset: usize, length: usize) -> Result<()> {
    if offset == 0 || offset > MAX_OFFSET {
        return Err(Error::Compression(format!(
            "match offset {} out of range",
            offset
        )));
    }
    if length < format.min_match_floor() || length > u16::MAX as usize {
        return Err(Error::Compression(format!(
            "match length {} out of range",
            length
        )));
    }
    Ok(())
}

fn write_command(
    format: FormatVersion,
    bw: &mut BlockWriter,
    literals: &[u8],
    part: MatchPart,
) -> Result<()> {
    match format {
        FormatVersion::V1 => write_command_v1(bw, literals, part),
        FormatVersion::V2 => write_command_v2(bw, literals, part),
    }
}

//-- Version 1 ------------------------------------------------------------------------------------------------

fn write_command_v1(bw: &mut BlockWriter, literals: &[u8], part: MatchPart) -> Result<()> {
    let count = literals.len();
    let lit_token = count.min(LITERALS_RUN_LEN_V1) as u8;
    let (long_offset, match_token) = match part {
        MatchPart::Copy { offset, length, .. } => (
            u8::from(offset > 256),
            (length - MIN_MATCH_SIZE_V1).min(MATCH_RUN_LEN_V1) as u8,
        ),
        MatchPart::EndOfBlock => (0, 0),
        MatchPart::EndOfData => (0, MATCH_RUN_LEN_V1 as u8),
    };
    bw.byte(long_offset << 7 | lit_token << 4 | match_token)?;

    // Literal count extension
    if count >= LITERALS_RUN_LEN_V1 {
        if count <= 255 {
            bw.byte((count - LITERALS_RUN_LEN_V1) as u8)?;
        } else if count <= 511 {
            bw.byte(V1_LITERALS_EXT_256)?;
            bw.byte((count - 256) as u8)?;
        } else {
            bw.byte(V1_LITERALS_EXT_16BIT)?;
            bw.u16_le(count as u16)?;
        }
    }
    bw.bytes(literals)?;

    match part {
        MatchPart::Copy { offset, length, .. } => {
            // Only the low byte of an offset up to 256, 256 wraps to 0
            if offset <= 256 {
                bw.byte((negated(offset) & 0xff) as u8)?;
            } else {
                bw.u16_le(negated(offset) as u16)?;
            }
            if length - MIN_MATCH_SIZE_V1 >= MATCH_RUN_LEN_V1 {
                if length <= 255 {
                    bw.byte((length - MIN_MATCH_SIZE_V1 - MATCH_RUN_LEN_V1) as u8)?;
                } else if length <= 511 {
                    bw.byte(V1_MATCH_EXT_256)?;
                    bw.byte((length - 256) as u8)?;
                } else {
                    bw.byte(V1_MATCH_EXT_16BIT)?;
                    bw.u16_le(length as u16)?;
                }
            }
        }
        MatchPart::EndOfBlock => {}
        MatchPart::EndOfData => {
            bw.byte(0)?;
            bw.byte(V1_MATCH_EXT_16BIT)?;
            bw.u16_le(0)?;
        }
    }
    Ok(())
}

//-- Version 2 ------------------------------------------------------------------------------------------------

/// Offset as a 16-bit two's complement negative number.
fn negated(offset: usize) -> usize {
    0x10000 - offset
}

/// XYZ bits for a version 2 offset.
fn offset_class_v2(offset: usize, repeat: bool) -> u8 {
    let neg = negated(offset);
    if repeat {
        0b111
    } else if offset <= V2_OFFSET_5BIT_MAX {
        ((neg & 1) ^ 1) as u8
    } else if offset <= V2_OFFSET_9BIT_MAX {
        0b010 | (((neg >> 8) & 1) ^ 1) as u8
    } else if offset <= V2_OFFSET_13BIT_MAX {
        0b100 | ((((neg + 512) >> 8) & 1) ^ 1) as u8
    } else {
        0b110
    }
}

fn write_command_v2(bw: &mut BlockWriter, literals: &[u8], part: MatchPart) -> Result<()> {
    let count = literals.len();
    let lit_token = count.min(LITERALS_RUN_LEN_V2) as u8;
    let (offset_class, match_token) = match part {
        MatchPart::Copy {
            offset,
            length,
            repeat,
        } => (
            offset_class_v2(offset, repeat),
            (length - MIN_MATCH_SIZE_V2).min(MATCH_RUN_LEN_V2) as u8,
        ),
        MatchPart::EndOfBlock => (0, 0),
        MatchPart::EndOfData => (0b111, MATCH_RUN_LEN_V2 as u8),
    };
    bw.byte(offset_class << 5 | lit_token << 3 | match_token)?;

    // Literal count extension: a nibble, then a byte, then a 16-bit word
    if count >= LITERALS_RUN_LEN_V2 {
        let extra = count - LITERALS_RUN_LEN_V2;
        if extra < 15 {
            bw.nibble(extra as u8)?;
        } else {
            bw.nibble(15)?;
            if count <= 256 {
                bw.byte((extra - 15) as u8)?;
            } else {
                bw.byte(V2_LITERALS_EXT_16BIT)?;
                bw.u16_le(count as u16)?;
            }
        }
    }
    bw.bytes(literals)?;

    match part {
        MatchPart::Copy {
            offset,
            length,
            repeat,
        } => {
            if !repeat {
                let neg = negated(offset);
                if offset <= V2_OFFSET_5BIT_MAX {
                    bw.nibble(((neg >> 1) & 0x0f) as u8)?;
                } else if offset <= V2_OFFSET_9BIT_MAX {
                    bw.byte((neg & 0xff) as u8)?;
                } else if offset <= V2_OFFSET_13BIT_MAX {
                    let biased = neg + 512;
                    bw.nibble(((biased >> 9) & 0x0f) as u8)?;
                    bw.byte((biased & 0xff) as u8)?;
                } else {
                    bw.u16_be(neg as u16)?;
                }
            }
            let extra = length - MIN_MATCH_SIZE_V2;
            if extra >= MATCH_RUN_LEN_V2 {
                if extra - MATCH_RUN_LEN_V2 < 15 {
                    bw.nibble((extra - MATCH_RUN_LEN_V2) as u8)?;
                } else {
                    bw.nibble(15)?;
                    if length <= 255 {
                        bw.byte((extra - MATCH_RUN_LEN_V2 - 15) as u8)?;
                    } else {
                        bw.byte(V2_MATCH_EXT_16BIT)?;
                        bw.u16_le(length as u16)?;
                    }
                }
            }
        }
        MatchPart::EndOfBlock => {}
        MatchPart::EndOfData => {
            bw.nibble(15)?;
            bw.byte(V2_MATCH_EXT_EOD)?;
        }
    }
    Ok(())
}
