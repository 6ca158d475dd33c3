//! Block decoder. Expands one compressed block in a single pass.
//!
//! The output buffer may start with history (the previous block, or a dictionary). Matches can
//! reach back into it, but never before its start. Every field is bounds checked before
//! anything is copied; malformed input ends the call with [`Error::Format`].

use log::trace;

use super::format::*;
use crate::bitstream::reader::BlockReader;
use crate::error::{format_error, Error, Result};

/// Match fields of a decoded command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Decoded {
    Copy { offset: usize, length: usize },
    EndOfData,
}

/// Expand a framed block. `output[..out_offset]` holds the history; the block is written
/// from `out_offset` on. Returns the number of bytes produced.
///
/// A framed block ends when the input is used up right after the literals of a command.
pub fn expand_block(
    format: FormatVersion,
    input: &[u8],
    output: &mut [u8],
    out_offset: usize,
) -> Result<usize> {
    expand(format, input, output, out_offset, false)
}

/// Expand a raw block, which must end with the end-of-data marker and nothing after it.
pub fn expand_raw_block(
    format: FormatVersion,
    input: &[u8],
    output: &mut [u8],
    out_offset: usize,
) -> Result<usize> {
    expand(format, input, output, out_offset, true)
}

fn expand(
    format: FormatVersion,
    input: &[u8],
    output: &mut [u8],
    out_offset: usize,
    raw: bool,
) -> Result<usize> {
    if out_offset > output.len() {
        return Err(Error::Config(format!(
            "history of {} bytes does not fit a {} byte buffer",
            out_offset,
            output.len()
        )));
    }
    let mut br = BlockReader::new(input);
    let mut pos = out_offset;
    let mut rep_offset = 0;
    let mut commands = 0;

    loop {
        let token = br.byte()?;
        commands += 1;

        let literals = match format {
            FormatVersion::V1 => literal_count_v1(&mut br, token)?,
            FormatVersion::V2 => literal_count_v2(&mut br, token)?,
        };
        let src = br.bytes(literals)?;
        let dst = pos
            .checked_add(literals)
            .and_then(|end| output.get_mut(pos..end))
            .ok_or_else(|| format_error("literals overrun the output buffer"))?;
        dst.copy_from_slice(src);
        pos += literals;

        if !raw && br.is_empty() {
            break;
        }

        let decoded = match format {
            FormatVersion::V1 => match_fields_v1(&mut br, token)?,
            FormatVersion::V2 => match_fields_v2(&mut br, token, rep_offset)?,
        };
        match decoded {
            Decoded::EndOfData => {
                if !raw {
                    return Err(format_error("end-of-data marker inside a framed block"));
                }
                if !br.is_empty() {
                    return Err(format_error("trailing bytes after the end-of-data marker"));
                }
                break;
            }
            Decoded::Copy { offset, length } => {
                // An offset of 0 also covers a repeat offset used before any match
                if offset == 0 || offset > pos {
                    return Err(Error::Format(format!(
                        "match offset {} at position {} reaches before the window",
                        offset, pos
                    )));
                }
                if pos + length > output.len() {
                    return Err(format_error("match overruns the output buffer"));
                }
                copy_match(output, pos, offset, length);
                pos += length;
                rep_offset = offset;
            }
        }
    }

    trace!(
        "\r\x1b[43mExpanded {} {} commands into {} bytes, input at {}.    \x1b[0m",
        commands,
        format,
        pos - out_offset,
        br.loc()
    );
    Ok(pos - out_offset)
}

/// Forward copy from `offset` bytes back. Overlapping copies repeat the pattern.
fn copy_match(output: &mut [u8], pos: usize, offset: usize, length: usize) {
    let src = pos - offset;
    if offset >= length {
        output.copy_within(src..src + length, pos);
    } else {
        for idx in 0..length {
            output[pos + idx] = output[src + idx];
        }
    }
}

fn reserved(value: u8) -> Error {
    Error::Format(format!("reserved extension byte {}", value))
}

//-- Version 1 ------------------------------------------------------------------------------------------------

fn literal_count_v1(br: &mut BlockReader, token: u8) -> Result<usize> {
    let count = ((token >> 4) & 0x07) as usize;
    if count < LITERALS_RUN_LEN_V1 {
        return Ok(count);
    }
    match br.byte()? {
        V1_LITERALS_EXT_256 => Ok(256 + br.byte()? as usize),
        V1_LITERALS_EXT_16BIT => Ok(br.u16_le()? as usize),
        b if b < V1_LITERALS_EXT_256 => Ok(LITERALS_RUN_LEN_V1 + b as usize),
        b => Err(reserved(b)),
    }
}

fn match_fields_v1(br: &mut BlockReader, token: u8) -> Result<Decoded> {
    let offset = if token & 0x80 == 0 {
        256 - br.byte()? as usize
    } else {
        0x10000 - br.u16_le()? as usize
    };
    let encoded = (token & 0x0f) as usize;
    let length = if encoded < MATCH_RUN_LEN_V1 {
        encoded + MIN_MATCH_SIZE_V1
    } else {
        match br.byte()? {
            V1_MATCH_EXT_16BIT => match br.u16_le()? {
                0 => return Ok(Decoded::EndOfData),
                length => length as usize,
            },
            V1_MATCH_EXT_256 => 256 + br.byte()? as usize,
            b if b < V1_MATCH_EXT_16BIT => MIN_MATCH_SIZE_V1 + MATCH_RUN_LEN_V1 + b as usize,
            b => return Err(reserved(b)),
        }
    };
    Ok(Decoded::Copy { offset, length })
}

//-- Version 2 ------------------------------------------------------------------------------------------------

fn literal_count_v2(br: &mut BlockReader, token: u8) -> Result<usize> {
    let count = ((token >> 3) & 0x03) as usize;
    if count < LITERALS_RUN_LEN_V2 {
        return Ok(count);
    }
    let nibble = br.nibble()? as usize;
    if nibble < 15 {
        return Ok(LITERALS_RUN_LEN_V2 + nibble);
    }
    match br.byte()? {
        V2_LITERALS_EXT_16BIT => Ok(br.u16_le()? as usize),
        b if b < V2_LITERALS_EXT_16BIT => Ok(LITERALS_RUN_LEN_V2 + 15 + b as usize),
        b => Err(reserved(b)),
    }
}

fn match_fields_v2(br: &mut BlockReader, token: u8, rep_offset: usize) -> Result<Decoded> {
    let class = token >> 5;
    // Z holds the inverse of the lowest stored bit of the negated offset
    let z = ((class & 1) ^ 1) as usize;
    let offset = match class {
        0b000 | 0b001 => 0x10000 - (0xffe0 | (br.nibble()? as usize) << 1 | z),
        0b010 | 0b011 => 0x10000 - (0xfe00 | z << 8 | br.byte()? as usize),
        0b100 | 0b101 => {
            let high = br.nibble()? as usize;
            let low = br.byte()? as usize;
            0x10000 + 512 - (0xe000 | high << 9 | z << 8 | low)
        }
        0b110 => match br.u16_be()? {
            0 => return Err(format_error("16-bit offset of 65536")),
            neg => 0x10000 - neg as usize,
        },
        _ => rep_offset,
    };
    let encoded = (token & 0x07) as usize;
    let length = if encoded < MATCH_RUN_LEN_V2 {
        encoded + MIN_MATCH_SIZE_V2
    } else {
        let nibble = br.nibble()? as usize;
        if nibble < 15 {
            MIN_MATCH_SIZE_V2 + MATCH_RUN_LEN_V2 + nibble
        } else {
            match br.byte()? {
                V2_MATCH_EXT_EOD => return Ok(Decoded::EndOfData),
                V2_MATCH_EXT_16BIT => br.u16_le()? as usize,
                b if b < V2_MATCH_EXT_EOD => MIN_MATCH_SIZE_V2 + MATCH_RUN_LEN_V2 + 15 + b as usize,
                b => return Err(reserved(b)),
            }
        }
    };
    Ok(Decoded::Copy { offset, length })
}
