//! Stream and file compression.
//!
//! Framed streams are cut into blocks of up to [`MAX_BLOCK_SIZE`] bytes. Every block is
//! compressed against up to [`MAX_BLOCK_SIZE`] bytes of history: the dictionary for the first
//! block, the end of the data before it for the others. Blocks that don't shrink are stored as
//! they are. Raw mode writes the whole input as one unframed block.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::{debug, info, trace};

use super::dictionary::{dictionary_tail, load_dictionary};
use super::frame::{
    decode_block_header, decode_frame_header, encode_block_header, encode_frame_header,
    BlockHeader, BLOCK_HEADER_SIZE, FRAME_FOOTER, FRAME_HEADER_SIZE,
};
use crate::compression::format::MAX_BLOCK_SIZE;
use crate::compression::{
    expand_block, expand_raw_block, CommandStats, CompressionFlags, Compressor, FormatVersion,
    SafeDistance,
};
use crate::error::{format_error, Error, Result};

/// Compression settings for a stream.
#[derive(Clone, Copy, Debug)]
pub struct StreamOptions {
    pub format: FormatVersion,
    pub flags: CompressionFlags,
    /// Requested minimum match size, clamped by the compressor.
    pub min_match: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            format: FormatVersion::V2,
            flags: CompressionFlags::from_bits(CompressionFlags::FAVOR_RATIO),
            min_match: 0,
        }
    }
}

/// Totals for a finished stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub original_size: u64,
    pub compressed_size: u64,
    /// Commands in the compressed blocks. Always zero when decompressing.
    pub command_count: usize,
    /// How far the compressed stream must reach past the end of the decompressed data for the
    /// two to share one buffer while decoding. Zero when decompressing.
    pub safe_distance: u64,
    /// Literal, offset and match length figures of the compressed blocks.
    pub commands: CommandStats,
}

/// Called after every block with the original and compressed byte counts so far.
pub type Progress<'a> = &'a mut dyn FnMut(u64, u64);

/// Compress everything `reader` yields into `writer`.
pub fn compress_stream<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    dictionary: &[u8],
    options: &StreamOptions,
    progress: Option<Progress>,
) -> Result<StreamStats> {
    if options.flags.raw_block {
        return compress_raw(reader, writer, dictionary, options);
    }

    let mut compressor = Compressor::new(
        2 * MAX_BLOCK_SIZE,
        options.min_match,
        options.format,
        options.flags,
    )?;
    let mut progress = progress;
    let mut stats = StreamStats::default();
    let mut safe = SafeDistance::new();

    writer.write_all(&encode_frame_header(options.format))?;
    stats.compressed_size += FRAME_HEADER_SIZE as u64;
    safe.advance(0, FRAME_HEADER_SIZE as u64);

    // window = history followed by the block being compressed
    let mut window = Vec::with_capacity(2 * MAX_BLOCK_SIZE);
    window.extend_from_slice(dictionary_tail(dictionary));
    let mut packed = vec![0_u8; MAX_BLOCK_SIZE];
    let mut block_count = 0;

    loop {
        let history = window.len();
        window.resize(history + MAX_BLOCK_SIZE, 0);
        let read = read_full(reader, &mut window[history..])?;
        window.truncate(history + read);
        if read == 0 {
            break;
        }

        // A compressed block must be smaller than the data it replaces
        let shrunk = match compressor.shrink_block(&window, history, read, &mut packed[..read]) {
            Ok(size) if size < read => Some(size),
            Ok(_) | Err(Error::OutputTooSmall { .. }) => None,
            Err(e) => return Err(e),
        };
        safe.advance(0, BLOCK_HEADER_SIZE as u64);
        let stored = match shrunk {
            Some(size) => {
                writer.write_all(&encode_block_header(BlockHeader::Compressed(size))?)?;
                writer.write_all(&packed[..size])?;
                stats.command_count += compressor.command_count();
                stats.commands.merge(compressor.stats());
                safe.note_boundary(compressor.max_lead());
                size
            }
            None => {
                debug!("Block {} stored uncompressed ({} bytes)", block_count, read);
                writer.write_all(&encode_block_header(BlockHeader::Uncompressed(read))?)?;
                writer.write_all(&window[history..])?;
                read
            }
        };
        safe.advance(read as u64, stored as u64);
        trace!(
            "\r\x1b[43mBlock {}: {} -> {} bytes.    \x1b[0m",
            block_count,
            read,
            stored
        );

        stats.original_size += read as u64;
        stats.compressed_size += (BLOCK_HEADER_SIZE + stored) as u64;
        block_count += 1;
        if let Some(report) = progress.as_mut() {
            report(stats.original_size, stats.compressed_size);
        }

        let keep_from = window.len().saturating_sub(MAX_BLOCK_SIZE);
        window.drain(..keep_from);
    }

    writer.write_all(&FRAME_FOOTER)?;
    writer.flush()?;
    stats.compressed_size += FRAME_FOOTER.len() as u64;
    safe.advance(0, FRAME_FOOTER.len() as u64);
    stats.safe_distance = safe.distance();
    info!(
        "Compressed {} bytes into {} bytes in {} blocks, safe distance {}",
        stats.original_size, stats.compressed_size, block_count, stats.safe_distance
    );
    log_command_stats(&stats.commands);
    Ok(stats)
}

fn compress_raw<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    dictionary: &[u8],
    options: &StreamOptions,
) -> Result<StreamStats> {
    let mut window = dictionary_tail(dictionary).to_vec();
    let history = window.len();
    // One byte past the limit is enough to tell that the input is too large
    let read = reader
        .take(MAX_BLOCK_SIZE as u64 + 1)
        .read_to_end(&mut window)?;
    if read > MAX_BLOCK_SIZE {
        return Err(Error::InputTooLarge {
            size: read,
            max: MAX_BLOCK_SIZE,
        });
    }

    let mut compressor = Compressor::new(
        window.len().max(1),
        options.min_match,
        options.format,
        options.flags,
    )?;
    // Room for the end of data marker even when the input is empty
    let mut packed = vec![0_u8; read + 8];
    let size = match compressor.shrink_block(&window, history, read, &mut packed) {
        Ok(size) => size,
        Err(Error::OutputTooSmall { .. }) => return Err(Error::RawUncompressed),
        Err(e) => return Err(e),
    };
    writer.write_all(&packed[..size])?;
    writer.flush()?;

    let mut safe = SafeDistance::new();
    safe.note_boundary(compressor.max_lead());
    safe.advance(read as u64, size as u64);
    let stats = StreamStats {
        original_size: read as u64,
        compressed_size: size as u64,
        command_count: compressor.command_count(),
        safe_distance: safe.distance(),
        commands: *compressor.stats(),
    };
    info!(
        "Compressed {} bytes into a {} byte raw block, safe distance {}",
        read, size, stats.safe_distance
    );
    log_command_stats(&stats.commands);
    Ok(stats)
}

fn log_command_stats(commands: &CommandStats) {
    debug!(
        "Literals: min {} avg {} max {} over {} commands",
        commands.min_literals,
        commands.avg_literals(),
        commands.max_literals,
        commands.commands
    );
    debug!(
        "Offsets: min {} avg {} max {}; match lengths: min {} avg {} max {}; {} of {} matches repeat an offset",
        commands.min_offset,
        commands.avg_offset(),
        commands.max_offset,
        commands.min_match_len,
        commands.avg_match_len(),
        commands.max_match_len,
        commands.rep_matches,
        commands.matches
    );
}

/// Decompress everything `reader` yields into `writer`. Raw blocks carry no header, so their
/// format is `default_format`; framed streams announce theirs.
pub fn decompress_stream<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    dictionary: &[u8],
    raw: bool,
    default_format: FormatVersion,
) -> Result<StreamStats> {
    if raw {
        return decompress_raw(reader, writer, dictionary, default_format);
    }

    let mut header = [0_u8; FRAME_HEADER_SIZE];
    read_exact_or_format(reader, &mut header, "stream header")?;
    let format = decode_frame_header(&header)?;
    debug!("Stream format {}", format);

    let mut stats = StreamStats {
        compressed_size: FRAME_HEADER_SIZE as u64,
        ..StreamStats::default()
    };
    let mut window = Vec::with_capacity(2 * MAX_BLOCK_SIZE);
    window.extend_from_slice(dictionary_tail(dictionary));
    let mut packed = Vec::with_capacity(MAX_BLOCK_SIZE);

    loop {
        let mut block_header = [0_u8; BLOCK_HEADER_SIZE];
        read_exact_or_format(reader, &mut block_header, "block header")?;
        stats.compressed_size += BLOCK_HEADER_SIZE as u64;
        let history = window.len();

        let produced = match decode_block_header(&block_header) {
            BlockHeader::End => break,
            BlockHeader::Uncompressed(size) => {
                check_block_size(size)?;
                window.resize(history + size, 0);
                read_exact_or_format(reader, &mut window[history..], "stored block")?;
                stats.compressed_size += size as u64;
                size
            }
            BlockHeader::Compressed(size) => {
                check_block_size(size)?;
                packed.resize(size, 0);
                read_exact_or_format(reader, &mut packed, "compressed block")?;
                stats.compressed_size += size as u64;
                window.resize(history + MAX_BLOCK_SIZE, 0);
                let produced = expand_block(format, &packed, &mut window, history)?;
                window.truncate(history + produced);
                produced
            }
        };

        writer.write_all(&window[history..])?;
        stats.original_size += produced as u64;
        let keep_from = window.len().saturating_sub(MAX_BLOCK_SIZE);
        window.drain(..keep_from);
    }

    writer.flush()?;
    info!(
        "Decompressed {} bytes into {} bytes",
        stats.compressed_size, stats.original_size
    );
    Ok(stats)
}

fn decompress_raw<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    dictionary: &[u8],
    format: FormatVersion,
) -> Result<StreamStats> {
    let mut packed = Vec::new();
    reader.read_to_end(&mut packed)?;

    let mut window = dictionary_tail(dictionary).to_vec();
    let history = window.len();
    window.resize(history + MAX_BLOCK_SIZE, 0);
    let produced = expand_raw_block(format, &packed, &mut window, history)?;
    writer.write_all(&window[history..history + produced])?;
    writer.flush()?;
    info!(
        "Decompressed a {} byte raw block into {} bytes",
        packed.len(),
        produced
    );
    Ok(StreamStats {
        original_size: produced as u64,
        compressed_size: packed.len() as u64,
        ..StreamStats::default()
    })
}

/// Compress the file at `input` into `output`, with an optional dictionary file.
pub fn compress_file(
    input: &Path,
    output: &Path,
    dictionary: Option<&Path>,
    options: &StreamOptions,
    progress: Option<Progress>,
) -> Result<StreamStats> {
    let dictionary = match dictionary {
        Some(path) => load_dictionary(path)?,
        None => Vec::new(),
    };
    let mut reader = BufReader::new(File::open(input)?);
    let mut writer = BufWriter::new(File::create(output)?);
    info!("Compressing {} to {}", input.display(), output.display());
    compress_stream(&mut reader, &mut writer, &dictionary, options, progress)
}

/// Decompress the file at `input` into `output`, with an optional dictionary file.
pub fn decompress_file(
    input: &Path,
    output: &Path,
    dictionary: Option<&Path>,
    raw: bool,
    default_format: FormatVersion,
) -> Result<StreamStats> {
    let dictionary = match dictionary {
        Some(path) => load_dictionary(path)?,
        None => Vec::new(),
    };
    let mut reader = BufReader::new(File::open(input)?);
    let mut writer = BufWriter::new(File::create(output)?);
    info!("Decompressing {} to {}", input.display(), output.display());
    decompress_stream(&mut reader, &mut writer, &dictionary, raw, default_format)
}

fn check_block_size(size: usize) -> Result<()> {
    if size > MAX_BLOCK_SIZE {
        return Err(Error::Format(format!(
            "block of {} bytes exceeds the {} byte limit",
            size, MAX_BLOCK_SIZE
        )));
    }
    Ok(())
}

/// Fill `buf` as far as the reader allows. Returns the bytes read; less than `buf.len()` only
/// at the end of the input.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// `read_exact` that reports a short read as truncated data rather than an I/O failure.
fn read_exact_or_format<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            Err(format_error(&format!("truncated {}", what)))
        }
        Err(e) => Err(e.into()),
    }
}
