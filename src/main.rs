//Enable more cargo lint tests
#![warn(rust_2018_idioms)]
#![warn(clippy::disallowed_types)]

use std::fs;
use std::path::Path;
use std::time::Instant;

use log::{error, info, LevelFilter};
use simplelog::{Config, TermLogger, TerminalMode};

use lzsa::tools::cli::{lzsa_opts_init, LzsaOpts, Mode};
use lzsa::{
    compress_file, compress_stream, decompress_file, decompress_stream, load_dictionary, Error,
    StreamStats,
};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

fn main() -> Result<(), Error> {
    // Available log levels are Error, Warn, Info, Debug, Trace
    if let Err(e) = TermLogger::init(
        LevelFilter::Trace,
        Config::default(),
        TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    ) {
        eprintln!("Logging unavailable: {}", e);
    }

    let options = lzsa_opts_init()?;
    let start = Instant::now();

    //----- Figure how what we need to do and go do it
    let result = match options.op_mode {
        Mode::Zip => compress(&options),
        Mode::Unzip => decompress(&options),
        Mode::Test => test(&options),
    };

    match &result {
        Ok(stats) => info!(
            "Done: {} bytes <-> {} bytes, {} commands, safe distance {}, {:.3}s.\n",
            stats.original_size,
            stats.compressed_size,
            stats.command_count,
            stats.safe_distance,
            start.elapsed().as_secs_f64()
        ),
        Err(e) => error!("{}", e),
    }
    result.map(|_| ())
}

fn output_path(options: &LzsaOpts) -> Result<&Path, Error> {
    options
        .output
        .as_deref()
        .ok_or_else(|| Error::Config("no output file".to_string()))
}

fn compress(options: &LzsaOpts) -> Result<StreamStats, Error> {
    let mut progress = |original: u64, compressed: u64| {
        log::debug!(
            "\r\x1b[43m{} -> {} bytes.    \x1b[0m",
            original,
            compressed
        );
    };
    compress_file(
        &options.input,
        output_path(options)?,
        options.dictionary.as_deref(),
        &options.stream_options(),
        Some(&mut progress),
    )
}

fn decompress(options: &LzsaOpts) -> Result<StreamStats, Error> {
    decompress_file(
        &options.input,
        output_path(options)?,
        options.dictionary.as_deref(),
        options.raw,
        options.format,
    )
}

/// Compress the input in memory, decompress it again and compare.
fn test(options: &LzsaOpts) -> Result<StreamStats, Error> {
    let data = fs::read(&options.input)?;
    let dictionary = match &options.dictionary {
        Some(path) => load_dictionary(path)?,
        None => Vec::new(),
    };

    let mut packed = Vec::new();
    let stats = compress_stream(
        &mut &data[..],
        &mut packed,
        &dictionary,
        &options.stream_options(),
        None,
    )?;
    let mut unpacked = Vec::with_capacity(data.len());
    decompress_stream(
        &mut &packed[..],
        &mut unpacked,
        &dictionary,
        options.raw,
        options.format,
    )?;

    if unpacked != data {
        let first = unpacked
            .iter()
            .zip(&data)
            .position(|(a, b)| a != b)
            .unwrap_or_else(|| unpacked.len().min(data.len()));
        return Err(Error::Format(format!(
            "verification failed: output differs from the input at byte {}",
            first
        )));
    }
    info!(
        "{}: verified, {} -> {} bytes",
        options.input.display(),
        stats.original_size,
        stats.compressed_size
    );
    Ok(stats)
}
