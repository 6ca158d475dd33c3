use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use clap::Parser;
use log::{info, warn};

use crate::compression::{CompressionFlags, FormatVersion};
use crate::error::{Error, Result};
use crate::tools::stream::StreamOptions;

/// Compress, Decompress, Test
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Zip,
    Unzip,
    Test,
}
impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Everything the command line decides.
#[derive(Debug)]
pub struct LzsaOpts {
    /// Compress/Decompress/Test
    pub op_mode: Mode,
    /// Block format written (or assumed for raw blocks when decompressing)
    pub format: FormatVersion,
    /// Requested minimum match size, clamped per format
    pub min_match: usize,
    /// Explore every match length for the best ratio
    pub favor_ratio: bool,
    /// Single unframed block ending with an end-of-data marker
    pub raw: bool,
    /// Optional dictionary file
    pub dictionary: Option<PathBuf>,
    /// File to read
    pub input: PathBuf,
    /// File to write. Not used when testing.
    pub output: Option<PathBuf>,
}

impl LzsaOpts {
    pub fn new(input: PathBuf) -> Self {
        Self {
            op_mode: Mode::Zip,
            format: FormatVersion::V2,
            min_match: 0,
            favor_ratio: true,
            raw: false,
            dictionary: None,
            input,
            output: None,
        }
    }

    /// Settings handed to the stream layer.
    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            format: self.format,
            flags: CompressionFlags {
                favor_ratio: self.favor_ratio,
                raw_block: self.raw,
            },
            min_match: self.min_match,
        }
    }
}

/// Command Line Interpretation - uses external CLAP crate.
#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "LZSA block compressor",
    long_about = "
    Compresses files into LZSA1 or LZSA2 streams. Matches are found with a suffix array
    and every block is parsed optimally for the smallest output of the chosen format."
)]
pub struct Args {
    /// File to process
    #[clap()]
    input: PathBuf,

    /// Where to write the result
    #[clap()]
    output: Option<PathBuf>,

    /// Compress the input file (default)
    #[clap(short = 'c', long = "compress")]
    compress: bool,

    /// Decompress the input file
    #[clap(short = 'd', long = "decompress")]
    decompress: bool,

    /// Compress in memory, decompress and compare
    #[clap(short = 't', long = "test")]
    test: bool,

    /// Single raw block without framing
    #[clap(short = 'r', long = "raw")]
    raw: bool,

    /// Block format, 1 or 2
    #[clap(short = 'f', long = "format", default_value_t = 2)]
    format: u8,

    /// Minimum match size, clamped to 3..5 for format 1 and 2..5 for format 2
    #[clap(short = 'm', long = "min-match", default_value_t = 0)]
    min_match: usize,

    /// Only try shorter match lengths at the start of a literal run
    #[clap(long = "prefer-speed")]
    prefer_speed: bool,

    /// Dictionary file, used as history for the first block
    #[clap(short = 'D', long = "dictionary")]
    dictionary: Option<PathBuf>,

    /// Sets verbosity. -v0 shows nothing, -v5 is chatty
    #[clap(short = 'v', default_value_t = 2)]
    v: u8,
}

/// Put command line information from CLAP into our internal structure and set the log level.
pub fn lzsa_opts_init() -> Result<LzsaOpts> {
    opts_from_args(Args::parse())
}

fn opts_from_args(args: Args) -> Result<LzsaOpts> {
    // Set the log level
    match args.v {
        0 => log::set_max_level(log::LevelFilter::Off),
        1 => log::set_max_level(log::LevelFilter::Error),
        2 => log::set_max_level(log::LevelFilter::Warn),
        3 => log::set_max_level(log::LevelFilter::Info),
        4 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    };

    let modes = [args.compress, args.decompress, args.test];
    if modes.iter().filter(|&&set| set).count() > 1 {
        return Err(Error::Config(
            "only one of -c, -d and -t can be given".to_string(),
        ));
    }

    let mut opts = LzsaOpts::new(args.input);
    if args.decompress {
        opts.op_mode = Mode::Unzip
    };
    if args.test {
        opts.op_mode = Mode::Test
    };
    opts.format = FormatVersion::from_number(args.format)?;
    opts.min_match = args.min_match;
    opts.favor_ratio = !args.prefer_speed;
    opts.raw = args.raw;
    opts.dictionary = args.dictionary;
    opts.output = match (opts.op_mode, args.output) {
        (Mode::Test, Some(_)) => {
            warn!("Output file ignored in test mode");
            None
        }
        (Mode::Test, None) => None,
        (_, Some(output)) => Some(output),
        (mode, None) => Some(default_output(&opts.input, mode)),
    };

    // Below we report initialization status to the user
    info!("---- LZSA Initialization Start ----");
    info!("Verbosity set to {}", log::max_level());
    info!("Operational mode set to {}", opts.op_mode);
    info!("Format {}, min match {}", opts.format, opts.min_match);
    if !opts.favor_ratio {
        info!("Preferring speed over ratio")
    };
    if opts.raw {
        info!("Raw block mode")
    };
    if let Some(dictionary) = &opts.dictionary {
        info!("Using the dictionary {}", dictionary.display())
    };
    info!("---- LZSA Initialization End ----\n");
    Ok(opts)
}

/// `file` becomes `file.lzsa` when compressing; `file.lzsa` becomes `file` when decompressing,
/// anything else gets `.out` appended.
fn default_output(input: &std::path::Path, mode: Mode) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    match mode {
        Mode::Unzip if input.extension().map_or(false, |ext| ext == "lzsa") => {
            input.with_extension("")
        }
        Mode::Unzip => {
            name.push(".out");
            PathBuf::from(name)
        }
        _ => {
            name.push(".lzsa");
            PathBuf::from(name)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> Result<LzsaOpts> {
        let args = Args::try_parse_from(std::iter::once("lzsa").chain(args.iter().copied()))
            .map_err(|e| Error::Config(e.to_string()))?;
        opts_from_args(args)
    }

    #[test]
    fn defaults() {
        let opts = parse(&["notes.txt"]).unwrap();
        assert_eq!(opts.op_mode, Mode::Zip);
        assert_eq!(opts.format, FormatVersion::V2);
        assert!(opts.favor_ratio);
        assert!(!opts.raw);
        assert_eq!(opts.output, Some(PathBuf::from("notes.txt.lzsa")));
    }

    #[test]
    fn decompress_names() {
        let opts = parse(&["-d", "notes.txt.lzsa"]).unwrap();
        assert_eq!(opts.op_mode, Mode::Unzip);
        assert_eq!(opts.output, Some(PathBuf::from("notes.txt")));
        let opts = parse(&["-d", "blob"]).unwrap();
        assert_eq!(opts.output, Some(PathBuf::from("blob.out")));
        let opts = parse(&["-d", "blob", "plain"]).unwrap();
        assert_eq!(opts.output, Some(PathBuf::from("plain")));
    }

    #[test]
    fn options() {
        let opts = parse(&[
            "-r",
            "-f",
            "1",
            "-m",
            "4",
            "--prefer-speed",
            "-D",
            "dict.bin",
            "in",
            "out",
        ])
        .unwrap();
        assert_eq!(opts.format, FormatVersion::V1);
        assert_eq!(opts.min_match, 4);
        assert!(opts.raw);
        assert!(!opts.favor_ratio);
        assert_eq!(opts.dictionary, Some(PathBuf::from("dict.bin")));
        let stream = opts.stream_options();
        assert_eq!(stream.flags.bits(), CompressionFlags::RAW_BLOCK);
    }

    #[test]
    fn bad_arguments() {
        assert!(parse(&["-f", "3", "in"]).is_err());
        assert!(parse(&["-c", "-d", "in"]).is_err());
        let opts = parse(&["-t", "in", "out"]).unwrap();
        assert_eq!(opts.op_mode, Mode::Test);
        assert_eq!(opts.output, None);
    }
}
