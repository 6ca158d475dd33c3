//! Compressor context: compresses one block at a time, reusing its buffers between blocks.
//!
//! Each call to [`Compressor::shrink_block`] indexes the window, finds the candidate matches of
//! the block, parses the block (twice for version 2, to price repeat offsets) and encodes the
//! result. The second version 2 parse is only kept when it encodes smaller than the first.

use log::{debug, info};

use super::encoder::encode_block;
use super::format::{CompressionFlags, FormatVersion, Token, MAX_BLOCK_SIZE};
use super::parser::{encoded_bits, OptimalParser, ParseInput};
use super::repmatch::RepState;
use super::stats::CommandStats;
use crate::error::{reserve, Error, Result};
use crate::suffix_index::{MatchFinder, MatchSlots};

#[derive(Debug)]
pub struct Compressor {
    format: FormatVersion,
    flags: CompressionFlags,
    min_match: usize,
    max_window_size: usize,
    finder: MatchFinder,
    matches: Vec<MatchSlots>,
    parser: OptimalParser,
    rep: RepState,
    tokens: Vec<Token>,
    rep_tokens: Vec<Token>,
    stats: CommandStats,
    max_lead: i64,
}

impl Compressor {
    /// Create a compressor for windows (history plus block) of up to `max_window_size` bytes.
    /// `min_match_size` is clamped into what `format` accepts. Every working buffer is
    /// reserved here; failure is reported as [`Error::Memory`].
    pub fn new(
        max_window_size: usize,
        min_match_size: usize,
        format: FormatVersion,
        flags: CompressionFlags,
    ) -> Result<Self> {
        let min_match = format.clamp_min_match(min_match_size);
        let block_size = max_window_size.min(MAX_BLOCK_SIZE);
        let mut compressor = Self {
            format,
            flags,
            min_match,
            max_window_size,
            finder: MatchFinder::new(),
            matches: Vec::new(),
            parser: OptimalParser::new(),
            rep: RepState::new(),
            tokens: Vec::new(),
            rep_tokens: Vec::new(),
            stats: CommandStats::default(),
            max_lead: 0,
        };
        compressor.finder.reserve(max_window_size)?;
        reserve(&mut compressor.matches, block_size, "match table")?;
        compressor.parser.reserve(block_size)?;
        reserve(&mut compressor.tokens, block_size, "tokens")?;
        if format == FormatVersion::V2 {
            compressor.rep.reserve(block_size)?;
            reserve(&mut compressor.rep_tokens, block_size, "repeat parse tokens")?;
        }
        info!(
            "{} compressor: window {} bytes, min match {}, favor ratio {}, raw {}",
            format, max_window_size, min_match, flags.favor_ratio, flags.raw_block
        );
        Ok(compressor)
    }

    /// Minimum match size after clamping.
    pub fn min_match(&self) -> usize {
        self.min_match
    }

    /// Commands emitted for the last block.
    pub fn command_count(&self) -> usize {
        self.stats.commands
    }

    /// Literal, offset and match length figures of the last block.
    pub fn stats(&self) -> &CommandStats {
        &self.stats
    }

    /// Largest lead of decoded over encoded bytes at a command boundary of the last block.
    pub fn max_lead(&self) -> i64 {
        self.max_lead
    }

    /// Compress `window[previous_block_size..previous_block_size + input_size]` into `out`,
    /// using the bytes before it as history. Returns the compressed size.
    ///
    /// [`Error::OutputTooSmall`] means the block should be stored some other way. In raw mode a
    /// block that does not shrink is refused with [`Error::RawUncompressed`].
    pub fn shrink_block(
        &mut self,
        window: &[u8],
        previous_block_size: usize,
        input_size: usize,
        out: &mut [u8],
    ) -> Result<usize> {
        self.stats = CommandStats::default();
        self.max_lead = 0;
        if input_size > MAX_BLOCK_SIZE {
            return Err(Error::InputTooLarge {
                size: input_size,
                max: MAX_BLOCK_SIZE,
            });
        }
        let end = previous_block_size + input_size;
        if end > window.len() {
            return Err(Error::Config(format!(
                "window holds {} bytes, {} expected",
                window.len(),
                end
            )));
        }
        if end > self.max_window_size {
            return Err(Error::Config(format!(
                "window of {} bytes exceeds the {} bytes this compressor was created for",
                end, self.max_window_size
            )));
        }
        let window = &window[..end];
        let block = &window[previous_block_size..];

        self.finder.build(window, self.min_match)?;
        self.finder.find_all_matches(previous_block_size, end, &mut self.matches)?;

        let input = ParseInput {
            format: self.format,
            matches: &self.matches,
            rep: None,
            min_match: self.min_match,
            favor_ratio: self.flags.favor_ratio,
        };
        self.parser.optimize(&input, &mut self.tokens)?;

        if self.format == FormatVersion::V2 {
            self.rep.prepare(
                &self.tokens,
                window,
                previous_block_size,
                &mut self.matches,
                self.min_match,
            )?;
            let input = ParseInput {
                format: self.format,
                matches: &self.matches,
                rep: Some(&self.rep),
                min_match: self.min_match,
                favor_ratio: self.flags.favor_ratio,
            };
            self.parser.optimize(&input, &mut self.rep_tokens)?;
            if !keep_cheaper(self.format, &mut self.tokens, &mut self.rep_tokens) {
                debug!("Repeat offsets saved nothing, keeping the first parse");
            }
        }

        let encoded = encode_block(self.format, block, &self.tokens, self.flags.raw_block, out)?;
        self.stats = encoded.stats;
        self.max_lead = encoded.max_lead;
        debug!(
            "Block of {} bytes ({} history) -> {} bytes, {} commands",
            input_size, previous_block_size, encoded.len, encoded.commands
        );

        if self.flags.raw_block && input_size > 0 && encoded.len >= input_size {
            return Err(Error::RawUncompressed);
        }
        Ok(encoded.len)
    }
}

/// Move `candidate` into `tokens` when it encodes in fewer bits. Returns whether it did.
fn keep_cheaper(format: FormatVersion, tokens: &mut Vec<Token>, candidate: &mut Vec<Token>) -> bool {
    if encoded_bits(format, candidate) < encoded_bits(format, tokens) {
        std::mem::swap(tokens, candidate);
        true
    } else {
        false
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compression::decompress::{expand_block, expand_raw_block};
    use crate::compression::parser::{evaluate, greedy_parse};

    fn round_trip(format: FormatVersion, flags: CompressionFlags, data: &[u8]) -> usize {
        let mut compressor = Compressor::new(data.len().max(1), 0, format, flags).unwrap();
        let mut packed = vec![0; data.len() + 64];
        let size = compressor
            .shrink_block(data, 0, data.len(), &mut packed)
            .unwrap();
        let mut out = vec![0; data.len()];
        let produced = if flags.raw_block {
            expand_raw_block(format, &packed[..size], &mut out, 0).unwrap()
        } else {
            expand_block(format, &packed[..size], &mut out, 0).unwrap()
        };
        assert_eq!(produced, data.len());
        assert_eq!(out, data);
        size
    }

    #[test]
    fn abab_scenario() {
        let data = b"ABABABABAB";
        let mut compressor =
            Compressor::new(16, 2, FormatVersion::V2, CompressionFlags::default()).unwrap();
        let mut packed = [0_u8; 32];
        let size = compressor.shrink_block(data, 0, 10, &mut packed).unwrap();
        assert_eq!(&packed[..size], &[0x36, b'A', b'B', 0xf0, 0x00]);
        assert_eq!(compressor.command_count(), 2);

        let mut v1 = Compressor::new(16, 2, FormatVersion::V1, CompressionFlags::default()).unwrap();
        // Version 1 matches are at least 3 long
        assert_eq!(v1.min_match(), 3);
        let size = v1.shrink_block(data, 0, 10, &mut packed).unwrap();
        assert_eq!(&packed[..size], &[0x25, b'A', b'B', 254, 0x00]);
    }

    #[test]
    fn small_inputs_round_trip() {
        let flags = CompressionFlags::from_bits(CompressionFlags::FAVOR_RATIO);
        for format in [FormatVersion::V1, FormatVersion::V2] {
            round_trip(format, flags, b"");
            round_trip(format, flags, b"x");
            round_trip(format, flags, b"xy");
            round_trip(format, flags, &[b'a'; 70]);
        }
    }

    #[test]
    fn distinct_bytes_are_incompressible() {
        let data: Vec<u8> = (0..100).collect();
        let mut compressor =
            Compressor::new(100, 3, FormatVersion::V1, CompressionFlags::default()).unwrap();
        let mut packed = vec![0; 200];
        let size = compressor.shrink_block(&data, 0, 100, &mut packed).unwrap();
        // One literal run: token, extension byte, the literals
        assert_eq!(size, 102);
        assert_eq!(compressor.command_count(), 1);

        let raw = CompressionFlags::from_bits(CompressionFlags::RAW_BLOCK);
        let mut compressor = Compressor::new(100, 3, FormatVersion::V1, raw).unwrap();
        assert!(matches!(
            compressor.shrink_block(&data, 0, 100, &mut packed),
            Err(Error::RawUncompressed)
        ));
    }

    #[test]
    fn size_checks() {
        let data = vec![0_u8; MAX_BLOCK_SIZE + 1];
        let mut compressor =
            Compressor::new(data.len(), 3, FormatVersion::V1, CompressionFlags::default()).unwrap();
        let mut packed = vec![0; 16];
        assert!(matches!(
            compressor.shrink_block(&data, 0, data.len(), &mut packed),
            Err(Error::InputTooLarge { .. })
        ));
        // Output buffer too small for the literals
        let data: Vec<u8> = (0..64).collect();
        assert!(matches!(
            compressor.shrink_block(&data, 0, data.len(), &mut packed),
            Err(Error::OutputTooSmall { .. })
        ));
        // Window shorter than announced
        assert!(compressor.shrink_block(&data, 10, 60, &mut packed).is_err());
    }

    #[test]
    fn history_is_used() {
        let text = b"It was the best of times, it was the worst of times. ";
        let mut window = text.to_vec();
        window.extend_from_slice(text);
        for format in [FormatVersion::V1, FormatVersion::V2] {
            let mut compressor =
                Compressor::new(window.len(), 0, format, CompressionFlags::default()).unwrap();
            let mut packed = vec![0; 128];
            let size = compressor
                .shrink_block(&window, text.len(), text.len(), &mut packed)
                .unwrap();
            // The whole second copy is one match into the history
            assert!(size < 8, "{} bytes", size);
            let mut out = window.clone();
            out[text.len()..].iter_mut().for_each(|b| *b = 0);
            let produced = expand_block(format, &packed[..size], &mut out, text.len()).unwrap();
            assert_eq!(produced, text.len());
            assert_eq!(out, window);
        }
    }

    fn m(offset: usize, length: usize) -> Token {
        Token::Match {
            offset,
            length,
            repeat: false,
        }
    }

    #[test]
    fn cheaper_parse_is_kept() {
        // "abcXabcYabcZ" parsed with one far and one repeated offset, or with literals only
        let mut first = vec![
            Token::Literals(4),
            m(4, 3),
            Token::Literals(1),
            m(4, 3),
            Token::Literals(1),
        ];
        let mut second = vec![Token::Literals(12)];
        let v2 = FormatVersion::V2;
        assert!(encoded_bits(v2, &first) < encoded_bits(v2, &second));
        assert!(!keep_cheaper(v2, &mut first, &mut second));
        assert_eq!(first.len(), 5);
        assert_eq!(second, vec![Token::Literals(12)]);

        // Equal cost keeps what is there
        let mut again = first.clone();
        assert!(!keep_cheaper(v2, &mut first, &mut again));

        let mut literals = vec![Token::Literals(12)];
        let mut matches = first.clone();
        assert!(keep_cheaper(v2, &mut literals, &mut matches));
        assert_eq!(literals, first);
    }

    #[test]
    fn repeat_parse_never_encodes_larger() {
        // Records with a far offset that the repeat parse can pick up in short pieces
        let mut data: Vec<u8> = (0..3000_u32).map(|i| (i * 17 % 253) as u8).collect();
        let copy: Vec<u8> = data
            .iter()
            .enumerate()
            .map(|(i, &b)| if i % 9 == 0 { b ^ 0x5a } else { b })
            .collect();
        data.extend_from_slice(&copy);
        let flags = CompressionFlags::from_bits(CompressionFlags::FAVOR_RATIO);
        let mut compressor = Compressor::new(data.len(), 0, FormatVersion::V2, flags).unwrap();
        let mut packed = vec![0; data.len() + 64];
        let size = compressor
            .shrink_block(&data, 0, data.len(), &mut packed)
            .unwrap();

        let mut finder = MatchFinder::new();
        finder.build(&data, 2).unwrap();
        let mut matches = Vec::new();
        finder.find_all_matches(0, data.len(), &mut matches).unwrap();
        let input = ParseInput {
            format: FormatVersion::V2,
            matches: &matches,
            rep: None,
            min_match: 2,
            favor_ratio: true,
        };
        let mut tokens = Vec::new();
        OptimalParser::new().optimize(&input, &mut tokens).unwrap();
        let mut plain = vec![0; data.len() + 64];
        let first = encode_block(FormatVersion::V2, &data, &tokens, false, &mut plain).unwrap();
        assert!(size <= first.len, "{} > {}", size, first.len);
        assert!(compressor.stats().rep_matches > 0);

        let mut out = vec![0; data.len()];
        expand_block(FormatVersion::V2, &packed[..size], &mut out, 0).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn optimal_parse_beats_greedy() {
        let data = b"abcabcabcdabcdeabcdefabcdefgabcabcdabcdeabcdefabcdefg aaaa bbbb abcdabcd";
        for format in [FormatVersion::V1, FormatVersion::V2] {
            let min_match = format.min_match_floor();
            let mut finder = MatchFinder::new();
            finder.build(data, min_match).unwrap();
            let mut matches = Vec::new();
            finder.find_all_matches(0, data.len(), &mut matches).unwrap();
            let input = ParseInput {
                format,
                matches: &matches,
                rep: None,
                min_match,
                favor_ratio: false,
            };
            let mut parser = OptimalParser::new();
            let mut tokens = Vec::new();
            parser.optimize(&input, &mut tokens).unwrap();
            let greedy = greedy_parse(&input);
            assert!(parser.total_cost() <= evaluate(&input, &greedy));
        }
    }
}
