//! Optimal parser: picks the cheapest way to express a block as commands, given the candidate
//! matches of every position.
//!
//! Costs are computed backwards, from the end of the block, in two tables:
//! - `command_cost[p]`: fewest bits for everything from `p` on, when a command starts at `p`.
//!   A command is a literal run followed by a match, or the final literal-only command.
//! - `match_cost[s]`: fewest bits for everything from `s` on, when a match starts at `s`.
//!
//! A command starting at `p` with `L` literals costs `8 + ext(L) + 8L + match_cost[p + L]`.
//! `ext(L)` only changes at a few class boundaries, so for each class the best `p + L` is the
//! minimum of `match_cost[s] + 8s` over a window of `s` that slides with `p`. One monotone
//! deque per class keeps that minimum, which makes the whole pass linear in the number of
//! candidate lengths.
//!
//! Ties are broken towards longer matches, then smaller offsets, and towards longer literal
//! runs. The all-literal tail wins an exact tie.

use std::collections::VecDeque;

use log::debug;

use super::format::{FormatVersion, Token, LEAVE_ALONE_MATCH_SIZE, MODESWITCH_PENALTY};
use super::repmatch::RepState;
use crate::error::{reserve, Result};
use crate::suffix_index::{Match, MatchSlots};

const INFINITE: u32 = u32::MAX;

/// How the command starting at a position goes on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum CommandChoice {
    /// Literals up to the end of the block.
    #[default]
    Final,
    /// This many literals, then the match chosen for the position after them.
    Literals(usize),
}

/// Everything the parser needs to know about one block.
#[derive(Clone, Copy, Debug)]
pub struct ParseInput<'a> {
    pub format: FormatVersion,
    /// Candidate matches, one entry per position of the block.
    pub matches: &'a [MatchSlots],
    /// Hot offsets from a previous pass (version 2).
    pub rep: Option<&'a RepState>,
    pub min_match: usize,
    pub favor_ratio: bool,
}

impl<'a> ParseInput<'a> {
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// The candidate in `slot` at `pos` would reuse the hot offset.
    fn slot_is_rep(&self, pos: usize, slot: usize) -> bool {
        self.format == FormatVersion::V2
            && self
                .rep
                .map_or(false, |rep| rep.best_slot(pos) == Some(slot))
    }

    /// A match with `offset` at `pos` would reuse the hot offset.
    fn offset_is_rep(&self, pos: usize, offset: usize) -> bool {
        self.format == FormatVersion::V2
            && self
                .rep
                .map_or(false, |rep| rep.incoming(pos) == Some(offset))
    }

    /// Model cost of a match, without what follows it.
    fn match_bits(&self, offset: usize, length: usize, repeat: bool) -> u32 {
        self.format.match_bits(offset, length, repeat) + MODESWITCH_PENALTY
    }
}

/// Cost tables, kept between blocks.
#[derive(Debug, Default)]
pub struct OptimalParser {
    command_cost: Vec<u32>,
    command_choice: Vec<CommandChoice>,
    match_cost: Vec<u32>,
    match_choice: Vec<Match>,
    /// Sliding minimum of `match_cost[s] + 8s` per literal class, as (s, key).
    windows: Vec<VecDeque<(usize, u32)>>,
}

impl OptimalParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the cost tables for blocks of up to `block_size` bytes.
    pub fn reserve(&mut self, block_size: usize) -> Result<()> {
        reserve(&mut self.command_cost, block_size + 1, "command costs")?;
        reserve(&mut self.command_choice, block_size + 1, "command choices")?;
        reserve(&mut self.match_cost, block_size + 1, "match costs")?;
        reserve(&mut self.match_choice, block_size + 1, "match choices")?;
        Ok(())
    }

    /// Bits of the cheapest parse found by the last call to [`OptimalParser::optimize`].
    pub fn total_cost(&self) -> u32 {
        self.command_cost.first().copied().unwrap_or(0)
    }

    /// Find the cheapest parse of the block and write it to `tokens`.
    pub fn optimize(&mut self, input: &ParseInput, tokens: &mut Vec<Token>) -> Result<()> {
        let n = input.len();
        let format = input.format;
        self.reserve(n)?;
        self.command_cost.resize(n + 1, INFINITE);
        self.command_choice.resize(n + 1, CommandChoice::Final);
        self.match_cost.resize(n + 1, INFINITE);
        self.match_choice.resize(n + 1, Match::default());
        self.command_cost[n] = format.command_bits(0);

        let classes = format.literal_classes();
        self.windows.resize_with(classes.len(), VecDeque::new);
        self.windows.iter_mut().for_each(|win| win.clear());

        for pos in (0..n).rev() {
            let (cost, choice) = self.best_match(input, pos);
            self.match_cost[pos] = cost;
            self.match_choice[pos] = choice;

            // Slide every class window down to [pos + first, pos + last]
            for (win, &(first, last, _)) in self.windows.iter_mut().zip(classes) {
                let start = pos + first;
                if start < n && self.match_cost[start] != INFINITE {
                    let key = self.match_cost[start] + 8 * start as u32;
                    while win.front().map_or(false, |&(_, k)| k > key) {
                        win.pop_front();
                    }
                    win.push_front((start, key));
                }
                while win.back().map_or(false, |&(s, _)| s > pos + last) {
                    win.pop_back();
                }
            }

            // The final command is the default, the longest literal class is tried first
            let mut best_cost = format.command_bits(n - pos);
            let mut best_choice = CommandChoice::Final;
            for (win, &(_, _, ext)) in self.windows.iter().zip(classes).rev() {
                if let Some(&(start, key)) = win.back() {
                    let cost = 8 + ext + key - 8 * pos as u32;
                    if cost < best_cost {
                        best_cost = cost;
                        best_choice = CommandChoice::Literals(start - pos);
                    }
                }
            }
            self.command_cost[pos] = best_cost;
            self.command_choice[pos] = best_choice;
        }

        self.walk(input, tokens);
        debug!(
            "Parsed {} bytes into {} tokens, {} bits",
            n,
            tokens.len(),
            self.total_cost()
        );
        Ok(())
    }

    /// Cheapest match starting at `pos`, given the costs of every later position.
    fn best_match(&self, input: &ParseInput, pos: usize) -> (u32, Match) {
        let remaining = input.len() - pos;
        let mut best_cost = INFINITE;
        let mut best = Match::default();

        for (slot, candidate) in input.matches[pos].iter().enumerate() {
            if candidate.is_empty() {
                break;
            }
            let longest = candidate.length.min(remaining);
            if longest < input.min_match {
                continue;
            }
            let repeat = input.slot_is_rep(pos, slot);
            let shortest = if longest >= LEAVE_ALONE_MATCH_SIZE
                || !(input.favor_ratio || slot == 0)
            {
                longest
            } else {
                input.min_match
            };

            for length in (shortest..=longest).rev() {
                let cost = input.match_bits(candidate.offset, length, repeat)
                    + self.command_cost[pos + length];
                let better = cost < best_cost
                    || (cost == best_cost
                        && (length > best.length
                            || (length == best.length && candidate.offset < best.offset)));
                if better {
                    best_cost = cost;
                    best = Match::new(length, candidate.offset);
                }
            }
        }
        (best_cost, best)
    }

    /// Follow the choices from the start of the block.
    fn walk(&self, input: &ParseInput, tokens: &mut Vec<Token>) {
        let n = input.len();
        tokens.clear();
        let mut pos = 0;
        let mut last_offset = 0;
        while pos < n {
            match self.command_choice[pos] {
                CommandChoice::Final => {
                    tokens.push(Token::Literals(n - pos));
                    break;
                }
                CommandChoice::Literals(count) => {
                    if count > 0 {
                        tokens.push(Token::Literals(count));
                    }
                    let chosen = self.match_choice[pos + count];
                    tokens.push(Token::Match {
                        offset: chosen.offset,
                        length: chosen.length,
                        repeat: input.format == FormatVersion::V2 && chosen.offset == last_offset,
                    });
                    last_offset = chosen.offset;
                    pos += count + chosen.length;
                }
            }
        }
    }
}

/// Model cost of any parse of the block, counted the same way as the optimal parser counts.
pub fn evaluate(input: &ParseInput, tokens: &[Token]) -> u32 {
    let format = input.format;
    let mut pos = 0;
    let mut literals = 0;
    let mut cost = 0;
    for token in tokens {
        match *token {
            Token::Literals(count) => {
                literals += count;
                pos += count;
            }
            Token::Match { offset, length, .. } => {
                let repeat = input.offset_is_rep(pos, offset);
                cost += format.command_bits(literals) + input.match_bits(offset, length, repeat);
                literals = 0;
                pos += length;
            }
        }
    }
    cost + format.command_bits(literals)
}

/// Bits the encoder writes for `tokens`, with repeat offsets derived the way the encoder
/// derives them. No mode switch penalty is charged.
pub fn encoded_bits(format: FormatVersion, tokens: &[Token]) -> u32 {
    let mut literals = 0;
    let mut last_offset = 0;
    let mut bits = 0;
    for token in tokens {
        match *token {
            Token::Literals(count) => literals += count,
            Token::Match { offset, length, .. } => {
                let repeat = format == FormatVersion::V2 && offset == last_offset;
                bits += format.command_bits(literals) + format.match_bits(offset, length, repeat);
                literals = 0;
                last_offset = offset;
            }
        }
    }
    bits + format.command_bits(literals)
}

/// Take the longest candidate wherever there is one, literals elsewhere.
pub fn greedy_parse(input: &ParseInput) -> Vec<Token> {
    let n = input.len();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut literals = 0;
    let mut last_offset = 0;
    while pos < n {
        let longest = input.matches[pos][0];
        let length = longest.length.min(n - pos);
        if longest.is_empty() || length < input.min_match {
            literals += 1;
            pos += 1;
            continue;
        }
        if literals > 0 {
            tokens.push(Token::Literals(literals));
            literals = 0;
        }
        tokens.push(Token::Match {
            offset: longest.offset,
            length,
            repeat: input.format == FormatVersion::V2 && longest.offset == last_offset,
        });
        last_offset = longest.offset;
        pos += length;
    }
    if literals > 0 {
        tokens.push(Token::Literals(literals));
    }
    tokens
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::suffix_index::MatchFinder;

    fn candidates(data: &[u8], min_match: usize) -> Vec<MatchSlots> {
        let mut mf = MatchFinder::new();
        mf.build(data, min_match).unwrap();
        let mut table = Vec::new();
        mf.find_all_matches(0, data.len(), &mut table).unwrap();
        table
    }

    fn plain_input<'a>(
        format: FormatVersion,
        matches: &'a [MatchSlots],
        min_match: usize,
    ) -> ParseInput<'a> {
        ParseInput {
            format,
            matches,
            rep: None,
            min_match,
            favor_ratio: true,
        }
    }

    fn replay(data: &[u8], tokens: &[Token]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut pos = 0;
        for token in tokens {
            match *token {
                Token::Literals(count) => {
                    out.extend_from_slice(&data[pos..pos + count]);
                    pos += count;
                }
                Token::Match { offset, length, .. } => {
                    for _ in 0..length {
                        out.push(out[out.len() - offset]);
                    }
                    pos += length;
                }
            }
        }
        out
    }

    #[test]
    fn abab() {
        let data = b"ABABABABAB";
        let matches = candidates(data, 2);
        let mut parser = OptimalParser::new();
        let mut tokens = Vec::new();
        let input = plain_input(FormatVersion::V2, &matches, 2);
        parser.optimize(&input, &mut tokens).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Literals(2),
                Token::Match {
                    offset: 2,
                    length: 8,
                    repeat: false
                }
            ]
        );
        assert_eq!(parser.total_cost(), evaluate(&input, &tokens));
    }

    #[test]
    fn no_matches_is_one_literal_run() {
        let data: Vec<u8> = (0..100).collect();
        let matches = candidates(&data, 3);
        let mut parser = OptimalParser::new();
        let mut tokens = Vec::new();
        parser
            .optimize(&plain_input(FormatVersion::V1, &matches, 3), &mut tokens)
            .unwrap();
        assert_eq!(tokens, vec![Token::Literals(100)]);
        assert_eq!(parser.total_cost(), FormatVersion::V1.command_bits(100));
    }

    #[test]
    fn empty_block() {
        let mut parser = OptimalParser::new();
        let mut tokens = vec![Token::Literals(3)];
        parser
            .optimize(&plain_input(FormatVersion::V2, &[], 2), &mut tokens)
            .unwrap();
        assert!(tokens.is_empty());
        assert_eq!(parser.total_cost(), 8);
    }

    #[test]
    fn encoded_bits_match_the_encoder() {
        use crate::compression::encoder::encode_block;
        let data = b"the cat sat on the mat, the cat sat on the hat; that cat sat on the mat";
        for format in [FormatVersion::V1, FormatVersion::V2] {
            let min_match = format.min_match_floor();
            let matches = candidates(data, min_match);
            let mut tokens = Vec::new();
            OptimalParser::new()
                .optimize(&plain_input(format, &matches, min_match), &mut tokens)
                .unwrap();
            let mut out = vec![0; 128];
            let done = encode_block(format, data, &tokens, false, &mut out).unwrap();
            let bits = encoded_bits(format, &tokens) as usize;
            assert_eq!(done.len, (bits + 7) / 8, "{}", format);
        }
    }

    #[test]
    fn never_worse_than_greedy() {
        let texts: [&[u8]; 3] = [
            b"the cat sat on the mat, the cat sat on the hat; that cat sat on the mat",
            b"aaaaaaaaaabaaaaaaaaaabaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaab",
            b"abcdefgabcdefxabcdefgabcdxxabcdefgabcdefgabcdefg0123abcd",
        ];
        for data in texts {
            for format in [FormatVersion::V1, FormatVersion::V2] {
                let min_match = format.min_match_floor();
                let matches = candidates(data, min_match);
                for favor_ratio in [true, false] {
                    let input = ParseInput {
                        favor_ratio,
                        ..plain_input(format, &matches, min_match)
                    };
                    let mut parser = OptimalParser::new();
                    let mut tokens = Vec::new();
                    parser.optimize(&input, &mut tokens).unwrap();
                    assert_eq!(replay(data, &tokens), data.to_vec());
                    assert_eq!(parser.total_cost(), evaluate(&input, &tokens));
                    let greedy = greedy_parse(&input);
                    assert_eq!(replay(data, &greedy), data.to_vec());
                    assert!(parser.total_cost() <= evaluate(&input, &greedy));
                }
            }
        }
    }
}
