//! Repeat offsets for version 2 blocks.
//!
//! A version 2 match may reuse the offset of the previous match without storing it. Which
//! offset is "previous" depends on the parse, which in turn depends on what repeat matches cost,
//! so the compressor parses twice. The first parse ignores repeat offsets. From its path every
//! position gets an incoming offset (the offset of the last match ending at or before it), and
//! the candidate that would reuse it is marked. The second parse prices marked candidates as
//! repeat matches.
//!
//! When no candidate at a position has the incoming offset, the bytes at that distance are
//! compared directly and, if they match for long enough, added as an extra candidate.

use log::debug;

use super::format::{Token, LCP_MAX, NMATCHES_PER_OFFSET};
use crate::error::{reserve, Result};
use crate::suffix_index::{Match, MatchSlots};

/// Hot offset of every position of a block.
#[derive(Debug, Default)]
pub struct RepState {
    /// Offset of the last match ending at or before each position (0 = none yet).
    incoming: Vec<usize>,
    /// Slot of the candidate that reuses the incoming offset.
    best_slot: Vec<Option<usize>>,
}

impl RepState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self, block_size: usize) -> Result<()> {
        reserve(&mut self.incoming, block_size, "incoming offsets")?;
        reserve(&mut self.best_slot, block_size, "repeat slots")?;
        Ok(())
    }

    /// Hot offset at `pos`, if a match came before it.
    pub fn incoming(&self, pos: usize) -> Option<usize> {
        self.incoming.get(pos).copied().filter(|&offset| offset != 0)
    }

    /// Candidate slot at `pos` that reuses the hot offset.
    pub fn best_slot(&self, pos: usize) -> Option<usize> {
        self.best_slot.get(pos).copied().flatten()
    }

    /// Derive the hot offsets from a preliminary parse and mark (or add) the candidates that
    /// reuse them. `matches` holds the candidates of the block starting at `window[start]`.
    /// Returns the number of candidates added.
    pub fn prepare(
        &mut self,
        tokens: &[Token],
        window: &[u8],
        start: usize,
        matches: &mut [MatchSlots],
        min_match: usize,
    ) -> Result<usize> {
        let n = matches.len();
        self.reserve(n)?;

        // Incoming offsets along the preliminary path
        let mut offset = 0;
        for token in tokens {
            let covered = token.len().min(n - self.incoming.len());
            self.incoming.extend(std::iter::repeat(offset).take(covered));
            if let Token::Match { offset: next, .. } = *token {
                offset = next;
            }
        }
        self.incoming.resize(n, offset);

        let mut added = 0;
        for pos in 0..n {
            let hot = self.incoming[pos];
            let slot = if hot == 0 {
                None
            } else if let Some(slot) = matches[pos].iter().position(|m| m.offset == hot) {
                Some(slot)
            } else {
                let length = rep_length(window, start + pos, hot, start + n);
                if length >= min_match {
                    added += 1;
                    Some(insert_candidate(&mut matches[pos], Match::new(length, hot)))
                } else {
                    None
                }
            };
            self.best_slot.push(slot);
        }

        debug!(
            "Repeat offsets: {} positions with a hot candidate, {} added",
            self.best_slot.iter().filter(|slot| slot.is_some()).count(),
            added
        );
        Ok(added)
    }
}

/// Length of the match at `pos` that reuses `offset`, up to `end` and [`LCP_MAX`].
fn rep_length(window: &[u8], pos: usize, offset: usize, end: usize) -> usize {
    if offset > pos {
        return 0;
    }
    let limit = (end - pos).min(LCP_MAX);
    (0..limit)
        .take_while(|&idx| window[pos + idx] == window[pos - offset + idx])
        .count()
}

/// Add a candidate keeping the slots sorted by length (longest first), then offset. When every
/// slot is taken the last one gives way. Returns the slot of the new candidate.
fn insert_candidate(slots: &mut MatchSlots, candidate: Match) -> usize {
    let used = slots.iter().take_while(|m| !m.is_empty()).count();
    let mut idx = used.min(NMATCHES_PER_OFFSET - 1);
    slots[idx] = candidate;
    while idx > 0 {
        let prev = slots[idx - 1];
        let before = prev.length > candidate.length
            || (prev.length == candidate.length && prev.offset < candidate.offset);
        if before {
            break;
        }
        slots.swap(idx - 1, idx);
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod test {
    use super::*;

    fn m(offset: usize, length: usize) -> Token {
        Token::Match {
            offset,
            length,
            repeat: false,
        }
    }

    #[test]
    fn incoming_follows_the_path() {
        let window = b"abcdabcdxyzxyzxy";
        let tokens = [Token::Literals(4), m(4, 4), Token::Literals(3), m(3, 5)];
        let mut matches = vec![MatchSlots::default(); window.len()];
        let mut rep = RepState::new();
        rep.prepare(&tokens, window, 0, &mut matches, 2).unwrap();
        assert_eq!(rep.incoming(0), None);
        assert_eq!(rep.incoming(7), None);
        assert_eq!(rep.incoming(8), Some(4));
        assert_eq!(rep.incoming(11), Some(4));
    }

    #[test]
    fn missing_rep_candidate_is_measured() {
        let window = b"ab_ab_ab";
        let tokens = [Token::Literals(3), m(3, 2), Token::Literals(3)];
        let mut matches = vec![MatchSlots::default(); window.len()];
        let mut rep = RepState::new();
        let added = rep.prepare(&tokens, window, 0, &mut matches, 2).unwrap();
        assert_eq!(added, 2);
        assert_eq!(rep.incoming(4), None);
        assert_eq!(rep.incoming(5), Some(3));
        assert_eq!(rep.best_slot(5), Some(0));
        assert_eq!(matches[5][0], Match::new(3, 3));
        assert_eq!(matches[6][0], Match::new(2, 3));
        // A single byte is too short
        assert_eq!(rep.best_slot(7), None);
    }

    #[test]
    fn insertion_keeps_order() {
        let mut slots = MatchSlots::default();
        slots[0] = Match::new(10, 40);
        slots[1] = Match::new(4, 9);
        assert_eq!(insert_candidate(&mut slots, Match::new(6, 3)), 1);
        assert_eq!(slots[..3], [Match::new(10, 40), Match::new(6, 3), Match::new(4, 9)]);

        let mut full = [Match::new(20, 100); NMATCHES_PER_OFFSET];
        assert_eq!(insert_candidate(&mut full, Match::new(2, 7)), NMATCHES_PER_OFFSET - 1);
        assert_eq!(full[NMATCHES_PER_OFFSET - 1], Match::new(2, 7));
    }

    #[test]
    fn rep_length_overlaps() {
        let window = b"aaaaaaaa";
        assert_eq!(rep_length(window, 1, 1, 8), 7);
        assert_eq!(rep_length(window, 0, 1, 8), 0);
    }
}
