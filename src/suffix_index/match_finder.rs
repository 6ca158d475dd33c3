//! Match finder: walks the lcp-interval tree one position at a time.
//!
//! Positions must be advanced in increasing order, starting at 0, and every position must be
//! advanced exactly once (either with [`MatchFinder::skip`] or
//! [`MatchFinder::find_matches_at`]), because each step links the intervals it passes through to
//! the current position. The matches found at a position come out in strictly decreasing
//! length and strictly decreasing offset order.

use log::debug;

use super::intervals::{IntervalLink, SuffixIndex, ROOT};
use crate::compression::format::{MAX_OFFSET, NMATCHES_PER_OFFSET};
use crate::error::{reserve, Result};

/// A candidate back-reference. A zero length marks an empty slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Match {
    pub length: usize,
    pub offset: usize,
}

impl Match {
    pub fn new(length: usize, offset: usize) -> Self {
        Self { length, offset }
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Candidate slots of one position.
pub type MatchSlots = [Match; NMATCHES_PER_OFFSET];

#[derive(Debug, Default)]
pub struct MatchFinder {
    index: SuffixIndex,
}

impl MatchFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the index buffers for windows of up to `window_size` bytes.
    pub fn reserve(&mut self, window_size: usize) -> Result<()> {
        self.index.reserve(window_size)
    }

    /// Index a new window. Any walk in progress is abandoned.
    pub fn build(&mut self, window: &[u8], min_match: usize) -> Result<()> {
        self.index.build(window, min_match)
    }

    /// Advance past `pos` without recording matches (history bytes).
    pub fn skip(&mut self, pos: usize) {
        self.advance(pos, None);
    }

    /// Advance past `pos` and write its candidate matches to `out`, returning how many were
    /// found. Matches reaching further back than [`MAX_OFFSET`] are not reported.
    pub fn find_matches_at(&mut self, pos: usize, out: &mut MatchSlots) -> usize {
        out.iter_mut().for_each(|m| *m = Match::default());
        self.advance(pos, Some(out))
    }

    /// Walk the whole window: skip the history, then collect the candidates of every position
    /// in `start..end` into `table` (one entry per position, starting at `start`).
    pub fn find_all_matches(
        &mut self,
        start: usize,
        end: usize,
        table: &mut Vec<MatchSlots>,
    ) -> Result<()> {
        reserve(table, end - start, "match table")?;
        for pos in 0..start {
            self.skip(pos);
        }
        let mut found = 0;
        for pos in start..end {
            let mut slots = MatchSlots::default();
            found += self.find_matches_at(pos, &mut slots);
            table.push(slots);
        }
        debug!(
            "Found {} candidate matches for {} positions ({} history)",
            found,
            end - start,
            start
        );
        Ok(())
    }

    fn advance(&mut self, pos: usize, mut out: Option<&mut MatchSlots>) -> usize {
        let intervals = &mut self.index.intervals;
        let pos_data = &mut self.index.pos_data;
        if pos >= pos_data.len() {
            return 0;
        }
        let here = pos as u32;

        // Deepest interval containing this suffix. Nothing lies deeper than it from now on.
        let mut current = pos_data[pos];
        pos_data[pos] = ROOT;

        // Climb while the intervals are unvisited, stopping at the root or a child of the root
        let mut match_pos = loop {
            match intervals[current.index as usize] {
                IntervalLink::Parent(parent) if parent.lcp != 0 => {
                    intervals[current.index as usize] = IntervalLink::VisitedBy(here);
                    current = parent;
                }
                IntervalLink::Parent(_) => {
                    if current != ROOT {
                        intervals[current.index as usize] = IntervalLink::VisitedBy(here);
                    }
                    return 0;
                }
                IntervalLink::VisitedBy(visitor) => break visitor as usize,
            }
        };

        // Climb the rest of the way through the positions that visited each interval last
        let mut count = 0;
        loop {
            let mut deeper = pos_data[match_pos];
            while deeper > current {
                match intervals[deeper.index as usize] {
                    IntervalLink::VisitedBy(visitor) => match_pos = visitor as usize,
                    IntervalLink::Parent(_) => return count,
                }
                deeper = pos_data[match_pos];
            }
            intervals[current.index as usize] = IntervalLink::VisitedBy(here);
            pos_data[match_pos] = current;

            if let Some(slots) = out.as_deref_mut() {
                let offset = pos - match_pos;
                if count < slots.len() && offset <= MAX_OFFSET {
                    slots[count] = Match::new(current.lcp as usize, offset);
                    count += 1;
                }
            }

            if deeper == ROOT {
                break;
            }
            current = deeper;
            match intervals[current.index as usize] {
                IntervalLink::VisitedBy(visitor) => match_pos = visitor as usize,
                IntervalLink::Parent(_) => break,
            }
        }
        count
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn all_matches(data: &[u8], min_match: usize) -> Vec<MatchSlots> {
        let mut mf = MatchFinder::new();
        mf.build(data, min_match).unwrap();
        let mut table = Vec::new();
        mf.find_all_matches(0, data.len(), &mut table).unwrap();
        table
    }

    /// Longest earlier occurrence of the suffix at `pos`, capped at `cap`, as (length, offset).
    fn longest_naive(data: &[u8], pos: usize, cap: usize) -> (usize, usize) {
        let mut best = (0, 0);
        for src in (0..pos).rev() {
            let len = data[src..]
                .iter()
                .zip(&data[pos..])
                .take(cap)
                .take_while(|(a, b)| a == b)
                .count();
            if len > best.0 {
                best = (len, pos - src);
            }
        }
        best
    }

    #[test]
    fn abab_has_one_long_match() {
        let table = all_matches(b"ABABABABAB", 2);
        assert!(table[0][0].is_empty());
        assert!(table[1][0].is_empty());
        assert_eq!(table[2][0], Match::new(8, 2));
        assert!(table[2][1].is_empty());
        assert_eq!(table[3][0], Match::new(7, 2));
    }

    #[test]
    fn position_zero_is_a_source() {
        // The only earlier copy of "xyz" starts at 0
        let table = all_matches(b"xyzQxyz", 3);
        assert_eq!(table[4][0], Match::new(3, 4));
    }

    #[test]
    fn ordering_and_longest() {
        let data = b"abcabdabcabcabdabcaaabcabd";
        let table = all_matches(data, 2);
        for (pos, slots) in table.iter().enumerate() {
            let found: Vec<Match> = slots.iter().copied().filter(|m| !m.is_empty()).collect();
            for pair in found.windows(2) {
                assert!(pair[0].length > pair[1].length);
                assert!(pair[0].offset > pair[1].offset);
            }
            for m in &found {
                assert!(m.length >= 2 && m.offset >= 1 && m.offset <= pos);
                assert_eq!(
                    data[pos - m.offset..pos - m.offset + m.length],
                    data[pos..pos + m.length]
                );
            }
            let (len, _) = longest_naive(data, pos, usize::MAX);
            let best = found.first().map(|m| m.length).unwrap_or(0);
            if len >= 2 {
                assert_eq!(best, len, "position {}", pos);
            } else {
                assert_eq!(best, 0);
            }
        }
    }

    #[test]
    fn history_is_skipped() {
        let data = b"hello world, hello world";
        let mut mf = MatchFinder::new();
        mf.build(data, 3).unwrap();
        let mut table = Vec::new();
        mf.find_all_matches(13, data.len(), &mut table).unwrap();
        assert_eq!(table.len(), 11);
        assert_eq!(table[0][0], Match::new(11, 13));
    }
}
