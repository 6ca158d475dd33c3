//! Command statistics gathered while encoding, and the safe distance for in-place decoding.
//!
//! The safe distance answers: if the compressed stream is loaded at the end of the buffer the
//! data decompresses into, how many bytes past the end of the decompressed data must it reach
//! so the decoder never overwrites input it has not read yet. The decoder writes at `u`
//! (bytes produced) and reads at `c` (bytes consumed) plus where the stream was loaded. Both
//! only change in steps that end on a command boundary, so tracking the largest `u - c` seen
//! at those boundaries is enough.

/// Literal, offset and match length figures over a run of commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommandStats {
    /// Every command, including the final literal-only ones.
    pub commands: usize,
    pub min_literals: usize,
    pub max_literals: usize,
    pub total_literals: u64,
    /// Commands carrying a match.
    pub matches: usize,
    /// Matches that reused the previous offset (version 2).
    pub rep_matches: usize,
    pub min_offset: usize,
    pub max_offset: usize,
    pub total_offsets: u64,
    pub min_match_len: usize,
    pub max_match_len: usize,
    pub total_match_len: u64,
}

impl CommandStats {
    /// Count a command and its literal run.
    pub fn record_literals(&mut self, count: usize) {
        if self.commands == 0 {
            self.min_literals = count;
        }
        self.commands += 1;
        self.min_literals = self.min_literals.min(count);
        self.max_literals = self.max_literals.max(count);
        self.total_literals += count as u64;
    }

    /// Count the match part of the command recorded last.
    pub fn record_match(&mut self, offset: usize, length: usize, repeat: bool) {
        if self.matches == 0 {
            self.min_offset = offset;
            self.min_match_len = length;
        }
        self.matches += 1;
        if repeat {
            self.rep_matches += 1;
        }
        self.min_offset = self.min_offset.min(offset);
        self.max_offset = self.max_offset.max(offset);
        self.total_offsets += offset as u64;
        self.min_match_len = self.min_match_len.min(length);
        self.max_match_len = self.max_match_len.max(length);
        self.total_match_len += length as u64;
    }

    /// Fold the figures of another run of commands into these.
    pub fn merge(&mut self, other: &CommandStats) {
        if other.commands > 0 {
            if self.commands == 0 {
                self.min_literals = other.min_literals;
            }
            self.commands += other.commands;
            self.min_literals = self.min_literals.min(other.min_literals);
            self.max_literals = self.max_literals.max(other.max_literals);
            self.total_literals += other.total_literals;
        }
        if other.matches > 0 {
            if self.matches == 0 {
                self.min_offset = other.min_offset;
                self.min_match_len = other.min_match_len;
            }
            self.matches += other.matches;
            self.rep_matches += other.rep_matches;
            self.min_offset = self.min_offset.min(other.min_offset);
            self.max_offset = self.max_offset.max(other.max_offset);
            self.total_offsets += other.total_offsets;
            self.min_match_len = self.min_match_len.min(other.min_match_len);
            self.max_match_len = self.max_match_len.max(other.max_match_len);
            self.total_match_len += other.total_match_len;
        }
    }

    /// Average literal run per command, 0 without commands.
    pub fn avg_literals(&self) -> u64 {
        self.total_literals.checked_div(self.commands as u64).unwrap_or(0)
    }

    pub fn avg_offset(&self) -> u64 {
        self.total_offsets.checked_div(self.matches as u64).unwrap_or(0)
    }

    pub fn avg_match_len(&self) -> u64 {
        self.total_match_len.checked_div(self.matches as u64).unwrap_or(0)
    }
}

/// Running byte counts of a decoder walking a stream, for the safe distance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SafeDistance {
    produced: u64,
    consumed: u64,
    max_lead: u64,
}

impl SafeDistance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance both counters; the new position is a boundary the decoder stops at.
    pub fn advance(&mut self, produced: u64, consumed: u64) {
        self.produced += produced;
        self.consumed += consumed;
        self.note_boundary(0);
    }

    /// A boundary inside the coming block, `lead` bytes further ahead than the current one.
    pub fn note_boundary(&mut self, lead: i64) {
        let ahead = self.produced as i64 + lead - self.consumed as i64;
        if ahead > self.max_lead as i64 {
            self.max_lead = ahead as u64;
        }
    }

    /// Gap needed past the end of the decompressed data, given everything advanced so far.
    pub fn distance(&self) -> u64 {
        let final_lead = self.produced as i64 - self.consumed as i64;
        (self.max_lead as i64 - final_lead).max(0) as u64
    }
}
