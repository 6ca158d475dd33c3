//! Suffix index of a window: suffix array, LCP array and the lcp-interval tree built from them.
//!
//! An lcp-interval is a maximal range of the suffix array whose suffixes share a prefix of
//! `lcp` bytes. Intervals nest, every interval but the root has a parent with a smaller lcp.
//! The tree is kept in two arrays:
//!
//! * `intervals[i]` links interval `i` to its parent. Once a suffix has visited the interval
//!   the link is replaced by the position of that suffix.
//! * `pos_data[p]` is the deepest interval containing the suffix that starts at `p`.
//!
//! Interval 0 is the root and is never marked as visited.

use log::trace;

use super::sais::{suffix_array_into, SaisBuffers};
use crate::compression::format::LCP_MAX;
use crate::error::{reserve, Result};

/// Reference to an interval. Ordered by lcp first, so a deeper interval compares greater.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntervalRef {
    pub lcp: u32,
    pub index: u32,
}

/// The root interval, lcp 0. Also stands for "nothing deeper" in `pos_data`.
pub const ROOT: IntervalRef = IntervalRef { lcp: 0, index: 0 };

/// Link stored for every interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntervalLink {
    /// Not yet visited, points at the enclosing interval.
    Parent(IntervalRef),
    /// Last suffix position that passed through this interval.
    VisitedBy(u32),
}

const NO_PREDECESSOR: u32 = u32::MAX;

/// Suffix index of one window. Buffers are kept between builds.
#[derive(Debug, Default)]
pub struct SuffixIndex {
    pub(crate) intervals: Vec<IntervalLink>,
    pub(crate) pos_data: Vec<IntervalRef>,
    sa: Vec<u32>,
    plcp: Vec<u32>,
    lcp: Vec<u32>,
    /// Intervals still open while the tree is built
    open: Vec<IntervalRef>,
    sais: SaisBuffers,
}

impl SuffixIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve every buffer for windows of up to `window_size` bytes.
    pub fn reserve(&mut self, window_size: usize) -> Result<()> {
        reserve(&mut self.sa, window_size, "suffix array")?;
        reserve(&mut self.plcp, window_size, "permuted lcp")?;
        reserve(&mut self.lcp, window_size, "lcp array")?;
        reserve(&mut self.intervals, window_size + 1, "interval links")?;
        reserve(&mut self.pos_data, window_size, "suffix positions")?;
        reserve(&mut self.open, window_size + 1, "open intervals")?;
        self.sais.reserve(window_size)
    }

    /// Bytes held by the working buffers, whether in use or not.
    pub fn capacity(&self) -> usize {
        use std::mem::size_of;
        (self.sa.capacity() + self.plcp.capacity() + self.lcp.capacity()) * size_of::<u32>()
            + self.intervals.capacity() * size_of::<IntervalLink>()
            + (self.pos_data.capacity() + self.open.capacity()) * size_of::<IntervalRef>()
            + self.sais.capacity()
    }

    /// Number of window positions indexed by the last build.
    pub fn len(&self) -> usize {
        self.pos_data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pos_data.is_empty()
    }

    /// Index `window`. Common prefixes shorter than `min_match` are ignored and longer ones are
    /// capped at [`LCP_MAX`].
    pub fn build(&mut self, window: &[u8], min_match: usize) -> Result<()> {
        self.reserve(window.len())?;
        suffix_array_into(window, &mut self.sa, &mut self.sais)?;
        lcp_array(window, &self.sa, min_match, &mut self.plcp, &mut self.lcp)?;
        self.build_tree();
        trace!(
            "\r\x1b[43mSuffix index: {} positions, {} intervals    \x1b[0m",
            window.len(),
            self.intervals.len()
        );
        Ok(())
    }

    /// Create a new interval with the given lcp and put it on the open stack.
    fn open_interval(&mut self, lcp: u32) -> IntervalRef {
        let interval = IntervalRef {
            lcp,
            index: self.intervals.len() as u32,
        };
        // The parent link is filled in when the interval closes
        self.intervals.push(IntervalLink::Parent(ROOT));
        self.open.push(interval);
        interval
    }

    /// Single pass over the suffix array, opening and closing intervals as the lcp rises and
    /// falls.
    fn build_tree(&mut self) {
        let n = self.sa.len();
        self.intervals.clear();
        self.intervals.push(IntervalLink::Parent(ROOT));
        self.pos_data.clear();
        self.pos_data.resize(n, ROOT);
        self.open.clear();
        if n == 0 {
            return;
        }

        let top = |open: &[IntervalRef]| open.last().copied().unwrap_or(ROOT);
        self.open.push(ROOT);
        let mut prev_pos = self.sa[0] as usize;

        for r in 1..n {
            let next_pos = self.sa[r] as usize;
            let next_lcp = self.lcp[r];
            let deepest = top(&self.open);

            if next_lcp == deepest.lcp {
                // Continuing the deepest open interval
                self.pos_data[prev_pos] = deepest;
            } else if next_lcp > deepest.lcp {
                // Opening a new interval
                self.pos_data[prev_pos] = self.open_interval(next_lcp);
            } else {
                // Closing the deepest open interval, and maybe some of its parents
                self.pos_data[prev_pos] = deepest;
                loop {
                    let closed = self.open.pop().unwrap_or(ROOT);
                    let parent = top(&self.open);
                    if next_lcp == parent.lcp {
                        self.intervals[closed.index as usize] = IntervalLink::Parent(parent);
                        break;
                    } else if next_lcp > parent.lcp {
                        // The new interval sits between the closed one and its old parent
                        let interval = self.open_interval(next_lcp);
                        self.intervals[closed.index as usize] = IntervalLink::Parent(interval);
                        break;
                    } else {
                        self.intervals[closed.index as usize] = IntervalLink::Parent(parent);
                    }
                }
            }
            prev_pos = next_pos;
        }

        // Close whatever is still open
        self.pos_data[prev_pos] = top(&self.open);
        while self.open.len() > 1 {
            let closed = self.open.pop().unwrap_or(ROOT);
            self.intervals[closed.index as usize] = IntervalLink::Parent(top(&self.open));
        }
    }
}

/// LCP array of `data` in suffix array order, by way of the permuted LCP (Kärkkäinen's phi
/// method). `lcp[r]` is the common prefix of the suffixes at ranks `r - 1` and `r`; `lcp[0]`
/// is 0. Values below `min_match` become 0, values above [`LCP_MAX`] are capped. `plcp` is
/// scratch space.
pub fn lcp_array(
    data: &[u8],
    sa: &[u32],
    min_match: usize,
    plcp: &mut Vec<u32>,
    lcp: &mut Vec<u32>,
) -> Result<()> {
    let n = sa.len();
    reserve(plcp, n, "permuted lcp")?;
    plcp.resize(n, NO_PREDECESSOR);
    for r in 1..n {
        plcp[sa[r] as usize] = sa[r - 1];
    }

    // Each slot holds phi until it is overwritten with the permuted lcp at the same position
    let mut h = 0_usize;
    for i in 0..n {
        let j = plcp[i];
        if j == NO_PREDECESSOR {
            plcp[i] = 0;
            h = 0;
            continue;
        }
        let j = j as usize;
        while i + h < n && j + h < n && data[i + h] == data[j + h] {
            h += 1;
        }
        plcp[i] = h as u32;
        h = h.saturating_sub(1);
    }

    reserve(lcp, n, "lcp array")?;
    lcp.extend(sa.iter().map(|&pos| {
        let len = plcp[pos as usize] as usize;
        if len < min_match {
            0
        } else {
            len.min(LCP_MAX) as u32
        }
    }));
    Ok(())
}
