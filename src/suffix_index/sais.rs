// Simple SA-IS, using a virtual sentinel past the end of the data.
// Every buffer is owned by the caller and kept between builds.
use crate::error::{reserve, Error, Result};

const EMPTY: u32 = u32::MAX;

#[allow(clippy::upper_case_acronyms)]
/// L, S and LMS classification of every element, stored as bit vectors.
#[derive(Debug, Default)]
struct LMS {
    /// Bit oriented vec: a set bit marks an S type element, a clear bit an L type
    ls: Vec<u32>,
    /// Bit oriented vec: a set bit marks an LMS (leftmost S) element
    lms: Vec<u32>,
    /// Length of the classified data
    last: usize,
    /// Count of LMS type elements
    lms_count: usize,
}

impl LMS {
    #[cfg(test)]
    fn new<T: Copy + Ord>(data: &[T]) -> Self {
        let mut lms = Self::default();
        lms.classify(data).unwrap();
        lms
    }

    /// Classify every element of data. The virtual sentinel after the last element is smaller
    /// than everything, so the last element is always L type.
    fn classify<T: Copy + Ord>(&mut self, data: &[T]) -> Result<()> {
        let words = data.len() / 32 + 1;
        reserve(&mut self.ls, words, "S type bits")?;
        reserve(&mut self.lms, words, "LMS bits")?;
        self.ls.resize(words, 0);
        self.lms.resize(words, 0);
        self.last = data.len();
        self.lms_count = 0;
        if data.is_empty() {
            return Ok(());
        }

        // Iterate backwards. Equal neighbours inherit the type of the element to their right.
        let mut current_is_s = false;
        for idx in (0..data.len() - 1).rev() {
            match data[idx].cmp(&data[idx + 1]) {
                std::cmp::Ordering::Less => current_is_s = true,
                std::cmp::Ordering::Greater => {
                    // An L after a run of S makes the S to its right an LMS element
                    if current_is_s {
                        self.lms[(idx + 1) >> 5] |= 1 << ((idx + 1) % 32);
                        self.lms_count += 1;
                    }
                    current_is_s = false;
                }
                std::cmp::Ordering::Equal => {}
            }
            if current_is_s {
                self.ls[idx >> 5] |= 1 << (idx % 32);
            }
        }
        Ok(())
    }

    /// data element at idx is an S type
    fn is_s(&self, idx: usize) -> bool {
        self.ls[idx >> 5] & (1 << (idx % 32)) != 0
    }

    /// data element at idx is an L type
    fn is_l(&self, idx: usize) -> bool {
        !self.is_s(idx)
    }

    /// data element at idx is an LMS element
    fn is_lms(&self, idx: usize) -> bool {
        idx < self.last && self.lms[idx >> 5] & (1 << (idx % 32)) != 0
    }

    /// Test if the LMS substrings starting at a and b are equal. Assumes a and b are LMS elements.
    fn equal_substrings<T: Copy + Ord>(&self, data: &[T], a: usize, b: usize) -> bool {
        let mut d = 0;
        loop {
            // The sentinel is unique, so reaching it means the substrings differ
            if a + d == self.last || b + d == self.last {
                return false;
            }
            if data[a + d] != data[b + d] || self.is_s(a + d) != self.is_s(b + d) {
                return false;
            }
            if d > 0 && (self.is_lms(a + d) || self.is_lms(b + d)) {
                return self.is_lms(a + d) && self.is_lms(b + d);
            }
            d += 1;
        }
    }
}

//-- Counts for Bucket Sorting --------------------------------------------------------------------------------

/// Frequency count of elements in the input. Size is the alphabet size.
fn bucket_sizes(data: &[u32], size: usize, freqs: &mut Vec<u32>) -> Result<()> {
    reserve(freqs, size, "bucket sizes")?;
    freqs.resize(size, 0);
    data.iter().for_each(|&el| freqs[el as usize] += 1);
    Ok(())
}

/// Index to the first slot of every bucket.
fn bucket_heads(buckets: &[u32], heads: &mut Vec<u32>) -> Result<()> {
    reserve(heads, buckets.len(), "bucket heads")?;
    heads.extend(buckets.iter().scan(0_u32, |idx, &count| {
        let head = *idx;
        *idx += count;
        Some(head)
    }));
    Ok(())
}

/// Index one past the last slot of every bucket.
fn bucket_tails(buckets: &[u32], tails: &mut Vec<u32>) -> Result<()> {
    reserve(tails, buckets.len(), "bucket tails")?;
    tails.extend(buckets.iter().scan(0_u32, |idx, &count| {
        *idx += count;
        Some(*idx)
    }));
    Ok(())
}

//-- Bucket Sorting --------------------------------------------------------------------------------------------

/// Induce L type suffixes from the suffixes already placed.
fn induced_sort_l(data: &[u32], sa: &mut [u32], heads: &mut [u32], lms: &LMS) {
    // The sentinel sorts first and the element before it is always L type.
    let last = data.len() - 1;
    sa[heads[data[last] as usize] as usize] = last as u32;
    heads[data[last] as usize] += 1;

    for idx in 0..sa.len() {
        let pos = sa[idx];
        if pos == EMPTY || pos == 0 {
            continue;
        }
        let prev = pos as usize - 1;
        if lms.is_l(prev) {
            let bucket = data[prev] as usize;
            sa[heads[bucket] as usize] = prev as u32;
            heads[bucket] += 1;
        }
    }
}

/// Induce S type suffixes, scanning from the right.
fn induced_sort_s(data: &[u32], sa: &mut [u32], tails: &mut [u32], lms: &LMS) {
    for idx in (0..sa.len()).rev() {
        let pos = sa[idx];
        if pos == EMPTY || pos == 0 {
            continue;
        }
        let prev = pos as usize - 1;
        if lms.is_s(prev) {
            let bucket = data[prev] as usize;
            tails[bucket] -= 1;
            sa[tails[bucket] as usize] = prev as u32;
        }
    }
}

/// Working memory of one recursion level.
#[derive(Debug, Default)]
struct Level {
    lms: LMS,
    bkt_sizes: Vec<u32>,
    /// Bucket heads or tails, whichever the current pass moves
    cursors: Vec<u32>,
    /// LMS positions in text order
    positions: Vec<u32>,
    /// LMS substring names, indexed by position
    names: Vec<u32>,
    /// Names of the LMS substrings in text order
    summary: Vec<u32>,
    /// Suffix array of the summary, then the LMS positions in sorted order
    sorted: Vec<u32>,
}

impl Level {
    /// Suffix array of data, whose elements are all smaller than alphabet_size, into sa.
    fn sort(
        &mut self,
        data: &[u32],
        alphabet_size: usize,
        sa: &mut [u32],
        levels: &mut Vec<Level>,
        depth: usize,
    ) -> Result<()> {
        // STEP 1: Build LMS info
        self.lms.classify(data)?;

        // STEP 2: Calculate buckets for bucket sorting
        bucket_sizes(data, alphabet_size, &mut self.bkt_sizes)?;

        // STEP 3: Place the LMS elements at the tails of their buckets, then induce
        sa.fill(EMPTY);
        bucket_tails(&self.bkt_sizes, &mut self.cursors)?;
        for idx in (1..data.len()).rev() {
            if self.lms.is_lms(idx) {
                let bucket = data[idx] as usize;
                self.cursors[bucket] -= 1;
                sa[self.cursors[bucket] as usize] = idx as u32;
            }
        }
        self.induce(data, sa)?;

        // STEP 4: Name the LMS substrings, now sorted, and sort the LMS suffixes
        self.sort_lms_suffixes(data, sa, levels, depth)?;

        // STEP 5: Final bucket sort from the correctly ordered LMS suffixes
        sa.fill(EMPTY);
        bucket_tails(&self.bkt_sizes, &mut self.cursors)?;
        for &pos in self.sorted.iter().rev() {
            let bucket = data[pos as usize] as usize;
            self.cursors[bucket] -= 1;
            sa[self.cursors[bucket] as usize] = pos;
        }
        self.induce(data, sa)
    }

    fn induce(&mut self, data: &[u32], sa: &mut [u32]) -> Result<()> {
        bucket_heads(&self.bkt_sizes, &mut self.cursors)?;
        induced_sort_l(data, sa, &mut self.cursors, &self.lms);
        bucket_tails(&self.bkt_sizes, &mut self.cursors)?;
        induced_sort_s(data, sa, &mut self.cursors, &self.lms);
        Ok(())
    }

    /// Name the LMS substrings in sorted order and leave the LMS suffixes fully sorted in
    /// `self.sorted`, recursing when two LMS substrings share a name.
    fn sort_lms_suffixes(
        &mut self,
        data: &[u32],
        sa: &[u32],
        levels: &mut Vec<Level>,
        depth: usize,
    ) -> Result<()> {
        let count = self.lms.lms_count;
        reserve(&mut self.sorted, count, "sorted LMS suffixes")?;
        if count == 0 {
            return Ok(());
        }
        let lms = &self.lms;

        // LMS positions in text order
        reserve(&mut self.positions, count, "LMS positions")?;
        self.positions.extend(
            (1..data.len())
                .filter(|&idx| lms.is_lms(idx))
                .map(|idx| idx as u32),
        );

        // Names indexed by position, assigned in sorted order
        reserve(&mut self.names, data.len(), "LMS names")?;
        self.names.resize(data.len(), EMPTY);
        let mut current_name = 0_u32;
        let mut prev: Option<usize> = None;
        for &pos in sa.iter() {
            let pos = pos as usize;
            if !lms.is_lms(pos) {
                continue;
            }
            if let Some(p) = prev {
                if !lms.equal_substrings(data, p, pos) {
                    current_name += 1;
                }
            }
            self.names[pos] = current_name;
            prev = Some(pos);
        }
        let name_count = current_name as usize + 1;

        // Summary string of names, in text order
        reserve(&mut self.summary, count, "LMS summary")?;
        let names = &self.names;
        self.summary
            .extend(self.positions.iter().map(|&pos| names[pos as usize]));

        self.sorted.resize(count, 0);
        if name_count == count {
            // Every LMS substring is unique, the names are the ranks
            for (idx, &name) in self.summary.iter().enumerate() {
                self.sorted[name as usize] = self.positions[idx];
            }
        } else {
            // Recurse until there are no more duplicate LMS names
            sa_is(&self.summary, name_count, &mut self.sorted, levels, depth + 1)?;
            let positions = &self.positions;
            self.sorted
                .iter_mut()
                .for_each(|idx| *idx = positions[*idx as usize]);
        }
        Ok(())
    }
}

/// Suffix array of data, whose elements are all smaller than alphabet_size, into sa.
/// The level at `depth` and every deeper one are scratch space.
fn sa_is(
    data: &[u32],
    alphabet_size: usize,
    sa: &mut [u32],
    levels: &mut Vec<Level>,
    depth: usize,
) -> Result<()> {
    match data.len() {
        0 => return Ok(()),
        1 => {
            sa[0] = 0;
            return Ok(());
        }
        _ => {}
    }
    if levels.len() <= depth {
        levels
            .try_reserve(1)
            .map_err(|e| Error::Memory(format!("suffix sort level {}: {}", depth, e)))?;
        levels.push(Level::default());
    }
    // Deeper levels borrow the stack while this one works
    let mut level = std::mem::take(&mut levels[depth]);
    let sorted = level.sort(data, alphabet_size, sa, levels, depth);
    levels[depth] = level;
    sorted
}

/// Scratch space for building suffix arrays, reused from one build to the next.
#[derive(Debug, Default)]
pub struct SaisBuffers {
    /// The input widened to the alphabet type of the recursion
    text: Vec<u32>,
    levels: Vec<Level>,
}

impl SaisBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the top level for inputs of up to `len` bytes. Deeper levels are at most half
    /// as long and are reserved the first time they are needed.
    pub fn reserve(&mut self, len: usize) -> Result<()> {
        reserve(&mut self.text, len, "suffix sort text")?;
        if self.levels.is_empty() {
            self.levels
                .try_reserve(1)
                .map_err(|e| Error::Memory(format!("suffix sort level 0: {}", e)))?;
            self.levels.push(Level::default());
        }
        let top = &mut self.levels[0];
        reserve(&mut top.bkt_sizes, 256, "bucket sizes")?;
        reserve(&mut top.cursors, 256, "bucket heads")?;
        reserve(&mut top.names, len, "LMS names")?;
        reserve(&mut top.positions, len / 2 + 1, "LMS positions")?;
        reserve(&mut top.summary, len / 2 + 1, "LMS summary")?;
        reserve(&mut top.sorted, len / 2 + 1, "sorted LMS suffixes")?;
        Ok(())
    }

    /// Bytes of scratch space currently held.
    pub fn capacity(&self) -> usize {
        let words: usize = self
            .levels
            .iter()
            .map(|level| {
                level.lms.ls.capacity()
                    + level.lms.lms.capacity()
                    + level.bkt_sizes.capacity()
                    + level.cursors.capacity()
                    + level.positions.capacity()
                    + level.names.capacity()
                    + level.summary.capacity()
                    + level.sorted.capacity()
            })
            .sum();
        (self.text.capacity() + words) * std::mem::size_of::<u32>()
    }
}

/// Build the suffix array of a byte string into `sa`: the start positions of all its suffixes
/// in lexicographic order. A suffix that is a prefix of another sorts first.
pub fn suffix_array_into(data: &[u8], sa: &mut Vec<u32>, buffers: &mut SaisBuffers) -> Result<()> {
    reserve(sa, data.len(), "suffix array")?;
    sa.resize(data.len(), EMPTY);
    reserve(&mut buffers.text, data.len(), "suffix sort text")?;
    buffers.text.extend(data.iter().map(|&b| b as u32));
    let SaisBuffers { text, levels } = buffers;
    sa_is(text, 256, sa, levels, 0)
}

/// Suffix array of a byte string in a fresh buffer.
pub fn suffix_array(data: &[u8]) -> Result<Vec<u32>> {
    let mut sa = Vec::new();
    suffix_array_into(data, &mut sa, &mut SaisBuffers::new())?;
    Ok(sa)
}


#[cfg(test)]
mod test_bucket_prep {
    use super::*;
    #[test]
    pub fn freq_count_test() {
        let data = [2, 0, 1, 1, 0, 6, 4];
        let mut frq = vec![9; 3];
        bucket_sizes(&data, 7, &mut frq).unwrap();
        assert_eq!(frq, vec![2, 2, 1, 0, 1, 0, 1]);
    }
    #[test]
    pub fn freq_head_test() {
        let mut freq = Vec::new();
        bucket_sizes(&[2, 0, 1, 1, 0, 6, 4], 7, &mut freq).unwrap();
        let mut heads = Vec::new();
        bucket_heads(&freq, &mut heads).unwrap();
        assert_eq!(heads, vec![0, 2, 4, 5, 5, 6, 6]);
    }
    #[test]
    pub fn freq_tail_test() {
        let mut freq = Vec::new();
        bucket_sizes(&[2, 0, 1, 1, 0, 6, 4], 7, &mut freq).unwrap();
        let mut tails = vec![1, 2, 3];
        bucket_tails(&freq, &mut tails).unwrap();
        assert_eq!(tails, vec![2, 4, 5, 5, 6, 6, 7]);
    }
}
