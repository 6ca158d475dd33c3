//! The suffix_index module finds the candidate matches of a window.
//!
//! The window (history followed by the block) is indexed once per block: an SA-IS suffix array,
//! its LCP array and the lcp-interval tree over them. The match finder then walks the tree
//! position by position and reports, for each position, up to
//! [`NMATCHES_PER_OFFSET`](crate::compression::format::NMATCHES_PER_OFFSET) earlier
//! occurrences of the bytes that follow it.
//!
pub mod intervals;
pub mod match_finder;
pub mod sais;

pub use intervals::SuffixIndex;
pub use match_finder::{Match, MatchFinder, MatchSlots};
