//! Contiguous byte ranges and gap detection over ordered extent lists

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A contiguous run of bytes (or blocks) `[offset, offset + size)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Extent {
    /// First byte of the run
    pub offset: u64,
    /// Length of the run
    pub size: u64,
}

impl Extent {
    /// Create a new extent
    pub const fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Extent covering `[start, end)`; empty if `end <= start`
    pub const fn from_range(start: u64, end: u64) -> Self {
        Self {
            offset: start,
            size: end.saturating_sub(start),
        }
    }

    /// One past the last byte
    pub const fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// True if the extent covers no bytes
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The extent as a half-open range
    pub const fn range(&self) -> Range<u64> {
        self.offset..self.end()
    }

    /// True if `other` lies entirely inside `self`
    pub const fn contains(&self, other: &Self) -> bool {
        other.offset >= self.offset && other.end() <= self.end()
    }
}

/// Locate the first discontinuity in an offset-ordered extent list
///
/// Walks forward while each extent starts exactly where the previous one
/// ends. Returns the index of the last extent before the gap together with
/// the index of the first extent after it, or `(last, None)` when the whole
/// list is contiguous. An empty list has no gap and no extents: `None`.
pub fn find_gap(extents: &[Extent]) -> Option<(usize, Option<usize>)> {
    if extents.is_empty() {
        return None;
    }
    for (ix, pair) in extents.windows(2).enumerate() {
        if pair[1].offset != pair[0].end() {
            return Some((ix, Some(ix + 1)));
        }
    }
    Some((extents.len() - 1, None))
}

/// Merge touching and overlapping extents
///
/// The input may be in any order. Empty extents are dropped. The result is
/// sorted by offset with no two extents touching.
pub fn coalesce(extents: &[Extent]) -> Vec<Extent> {
    let mut sorted: Vec<Extent> = extents.iter().copied().filter(|e| !e.is_empty()).collect();
    sorted.sort_unstable();

    // Overlaps are folded first so that only exact adjacency and true gaps
    // remain for the gap finder.
    let mut disjoint: Vec<Extent> = Vec::with_capacity(sorted.len());
    for extent in sorted {
        match disjoint.last_mut() {
            Some(last) if extent.offset < last.end() => {
                let end = last.end().max(extent.end());
                last.size = end - last.offset;
            }
            _ => disjoint.push(extent),
        }
    }

    let mut merged = Vec::new();
    let mut rest = disjoint.as_slice();
    while let Some((before, after)) = find_gap(rest) {
        let first = rest[0];
        merged.push(Extent::from_range(first.offset, rest[before].end()));
        match after {
            Some(next) => rest = &rest[next..],
            None => break,
        }
    }
    merged
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ext(offset: u64, size: u64) -> Extent {
        Extent::new(offset, size)
    }

    #[test]
    fn test_find_gap_empty() {
        assert_eq!(find_gap(&[]), None);
    }

    #[test]
    fn test_find_gap_contiguous() {
        let list = [ext(0, 10), ext(10, 5), ext(15, 1)];
        assert_eq!(find_gap(&list), Some((2, None)));
        assert_eq!(find_gap(&list[..1]), Some((0, None)));
    }

    #[test]
    fn test_find_gap_first_discontinuity() {
        let list = [ext(0, 10), ext(10, 5), ext(20, 5), ext(30, 1)];
        assert_eq!(find_gap(&list), Some((1, Some(2))));
    }

    #[test]
    fn test_find_gap_overlap_is_a_gap() {
        let list = [ext(0, 10), ext(5, 10)];
        assert_eq!(find_gap(&list), Some((0, Some(1))));
    }

    #[test]
    fn test_coalesce() {
        let list = [
            ext(100, 10),
            ext(0, 10),
            ext(10, 10),
            ext(105, 20),
            ext(50, 0),
            ext(200, 1),
        ];
        assert_eq!(
            coalesce(&list),
            vec![ext(0, 20), ext(100, 25), ext(200, 1)]
        );
    }

    #[test]
    fn test_coalesce_nested() {
        let list = [ext(0, 100), ext(10, 5), ext(100, 1)];
        assert_eq!(coalesce(&list), vec![ext(0, 101)]);
        assert!(coalesce(&[]).is_empty());
    }

    #[test]
    fn test_extent_helpers() {
        let e = Extent::from_range(10, 30);
        assert_eq!(e, ext(10, 20));
        assert_eq!(e.end(), 30);
        assert_eq!(e.range(), 10..30);
        assert!(e.contains(&ext(15, 15)));
        assert!(!e.contains(&ext(15, 16)));
        assert!(Extent::from_range(30, 10).is_empty());
    }
}
