//! Packed bit vector, one bit per cache block
//!
//! Bits are stored most-significant-bit first: bit 0 is `0x80` of byte 0,
//! bit 7 is `0x01` of byte 0, bit 8 is `0x80` of byte 1. The byte layout is
//! written verbatim into the bitmap file, so this order is part of the
//! on-disk format.
//!
//! Range operations split `[start, start + count)` into a partial leading
//! byte, a run of whole bytes, and a partial trailing byte. The partial bytes
//! are handled with the two mask tables below, the whole bytes in bulk.

use std::ops::Range;

/// Mask of the bits at and after position `i` within a byte
const LEFT_MASK: [u8; 8] = [0xFF, 0x7F, 0x3F, 0x1F, 0x0F, 0x07, 0x03, 0x01];

/// Mask of the bits at and before position `i` within a byte
const RIGHT_MASK: [u8; 8] = [0x80, 0xC0, 0xE0, 0xF0, 0xF8, 0xFC, 0xFE, 0xFF];

const fn build_popcount_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = (i as u8).count_ones() as u8;
        i += 1;
    }
    table
}

/// Number of set bits in each byte value
const BITS_IN_BYTE: [u8; 256] = build_popcount_table();

const fn one_bit(ix: usize) -> u8 {
    0x80 >> (ix & 7)
}

/// Byte-level decomposition of a non-empty bit range
struct Span {
    start_byte: usize,
    end_byte: usize,
    left: u8,
    right: u8,
}

impl Span {
    /// Decompose `[start, start + count)`, `count > 0`
    const fn new(start: usize, count: usize) -> Self {
        let end = start + count - 1;
        Self {
            start_byte: start >> 3,
            end_byte: end >> 3,
            left: LEFT_MASK[start & 7],
            right: RIGHT_MASK[end & 7],
        }
    }
}

/// A fixed-length packed array of bits
///
/// Out-of-range indices are a caller bug and panic like slice indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bits {
    bytes: Vec<u8>,
    len: usize,
}

impl Bits {
    /// Allocate `bit_count` cleared bits
    pub fn alloc(bit_count: usize) -> Self {
        Self {
            bytes: vec![0; Self::byte_len(bit_count)],
            len: bit_count,
        }
    }

    /// Number of bytes needed to hold `bit_count` bits
    pub const fn byte_len(bit_count: usize) -> usize {
        bit_count.div_ceil(8)
    }

    /// Rebuild a bit vector from its packed bytes
    ///
    /// Returns `None` if `bytes` is shorter than [`Bits::byte_len`]. Trailing
    /// bytes beyond that length are ignored.
    pub fn from_bytes(bytes: &[u8], bit_count: usize) -> Option<Self> {
        let needed = Self::byte_len(bit_count);
        if bytes.len() < needed {
            return None;
        }
        Some(Self {
            bytes: bytes[..needed].to_vec(),
            len: bit_count,
        })
    }

    /// Packed bytes, in on-disk order
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of bits
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True if the vector holds no bits
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Byte indices touched by the bit range `[start, end)`
    pub const fn byte_span(start: usize, end: usize) -> Range<usize> {
        if end <= start {
            return 0..0;
        }
        (start >> 3)..((end - 1) >> 3) + 1
    }

    /// Set bit `ix`
    pub fn set_one(&mut self, ix: usize) {
        self.bytes[ix >> 3] |= one_bit(ix);
    }

    /// Clear bit `ix`
    pub fn clear_one(&mut self, ix: usize) {
        self.bytes[ix >> 3] &= !one_bit(ix);
    }

    /// Read bit `ix`
    pub fn read_one(&self, ix: usize) -> bool {
        self.bytes[ix >> 3] & one_bit(ix) != 0
    }

    /// Set bits `[start, start + count)`
    pub fn set_range(&mut self, start: usize, count: usize) {
        if count == 0 {
            return;
        }
        let span = Span::new(start, count);
        if span.start_byte == span.end_byte {
            self.bytes[span.start_byte] |= span.left & span.right;
            return;
        }
        self.bytes[span.start_byte] |= span.left;
        self.bytes[span.start_byte + 1..span.end_byte].fill(0xFF);
        self.bytes[span.end_byte] |= span.right;
    }

    /// Clear bits `[start, start + count)`
    pub fn clear_range(&mut self, start: usize, count: usize) {
        if count == 0 {
            return;
        }
        let span = Span::new(start, count);
        if span.start_byte == span.end_byte {
            self.bytes[span.start_byte] &= !(span.left & span.right);
            return;
        }
        self.bytes[span.start_byte] &= !span.left;
        self.bytes[span.start_byte + 1..span.end_byte].fill(0);
        self.bytes[span.end_byte] &= !span.right;
    }

    /// Clear every bit
    pub fn clear_all(&mut self) {
        self.bytes.fill(0);
    }

    /// Count set bits in `[start, start + count)`
    pub fn count_range(&self, start: usize, count: usize) -> usize {
        if count == 0 {
            return 0;
        }
        let span = Span::new(start, count);
        let pop = |b: u8| usize::from(BITS_IN_BYTE[usize::from(b)]);
        if span.start_byte == span.end_byte {
            return pop(self.bytes[span.start_byte] & span.left & span.right);
        }
        pop(self.bytes[span.start_byte] & span.left)
            + self.bytes[span.start_byte + 1..span.end_byte]
                .iter()
                .map(|&b| pop(b))
                .sum::<usize>()
            + pop(self.bytes[span.end_byte] & span.right)
    }

    /// Index of the first bit at or after `start` whose value is `want_set`
    ///
    /// Only bits below `bit_count` are examined (and never past [`Bits::len`]).
    /// Returns `bit_count` if there is no such bit, including when
    /// `start >= bit_count`.
    pub fn find(&self, start: usize, want_set: bool, bit_count: usize) -> usize {
        let limit = bit_count.min(self.len);
        let mut ix = start;
        if ix >= limit {
            return bit_count;
        }

        while ix < limit && ix & 7 != 0 {
            if self.read_one(ix) == want_set {
                return ix;
            }
            ix += 1;
        }

        let skip = if want_set { 0x00 } else { 0xFF };
        while ix + 8 <= limit && self.bytes[ix >> 3] == skip {
            ix += 8;
        }

        while ix < limit {
            if self.read_one(ix) == want_set {
                return ix;
            }
            ix += 1;
        }

        bit_count
    }

    /// First set bit at or after `start`, or [`Bits::len`]
    pub fn find_set(&self, start: usize) -> usize {
        self.find(start, true, self.len)
    }

    /// First clear bit at or after `start`, or [`Bits::len`]
    pub fn find_clear(&self, start: usize) -> usize {
        self.find(start, false, self.len)
    }

    /// Maximal runs of bits equal to `want_set` inside `[start, end)`
    pub fn runs(&self, start: usize, end: usize, want_set: bool) -> Runs<'_> {
        Runs {
            bits: self,
            pos: start,
            end: end.min(self.len),
            want_set,
        }
    }
}

/// Iterator returned by [`Bits::runs`]
#[derive(Debug)]
pub struct Runs<'a> {
    bits: &'a Bits,
    pos: usize,
    end: usize,
    want_set: bool,
}

impl Iterator for Runs<'_> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.bits.find(self.pos, self.want_set, self.end);
        if start >= self.end {
            self.pos = self.end;
            return None;
        }
        let stop = self.bits.find(start, !self.want_set, self.end);
        self.pos = stop;
        Some(start..stop)
    }
}
