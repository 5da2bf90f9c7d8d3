//! Bitmap file header codec
//!
//! The bitmap file starts with a fixed 40-byte header followed by the packed
//! block bits. All integers are little-endian.
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x00   | 4    | Magic `RCBM` |
//! | 0x04   | 4    | Format version (1) |
//! | 0x08   | 8    | Block size in bytes |
//! | 0x10   | 8    | Remote modification time, Unix seconds (signed) |
//! | 0x18   | 8    | Remote size in bytes |
//! | 0x20   | 8    | Local data file size in bytes |
//! | 0x28   | n    | Block bits, `ceil(ceil(remote_size / block_size) / 8)` bytes |

use rangecache_origin::OriginStat;
use thiserror::Error;

use crate::bits::Bits;

/// Size of the fixed header in bytes
pub const HEADER_LEN: usize = 0x28;

/// Magic bytes at the start of every bitmap file
pub const BITMAP_MAGIC: [u8; 4] = *b"RCBM";

/// Current header format version
pub const BITMAP_VERSION: u32 = 1;

/// Reasons a bitmap file cannot be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// Fewer bytes than the fixed header
    #[error("header truncated: {0} bytes")]
    Truncated(usize),

    /// Magic bytes do not match
    #[error("bad magic {0:02x?}")]
    BadMagic([u8; 4]),

    /// Written by an incompatible format version
    #[error("unsupported version {0}")]
    UnsupportedVersion(u32),

    /// Block size of zero
    #[error("zero block size")]
    ZeroBlockSize,

    /// Block count does not fit in memory on this platform
    #[error("{0} blocks do not fit in memory")]
    TooManyBlocks(u64),

    /// Bit vector shorter than the remote size requires
    #[error("bit vector truncated: expected {expected} bytes, found {actual}")]
    BitsTruncated {
        /// Bytes required for the block count
        expected: usize,
        /// Bytes present after the header
        actual: usize,
    },
}

/// Fixed-size part of the bitmap file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapHeader {
    /// Cache block size
    pub block_size: u64,
    /// Remote modification time, Unix seconds, 0 if unknown
    pub modified: i64,
    /// Remote size in bytes
    pub remote_size: u64,
    /// Size the local data file was created with
    pub local_size: u64,
}

impl BitmapHeader {
    /// Header for a fresh entry mirroring `stat`
    pub const fn new(block_size: u64, stat: OriginStat) -> Self {
        Self {
            block_size,
            modified: stat.modified,
            remote_size: stat.size,
            local_size: stat.size,
        }
    }

    /// Remote size and modification time as recorded
    pub const fn stat(&self) -> OriginStat {
        OriginStat::new(self.remote_size, self.modified)
    }

    /// Number of blocks covering the remote size
    pub fn block_count(&self) -> Result<usize, HeaderError> {
        if self.block_size == 0 {
            return Err(HeaderError::ZeroBlockSize);
        }
        let blocks = self.remote_size.div_ceil(self.block_size);
        usize::try_from(blocks).map_err(|_| HeaderError::TooManyBlocks(blocks))
    }

    /// Serialize the fixed header
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0x00..0x04].copy_from_slice(&BITMAP_MAGIC);
        buf[0x04..0x08].copy_from_slice(&BITMAP_VERSION.to_le_bytes());
        buf[0x08..0x10].copy_from_slice(&self.block_size.to_le_bytes());
        buf[0x10..0x18].copy_from_slice(&self.modified.to_le_bytes());
        buf[0x18..0x20].copy_from_slice(&self.remote_size.to_le_bytes());
        buf[0x20..0x28].copy_from_slice(&self.local_size.to_le_bytes());
        buf
    }

    /// Parse the fixed header from the start of `data`
    pub fn from_bytes(data: &[u8]) -> Result<Self, HeaderError> {
        if data.len() < HEADER_LEN {
            return Err(HeaderError::Truncated(data.len()));
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&data[0x00..0x04]);
        if magic != BITMAP_MAGIC {
            return Err(HeaderError::BadMagic(magic));
        }

        let version = u32::from_le_bytes(le_array(&data[0x04..0x08]));
        if version != BITMAP_VERSION {
            return Err(HeaderError::UnsupportedVersion(version));
        }

        let header = Self {
            block_size: u64::from_le_bytes(le_array(&data[0x08..0x10])),
            modified: i64::from_le_bytes(le_array(&data[0x10..0x18])),
            remote_size: u64::from_le_bytes(le_array(&data[0x18..0x20])),
            local_size: u64::from_le_bytes(le_array(&data[0x20..0x28])),
        };
        header.block_count()?;
        Ok(header)
    }
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

/// Serialize a complete bitmap file
pub fn encode_bitmap(header: &BitmapHeader, bits: &Bits) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + bits.as_bytes().len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(bits.as_bytes());
    out
}

/// Parse a complete bitmap file
pub fn decode_bitmap(data: &[u8]) -> Result<(BitmapHeader, Bits), HeaderError> {
    let header = BitmapHeader::from_bytes(data)?;
    let block_count = header.block_count()?;
    let body = &data[HEADER_LEN..];
    let bits = Bits::from_bytes(body, block_count).ok_or(HeaderError::BitsTruncated {
        expected: Bits::byte_len(block_count),
        actual: body.len(),
    })?;
    Ok((header, bits))
}
