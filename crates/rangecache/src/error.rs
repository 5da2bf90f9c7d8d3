//! Error types for cache operations

use rangecache_origin::OriginError;
use std::{io, path::PathBuf};
use thiserror::Error;

use crate::header::HeaderError;

/// Result alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur while opening or reading a cached file
#[derive(Debug, Error)]
pub enum CacheError {
    /// The origin failed
    #[error(transparent)]
    Origin(#[from] OriginError),

    /// The cache directory or one of its files could not be created or opened
    #[error("Cannot use cache path {}: {source}", path.display())]
    CacheDir {
        /// Directory or file that failed
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// The bitmap file exists but cannot be decoded
    #[error("Corrupt bitmap {}: {reason}", path.display())]
    CorruptHeader {
        /// Bitmap file
        path: PathBuf,
        /// What is wrong with it
        reason: HeaderError,
    },

    /// Local I/O on the cache files failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// End of file reached before the requested bytes were read
    #[error("Unexpected end of {url} at offset {offset}: wanted {wanted} bytes, got {got}")]
    UnexpectedEof {
        /// Resource being read
        url: String,
        /// Offset the read started at
        offset: u64,
        /// Bytes requested
        wanted: u64,
        /// Bytes available
        got: u64,
    },

    /// Resource exceeds the caller's size limit
    #[error("{url} is {size} bytes, over the {max} byte limit")]
    TooLarge {
        /// Resource being read
        url: String,
        /// Its size
        size: u64,
        /// The limit
        max: u64,
    },

    /// Invalid cache configuration
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),

    /// Seek before the start of the file
    #[error("Seek to negative offset in {0}")]
    NegativeSeek(String),
}

impl CacheError {
    /// True if the origin could not be reached
    pub fn is_origin_unreachable(&self) -> bool {
        matches!(self, Self::Origin(OriginError::Unreachable { .. }))
    }

    /// True if the origin rejected a byte range
    pub fn is_range_unsatisfiable(&self) -> bool {
        matches!(self, Self::Origin(e) if e.is_range_unsatisfiable())
    }

    /// True if the origin returned fewer bytes than requested
    pub fn is_short_read(&self) -> bool {
        matches!(self, Self::Origin(OriginError::ShortRead { .. }))
    }

    /// True if the resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Origin(e) if e.is_not_found())
    }
}

impl From<CacheError> for io::Error {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Io(e) => e,
            CacheError::Origin(OriginError::Io(e)) => e,
            CacheError::UnexpectedEof { .. } => Self::new(io::ErrorKind::UnexpectedEof, err),
            CacheError::NegativeSeek(_) | CacheError::InvalidConfig(_) => {
                Self::new(io::ErrorKind::InvalidInput, err)
            }
            e if e.is_not_found() => Self::new(io::ErrorKind::NotFound, e),
            e => Self::other(e),
        }
    }
}
