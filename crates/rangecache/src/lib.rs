//! Block-granular caching of large remote files
//!
//! `rangecache` gives ordinary seek/read access to multi-gigabyte HTTP, HTTPS
//! and FTP resources while fetching only the bytes actually touched. Each
//! remote URL maps to a cache directory holding two files:
//!
//! - `.sparse`: a sparse file the size of the resource, populated only in the
//!   blocks that have been fetched
//! - `.bitmap`: a small header (block size, remote size, remote modification
//!   time) followed by one bit per block
//!
//! Entries persist across processes. Before trusting an entry the origin is
//! re-checked at most once per [`CacheConfig::cache_timeout`]; if its size or
//! modification time changed, the entry is discarded and rebuilt.
//!
//! # Example
//!
//! ```no_run
//! use rangecache::CachedFile;
//! use std::io::{Read, Seek, SeekFrom};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut file = CachedFile::open("https://example.com/genome.2bit", "/tmp/rangecache")?;
//! file.seek(SeekFrom::Start(1 << 30))?;
//! let mut buf = [0u8; 4096];
//! file.read_exact(&mut buf)?;
//! println!("{} of {} bytes cached", file.info().cached_bytes, file.size());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod bits;
pub mod config;
pub mod error;
pub mod extent;
pub mod file;
pub mod header;
pub mod location;
pub mod maintenance;
pub mod stats;

pub use bits::Bits;
pub use config::{CacheConfig, default_cache_dir};
pub use error::{CacheError, CacheResult};
pub use extent::{Extent, coalesce, find_gap};
pub use file::{
    CachedFile, EntryInfo, cache_age, cache_files, file_size, read_all, read_all_with_config,
    size_from_cache,
};
pub use location::{CacheLocation, ParsedUrl, cache_dir_for_url, parse_url};
pub use maintenance::{CleanupReport, cleanup, cleanup_report};
pub use stats::CacheStats;

pub use rangecache_origin::{
    Origin, OriginConfig, OriginError, OriginResult, OriginStat, RetryPolicy, is_local,
};
