//! Byte-addressable origins for the rangecache block cache
//!
//! An origin is anything that can report its current size and modification
//! time and hand back an arbitrary `[start, end)` slice of its bytes. The cache
//! layer only ever talks to the [`Origin`] trait; this crate provides the
//! implementations:
//!
//! - [`LocalOrigin`]: a file on local disk (plain paths and `file://` URLs)
//! - [`HttpOrigin`]: HTTP/HTTPS servers that honour `Range` requests
//! - [`FtpOrigin`]: FTP servers supporting passive mode and `REST`
//!
//! # Example
//!
//! ```no_run
//! use rangecache_origin::{OriginConfig, open_origin};
//!
//! # fn example() -> Result<(), rangecache_origin::OriginError> {
//! let origin = open_origin("https://example.com/genome.2bit", &OriginConfig::default())?;
//! let stat = origin.stat()?;
//! let header = origin.fetch_range(0, 16.min(stat.size))?;
//! println!("{} bytes, first block {:?}", stat.size, &header[..]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod ftp;
pub mod http;
pub mod local;
pub mod retry;

pub use config::{FtpConfig, HttpConfig, OriginConfig};
pub use error::{OriginError, OriginResult};
pub use ftp::FtpOrigin;
pub use http::HttpOrigin;
pub use local::LocalOrigin;
pub use retry::RetryPolicy;

use bytes::Bytes;
use std::sync::Arc;

/// Size and modification time of an origin resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OriginStat {
    /// Current size in bytes
    pub size: u64,
    /// Last modification time in seconds since the Unix epoch, 0 if unknown
    pub modified: i64,
}

impl OriginStat {
    /// Create a new stat record
    pub const fn new(size: u64, modified: i64) -> Self {
        Self { size, modified }
    }
}

/// A byte-addressable resource that can be read in arbitrary ranges
///
/// Implementations hold no per-request state: a repeated `fetch_range` with
/// the same arguments after a transient failure must return the same bytes.
pub trait Origin: Send + Sync {
    /// The URL or path this origin reads from
    fn url(&self) -> &str;

    /// Query the current size and modification time
    fn stat(&self) -> OriginResult<OriginStat>;

    /// Fetch bytes `[start, end)`
    ///
    /// Returns exactly `end - start` bytes or fails. A range that starts or
    /// ends past the current size fails with
    /// [`OriginError::RangeUnsatisfiable`]; a transfer that stops early fails
    /// with [`OriginError::ShortRead`].
    fn fetch_range(&self, start: u64, end: u64) -> OriginResult<Bytes>;
}

/// URL schemes served by remote origins
pub const REMOTE_SCHEMES: &[&str] = &["http", "https", "ftp"];

/// Split off the scheme of `url`, if it has one of the form `scheme://`
pub fn url_scheme(url: &str) -> Option<&str> {
    let (scheme, _) = url.split_once("://")?;
    let valid = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

/// Whether `url` names a local file rather than a remote resource
///
/// Plain paths and `file://` URLs are local; `http`, `https` and `ftp` URLs
/// are remote. Any other scheme is treated as remote so that opening it fails
/// loudly instead of being mistaken for a path.
pub fn is_local(url: &str) -> bool {
    match url_scheme(url) {
        None => true,
        Some(scheme) => scheme.eq_ignore_ascii_case("file"),
    }
}

/// Convert a local URL (`file://...` or plain path) to a filesystem path
pub fn local_path(url: &str) -> &str {
    const PREFIX: &str = "file://";
    match url.get(..PREFIX.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(PREFIX) => &url[PREFIX.len()..],
        _ => url,
    }
}

/// Open the origin appropriate for `url`
pub fn open_origin(url: &str, config: &OriginConfig) -> OriginResult<Arc<dyn Origin>> {
    if is_local(url) {
        return Ok(Arc::new(LocalOrigin::open(local_path(url))?));
    }

    let scheme = url_scheme(url).unwrap_or_default().to_ascii_lowercase();
    match scheme.as_str() {
        "http" | "https" => Ok(Arc::new(HttpOrigin::new(
            url,
            &config.http,
            config.retry.clone(),
        )?)),
        "ftp" => Ok(Arc::new(FtpOrigin::new(
            url,
            config.ftp.clone(),
            config.retry.clone(),
        )?)),
        _ => Err(OriginError::UnsupportedScheme(scheme)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_url_scheme() {
        assert_eq!(url_scheme("http://example.com/a"), Some("http"));
        assert_eq!(url_scheme("ftp://ftp.example.com/pub/x"), Some("ftp"));
        assert_eq!(url_scheme("/data/local/file.bin"), None);
        assert_eq!(url_scheme("relative/dir://odd"), None);
        assert_eq!(url_scheme("://nothing"), None);
    }

    #[test]
    fn test_is_local() {
        assert!(is_local("/tmp/x.bin"));
        assert!(is_local("x.bin"));
        assert!(is_local("file:///tmp/x.bin"));
        assert!(!is_local("http://example.com/x.bin"));
        assert!(!is_local("HTTPS://example.com/x.bin"));
        assert!(!is_local("ftp://example.com/x.bin"));
        assert!(!is_local("s3://bucket/x.bin"));
    }

    #[test]
    fn test_local_path() {
        assert_eq!(local_path("file:///tmp/x.bin"), "/tmp/x.bin");
        assert_eq!(local_path("/tmp/x.bin"), "/tmp/x.bin");
        assert_eq!(local_path("FILE:///tmp/x.bin"), "/tmp/x.bin");
        assert_eq!(local_path("File:///tmp/x.bin"), "/tmp/x.bin");
        assert_eq!(local_path("fil"), "fil");
    }

    #[test]
    fn test_unsupported_scheme() {
        let result = open_origin("gopher://example.com/x", &OriginConfig::default());
        assert!(matches!(result, Err(OriginError::UnsupportedScheme(s)) if s == "gopher"));
    }

    #[test]
    fn test_open_local_origin() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"0123456789").expect("write");

        let origin = open_origin(path.to_str().expect("utf8"), &OriginConfig::default())
            .expect("open local");
        assert_eq!(origin.stat().expect("stat").size, 10);
        assert_eq!(&origin.fetch_range(2, 5).expect("fetch")[..], b"234");

        let upper = format!("FILE://{}", path.display());
        let origin = open_origin(&upper, &OriginConfig::default()).expect("open FILE url");
        assert_eq!(origin.stat().expect("stat").size, 10);
    }
}
