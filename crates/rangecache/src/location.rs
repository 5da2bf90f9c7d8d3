//! Mapping from URLs to cache directories
//!
//! A remote URL such as `http://example.com/data/genome.2bit` is cached under
//! `<root>/http/example.com/data/genome.2bit/`. The protocol becomes the
//! first directory level and every `/`-separated component of the remainder
//! becomes one more level, after Q-encoding:
//!
//! - `[A-Za-z0-9]` (except `Q`) and `-_.~` are kept as they are
//! - every other byte, `Q` included, becomes `Q` plus two uppercase hex digits
//! - a `.` at the start of a component is always encoded, so `.`, `..` and
//!   dot-prefixed names never appear on disk
//! - an empty component (`//`, trailing `/`) becomes a bare `Q`
//!
//! Credentials in the URL are split off and never reach the filesystem.
//! The two cache files inside each directory are dot-prefixed and so cannot
//! collide with an encoded component.

use rangecache_origin::{is_local, url_scheme};
use std::path::{Path, PathBuf};

/// File holding the bitmap header and block bits
pub const BITMAP_NAME: &str = ".bitmap";

/// Sparse file holding fetched block data
pub const SPARSE_NAME: &str = ".sparse";

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// A remote URL split into the parts the cache cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    /// Lowercased scheme (`http`, `https`, `ftp`)
    pub protocol: String,
    /// Q-encoded remainder, components joined with `/`
    pub after_protocol: String,
    /// `user[:password]` from the URL, if any
    pub auth: Option<String>,
}

/// Split a remote URL into protocol, encoded remainder and credentials
///
/// Returns `None` for local paths and `file://` URLs.
pub fn parse_url(url: &str) -> Option<ParsedUrl> {
    if is_local(url) {
        return None;
    }
    let protocol = url_scheme(url)?.to_ascii_lowercase();
    let rest = &url[protocol.len() + 3..];

    let authority_end = rest.find('/').unwrap_or(rest.len());
    let (auth, rest) = match rest[..authority_end].rfind('@') {
        Some(at) => (Some(rest[..at].to_string()), &rest[at + 1..]),
        None => (None, rest),
    };

    let after_protocol = rest.split('/').map(q_encode).collect::<Vec<_>>().join("/");

    Some(ParsedUrl {
        protocol,
        after_protocol,
        auth,
    })
}

/// Q-encode a single path component
pub fn q_encode(component: &str) -> String {
    if component.is_empty() {
        return "Q".to_string();
    }
    let mut out = String::with_capacity(component.len());
    for (ix, byte) in component.bytes().enumerate() {
        let keep = (byte.is_ascii_alphanumeric() && byte != b'Q')
            || matches!(byte, b'-' | b'_' | b'~')
            || (byte == b'.' && ix > 0);
        if keep {
            out.push(char::from(byte));
        } else {
            out.push('Q');
            out.push(char::from(HEX_DIGITS[usize::from(byte >> 4)]));
            out.push(char::from(HEX_DIGITS[usize::from(byte & 0x0F)]));
        }
    }
    out
}

/// Cache directory for `url` under `root`, or `None` for local files
pub fn cache_dir_for_url(url: &str, root: &Path) -> Option<PathBuf> {
    let parsed = parse_url(url)?;
    let mut dir = root.join(&parsed.protocol);
    for component in parsed.after_protocol.split('/') {
        dir.push(component);
    }
    Some(dir)
}

/// Paths of one cache entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLocation {
    /// Entry directory
    pub dir: PathBuf,
    /// Bitmap file inside `dir`
    pub bitmap: PathBuf,
    /// Sparse data file inside `dir`
    pub sparse: PathBuf,
}

impl CacheLocation {
    /// Entry paths for `url` under `root`, or `None` for local files
    pub fn for_url(url: &str, root: &Path) -> Option<Self> {
        cache_dir_for_url(url, root).map(Self::in_dir)
    }

    /// Entry paths inside an existing entry directory
    pub fn in_dir(dir: PathBuf) -> Self {
        Self {
            bitmap: dir.join(BITMAP_NAME),
            sparse: dir.join(SPARSE_NAME),
            dir,
        }
    }

    /// Temporary path used while replacing the bitmap
    pub fn bitmap_temp(&self) -> PathBuf {
        self.dir.join(".bitmap.tmp")
    }

    /// Temporary path used while replacing the data file
    pub fn sparse_temp(&self) -> PathBuf {
        self.dir.join(".sparse.tmp")
    }

    /// Both cache files, bitmap first
    pub fn files(&self) -> Vec<PathBuf> {
        vec![self.bitmap.clone(), self.sparse.clone()]
    }
}
