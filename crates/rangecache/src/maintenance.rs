//! Age-based cleanup of the cache tree
//!
//! An entry is any directory holding a bitmap file. Its last use is the most
//! recent access or modification time over the files directly inside it;
//! opening an entry bumps the bitmap's access time and fetching bumps its
//! modification time, so both reads and writes keep an entry alive.
//!
//! Entries can nest (`http://h/a` and `http://h/a/b` share a prefix), so
//! removing an entry deletes only its own files. Directories left empty
//! afterwards are pruned bottom-up, never the root itself.

use serde::Serialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{error::CacheResult, location::BITMAP_NAME};

/// Outcome of a cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Entries older than the cutoff
    pub entries: usize,
    /// Total size of their files in bytes
    pub bytes: u64,
    /// Whether the entries were actually deleted
    pub removed: bool,
}

/// Remove entries unused for longer than `max_age`
///
/// Returns the number of bytes in the expired entries. With `test_only` the
/// total is computed but nothing is deleted.
pub fn cleanup(root: impl AsRef<Path>, max_age: Duration, test_only: bool) -> CacheResult<u64> {
    cleanup_report(root, max_age, test_only).map(|report| report.bytes)
}

/// [`cleanup`] with entry counts
pub fn cleanup_report(
    root: impl AsRef<Path>,
    max_age: Duration,
    test_only: bool,
) -> CacheResult<CleanupReport> {
    let root = root.as_ref();
    let mut report = CleanupReport {
        removed: !test_only,
        ..CleanupReport::default()
    };
    if !root.is_dir() {
        return Ok(report);
    }

    let now = SystemTime::now();
    for dir in entry_dirs(root) {
        let Some(usage) = entry_usage(&dir)? else {
            debug!(dir = %dir.display(), "Cache entry vanished during cleanup");
            continue;
        };
        let age = now.duration_since(usage.last_used).unwrap_or_default();
        if age <= max_age {
            continue;
        }

        debug!(
            dir = %dir.display(),
            age_secs = age.as_secs(),
            bytes = usage.bytes,
            "Expired cache entry"
        );
        report.entries += 1;
        report.bytes += usage.bytes;

        if !test_only {
            for file in &usage.files {
                match fs::remove_file(file) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }

    if !test_only {
        prune_empty_dirs(root);
    }

    info!(
        root = %root.display(),
        entries = report.entries,
        bytes = report.bytes,
        test_only,
        "Cache cleanup finished"
    );
    Ok(report)
}

/// Directories under `root` holding a bitmap file
fn entry_dirs(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable cache path");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == BITMAP_NAME)
        .filter_map(|entry| entry.path().parent().map(Path::to_path_buf))
        .collect()
}

struct EntryUsage {
    last_used: SystemTime,
    bytes: u64,
    files: Vec<PathBuf>,
}

/// Latest use and total size over the files directly inside `dir`
///
/// Files removed while the directory is being read are skipped; `None` if
/// the directory itself is gone or no files remain.
fn entry_usage(dir: &Path) -> CacheResult<Option<EntryUsage>> {
    let mut usage = EntryUsage {
        last_used: UNIX_EPOCH,
        bytes: 0,
        files: Vec::new(),
    };

    let items = match fs::read_dir(dir) {
        Ok(items) => items,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    for item in items {
        let (path, metadata) = match item.and_then(|item| Ok((item.path(), item.metadata()?))) {
            Ok(found) => found,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            continue;
        }
        for time in [metadata.accessed(), metadata.modified()]
            .into_iter()
            .flatten()
        {
            usage.last_used = usage.last_used.max(time);
        }
        usage.bytes += metadata.len();
        usage.files.push(path);
    }
    Ok((!usage.files.is_empty()).then_some(usage))
}

/// Remove empty directories below `root`, deepest first
fn prune_empty_dirs(root: &Path) {
    let dirs: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .flatten()
        .filter(|entry| entry.file_type().is_dir())
        .map(walkdir::DirEntry::into_path)
        .collect();

    for dir in dirs {
        let is_empty = fs::read_dir(&dir).is_ok_and(|mut items| items.next().is_none());
        if is_empty && let Err(e) = fs::remove_dir(&dir) {
            debug!(dir = %dir.display(), error = %e, "Could not prune directory");
        }
    }
}
