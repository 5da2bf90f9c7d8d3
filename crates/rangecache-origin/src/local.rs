//! Origin backed by a file on local disk

use bytes::Bytes;
use parking_lot::Mutex;
use std::{
    fs::File,
    io::{ErrorKind, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    Origin, OriginStat,
    error::{OriginError, OriginResult},
};

/// A local file read through the [`Origin`] contract
///
/// The handle is opened once and shared; reads are positioned under a lock so
/// the origin can be used from several cache handles at once.
#[derive(Debug)]
pub struct LocalOrigin {
    path: PathBuf,
    url: String,
    file: Mutex<File>,
}

impl LocalOrigin {
    /// Open `path` for reading
    ///
    /// A missing file maps to [`OriginError::NotFound`].
    pub fn open(path: impl AsRef<Path>) -> OriginResult<Self> {
        let path = path.as_ref();
        let url = path.display().to_string();
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => OriginError::NotFound(url.clone()),
            _ => OriginError::Io(e),
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            url,
            file: Mutex::new(file),
        })
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Convert a filesystem timestamp to Unix seconds
pub(crate) fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_secs()).unwrap_or(i64::MAX),
    }
}

impl Origin for LocalOrigin {
    fn url(&self) -> &str {
        &self.url
    }

    fn stat(&self) -> OriginResult<OriginStat> {
        let metadata = self.file.lock().metadata()?;
        let modified = metadata.modified().map(unix_seconds).unwrap_or(0);
        Ok(OriginStat::new(metadata.len(), modified))
    }

    fn fetch_range(&self, start: u64, end: u64) -> OriginResult<Bytes> {
        let mut file = self.file.lock();
        let size = file.metadata()?.len();
        if start > end || end > size {
            return Err(OriginError::RangeUnsatisfiable {
                url: self.url.clone(),
                start,
                end,
            });
        }

        let expected = end - start;
        let mut buf = vec![0u8; expected as usize];
        file.seek(SeekFrom::Start(start))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        if filled < buf.len() {
            return Err(OriginError::ShortRead {
                url: self.url.clone(),
                expected,
                actual: filled as u64,
            });
        }

        Ok(Bytes::from(buf))
    }
}
