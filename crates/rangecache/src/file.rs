//! Cached random access to a remote file
//!
//! A [`CachedFile`] pairs an [`Origin`] with an on-disk cache entry: a sparse
//! data file the size of the remote resource and a bitmap file recording
//! which blocks of it hold valid data. Reads fetch only the blocks that are
//! missing, write them into the data file, then set and persist their bits.
//! Block data always reaches the data file before the bits covering it, so a
//! set bit on disk always describes valid data even if the process dies
//! mid-read.
//!
//! Local paths and `file://` URLs have no cache entry and are read through
//! directly.

use bytes::Bytes;
use rangecache_origin::{Origin, OriginError, OriginStat, open_origin};
use serde::Serialize;
use std::{
    fmt,
    fs::{self, File, FileTimes, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tracing::{debug, info, warn};

use crate::{
    bits::Bits,
    config::CacheConfig,
    error::{CacheError, CacheResult},
    extent::{Extent, coalesce},
    header::{BitmapHeader, HEADER_LEN, decode_bitmap, encode_bitmap},
    location::CacheLocation,
    stats::CacheStats,
};

/// Map a failure to open or create a cache file to [`CacheError::CacheDir`]
fn cache_path_error(path: &Path) -> impl FnOnce(io::Error) -> CacheError + '_ {
    move |source| CacheError::CacheDir {
        path: path.to_path_buf(),
        source,
    }
}

/// On-disk state of one cached URL
#[derive(Debug)]
struct CacheEntry {
    location: CacheLocation,
    header: BitmapHeader,
    bits: Bits,
    bitmap: File,
    sparse: File,
    last_check: SystemTime,
}

impl CacheEntry {
    /// Load an existing entry
    ///
    /// Returns `Ok(None)` when there is nothing usable on disk and the entry
    /// has to be built from scratch.
    fn load(location: &CacheLocation) -> CacheResult<Option<Self>> {
        let data = match fs::read(&location.bitmap) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(cache_path_error(&location.bitmap)(e)),
        };
        let (header, bits) = decode_bitmap(&data).map_err(|reason| CacheError::CorruptHeader {
            path: location.bitmap.clone(),
            reason,
        })?;

        let sparse = match OpenOptions::new()
            .read(true)
            .write(true)
            .open(&location.sparse)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %location.sparse.display(), "Data file missing, rebuilding cache entry");
                return Ok(None);
            }
            Err(e) => return Err(cache_path_error(&location.sparse)(e)),
        };

        let data_len = sparse.metadata()?.len();
        if data_len < header.local_size {
            warn!(
                path = %location.sparse.display(),
                expected = header.local_size,
                actual = data_len,
                "Data file shorter than recorded size, rebuilding cache entry"
            );
            return Ok(None);
        }

        let bitmap = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&location.bitmap)
            .map_err(cache_path_error(&location.bitmap))?;
        let last_check = bitmap
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(UNIX_EPOCH);

        Ok(Some(Self {
            location: location.clone(),
            header,
            bits,
            bitmap,
            sparse,
            last_check,
        }))
    }

    /// Build a fresh, empty entry for a resource with the given stat
    ///
    /// The old bitmap is unlinked first, so a crash part way through leaves
    /// no bits describing the new data file. Both files are then replaced by
    /// rename; handles still open on the old entry keep reading the old
    /// inodes, whose bits stay true for them.
    fn create(location: &CacheLocation, block_size: u64, stat: OriginStat) -> CacheResult<Self> {
        let header = BitmapHeader::new(block_size, stat);
        let block_count = header
            .block_count()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let bits = Bits::alloc(block_count);

        match fs::remove_file(&location.bitmap) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(cache_path_error(&location.bitmap)(e)),
        }

        let sparse_temp = location.sparse_temp();
        let sparse = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&sparse_temp)
            .map_err(cache_path_error(&sparse_temp))?;
        sparse
            .set_len(stat.size)
            .map_err(cache_path_error(&sparse_temp))?;
        fs::rename(&sparse_temp, &location.sparse).map_err(cache_path_error(&location.sparse))?;

        let bitmap_temp = location.bitmap_temp();
        {
            let mut file = File::create(&bitmap_temp).map_err(cache_path_error(&bitmap_temp))?;
            file.write_all(&encode_bitmap(&header, &bits))
                .and_then(|()| file.sync_all())
                .map_err(cache_path_error(&bitmap_temp))?;
        }
        fs::rename(&bitmap_temp, &location.bitmap).map_err(cache_path_error(&location.bitmap))?;

        let bitmap = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&location.bitmap)
            .map_err(cache_path_error(&location.bitmap))?;

        debug!(
            dir = %location.dir.display(),
            size = stat.size,
            blocks = block_count,
            "Created cache entry"
        );

        Ok(Self {
            location: location.clone(),
            header,
            bits,
            bitmap,
            sparse,
            last_check: SystemTime::now(),
        })
    }

    fn is_check_due(&self, timeout: Duration) -> bool {
        self.last_check
            .elapsed()
            .is_ok_and(|elapsed| elapsed >= timeout)
    }

    /// Record a successful staleness check for this and other processes
    fn touch(&mut self) -> CacheResult<()> {
        let now = SystemTime::now();
        self.bitmap.set_modified(now)?;
        self.last_check = now;
        Ok(())
    }

    /// Record use for age-based cleanup
    fn mark_used(&self) -> io::Result<()> {
        self.bitmap
            .set_times(FileTimes::new().set_accessed(SystemTime::now()))
    }

    /// Fetch every missing block overlapping `[start, end)`
    fn fill(
        &mut self,
        origin: &dyn Origin,
        start: u64,
        end: u64,
        config: &CacheConfig,
        stats: &mut CacheStats,
    ) -> CacheResult<()> {
        let block = self.header.block_size;
        let first = (start / block) as usize;
        let last = end.div_ceil(block) as usize;
        let missing: Vec<_> = self.bits.runs(first, last, false).collect();
        if missing.is_empty() {
            return Ok(());
        }

        let step = config.fetch_step(block);
        for run in missing {
            let run_end = (run.end as u64 * block).min(self.header.remote_size);
            let mut chunk_start = run.start as u64 * block;
            while chunk_start < run_end {
                let chunk_end = chunk_start.saturating_add(step).min(run_end);
                self.fetch_chunk(origin, chunk_start, chunk_end, config.sync_data, stats)?;
                chunk_start = chunk_end;
            }
        }
        Ok(())
    }

    fn fetch_chunk(
        &mut self,
        origin: &dyn Origin,
        start: u64,
        end: u64,
        sync_data: bool,
        stats: &mut CacheStats,
    ) -> CacheResult<()> {
        debug!(url = origin.url(), start, end, "Fetching blocks");
        stats.fetch_requests += 1;
        let bytes = origin.fetch_range(start, end)?;
        if bytes.len() as u64 != end - start {
            return Err(OriginError::ShortRead {
                url: origin.url().to_string(),
                expected: end - start,
                actual: bytes.len() as u64,
            }
            .into());
        }
        stats.bytes_fetched += bytes.len() as u64;

        self.sparse.seek(SeekFrom::Start(start))?;
        self.sparse.write_all(&bytes)?;
        if sync_data {
            self.sparse.sync_data()?;
        }

        let block = self.header.block_size;
        let first = (start / block) as usize;
        let last = end.div_ceil(block) as usize;
        self.bits.set_range(first, last - first);
        self.persist_bits(first, last)
    }

    /// Write the bitmap bytes covering blocks `[first, last)` in place
    fn persist_bits(&mut self, first: usize, last: usize) -> CacheResult<()> {
        let span = Bits::byte_span(first, last);
        self.bitmap
            .seek(SeekFrom::Start((HEADER_LEN + span.start) as u64))?;
        self.bitmap.write_all(&self.bits.as_bytes()[span])?;
        Ok(())
    }

    fn read_data(&mut self, offset: u64, dest: &mut [u8]) -> CacheResult<()> {
        self.sparse.seek(SeekFrom::Start(offset))?;
        self.sparse.read_exact(dest)?;
        Ok(())
    }

    fn cached_extents(&self) -> Vec<Extent> {
        let block = self.header.block_size;
        self.bits
            .runs(0, self.bits.len(), true)
            .map(|run| {
                Extent::from_range(
                    run.start as u64 * block,
                    (run.end as u64 * block).min(self.header.remote_size),
                )
            })
            .collect()
    }
}

/// Summary of one cached file, as reported by [`CachedFile::info`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    /// Source URL or path
    pub url: String,
    /// Cache entry directory, `None` for local files
    pub cache_dir: Option<PathBuf>,
    /// Resource size in bytes
    pub size: u64,
    /// Resource modification time, Unix seconds
    pub modified: i64,
    /// Cache block size
    pub block_size: u64,
    /// Blocks covering the resource
    pub blocks_total: usize,
    /// Blocks held in the cache
    pub blocks_cached: usize,
    /// Bytes held in the cache
    pub cached_bytes: u64,
}

/// Random access to a URL through the block cache
///
/// Implements [`Read`] and [`Seek`]; the inherent methods return
/// [`CacheError`] rather than `io::Error`.
pub struct CachedFile {
    url: String,
    origin: Arc<dyn Origin>,
    config: CacheConfig,
    stat: OriginStat,
    entry: Option<CacheEntry>,
    pos: u64,
    stats: CacheStats,
}

impl fmt::Debug for CachedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedFile")
            .field("url", &self.url)
            .field("stat", &self.stat)
            .field("pos", &self.pos)
            .field("entry", &self.entry.as_ref().map(|e| &e.location.dir))
            .finish_non_exhaustive()
    }
}

impl CachedFile {
    /// Open `url` with default settings, caching under `cache_root`
    ///
    /// Fails with [`CacheError::Origin`] wrapping
    /// [`OriginError::NotFound`] if the resource does not exist.
    pub fn open(url: &str, cache_root: impl AsRef<Path>) -> CacheResult<Self> {
        Self::open_with_config(url, CacheConfig::default().with_cache_dir(cache_root))
    }

    /// Like [`CachedFile::open`], but returns `Ok(None)` for a missing resource
    pub fn may_open(url: &str, cache_root: impl AsRef<Path>) -> CacheResult<Option<Self>> {
        match Self::open(url, cache_root) {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Open `url` with explicit settings
    pub fn open_with_config(url: &str, config: CacheConfig) -> CacheResult<Self> {
        config.validate().map_err(CacheError::InvalidConfig)?;
        let origin = open_origin(url, &config.origin)?;
        Self::open_with_origin(url, origin, config)
    }

    /// Open `url` served by a caller-supplied origin
    ///
    /// `url` still determines the cache location; a local `url` reads the
    /// origin directly without a cache entry.
    pub fn open_with_origin(
        url: &str,
        origin: Arc<dyn Origin>,
        config: CacheConfig,
    ) -> CacheResult<Self> {
        config.validate().map_err(CacheError::InvalidConfig)?;

        let mut file = Self {
            url: url.to_string(),
            origin,
            config,
            stat: OriginStat::new(0, 0),
            entry: None,
            pos: 0,
            stats: CacheStats::default(),
        };

        let Some(location) = CacheLocation::for_url(url, &file.config.cache_dir) else {
            file.stat = file.origin.stat()?;
            return Ok(file);
        };

        fs::create_dir_all(&location.dir).map_err(|source| CacheError::CacheDir {
            path: location.dir.clone(),
            source,
        })?;

        let loaded = match CacheEntry::load(&location) {
            Ok(entry) => entry,
            Err(CacheError::CorruptHeader { path, reason }) => {
                warn!(path = %path.display(), %reason, "Corrupt bitmap, rebuilding cache entry");
                None
            }
            Err(e) => return Err(e),
        };

        match loaded {
            Some(entry) => {
                file.stat = entry.header.stat();
                file.entry = Some(entry);
                file.check_freshness(false)?;
            }
            None => {
                let stat = file.origin.stat()?;
                file.entry = Some(CacheEntry::create(
                    &location,
                    file.config.block_size,
                    stat,
                )?);
                file.stat = stat;
            }
        }

        if let Some(entry) = &file.entry {
            if let Err(e) = entry.mark_used() {
                debug!(error = %e, "Could not update cache access time");
            }
            debug!(
                url = %file.url,
                dir = %entry.location.dir.display(),
                size = file.stat.size,
                cached_blocks = entry.bits.count_range(0, entry.bits.len()),
                "Opened cache entry"
            );
        }

        Ok(file)
    }

    /// Re-stat the origin if the check interval has passed (or `force`)
    ///
    /// Returns `true` if the resource changed. A changed resource discards
    /// every cached block.
    fn check_freshness(&mut self, force: bool) -> CacheResult<bool> {
        let due = force
            || self
                .entry
                .as_ref()
                .is_some_and(|e| e.is_check_due(self.config.cache_timeout));
        if !due {
            return Ok(false);
        }

        let current = self.origin.stat()?;
        let Some(entry) = self.entry.as_mut() else {
            let changed = current != self.stat;
            self.stat = current;
            return Ok(changed);
        };

        if current == entry.header.stat() {
            entry.touch()?;
            return Ok(false);
        }

        info!(
            url = %self.url,
            old_size = entry.header.remote_size,
            new_size = current.size,
            old_modified = entry.header.modified,
            new_modified = current.modified,
            "Remote changed, invalidating cache entry"
        );
        entry.bits.clear_all();
        let location = entry.location.clone();
        self.entry = Some(CacheEntry::create(
            &location,
            self.config.block_size,
            current,
        )?);
        self.stat = current;
        self.stats.invalidations += 1;
        Ok(true)
    }

    /// Read up to `buf.len()` bytes at `offset` without moving the cursor
    ///
    /// Returns the number of bytes read, which is short only at end of file.
    /// Once the cache timeout has passed since the last check the origin is
    /// re-checked first. If the origin rejects a range because it changed
    /// underneath us, the entry is invalidated and the read retried once.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> CacheResult<usize> {
        if self.entry.is_some() {
            self.check_freshness(false)?;
        }
        match self.read_at_once(offset, buf) {
            Err(e) if e.is_range_unsatisfiable() => {
                if self.check_freshness(true)? {
                    self.read_at_once(offset, buf)
                } else {
                    Err(e)
                }
            }
            result => result,
        }
    }

    fn read_at_once(&mut self, offset: u64, buf: &mut [u8]) -> CacheResult<usize> {
        let size = self.stat.size;
        if offset >= size || buf.is_empty() {
            return Ok(0);
        }
        let end = offset.saturating_add(buf.len() as u64).min(size);
        let len = (end - offset) as usize;
        let dest = &mut buf[..len];

        match self.entry.as_mut() {
            Some(entry) => {
                entry.fill(
                    self.origin.as_ref(),
                    offset,
                    end,
                    &self.config,
                    &mut self.stats,
                )?;
                entry.read_data(offset, dest)?;
            }
            None => {
                self.stats.fetch_requests += 1;
                let bytes = self.origin.fetch_range(offset, end)?;
                if bytes.len() != len {
                    return Err(OriginError::ShortRead {
                        url: self.url.clone(),
                        expected: len as u64,
                        actual: bytes.len() as u64,
                    }
                    .into());
                }
                self.stats.bytes_fetched += len as u64;
                dest.copy_from_slice(&bytes);
            }
        }

        self.stats.bytes_served += len as u64;
        Ok(len)
    }

    /// Fill `buf` from the cursor, failing if end of file comes first
    pub fn must_read(&mut self, buf: &mut [u8]) -> CacheResult<()> {
        let offset = self.pos;
        let n = self.read_at(offset, buf)?;
        self.pos += n as u64;
        if n < buf.len() {
            return Err(CacheError::UnexpectedEof {
                url: self.url.clone(),
                offset,
                wanted: buf.len() as u64,
                got: n as u64,
            });
        }
        Ok(())
    }

    fn read_array<const N: usize>(&mut self) -> CacheResult<[u8; N]> {
        let mut buf = [0u8; N];
        self.must_read(&mut buf)?;
        Ok(buf)
    }

    /// Read a native-order `u16`, byte-swapped if `swapped`
    pub fn read_u16(&mut self, swapped: bool) -> CacheResult<u16> {
        let value = u16::from_ne_bytes(self.read_array()?);
        Ok(if swapped { value.swap_bytes() } else { value })
    }

    /// Read a native-order `u32`, byte-swapped if `swapped`
    pub fn read_u32(&mut self, swapped: bool) -> CacheResult<u32> {
        let value = u32::from_ne_bytes(self.read_array()?);
        Ok(if swapped { value.swap_bytes() } else { value })
    }

    /// Read a native-order `u64`, byte-swapped if `swapped`
    pub fn read_u64(&mut self, swapped: bool) -> CacheResult<u64> {
        let value = u64::from_ne_bytes(self.read_array()?);
        Ok(if swapped { value.swap_bytes() } else { value })
    }

    /// Read a native-order `f32`, byte-swapped if `swapped`
    pub fn read_f32(&mut self, swapped: bool) -> CacheResult<f32> {
        self.read_u32(swapped).map(f32::from_bits)
    }

    /// Read a native-order `f64`, byte-swapped if `swapped`
    pub fn read_f64(&mut self, swapped: bool) -> CacheResult<f64> {
        self.read_u64(swapped).map(f64::from_bits)
    }

    /// Read a zero-terminated string; the terminator is consumed
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn read_cstring(&mut self) -> CacheResult<String> {
        let start = self.pos;
        let mut out = Vec::new();
        let mut chunk = [0u8; 256];
        loop {
            let n = self.read_at(self.pos, &mut chunk)?;
            if n == 0 {
                return Err(CacheError::UnexpectedEof {
                    url: self.url.clone(),
                    offset: start,
                    wanted: out.len() as u64 + 1,
                    got: out.len() as u64,
                });
            }
            if let Some(nul) = chunk[..n].iter().position(|&b| b == 0) {
                out.extend_from_slice(&chunk[..nul]);
                self.pos += nul as u64 + 1;
                return Ok(String::from_utf8_lossy(&out).into_owned());
            }
            out.extend_from_slice(&chunk[..n]);
            self.pos += n as u64;
        }
    }

    /// Read a string prefixed by a one-byte length
    ///
    /// Returns `Ok(None)` if the cursor is already at end of file.
    pub fn read_short_string(&mut self) -> CacheResult<Option<String>> {
        let mut len = [0u8; 1];
        if self.read_at(self.pos, &mut len)? == 0 {
            return Ok(None);
        }
        self.pos += 1;
        let mut buf = vec![0u8; usize::from(len[0])];
        self.must_read(&mut buf)?;
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    /// Read several extents, merging touching and overlapping ones
    ///
    /// Each contiguous run is read once; the results come back in request
    /// order as slices of the shared run buffers.
    pub fn read_batch(&mut self, extents: &[Extent]) -> CacheResult<Vec<Bytes>> {
        let runs = coalesce(extents);
        let mut buffers = Vec::with_capacity(runs.len());
        for run in &runs {
            let mut buf = vec![0u8; run.size as usize];
            let n = self.read_at(run.offset, &mut buf)?;
            if n < buf.len() {
                return Err(CacheError::UnexpectedEof {
                    url: self.url.clone(),
                    offset: run.offset,
                    wanted: run.size,
                    got: n as u64,
                });
            }
            buffers.push(Bytes::from(buf));
        }

        Ok(extents
            .iter()
            .map(|want| {
                if want.is_empty() {
                    return Bytes::new();
                }
                let ix = runs.partition_point(|run| run.end() <= want.offset);
                let start = (want.offset - runs[ix].offset) as usize;
                buffers[ix].slice(start..start + want.size as usize)
            })
            .collect())
    }

    /// Current cursor position
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// Move the cursor to an absolute offset
    ///
    /// Seeking past the end is allowed; reads there return 0 bytes.
    pub fn seek_to(&mut self, offset: u64) {
        self.pos = offset;
    }

    /// Move the cursor relative to its current position
    pub fn seek_cur(&mut self, delta: i64) -> CacheResult<u64> {
        self.resolve_seek(SeekFrom::Current(delta)).map(|pos| {
            self.pos = pos;
            pos
        })
    }

    fn resolve_seek(&self, pos: SeekFrom) -> CacheResult<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.stat.size.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        target.ok_or_else(|| CacheError::NegativeSeek(self.url.clone()))
    }

    /// Source URL or path
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Resource size in bytes
    pub fn size(&self) -> u64 {
        self.stat.size
    }

    /// Resource modification time, Unix seconds, 0 if the origin has none
    pub fn update_time(&self) -> i64 {
        self.stat.modified
    }

    /// Cache entry directory, `None` for local files
    pub fn cache_dir(&self) -> Option<&Path> {
        self.entry.as_ref().map(|e| e.location.dir.as_path())
    }

    /// Block size of the cache entry
    pub fn block_size(&self) -> u64 {
        self.entry
            .as_ref()
            .map_or(self.config.block_size, |e| e.header.block_size)
    }

    /// Settings this handle was opened with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Counters for this handle
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Byte ranges held in the cache, in offset order
    ///
    /// A local file is always fully available.
    pub fn cached_extents(&self) -> Vec<Extent> {
        match &self.entry {
            Some(entry) => entry.cached_extents(),
            None if self.stat.size > 0 => vec![Extent::new(0, self.stat.size)],
            None => Vec::new(),
        }
    }

    /// Snapshot of the entry's size and cache coverage
    pub fn info(&self) -> EntryInfo {
        let block_size = self.block_size();
        let blocks_total = match &self.entry {
            Some(entry) => entry.bits.len(),
            None => self.stat.size.div_ceil(block_size) as usize,
        };
        let blocks_cached = match &self.entry {
            Some(entry) => entry.bits.count_range(0, entry.bits.len()),
            None => blocks_total,
        };
        EntryInfo {
            url: self.url.clone(),
            cache_dir: self.cache_dir().map(Path::to_path_buf),
            size: self.stat.size,
            modified: self.stat.modified,
            block_size,
            blocks_total,
            blocks_cached,
            cached_bytes: self.cached_extents().iter().map(|e| e.size).sum(),
        }
    }

    /// Flush and release the cache files
    ///
    /// Everything fetched so far stays on disk for the next open.
    pub fn close(self) -> CacheResult<()> {
        if let Some(entry) = &self.entry {
            if self.config.sync_data {
                entry.sparse.sync_all()?;
                entry.bitmap.sync_all()?;
            }
            debug!(
                url = %self.url,
                fetches = self.stats.fetch_requests,
                bytes_served = self.stats.bytes_served,
                "Closed cache entry"
            );
        }
        Ok(())
    }
}

impl Read for CachedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_at(self.pos, buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for CachedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = self.resolve_seek(pos)?;
        Ok(self.pos)
    }
}

/// Read a whole resource through the cache
///
/// Fails with [`CacheError::TooLarge`] if the resource exceeds `max_size`.
pub fn read_all(
    url: &str,
    cache_root: impl AsRef<Path>,
    max_size: Option<u64>,
) -> CacheResult<Vec<u8>> {
    read_all_with_config(
        url,
        CacheConfig::default().with_cache_dir(cache_root),
        max_size,
    )
}

/// [`read_all`] with explicit settings
pub fn read_all_with_config(
    url: &str,
    config: CacheConfig,
    max_size: Option<u64>,
) -> CacheResult<Vec<u8>> {
    let mut file = CachedFile::open_with_config(url, config)?;
    let size = file.size();
    let too_large = |max| CacheError::TooLarge {
        url: url.to_string(),
        size,
        max,
    };
    if let Some(max) = max_size
        && size > max
    {
        return Err(too_large(max));
    }
    let len = usize::try_from(size).map_err(|_| too_large(usize::MAX as u64))?;

    let mut buf = vec![0u8; len];
    file.must_read(&mut buf)?;
    file.close()?;
    Ok(buf)
}

/// Current size of a remote or local resource, straight from the origin
pub fn file_size(url: &str) -> CacheResult<u64> {
    let origin = open_origin(url, &rangecache_origin::OriginConfig::default())?;
    Ok(origin.stat()?.size)
}

/// Files making up the cache entry for `url`, empty for local files
///
/// The files are listed whether or not they exist yet.
pub fn cache_files(url: &str, cache_root: impl AsRef<Path>) -> Vec<PathBuf> {
    CacheLocation::for_url(url, cache_root.as_ref())
        .map(|location| location.files())
        .unwrap_or_default()
}

/// Resource size recorded in the cache, without contacting the origin
///
/// Returns `Ok(None)` if `url` is local or has no cache entry.
pub fn size_from_cache(url: &str, cache_root: impl AsRef<Path>) -> CacheResult<Option<u64>> {
    let Some(location) = CacheLocation::for_url(url, cache_root.as_ref()) else {
        return Ok(None);
    };
    let file = match File::open(&location.bitmap) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut data = Vec::with_capacity(HEADER_LEN);
    file.take(HEADER_LEN as u64).read_to_end(&mut data)?;
    let header = BitmapHeader::from_bytes(&data).map_err(|reason| CacheError::CorruptHeader {
        path: location.bitmap.clone(),
        reason,
    })?;
    Ok(Some(header.remote_size))
}

/// Age of the oldest file in the cache entry for `url`
///
/// Returns `Ok(None)` if `url` is local or any cache file is missing.
pub fn cache_age(url: &str, cache_root: impl AsRef<Path>) -> CacheResult<Option<Duration>> {
    let Some(location) = CacheLocation::for_url(url, cache_root.as_ref()) else {
        return Ok(None);
    };

    let mut oldest: Option<SystemTime> = None;
    for path in location.files() {
        let modified = match fs::metadata(&path) {
            Ok(metadata) => metadata.modified()?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        oldest = Some(oldest.map_or(modified, |o| o.min(modified)));
    }

    Ok(oldest.map(|t| t.elapsed().unwrap_or_default()))
}
