//! rangecache command-line entry point.
//!
//! This is a thin wrapper around the rangecache library that:
//! 1. Parses command-line arguments
//! 2. Initializes logging
//! 3. Runs one cache operation
//!
//! For library usage, see the rangecache crate documentation.

use anyhow::{Context, Result, ensure};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rangecache::{
    CacheConfig, CachedFile, OriginConfig, RetryPolicy, cache_age, cleanup_report,
    config::{DEFAULT_BLOCK_SIZE, default_cache_dir},
    file_size, size_from_cache,
};
use std::{
    io::{self, Write},
    path::PathBuf,
    time::Duration,
};

/// Bytes requested per read while streaming to stdout
const CAT_CHUNK: usize = 4 * 1024 * 1024;

/// Random access to large remote files through a local block cache
#[derive(Debug, Parser)]
#[command(name = "rangecache", version)]
struct Cli {
    /// Cache root directory
    #[arg(long, env = "RANGECACHE_DIR", global = true)]
    cache_dir: Option<PathBuf>,

    /// Block size for newly created cache entries
    #[arg(long, env = "RANGECACHE_BLOCK_SIZE", default_value_t = DEFAULT_BLOCK_SIZE, global = true)]
    block_size: u64,

    /// Seconds between staleness checks against the origin
    #[arg(long, env = "RANGECACHE_CACHE_TIMEOUT", default_value_t = 60, global = true)]
    cache_timeout_secs: u64,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a byte range of a resource to stdout
    Cat {
        /// URL or local path
        url: String,
        /// First byte to write
        #[arg(long, default_value_t = 0)]
        offset: u64,
        /// Number of bytes to write (default: to end of file)
        #[arg(long)]
        length: Option<u64>,
    },
    /// Print the size of a resource in bytes
    Size {
        /// URL or local path
        url: String,
        /// Read the size from the cache without contacting the origin
        #[arg(long)]
        cached: bool,
    },
    /// Show cache coverage for a resource
    Info {
        /// URL or local path
        url: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove cache entries unused for longer than a number of days
    Cleanup {
        /// Maximum age in days; fractions are allowed
        #[arg(long, default_value_t = 7.0)]
        max_age_days: f64,
        /// Report what would be removed without deleting anything
        #[arg(long)]
        test_only: bool,
    },
}

impl Cli {
    fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }

    fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_cache_dir(self.cache_dir())
            .with_block_size(self.block_size)
            .with_cache_timeout(Duration::from_secs(self.cache_timeout_secs))
            .with_origin(OriginConfig::new().with_retry(RetryPolicy::from_env()))
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = cli.cache_config();
    config.validate().map_err(anyhow::Error::msg)?;

    match &cli.command {
        Command::Cat {
            url,
            offset,
            length,
        } => cat(url, config, *offset, *length),
        Command::Size { url, cached } => {
            let size = if *cached {
                size_from_cache(url, &config.cache_dir)?
                    .with_context(|| format!("no cache entry for {url}"))?
            } else {
                file_size(url)?
            };
            println!("{size}");
            Ok(())
        }
        Command::Info { url, json } => info(url, config, *json),
        Command::Cleanup {
            max_age_days,
            test_only,
        } => {
            let max_age = max_age_from_days(*max_age_days)?;
            let report = cleanup_report(&config.cache_dir, max_age, *test_only)?;
            let verb = if report.removed { "Removed" } else { "Would remove" };
            println!(
                "{verb} {} entries, {} bytes",
                report.entries, report.bytes
            );
            Ok(())
        }
    }
}

/// Convert a `--max-age-days` value to a duration
fn max_age_from_days(days: f64) -> Result<Duration> {
    ensure!(
        days.is_finite() && days >= 0.0,
        "max age must be a non-negative number of days"
    );
    Duration::try_from_secs_f64(days * 86_400.0)
        .with_context(|| format!("max age of {days} days is out of range"))
}

fn cat(url: &str, config: CacheConfig, offset: u64, length: Option<u64>) -> Result<()> {
    let mut file =
        CachedFile::open_with_config(url, config).with_context(|| format!("opening {url}"))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut buf = vec![0u8; CAT_CHUNK];
    let mut pos = offset;
    let mut remaining = length.unwrap_or(u64::MAX);

    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = file
            .read_at(pos, &mut buf[..want])
            .with_context(|| format!("reading {url} at offset {pos}"))?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
        pos += n as u64;
        remaining -= n as u64;
    }
    out.flush()?;

    let stats = file.stats();
    tracing::debug!(
        fetches = stats.fetch_requests,
        bytes_fetched = stats.bytes_fetched,
        bytes_served = stats.bytes_served,
        bytes_saved = stats.bytes_saved(),
        "cat finished"
    );
    file.close()?;
    Ok(())
}

fn info(url: &str, config: CacheConfig, json: bool) -> Result<()> {
    let cache_root = config.cache_dir.clone();
    let file =
        CachedFile::open_with_config(url, config).with_context(|| format!("opening {url}"))?;
    let info = file.info();

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let modified = DateTime::<Utc>::from_timestamp(info.modified, 0)
        .map_or_else(|| info.modified.to_string(), |t| t.to_rfc3339());
    println!("url:          {}", info.url);
    match &info.cache_dir {
        Some(dir) => println!("cache dir:    {}", dir.display()),
        None => println!("cache dir:    (local file, not cached)"),
    }
    println!("size:         {} bytes", info.size);
    println!("modified:     {modified}");
    println!("block size:   {} bytes", info.block_size);
    println!(
        "cached:       {}/{} blocks, {} bytes",
        info.blocks_cached, info.blocks_total, info.cached_bytes
    );
    if let Some(age) = cache_age(url, &cache_root)? {
        println!("cache age:    {}s", age.as_secs());
    }
    Ok(())
}
