//! Origin configuration structures
//!
//! Each transport has its own configuration with sensible defaults and
//! validation. [`OriginConfig`] bundles them for [`open_origin`](crate::open_origin).

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP origin configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Whole-request timeout
    pub timeout: Duration,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,

    /// Maximum redirects to follow
    pub max_redirects: usize,

    /// User-Agent header value
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(30),
            max_redirects: 5,
            user_agent: concat!("rangecache/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    /// Create a new HTTP configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout.is_zero() {
            return Err("timeout must be greater than 0".to_string());
        }
        if self.connect_timeout.is_zero() {
            return Err("connect_timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// FTP origin configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FtpConfig {
    /// Timeout for establishing control and data connections
    pub connect_timeout: Duration,

    /// Read/write timeout on both connections
    pub io_timeout: Duration,

    /// Password sent for anonymous logins
    pub anonymous_password: String,
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            io_timeout: Duration::from_secs(60),
            anonymous_password: "rangecache@".to_string(),
        }
    }
}

impl FtpConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.connect_timeout.is_zero() || self.io_timeout.is_zero() {
            return Err("FTP timeouts must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Configuration for every origin type
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OriginConfig {
    /// HTTP/HTTPS settings
    pub http: HttpConfig,
    /// FTP settings
    pub ftp: FtpConfig,
    /// Retry policy for transient network failures
    pub retry: RetryPolicy,
}

impl OriginConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the HTTP configuration
    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Validate all nested configurations
    pub fn validate(&self) -> Result<(), String> {
        self.http.validate()?;
        self.ftp.validate()?;
        if self.retry.multiplier < 1.0 {
            return Err("retry multiplier must be at least 1.0".to_string());
        }
        Ok(())
    }
}
