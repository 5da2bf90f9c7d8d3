//! Per-handle cache counters

use serde::Serialize;

/// Counters collected by one [`CachedFile`](crate::CachedFile)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Range requests sent to the origin
    pub fetch_requests: u64,
    /// Bytes received from the origin
    pub bytes_fetched: u64,
    /// Bytes returned to the caller
    pub bytes_served: u64,
    /// Times the entry was discarded because the origin changed
    pub invalidations: u64,
}

impl CacheStats {
    /// Bytes served without a matching fetch
    pub fn bytes_saved(&self) -> u64 {
        self.bytes_served.saturating_sub(self.bytes_fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_saved() {
        let stats = CacheStats {
            fetch_requests: 2,
            bytes_fetched: 8192,
            bytes_served: 20_000,
            invalidations: 0,
        };
        assert_eq!(stats.bytes_saved(), 20_000 - 8192);

        let overfetched = CacheStats {
            bytes_fetched: 8192,
            bytes_served: 100,
            ..CacheStats::default()
        };
        assert_eq!(overfetched.bytes_saved(), 0);
    }
}
