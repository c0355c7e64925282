//! Result cache interface and fail-open adapter
//!
//! The querier talks to the cache backend through [`ResultCache`]. Backends
//! (in-memory, Redis, disk) live outside this crate. [`FailOpenCache`] wraps
//! a backend so that every failure degrades into a miss or a skipped
//! write-back:
//!
//! ```text
//! retrieve ── Ok(data) ─────────► Some(bytes)
//!          ── Ok(no data) ──────► None
//!          ── Err(e) ── log ────► None
//! ```

pub mod keys;

use crate::error::CacheError;
use crate::metrics;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

pub use keys::{CacheKeyGenerator, CacheKeys, DefaultKeyGenerator};

/// Informational outcome of a cache retrieve
///
/// Reported for diagnostics only. Control flow relies solely on whether
/// data came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetrieveStatus {
    /// Entry found and fresh
    Hit,
    /// Entry found but covers only part of what was asked
    PartialHit,
    /// Entry exists but not for the requested range
    RangeMiss,
    /// No entry under the key
    KeyMiss,
    /// Stale entry returned after revalidation
    Revalidated,
    /// Backend failed
    Error,
}

impl fmt::Display for RetrieveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RetrieveStatus::Hit => "hit",
            RetrieveStatus::PartialHit => "partial hit",
            RetrieveStatus::RangeMiss => "range miss",
            RetrieveStatus::KeyMiss => "key miss",
            RetrieveStatus::Revalidated => "revalidated",
            RetrieveStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Data returned by a cache retrieve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieved {
    /// Payload, `None` on a miss
    pub data: Option<Vec<u8>>,
    /// Backend-reported status
    pub status: RetrieveStatus,
}

impl Retrieved {
    /// Hit carrying `data`
    pub fn hit(data: Vec<u8>) -> Self {
        Self {
            data: Some(data),
            status: RetrieveStatus::Hit,
        }
    }

    /// Miss for an unknown key
    pub fn miss() -> Self {
        Self {
            data: None,
            status: RetrieveStatus::KeyMiss,
        }
    }
}

/// Cache backend used for range results
///
/// Implementations must be safe to call concurrently from many sub-query
/// workers. No locking or transactions are expected across calls.
#[async_trait]
pub trait ResultCache: Send + Sync + 'static {
    /// Fetch the payload stored under `key`
    ///
    /// With `allow_stale` the backend may return expired entries; the
    /// querier re-derives coverage from the payload itself.
    async fn retrieve(&self, key: &str, allow_stale: bool) -> Result<Retrieved, CacheError>;

    /// Store `data` under `key` for `ttl`
    async fn store(&self, key: &str, data: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
}

/// Adapter that turns every cache failure into a miss
#[derive(Clone)]
pub struct FailOpenCache {
    inner: Arc<dyn ResultCache>,
}

impl FailOpenCache {
    /// Wrap a cache backend
    pub fn new(inner: Arc<dyn ResultCache>) -> Self {
        Self { inner }
    }

    /// Fetch a payload, collapsing errors and misses into `None`
    pub async fn fetch(&self, key: &str) -> Option<Vec<u8>> {
        match self.inner.retrieve(key, true).await {
            Ok(Retrieved { data, status }) => {
                debug!(cache_key = key, status = %status, "cache retrieve status");
                metrics::record_cache_retrieve(if data.is_some() { "hit" } else { "miss" });
                data
            },
            Err(e) => {
                warn!(cache_key = key, error = %e, "cache retrieve failed, treating as miss");
                metrics::record_cache_retrieve("error");
                None
            },
        }
    }

    /// Store a payload; failures are logged and dropped
    pub async fn write_back(&self, key: &str, data: Vec<u8>, ttl: Duration) {
        match self.inner.store(key, data, ttl).await {
            Ok(()) => {
                debug!(cache_key = key, ttl_secs = ttl.as_secs(), "cached merged series");
                metrics::record_cache_write_back("stored");
            },
            Err(e) => {
                error!(cache_key = key, error = %e, "error storing merged series");
                metrics::record_cache_write_back("store_error");
            },
        }
    }
}

impl fmt::Debug for FailOpenCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailOpenCache").finish_non_exhaustive()
    }
}
