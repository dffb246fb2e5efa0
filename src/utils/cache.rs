//! Caches scoped to one resolver

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ResolveError;
use crate::platform::decipher::DecipherOperations;

/// Default time-to-live for cached player data (10 minutes)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Default number of script versions kept
pub const DEFAULT_CACHE_CAPACITY: u64 = 16;

/// Stable identifier for one player script version.
///
/// Script URLs embed the release id, so hashing the URL separates versions.
pub fn script_version_key(script_url: &str) -> String {
    hex::encode(Sha256::digest(script_url.as_bytes()))
}

/// Extraction outcome remembered for one script version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedDecipher {
    Ready(Arc<DecipherOperations>),
    /// Extraction failed; the version stays unusable until the entry expires
    Unusable(String),
}

/// Per-script-version cache of extraction outcomes and script bodies
#[derive(Clone)]
pub struct DecipherCache {
    /// Script version key -> extraction outcome
    operations: Cache<String, CachedDecipher>,
    /// Script URL -> script text
    scripts: Cache<String, Arc<String>>,
}

impl DecipherCache {
    /// Create a cache with default TTL and capacity
    pub fn new() -> Self {
        Self::with_config(DEFAULT_CACHE_TTL, DEFAULT_CACHE_CAPACITY)
    }

    /// Create a cache with custom TTL and capacity
    pub fn with_config(ttl: Duration, max_capacity: u64) -> Self {
        Self {
            operations: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(max_capacity)
                .build(),
            scripts: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(max_capacity)
                .build(),
        }
    }

    /// Get the outcome recorded for a script version
    pub async fn get_operations(&self, version_key: &str) -> Option<CachedDecipher> {
        self.operations.get(version_key).await
    }

    /// Record the outcome for a script version
    pub async fn set_operations(&self, version_key: &str, outcome: CachedDecipher) {
        self.operations.insert(version_key.to_string(), outcome).await;
    }

    /// Return the recorded outcome, or run `init` to produce it.
    ///
    /// Concurrent callers on a cold key wait for a single `init`. An `Err`
    /// from `init` is handed to every waiter and is not recorded.
    pub async fn get_or_init_operations<F>(
        &self,
        version_key: &str,
        init: F,
    ) -> Result<CachedDecipher, Arc<ResolveError>>
    where
        F: Future<Output = Result<CachedDecipher, ResolveError>>,
    {
        self.operations
            .try_get_with(version_key.to_string(), init)
            .await
    }

    /// Get a cached player script body
    pub async fn get_script(&self, script_url: &str) -> Option<Arc<String>> {
        self.scripts.get(script_url).await
    }

    /// Store a player script body
    pub async fn set_script(&self, script_url: &str, content: Arc<String>) {
        self.scripts.insert(script_url.to_string(), content).await;
    }

    /// Drop every cached entry
    pub fn clear(&self) {
        self.operations.invalidate_all();
        self.scripts.invalidate_all();
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        self.operations.run_pending_tasks().await;
        self.scripts.run_pending_tasks().await;
        CacheStats {
            operation_entries: self.operations.entry_count(),
            script_entries: self.scripts.entry_count(),
        }
    }
}

impl Default for DecipherCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub operation_entries: u64,
    pub script_entries: u64,
}
