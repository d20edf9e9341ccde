// Token cache types

use chrono::Utc;
use serde::Serialize;

/// Current time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Authentication scheme a cached value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AuthKind {
    OAuth,
    Basic,
}

/// Cached credential material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Bare bearer token (OAuth) or full `Basic ...` header value
    pub credential_value: String,
    pub auth_kind: AuthKind,
    pub expires_at_epoch_millis: i64,
}

impl CacheEntry {
    pub fn new(
        credential_value: String,
        auth_kind: AuthKind,
        expires_at_epoch_millis: i64,
    ) -> Self {
        Self {
            credential_value,
            auth_kind,
            expires_at_epoch_millis,
        }
    }

    /// An entry is valid strictly before its expiry instant
    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        self.expires_at_epoch_millis > now_millis
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(now_millis())
    }
}

/// Per-credential-type cache tuning (all values in milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Subtracted from OAuth lifetimes so tokens go stale before the server rejects them
    pub expiry_buffer_millis: i64,

    /// Lifetime of a validated Basic Auth header
    pub default_basic_auth_expiry_millis: i64,

    /// Floor applied to server-reported OAuth lifetimes
    pub minimum_cache_duration_millis: i64,

    /// Period of the background sweep; one sweep serves every credential
    /// type and runs at the shortest configured period
    pub cleanup_interval_millis: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiry_buffer_millis: 60_000,               // 1 minute
            default_basic_auth_expiry_millis: 3_600_000, // 1 hour
            minimum_cache_duration_millis: 300_000,      // 5 minutes
            cleanup_interval_millis: 300_000,            // 5 minutes
        }
    }
}

/// Partial `CacheConfig`; unset fields keep the base value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheConfigOverrides {
    pub expiry_buffer_millis: Option<i64>,
    pub default_basic_auth_expiry_millis: Option<i64>,
    pub minimum_cache_duration_millis: Option<i64>,
    pub cleanup_interval_millis: Option<u64>,
}

impl CacheConfigOverrides {
    /// Apply these overrides on top of `base`
    pub fn merge_over(&self, base: CacheConfig) -> CacheConfig {
        CacheConfig {
            expiry_buffer_millis: self.expiry_buffer_millis.unwrap_or(base.expiry_buffer_millis),
            default_basic_auth_expiry_millis: self
                .default_basic_auth_expiry_millis
                .unwrap_or(base.default_basic_auth_expiry_millis),
            minimum_cache_duration_millis: self
                .minimum_cache_duration_millis
                .unwrap_or(base.minimum_cache_duration_millis),
            cleanup_interval_millis: self
                .cleanup_interval_millis
                .unwrap_or(base.cleanup_interval_millis),
        }
    }
}

/// Entry counts broken down by auth kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KindBreakdown {
    pub oauth: usize,
    pub basic: usize,
}

/// Snapshot of cache contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub active: usize,
    pub expired: usize,
    /// Breakdown of all entries, active or not
    pub by_kind: KindBreakdown,
}
