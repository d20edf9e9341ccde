// Token cache storage, registries and background sweep

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::types::{
    now_millis, AuthKind, CacheConfig, CacheConfigOverrides, CacheEntry, CacheStats,
};
use crate::auth::CredentialRecord;

/// Derives a cache key from a credential record
pub type KeyGenerator = Arc<dyn Fn(&CredentialRecord) -> String + Send + Sync>;

/// Default key derivation: `{base_url}-{username}`
pub fn default_cache_key(record: &CredentialRecord) -> String {
    format!(
        "{}-{}",
        record.base_url.as_deref().unwrap_or("unknown"),
        record.username.as_deref().unwrap_or("anonymous")
    )
}

/// Process-wide store of cached credential material
///
/// Entries live in a sharded map so replacement is atomic for concurrent
/// readers. The key-generator and config registries are each behind their
/// own lock. No method ever fails: missing or expired keys read as absent.
pub struct TokenCache {
    /// Cached entries indexed by derived key
    entries: DashMap<String, CacheEntry>,

    /// Custom key derivation per credential type
    key_generators: RwLock<HashMap<String, KeyGenerator>>,

    /// Merged config per credential type
    configs: RwLock<HashMap<String, CacheConfig>>,

    /// Config for unregistered credential types
    default_config: CacheConfig,

    /// Background sweep task, if running
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

impl TokenCache {
    /// Create an empty cache with default tuning
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Create an empty cache with the given default tuning
    pub fn with_config(default_config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            key_generators: RwLock::new(HashMap::new()),
            configs: RwLock::new(HashMap::new()),
            default_config,
            cleanup_task: Mutex::new(None),
        }
    }

    /// Install a key generator for a credential type; last registration wins
    pub fn register_key_generator<F>(&self, credential_type: impl Into<String>, generator: F)
    where
        F: Fn(&CredentialRecord) -> String + Send + Sync + 'static,
    {
        let credential_type = credential_type.into();
        tracing::debug!("Registering key generator for credential type '{}'", credential_type);
        self.key_generators
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(credential_type, Arc::new(generator));
    }

    /// Merge overrides over the default config and store it for a credential type
    pub fn register_cache_config(
        &self,
        credential_type: impl Into<String>,
        overrides: CacheConfigOverrides,
    ) {
        let credential_type = credential_type.into();
        let config = overrides.merge_over(self.default_config);
        tracing::debug!(
            "Registering cache config for credential type '{}': {:?}",
            credential_type,
            config
        );
        self.configs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(credential_type, config);
    }

    /// Effective config for a credential type
    pub fn cache_config(&self, credential_type: &str) -> CacheConfig {
        self.configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(credential_type)
            .copied()
            .unwrap_or(self.default_config)
    }

    /// Sweep period: the shortest interval across the default and every
    /// registered config. Read once when the sweep starts.
    pub fn cleanup_interval(&self) -> Duration {
        let millis = self
            .configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|config| config.cleanup_interval_millis)
            .fold(self.default_config.cleanup_interval_millis, u64::min);
        Duration::from_millis(millis.max(1))
    }

    /// Derive the cache key for a record under a credential type
    pub fn derive_key(&self, credential_type: &str, record: &CredentialRecord) -> String {
        let generator = self
            .key_generators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(credential_type)
            .cloned();

        // Generator runs outside the registry lock
        match generator {
            Some(generator) => generator(record),
            None => default_cache_key(record),
        }
    }

    /// Get a fresh entry; an expired entry is removed and reads as absent
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = now_millis();

        match self.entries.get(key) {
            None => return None,
            Some(entry) if entry.is_valid_at(now) => return Some(entry.value().clone()),
            Some(_) => {}
        }

        // Only remove if still expired; a concurrent set may have replaced it
        if self
            .entries
            .remove_if(key, |_, entry| !entry.is_valid_at(now))
            .is_some()
        {
            tracing::debug!("Removed expired cache entry: {}", key);
        }
        None
    }

    /// Insert or fully replace an entry
    pub fn set(&self, key: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(key.into(), entry);
    }

    /// Remove an entry, returning whether one existed
    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Whether a fresh entry exists for the key
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// All stored keys, expired or not
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Build an OAuth entry; lifetime is floored at the minimum duration, then
    /// shortened by the expiry buffer
    pub fn create_oauth_entry(
        &self,
        credential_type: &str,
        token: impl Into<String>,
        expires_in_secs: u64,
    ) -> CacheEntry {
        let config = self.cache_config(credential_type);
        let reported_millis = i64::try_from(expires_in_secs)
            .unwrap_or(i64::MAX / 1000)
            .saturating_mul(1000);
        let lifetime = reported_millis.max(config.minimum_cache_duration_millis);
        let expires_at = now_millis()
            .saturating_add(lifetime)
            .saturating_sub(config.expiry_buffer_millis);

        CacheEntry::new(token.into(), AuthKind::OAuth, expires_at)
    }

    /// Build a Basic Auth entry with the fixed default lifetime
    pub fn create_basic_auth_entry(
        &self,
        credential_type: &str,
        header_value: impl Into<String>,
    ) -> CacheEntry {
        let config = self.cache_config(credential_type);
        let expires_at = now_millis().saturating_add(config.default_basic_auth_expiry_millis);

        CacheEntry::new(header_value.into(), AuthKind::Basic, expires_at)
    }

    /// Remove every expired entry, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let now = now_millis();
        let mut removed = 0;

        self.entries.retain(|_, entry| {
            let keep = entry.is_valid_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            tracing::debug!(
                "Token cache cleanup: removed {} expired entries, {} remaining",
                removed,
                self.entries.len()
            );
        }
        removed
    }

    /// Counts of total, active and expired entries
    pub fn stats(&self) -> CacheStats {
        let now = now_millis();
        let mut stats = CacheStats::default();

        for entry in self.entries.iter() {
            stats.total += 1;
            if entry.is_valid_at(now) {
                stats.active += 1;
            } else {
                stats.expired += 1;
            }
            match entry.auth_kind {
                AuthKind::OAuth => stats.by_kind.oauth += 1,
                AuthKind::Basic => stats.by_kind.basic += 1,
            }
        }

        stats
    }

    /// Start the periodic sweep on the current tokio runtime
    ///
    /// The task holds a weak reference, so dropping the last `Arc` ends it.
    /// Returns false if a sweep is already running or no runtime is available.
    pub fn start_cleanup(self: &Arc<Self>) -> bool {
        let mut slot = self.cleanup_task.lock().unwrap_or_else(PoisonError::into_inner);

        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!("No tokio runtime available, token cache cleanup not started");
                return false;
            }
        };

        let period = self.cleanup_interval();
        let cache = Arc::downgrade(self);

        *slot = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match cache.upgrade() {
                    Some(cache) => {
                        cache.cleanup_expired();
                    }
                    None => break,
                }
            }
        }));

        tracing::debug!("Token cache cleanup started (every {:?})", period);
        true
    }

    /// Stop the periodic sweep; returns whether one was running
    pub fn stop_cleanup(&self) -> bool {
        let handle = self
            .cleanup_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match handle {
            Some(handle) => {
                handle.abort();
                tracing::debug!("Token cache cleanup stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_cleanup_running(&self) -> bool {
        self.cleanup_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the sweep and drop every entry
    pub fn shutdown(&self) {
        self.stop_cleanup();
        self.clear();
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TokenCache {
    fn drop(&mut self) {
        let slot = self.cleanup_task.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}
