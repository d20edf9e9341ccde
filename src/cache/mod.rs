// Token cache module
// Keyed, expiring store of OAuth tokens and Basic Auth headers

mod store;
mod types;

pub use store::{default_cache_key, KeyGenerator, TokenCache};
pub use types::{
    now_millis, AuthKind, CacheConfig, CacheConfigOverrides, CacheEntry, CacheStats, KindBreakdown,
};
