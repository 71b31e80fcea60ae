/// Caller name lookup cache
///
/// Durable, TTL-checked mapping from phone key to the caller name the
/// provider last returned, with per-key fetch coalescing.
pub mod cache;

pub use cache::LookupCache;

use crate::phone::PhoneKey;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Cached caller name entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: PhoneKey,
    pub resolved_name: String,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Entry is live when its age does not exceed `ttl`
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.fetched_at <= ttl
    }
}
