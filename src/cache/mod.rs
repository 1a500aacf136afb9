//! Fast-read cache for materialized feeds
//!
//! The core writes feeds through the narrow `ListCache` contract
//! (delete / push / expire). The shipped implementation is in-process
//! (`MemoryListCache`); a broker-backed one can be slotted in without
//! touching the materializer.

pub mod memory;

pub use memory::MemoryListCache;

use async_trait::async_trait;
use std::time::Duration;

use crate::types::Result;

/// Cache key for an actor's materialized feed
pub fn feed_key(actor_id: &str) -> String {
    format!("feed:user:{actor_id}")
}

/// Ordered-list cache with per-key TTL.
///
/// An absent key means "no cached feed", which readers treat differently
/// from an empty list.
#[async_trait]
pub trait ListCache: Send + Sync {
    /// Remove a key and its list
    async fn delete_key(&self, key: &str) -> Result<()>;

    /// Append values to the list at `key`, creating it if absent
    async fn push_list(&self, key: &str, values: &[String]) -> Result<()>;

    /// Set the key's time-to-live; no-op if the key is absent
    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Read the full list, or `None` if absent or expired
    async fn get_list(&self, key: &str) -> Result<Option<Vec<String>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_key_format() {
        assert_eq!(feed_key("actor-9"), "feed:user:actor-9");
    }
}
