//! In-process list cache
//!
//! DashMap-backed with Instant-based expiry. Expired entries are evicted
//! lazily on read; rematerialization overwrites them anyway.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

use super::ListCache;
use crate::types::Result;

struct ListEntry {
    values: Vec<String>,
    /// Absent until `set_expiry` is called
    expires_at: Option<Instant>,
}

impl ListEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// DashMap-backed `ListCache`
#[derive(Default)]
pub struct MemoryListCache {
    entries: DashMap<String, ListEntry>,
}

impl MemoryListCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) keys
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ListCache for MemoryListCache {
    async fn delete_key(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn push_list(&self, key: &str, values: &[String]) -> Result<()> {
        let mut entry = self.entries.entry(key.to_string()).or_insert(ListEntry {
            values: Vec::new(),
            expires_at: None,
        });

        // A lingering expired entry is stale state, not a base to append to
        if entry.is_expired() {
            entry.values.clear();
            entry.expires_at = None;
        }

        entry.values.extend(values.iter().cloned());
        Ok(())
    }

    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<()> {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn get_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired() {
                drop(entry);
                self.entries.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.values.clone()));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_then_get_preserves_order() {
        let cache = MemoryListCache::new();
        cache
            .push_list("k", &["a".into(), "b".into()])
            .await
            .unwrap();
        cache.push_list("k", &["c".into()]).await.unwrap();

        let list = cache.get_list("k").await.unwrap().unwrap();
        assert_eq!(list, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_absent_key_is_none_not_empty() {
        let cache = MemoryListCache::new();
        assert!(cache.get_list("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let cache = MemoryListCache::new();
        cache.push_list("k", &["a".into()]).await.unwrap();
        cache.delete_key("k").await.unwrap();
        assert!(cache.get_list("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_absent() {
        let cache = MemoryListCache::new();
        cache.push_list("k", &["a".into()]).await.unwrap();
        cache
            .set_expiry("k", Duration::from_millis(10))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get_list("k").await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_expiry_on_missing_key_is_noop() {
        let cache = MemoryListCache::new();
        cache
            .set_expiry("missing", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(cache.get_list("missing").await.unwrap().is_none());
    }
}
