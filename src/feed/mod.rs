//! Feed materialization
//!
//! Computes a ranked candidate set per actor from social-graph signals and
//! replaces that actor's cache entry with it. Actors who follow nobody and
//! belong to no group get their entry deleted rather than a fallback feed;
//! that is a deliberate product decision (it also means no cold-start
//! recommendations).
//!
//! Replacement is not transactional across concurrent runs for one actor:
//! last writer wins, and the staleness window is bounded by the entry TTL.

use bson::{doc, Bson};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::cache::{feed_key, ListCache};
use crate::db::mongo::MongoCollection;
use crate::db::schemas::{ContentDoc, FollowDoc, GroupMemberDoc, ViewEventDoc};
use crate::logging::{EventKind, EventLog};
use crate::types::Result;

/// Feed tuning knobs
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Maximum ids in a materialized feed
    pub limit: usize,
    /// Cache entry time-to-live
    pub ttl: Duration,
    /// Oldest content age eligible for feeds
    pub max_age: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            ttl: Duration::from_secs(900),
            max_age: Duration::from_secs(14 * 24 * 3600),
        }
    }
}

/// Materializes ranked per-actor feeds into the cache
pub struct FeedMaterializer {
    follows: MongoCollection<FollowDoc>,
    members: MongoCollection<GroupMemberDoc>,
    views: MongoCollection<ViewEventDoc>,
    content: MongoCollection<ContentDoc>,
    cache: Arc<dyn ListCache>,
    config: FeedConfig,
    events: EventLog,
}

impl FeedMaterializer {
    pub fn new(
        follows: MongoCollection<FollowDoc>,
        members: MongoCollection<GroupMemberDoc>,
        views: MongoCollection<ViewEventDoc>,
        content: MongoCollection<ContentDoc>,
        cache: Arc<dyn ListCache>,
        config: FeedConfig,
    ) -> Self {
        Self {
            follows,
            members,
            views,
            content,
            cache,
            config,
            events: EventLog::disabled("feed"),
        }
    }

    /// Attach the observability event log
    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    /// Recompute and replace one actor's cached feed.
    ///
    /// Returns the number of ids written (0 when the entry was deleted).
    pub async fn materialize_feed(&self, actor_id: &str) -> Result<usize> {
        let key = feed_key(actor_id);

        // The three lookups have no ordering dependency
        let (followed, groups, seen) = tokio::join!(
            self.follows
                .distinct_values("followee_id", doc! { "follower_id": actor_id }),
            self.members
                .distinct_values("group_id", doc! { "member_id": actor_id }),
            self.views
                .distinct_values("content_id", doc! { "viewer_id": actor_id }),
        );
        let followed = followed?;
        let groups = groups?;
        let seen = seen?;

        if followed.is_empty() && groups.is_empty() {
            // No follow signals means no feed, not a generic one
            self.cache.delete_key(&key).await?;
            debug!("Actor {} follows nothing; feed cache entry removed", actor_id);
            self.events
                .emit(
                    self.events
                        .event(EventKind::FeedMaterialized)
                        .with_job(actor_id.to_string())
                        .with_count(0),
                )
                .await;
            return Ok(0);
        }

        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.max_age)
                .unwrap_or_else(|_| chrono::Duration::days(14));

        let filter = doc! {
            "$or": [
                { "author_id": { "$in": followed.clone() } },
                { "group_id": { "$in": groups.clone() } },
            ],
            "_id": { "$nin": seen.clone() },
            "created_at": { "$gte": bson::DateTime::from_chrono(cutoff) },
        };

        let candidates = self
            .content
            .find_ranked(filter, doc! { "popularity_score": -1 }, self.config.limit)
            .await?;

        let seen_hex: HashSet<String> = seen
            .iter()
            .filter_map(|b| match b {
                Bson::ObjectId(oid) => Some(oid.to_hex()),
                _ => None,
            })
            .collect();

        let pairs: Vec<(String, f64)> = candidates
            .iter()
            .filter_map(|c| c.id.map(|id| (id.to_hex(), c.popularity_score)))
            .collect();

        // Invariant: the written feed never contains a seen id and never
        // exceeds the limit, regardless of what the query returned
        let ids = rank_candidates(pairs, &seen_hex, self.config.limit);

        // Delete before repopulate so a reader never sees old and new ids
        // mixed; the brief absent-entry window reads as "no cached feed"
        self.cache.delete_key(&key).await?;
        if !ids.is_empty() {
            self.cache.push_list(&key, &ids).await?;
            self.cache.set_expiry(&key, self.config.ttl).await?;
        }

        info!("Materialized feed for {} with {} ids", actor_id, ids.len());
        self.events
            .emit(
                self.events
                    .event(EventKind::FeedMaterialized)
                    .with_job(actor_id.to_string())
                    .with_count(ids.len() as u64),
            )
            .await;

        Ok(ids.len())
    }
}

/// Order candidates by score descending, drop seen ids, cap at `limit`.
pub fn rank_candidates(
    mut candidates: Vec<(String, f64)>,
    seen: &HashSet<String>,
    limit: usize,
) -> Vec<String> {
    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    candidates
        .into_iter()
        .filter(|(id, _)| !seen.contains(id))
        .map(|(id, _)| id)
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, f64)]) -> Vec<(String, f64)> {
        items.iter().map(|(id, s)| (id.to_string(), *s)).collect()
    }

    #[test]
    fn test_rank_orders_by_score_descending() {
        let ranked = rank_candidates(
            pairs(&[("a", 1.0), ("b", 9.5), ("c", 4.2)]),
            &HashSet::new(),
            10,
        );
        assert_eq!(ranked, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_rank_excludes_seen_ids() {
        let seen: HashSet<String> = ["b".to_string()].into();
        let ranked = rank_candidates(pairs(&[("a", 1.0), ("b", 9.5)]), &seen, 10);
        assert_eq!(ranked, vec!["a"]);
    }

    #[test]
    fn test_rank_respects_limit() {
        let ranked = rank_candidates(
            pairs(&[("a", 3.0), ("b", 2.0), ("c", 1.0)]),
            &HashSet::new(),
            2,
        );
        assert_eq!(ranked, vec!["a", "b"]);
    }

    #[test]
    fn test_negative_scores_still_rank() {
        let ranked = rank_candidates(pairs(&[("a", -2.0), ("b", -0.5)]), &HashSet::new(), 10);
        assert_eq!(ranked, vec!["b", "a"]);
    }
}
