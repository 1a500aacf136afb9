//! Scoring engine
//!
//! Scans content in keyset-paginated batches and enqueues score updates
//! through the coalescer's update path, one bulk dispatch per page.

use bson::{doc, oid::ObjectId, Document};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::coalescer::{BatchCoalescer, WriteIntent};
use crate::db::mongo::MongoCollection;
use crate::db::schemas::{ContentDoc, CONTENT_COLLECTION};
use crate::scoring::{popularity_score, EngagementCounters};
use crate::types::Result;

/// Outcome summary of one scoring pass
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringStats {
    /// Records scanned and rescored
    pub scanned: u64,
    /// Pages fetched
    pub pages: u64,
}

/// Recomputes popularity scores over recently created content
pub struct ScoringEngine {
    content: MongoCollection<ContentDoc>,
    coalescer: Arc<BatchCoalescer>,
}

impl ScoringEngine {
    pub fn new(content: MongoCollection<ContentDoc>, coalescer: Arc<BatchCoalescer>) -> Self {
        Self { content, coalescer }
    }

    /// Rescore all content created within `lookback`.
    ///
    /// Pages are processed sequentially so the `_id` cursor stays
    /// well-defined; each page's updates go out as one coalesced bulk call.
    /// A failed page update is contained by the coalescer and the scan
    /// continues with the next page.
    pub async fn recompute_scores(
        &self,
        lookback: Duration,
        batch_size: usize,
    ) -> Result<ScoringStats> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(lookback)
                .unwrap_or_else(|_| chrono::Duration::hours(48));
        let filter = doc! { "created_at": { "$gte": bson::DateTime::from_chrono(cutoff) } };

        let stats = self.score_scan(filter, batch_size).await?;
        info!(
            "Scoring pass complete: {} records over {} pages",
            stats.scanned, stats.pages
        );
        Ok(stats)
    }

    /// Rescore one page of keyword-tagged content (synthetic refresh).
    ///
    /// Deliberately bounded: exactly one keyset page of `batch_size`, not a
    /// full tag scan. Periodic triggers rotate through the tag's content as
    /// scores shift its ranked order between runs.
    pub async fn refresh_keyword_batch(
        &self,
        keyword: &str,
        batch_size: usize,
    ) -> Result<ScoringStats> {
        let filter = doc! { "tags": keyword };
        let page = self.content.find_page(filter, None, batch_size).await?;

        let mut stats = ScoringStats::default();
        if !page.is_empty() {
            stats.scanned = enqueue_score_updates(&self.coalescer, &page).await;
            stats.pages = 1;
            self.coalescer.flush().await;
        }

        info!(
            "Keyword refresh '{}' complete: {} records rescored",
            keyword, stats.scanned
        );
        Ok(stats)
    }

    /// Keyset scan over `filter`, enqueueing one score update per record.
    async fn score_scan(&self, filter: Document, batch_size: usize) -> Result<ScoringStats> {
        let mut stats = ScoringStats::default();
        let mut after_id = None;

        loop {
            let page = self
                .content
                .find_page(filter.clone(), after_id, batch_size)
                .await?;

            if page.is_empty() {
                break;
            }

            stats.scanned += enqueue_score_updates(&self.coalescer, &page).await;

            // One bulk dispatch per page; a failure here is logged by the
            // coalescer and must not stop the remaining pages
            self.coalescer.flush().await;

            stats.pages += 1;
            debug!("Scored page {} ({} records)", stats.pages, page.len());

            match next_cursor(&page, batch_size) {
                Some(cursor) => after_id = Some(cursor),
                None => break,
            }
        }

        Ok(stats)
    }
}

/// Enqueue one score update per record, keyed by `_id` so repeat scans of
/// the same record collapse. Records without an id are skipped. Returns the
/// number enqueued.
async fn enqueue_score_updates(coalescer: &Arc<BatchCoalescer>, page: &[ContentDoc]) -> u64 {
    let now = Utc::now();
    let mut enqueued = 0;

    for record in page {
        let Some(id) = record.id else { continue };

        let age_ms = (now - record.created_at.to_chrono()).num_milliseconds();
        let age_hours = age_ms.max(0) as f64 / 3_600_000.0;
        let score = popularity_score(&EngagementCounters::from(record), age_hours);

        let payload = doc! {
            "filter": { "_id": id },
            "update": { "$set": {
                "popularity_score": score,
                "score_updated_at": bson::DateTime::now(),
            }},
        };
        coalescer
            .enqueue(WriteIntent::update(CONTENT_COLLECTION, id.to_hex(), payload))
            .await;

        enqueued += 1;
    }

    enqueued
}

/// Cursor for the page after this one, or `None` when the scan should stop.
///
/// A short page means the result set is exhausted. A full page advances to
/// the last record that actually carries an id; if none do, the cursor
/// cannot move forward and the scan stops rather than restarting from the
/// beginning.
fn next_cursor(page: &[ContentDoc], batch_size: usize) -> Option<ObjectId> {
    if page.len() < batch_size {
        return None;
    }
    page.iter().rev().find_map(|record| record.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coalescer::{CoalescerConfig, FlushHandler, OpKind};
    use crate::db::schemas::Metadata;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    struct BatchRecorder {
        sizes: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl FlushHandler for BatchRecorder {
        async fn apply(&self, _kind: OpKind, _group: &str, payloads: Vec<Document>) -> Result<()> {
            self.sizes.lock().await.push(payloads.len());
            Ok(())
        }
    }

    fn make_record(id: Option<ObjectId>) -> ContentDoc {
        ContentDoc {
            id,
            author_id: "author-1".into(),
            group_id: None,
            title: "post".into(),
            tags: vec!["featured".into()],
            created_at: bson::DateTime::now(),
            view_count: 10,
            upvote_count: 2,
            downvote_count: 0,
            comment_count: 1,
            save_count: 0,
            popularity_score: 0.0,
            score_updated_at: None,
            metadata: Metadata::new(),
        }
    }

    #[tokio::test]
    async fn test_full_page_dispatches_as_one_bulk_batch() {
        let recorder = Arc::new(BatchRecorder {
            sizes: Mutex::new(Vec::new()),
        });
        // Buffer sized for the page, as the worker wiring guarantees
        let coalescer = Arc::new(
            crate::coalescer::BatchCoalescer::new(CoalescerConfig {
                max_operations: 500,
                flush_delay: Duration::from_secs(60),
            })
            .with_handler(OpKind::Update, CONTENT_COLLECTION, recorder.clone()),
        );

        let page: Vec<ContentDoc> = (0..500).map(|_| make_record(Some(ObjectId::new()))).collect();
        let enqueued = enqueue_score_updates(&coalescer, &page).await;
        assert_eq!(enqueued, 500);

        coalescer.flush().await;
        assert_eq!(*recorder.sizes.lock().await, vec![500]);
    }

    #[tokio::test]
    async fn test_records_without_ids_are_skipped() {
        let coalescer = Arc::new(crate::coalescer::BatchCoalescer::new(CoalescerConfig {
            max_operations: 100,
            flush_delay: Duration::from_secs(60),
        }));

        let page = vec![
            make_record(Some(ObjectId::new())),
            make_record(None),
            make_record(Some(ObjectId::new())),
        ];
        let enqueued = enqueue_score_updates(&coalescer, &page).await;
        assert_eq!(enqueued, 2);
        assert_eq!(coalescer.pending_len().await, 2);
    }

    #[test]
    fn test_next_cursor_skips_trailing_record_without_id() {
        let keeper = ObjectId::new();
        let page = vec![
            make_record(Some(ObjectId::new())),
            make_record(Some(keeper)),
            make_record(None),
        ];
        assert_eq!(next_cursor(&page, 3), Some(keeper));
    }

    #[test]
    fn test_next_cursor_stops_on_short_page() {
        let page = vec![make_record(Some(ObjectId::new()))];
        assert_eq!(next_cursor(&page, 3), None);
    }

    #[test]
    fn test_next_cursor_stops_when_no_record_has_id() {
        // A full page with no usable cursor must end the scan, not restart it
        let page = vec![make_record(None), make_record(None)];
        assert_eq!(next_cursor(&page, 2), None);
    }
}
