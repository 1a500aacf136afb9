//! View event retention
//!
//! Deletes view events older than the retention window in one
//! delete-by-filter call. Pure cleanup with no per-row side effects, so no
//! pagination; running twice in a row deletes nothing the second time.

use bson::{doc, Document};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::info;

use crate::db::mongo::MongoCollection;
use crate::db::schemas::ViewEventDoc;
use crate::types::Result;

/// Filter matching view events that occurred strictly before `cutoff`.
///
/// Strict `$lt`: an event stamped exactly at the cutoff survives, and a
/// second pass with the same cutoff matches nothing that the first deleted.
pub fn expiry_filter(cutoff: DateTime<Utc>) -> Document {
    doc! { "occurred_at": { "$lt": bson::DateTime::from_chrono(cutoff) } }
}

/// Prunes expired interaction records
pub struct RetentionJob {
    views: MongoCollection<ViewEventDoc>,
}

impl RetentionJob {
    pub fn new(views: MongoCollection<ViewEventDoc>) -> Self {
        Self { views }
    }

    /// Delete all view events that occurred before `now - max_age`.
    ///
    /// Returns the number deleted for observability.
    pub async fn prune_expired(&self, max_age: Duration) -> Result<u64> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::days(30));

        let deleted = self.views.delete_many(expiry_filter(cutoff)).await?;

        info!("Retention pass deleted {} expired view events", deleted);
        Ok(deleted)
    }
}
