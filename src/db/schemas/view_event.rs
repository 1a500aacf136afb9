//! View event schema
//!
//! One record per `(content, viewer)` pair. Feeds the seen-set exclusion in
//! the feed materializer and is pruned by the retention job once older than
//! the configured window.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::Metadata;

pub const VIEW_EVENT_COLLECTION: &str = "view_events";

/// A single content view by an actor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewEventDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Viewed content document id
    pub content_id: ObjectId,

    /// Viewer identifier
    pub viewer_id: String,

    /// When the view occurred (retention cutoff field)
    pub occurred_at: DateTime,

    /// Standard metadata (soft delete, timestamps)
    #[serde(default)]
    pub metadata: Metadata,
}

impl IntoIndexes for ViewEventDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // One view record per (content, viewer) pair
            (
                doc! { "content_id": 1, "viewer_id": 1 },
                Some(IndexOptions::builder().unique(true).build()),
            ),
            // Seen-set lookups by viewer
            (doc! { "viewer_id": 1 }, None),
            // Retention cutoff scans
            (doc! { "occurred_at": 1 }, None),
        ]
    }
}
