//! Content record schema
//!
//! The scored entity: engagement counters plus the derived popularity score.
//! Counters are owned by the (out-of-scope) ingestion handlers; the score is
//! mutated only through bulk updates emitted by the scoring engine or the
//! coalescer.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::Metadata;

pub const CONTENT_COLLECTION: &str = "content";

/// A piece of user-submitted content with engagement counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentDoc {
    /// MongoDB document ID; also the keyset pagination cursor
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Author identifier
    pub author_id: String,

    /// Owning group, if posted into one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    /// Title
    pub title: String,

    /// Keyword tags for filtering and synthetic refresh batches
    #[serde(default)]
    pub tags: Vec<String>,

    /// Original creation timestamp (drives score decay)
    pub created_at: DateTime,

    /// Raw engagement counters
    #[serde(default)]
    pub view_count: i64,
    #[serde(default)]
    pub upvote_count: i64,
    #[serde(default)]
    pub downvote_count: i64,
    #[serde(default)]
    pub comment_count: i64,
    #[serde(default)]
    pub save_count: i64,

    /// Derived time-decayed popularity score.
    /// May be negative when downvotes dominate; no clamping.
    #[serde(default)]
    pub popularity_score: f64,

    /// When the score was last recomputed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_updated_at: Option<DateTime>,

    /// Standard metadata (soft delete, timestamps)
    #[serde(default)]
    pub metadata: Metadata,
}

impl IntoIndexes for ContentDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Scoring engine lookback window
            (doc! { "created_at": -1 }, None),
            // Feed candidate queries by author / group, ranked by score
            (doc! { "author_id": 1, "popularity_score": -1 }, None),
            (doc! { "group_id": 1, "popularity_score": -1 }, None),
            // Keyword refresh batches
            (doc! { "tags": 1 }, None),
        ]
    }
}
