//! Social-graph edge schemas
//!
//! Person follows and group memberships; read via `distinct_values` by the
//! feed materializer. Writes happen in out-of-scope request handlers.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::Metadata;

pub const FOLLOW_COLLECTION: &str = "follows";
pub const GROUP_MEMBER_COLLECTION: &str = "group_members";

/// One actor following another
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// The actor doing the following
    pub follower_id: String,

    /// The actor being followed
    pub followee_id: String,

    /// Standard metadata (soft delete, timestamps)
    #[serde(default)]
    pub metadata: Metadata,
}

impl IntoIndexes for FollowDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "follower_id": 1, "followee_id": 1 },
                Some(IndexOptions::builder().unique(true).build()),
            ),
            (doc! { "followee_id": 1 }, None),
        ]
    }
}

/// One actor's membership in a group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMemberDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// The member actor
    pub member_id: String,

    /// The joined group
    pub group_id: String,

    /// Standard metadata (soft delete, timestamps)
    #[serde(default)]
    pub metadata: Metadata,
}

impl IntoIndexes for GroupMemberDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "member_id": 1, "group_id": 1 },
                Some(IndexOptions::builder().unique(true).build()),
            ),
            (doc! { "group_id": 1 }, None),
        ]
    }
}
