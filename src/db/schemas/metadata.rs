//! Common metadata for all documents

use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Soft-delete flag and bookkeeping timestamps carried by every document.
///
/// Documents with `is_deleted` set are invisible to reads but stay in place
/// until an out-of-scope cleanup removes them.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Metadata {
    /// Whether this document has been soft-deleted
    #[serde(default)]
    pub is_deleted: bool,

    /// When the document was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,

    /// When the document was last updated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl Metadata {
    /// Fresh metadata with current timestamps
    pub fn new() -> Self {
        Self {
            is_deleted: false,
            created_at: Some(DateTime::now()),
            updated_at: Some(DateTime::now()),
        }
    }
}
