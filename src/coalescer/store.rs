//! Store-backed flush handlers
//!
//! Bridges flush groups to grouped MongoDB writes. Payloads on the update
//! path carry `{ "filter": {...}, "update": {...} }` pairs, one per record.

use async_trait::async_trait;
use bson::Document;
use tracing::{debug, warn};

use super::{FlushHandler, OpKind};
use crate::db::mongo::{BulkUpdateOp, MongoCollection};
use crate::db::schemas::ContentDoc;
use crate::types::{Result, UndercurrentError};

/// Applies coalesced update groups to the content collection as one bulk write
pub struct ContentUpdateHandler {
    collection: MongoCollection<ContentDoc>,
}

impl ContentUpdateHandler {
    pub fn new(collection: MongoCollection<ContentDoc>) -> Self {
        Self { collection }
    }
}

#[async_trait]
impl FlushHandler for ContentUpdateHandler {
    async fn apply(
        &self,
        kind: OpKind,
        target_group: &str,
        payloads: Vec<Document>,
    ) -> Result<()> {
        if kind != OpKind::Update {
            return Err(UndercurrentError::Internal(format!(
                "ContentUpdateHandler wired to {} group '{}'",
                kind, target_group
            )));
        }

        let total = payloads.len();
        let ops: Vec<BulkUpdateOp> = payloads
            .into_iter()
            .filter_map(|payload| {
                let filter = payload.get_document("filter").ok()?.clone();
                let update = payload.get_document("update").ok()?.clone();
                Some(BulkUpdateOp { filter, update })
            })
            .collect();

        if ops.len() < total {
            warn!(
                "Skipped {} malformed update payloads for '{}'",
                total - ops.len(),
                target_group
            );
        }

        if ops.is_empty() {
            return Ok(());
        }

        let submitted = ops.len();
        let modified = self.collection.bulk_update(ops).await?;
        debug!(
            "Bulk updated {}/{} documents in '{}'",
            modified, submitted, target_group
        );

        Ok(())
    }
}
