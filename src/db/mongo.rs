//! MongoDB client and collection wrapper
//!
//! Typed collections with schema-defined indexes, keyset pagination, and
//! grouped bulk updates.

use bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::{
    options::{IndexOptions, UpdateModifications, UpdateOneModel, WriteModel},
    Client, Collection, IndexModel, Namespace,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

use crate::types::{Result, UndercurrentError};

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// One update in a grouped bulk call: filter selects the document,
/// update is a full `$set`-style modification document.
#[derive(Debug, Clone)]
pub struct BulkUpdateOp {
    pub filter: Document,
    pub update: Document,
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri).await.map_err(|e| {
            UndercurrentError::Database(format!("Failed to connect to MongoDB: {}", e))
        })?;

        // Verify connection with timeout
        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| UndercurrentError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    client: Client,
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes,
{
    /// Create a new collection and apply indexes
    pub async fn new(client: &Client, db_name: &str, collection_name: &str) -> Result<Self> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection {
            client: client.clone(),
            inner: collection,
        };

        // Apply indexes
        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> Result<()> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| UndercurrentError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Fetch one keyset page, ordered by `_id` ascending.
    ///
    /// Paging by the monotonic `_id` cursor (rather than a numeric skip) is a
    /// correctness requirement: concurrent inserts and deletes shift offsets
    /// and would skip or duplicate rows mid-scan. Soft-deleted documents are
    /// excluded.
    pub async fn find_page(
        &self,
        filter: Document,
        after_id: Option<ObjectId>,
        limit: usize,
    ) -> Result<Vec<T>> {
        let mut full_filter = filter;
        full_filter.insert("metadata.is_deleted", doc! { "$ne": true });
        if let Some(after) = after_id {
            full_filter.insert("_id", doc! { "$gt": after });
        }

        let cursor = self
            .inner
            .find(full_filter)
            .sort(doc! { "_id": 1 })
            .limit(limit as i64)
            .await
            .map_err(|e| UndercurrentError::Database(format!("Find failed: {}", e)))?;

        collect_cursor(cursor).await
    }

    /// Find documents by filter with an explicit sort order and cap.
    ///
    /// Soft-deleted documents are excluded.
    pub async fn find_ranked(
        &self,
        filter: Document,
        sort: Document,
        limit: usize,
    ) -> Result<Vec<T>> {
        let mut full_filter = filter;
        full_filter.insert("metadata.is_deleted", doc! { "$ne": true });

        let cursor = self
            .inner
            .find(full_filter)
            .sort(sort)
            .limit(limit as i64)
            .await
            .map_err(|e| UndercurrentError::Database(format!("Find failed: {}", e)))?;

        collect_cursor(cursor).await
    }

    /// Apply a group of updates as one bulk write.
    ///
    /// Returns the number of documents modified. The whole group succeeds or
    /// fails together from the caller's point of view; callers isolate the
    /// failure at their own boundary (flush group or page).
    pub async fn bulk_update(&self, ops: Vec<BulkUpdateOp>) -> Result<u64> {
        if ops.is_empty() {
            return Ok(0);
        }

        let ns: Namespace = self.inner.namespace();
        let models: Vec<WriteModel> = ops
            .into_iter()
            .map(|op| {
                WriteModel::UpdateOne(
                    UpdateOneModel::builder()
                        .namespace(ns.clone())
                        .filter(op.filter)
                        .update(UpdateModifications::Document(op.update))
                        .build(),
                )
            })
            .collect();

        let result = self
            .client
            .bulk_write(models)
            .await
            .map_err(|e| UndercurrentError::Database(format!("Bulk update failed: {}", e)))?;

        Ok(result.modified_count as u64)
    }

    /// Hard-delete all documents matching the filter, returning the count.
    ///
    /// Used for retention cleanup; does not respect the soft-delete flag.
    pub async fn delete_many(&self, filter: Document) -> Result<u64> {
        let result = self
            .inner
            .delete_many(filter)
            .await
            .map_err(|e| UndercurrentError::Database(format!("Delete failed: {}", e)))?;

        Ok(result.deleted_count)
    }

    /// Distinct values of a field over documents matching the filter.
    ///
    /// Soft-deleted documents are excluded.
    pub async fn distinct_values(&self, field: &str, filter: Document) -> Result<Vec<Bson>> {
        let mut full_filter = filter;
        full_filter.insert("metadata.is_deleted", doc! { "$ne": true });

        self.inner
            .distinct(field, full_filter)
            .await
            .map_err(|e| UndercurrentError::Database(format!("Distinct failed: {}", e)))
    }
}

/// Drain a cursor, logging and skipping undecodable documents
async fn collect_cursor<T>(cursor: mongodb::Cursor<T>) -> Result<Vec<T>>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    use futures_util::StreamExt;

    let results: Vec<T> = cursor
        .filter_map(|doc| async {
            match doc {
                Ok(d) => Some(d),
                Err(e) => {
                    error!("Error reading document: {}", e);
                    None
                }
            }
        })
        .collect()
        .await;

    Ok(results)
}

#[cfg(test)]
mod tests {
    // Store operations require a running MongoDB instance and are covered by
    // deployment smoke tests; pure query construction is tested in the
    // modules that build filters (scoring, feed, retention).
}
