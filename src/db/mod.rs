//! MongoDB access layer
//!
//! Client/collection wrappers plus the document schemas the scoring,
//! retention, and feed paths operate on.

pub mod mongo;
pub mod schemas;

pub use mongo::{BulkUpdateOp, IntoIndexes, MongoClient, MongoCollection};
