//! Built-in job handlers
//!
//! One handler per registered job name, each wrapping one core component.
//! Payload fields override the configured defaults where noted.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::processor::JobHandler;
use crate::feed::FeedMaterializer;
use crate::retention::RetentionJob;
use crate::scoring::ScoringEngine;
use crate::types::{Result, UndercurrentError};

/// `recompute_scores`: one scoring pass over the lookback window
pub struct ScoringPassJob {
    engine: Arc<ScoringEngine>,
    lookback: Duration,
    batch_size: usize,
}

impl ScoringPassJob {
    pub fn new(engine: Arc<ScoringEngine>, lookback: Duration, batch_size: usize) -> Self {
        Self {
            engine,
            lookback,
            batch_size,
        }
    }
}

#[async_trait]
impl JobHandler for ScoringPassJob {
    async fn run(&self, _payload: &serde_json::Value) -> Result<u64> {
        let stats = self
            .engine
            .recompute_scores(self.lookback, self.batch_size)
            .await?;
        Ok(stats.scanned)
    }
}

/// `prune_views`: delete view events past the retention window
pub struct RetentionPassJob {
    retention: Arc<RetentionJob>,
    max_age: Duration,
}

impl RetentionPassJob {
    pub fn new(retention: Arc<RetentionJob>, max_age: Duration) -> Self {
        Self { retention, max_age }
    }
}

#[async_trait]
impl JobHandler for RetentionPassJob {
    async fn run(&self, _payload: &serde_json::Value) -> Result<u64> {
        self.retention.prune_expired(self.max_age).await
    }
}

/// `refresh_keyword_batch`: rescore one keyword-tagged content slice.
///
/// Payload `{"keyword": "..."}` overrides the configured default.
pub struct KeywordRefreshJob {
    engine: Arc<ScoringEngine>,
    default_keyword: String,
    batch_size: usize,
}

impl KeywordRefreshJob {
    pub fn new(engine: Arc<ScoringEngine>, default_keyword: String, batch_size: usize) -> Self {
        Self {
            engine,
            default_keyword,
            batch_size,
        }
    }
}

#[async_trait]
impl JobHandler for KeywordRefreshJob {
    async fn run(&self, payload: &serde_json::Value) -> Result<u64> {
        let keyword = payload
            .get("keyword")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.default_keyword);

        let stats = self
            .engine
            .refresh_keyword_batch(keyword, self.batch_size)
            .await?;
        Ok(stats.scanned)
    }
}

/// `materialize_feed`: on-demand feed rebuild for one actor.
///
/// Not cron-driven; request handlers enqueue it when an actor's graph or
/// seen-set changes. Payload must carry `{"actor_id": "..."}`.
pub struct FeedJob {
    materializer: Arc<FeedMaterializer>,
}

impl FeedJob {
    pub fn new(materializer: Arc<FeedMaterializer>) -> Self {
        Self { materializer }
    }
}

#[async_trait]
impl JobHandler for FeedJob {
    async fn run(&self, payload: &serde_json::Value) -> Result<u64> {
        let actor_id = payload
            .get("actor_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                UndercurrentError::Internal("materialize_feed payload missing actor_id".into())
            })?;

        let written = self.materializer.materialize_feed(actor_id).await?;
        Ok(written as u64)
    }
}
