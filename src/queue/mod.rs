//! Job queue contract
//!
//! The core talks to its queue through `JobQueue`; the broker (NATS
//! JetStream here) owns delivery, retry, and backoff policy.

pub mod nats;

pub use nats::{ensure_jobs_stream, NatsJobQueue, STREAM_NAME, SUBJECT_PREFIX};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::Result;

/// One queued unit of work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    /// Registered job name; routes to exactly one handler
    pub name: String,
    /// Handler-specific payload
    pub payload: serde_json::Value,
    /// When the job was enqueued
    pub enqueued_at: DateTime<Utc>,
    /// Earliest time the job should run (delayed jobs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Options for a single enqueue
#[derive(Debug, Clone, Default)]
pub struct EnqueueOpts {
    /// Delay before the job becomes runnable
    pub delay: Option<Duration>,
    /// Broker-side dedupe id; repeated enqueues with the same id collapse
    pub dedupe_id: Option<String>,
}

/// Abstract queue producer
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue one job
    async fn enqueue(&self, name: &str, payload: serde_json::Value, opts: EnqueueOpts)
        -> Result<()>;

    /// Drop queued jobs older than `age`.
    ///
    /// Only jobs still waiting for delivery are affected: acknowledged jobs
    /// leave the broker immediately and failed jobs are redelivered until
    /// they age out, so an age bound is the whole purge policy and no
    /// per-status selection exists. On JetStream this maps to tightening the
    /// stream's max-age retention.
    async fn purge_older_than(&self, age: Duration) -> Result<()>;
}
