//! NATS JetStream queue implementation
//!
//! Jobs are JSON `JobRequest`s published to `jobs.<name>` subjects on one
//! stream. Broker-side dedupe uses `Nats-Msg-Id`; delayed jobs carry a
//! `scheduled_for` timestamp that consumers honor by nak-ing with a delay,
//! since JetStream has no native delayed delivery.

use async_nats::jetstream::{self, stream::Stream};
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info};

use super::{EnqueueOpts, JobQueue, JobRequest};
use crate::types::{Result, UndercurrentError};

pub const STREAM_NAME: &str = "JOBS";
pub const SUBJECT_PREFIX: &str = "jobs";

/// Default stream retention; `purge_older_than` tightens it at runtime
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 3600);

/// Get or create the jobs stream
pub async fn ensure_jobs_stream(js: &jetstream::Context) -> Result<Stream> {
    let stream = js
        .get_or_create_stream(jetstream::stream::Config {
            name: STREAM_NAME.to_string(),
            subjects: vec![format!("{}.>", SUBJECT_PREFIX)],
            max_age: DEFAULT_MAX_AGE,
            duplicate_window: Duration::from_secs(120),
            storage: jetstream::stream::StorageType::File,
            ..Default::default()
        })
        .await
        .map_err(|e| UndercurrentError::Queue(format!("Failed to create stream: {e}")))?;

    info!(
        "Using stream {} with subjects {}.>",
        STREAM_NAME, SUBJECT_PREFIX
    );
    Ok(stream)
}

/// JetStream-backed job producer
#[derive(Clone)]
pub struct NatsJobQueue {
    jetstream: jetstream::Context,
}

impl NatsJobQueue {
    /// Wrap a JetStream context, ensuring the jobs stream exists
    pub async fn new(jetstream: jetstream::Context) -> Result<Self> {
        ensure_jobs_stream(&jetstream).await?;
        Ok(Self { jetstream })
    }
}

#[async_trait]
impl JobQueue for NatsJobQueue {
    async fn enqueue(
        &self,
        name: &str,
        payload: serde_json::Value,
        opts: EnqueueOpts,
    ) -> Result<()> {
        let request = JobRequest {
            name: name.to_string(),
            payload,
            enqueued_at: Utc::now(),
            scheduled_for: opts
                .delay
                .and_then(|d| chrono::Duration::from_std(d).ok())
                .map(|d| Utc::now() + d),
        };

        let bytes = serde_json::to_vec(&request)?;
        let subject = format!("{}.{}", SUBJECT_PREFIX, name);

        let mut headers = async_nats::HeaderMap::new();
        if let Some(dedupe_id) = &opts.dedupe_id {
            headers.insert("Nats-Msg-Id", dedupe_id.as_str());
        }

        self.jetstream
            .publish_with_headers(subject.clone(), headers, bytes.into())
            .await
            .map_err(|e| UndercurrentError::Queue(format!("Publish to {subject} failed: {e}")))?
            .await
            .map_err(|e| UndercurrentError::Queue(format!("Publish to {subject} not acked: {e}")))?;

        debug!("Enqueued job '{}' to {}", name, subject);
        Ok(())
    }

    async fn purge_older_than(&self, age: Duration) -> Result<()> {
        // JetStream expires by stream max-age rather than per-message purge
        // calls; tightening the config makes the server drop the old tail
        self.jetstream
            .update_stream(jetstream::stream::Config {
                name: STREAM_NAME.to_string(),
                subjects: vec![format!("{}.>", SUBJECT_PREFIX)],
                max_age: age,
                duplicate_window: Duration::from_secs(120),
                storage: jetstream::stream::StorageType::File,
                ..Default::default()
            })
            .await
            .map_err(|e| UndercurrentError::Queue(format!("Failed to update stream: {e}")))?;

        info!("Jobs stream max age set to {:?}", age);
        Ok(())
    }
}
