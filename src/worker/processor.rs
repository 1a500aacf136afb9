//! Worker processor - JetStream consumer for queued jobs
//!
//! Mirrors the queue side of `queue::nats`: one durable pull consumer over
//! the jobs stream, fetched in bounded batches.

use async_nats::jetstream::{self, consumer::PullConsumer, stream::Stream, AckKind};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::logging::{EventKind, EventLog};
use crate::queue::{ensure_jobs_stream, JobRequest, SUBJECT_PREFIX};
use crate::scheduler::{JobState, JobStates};
use crate::types::{Result, UndercurrentError};

pub const CONSUMER_NAME_PREFIX: &str = "job_worker";

/// Executes one kind of job
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run the job; the returned count feeds the event log
    async fn run(&self, payload: &serde_json::Value) -> Result<u64>;
}

/// Worker configuration
pub struct WorkerConfig {
    /// Unique worker ID
    pub worker_id: String,
    /// Maximum messages fetched per batch
    pub max_concurrent: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: uuid::Uuid::new_v4().to_string(),
            max_concurrent: 10,
        }
    }
}

/// Pull-consumer worker dispatching jobs to handlers by name
pub struct Worker {
    config: WorkerConfig,
    jetstream: jetstream::Context,
    handlers: HashMap<String, Arc<dyn JobHandler>>,
    states: Arc<JobStates>,
    events: EventLog,
    running: Arc<RwLock<bool>>,
}

impl Worker {
    pub fn new(jetstream: jetstream::Context, config: WorkerConfig) -> Self {
        Self {
            config,
            jetstream,
            handlers: HashMap::new(),
            states: JobStates::new(),
            events: EventLog::disabled("worker"),
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Register the handler for one job name
    pub fn with_handler(mut self, name: impl Into<String>, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    /// Share job state tracking with the scheduler
    pub fn with_states(mut self, states: Arc<JobStates>) -> Self {
        self.states = states;
        self
    }

    /// Attach the observability event log
    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    /// Run the worker processing loop
    pub async fn run(&self) -> Result<()> {
        *self.running.write().await = true;

        let stream = ensure_jobs_stream(&self.jetstream).await?;
        let consumer = self.ensure_consumer(&stream).await?;

        info!(
            "Worker {} starting job processing loop",
            self.config.worker_id
        );

        while *self.running.read().await {
            match self.process_batch(&consumer).await {
                Ok(count) => {
                    if count > 0 {
                        debug!("Processed {} jobs", count);
                    }
                }
                Err(e) => {
                    error!("Error processing batch: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        info!("Worker {} stopped", self.config.worker_id);
        Ok(())
    }

    /// Stop the worker after the current batch
    pub async fn stop(&self) {
        *self.running.write().await = false;
    }

    /// Ensure the shared durable consumer exists
    async fn ensure_consumer(&self, stream: &Stream) -> Result<PullConsumer> {
        let consumer = stream
            .get_or_create_consumer(
                CONSUMER_NAME_PREFIX,
                jetstream::consumer::pull::Config {
                    durable_name: Some(CONSUMER_NAME_PREFIX.to_string()),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    filter_subject: format!("{SUBJECT_PREFIX}.>"),
                    max_ack_pending: self.config.max_concurrent as i64,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| UndercurrentError::Queue(format!("Failed to create consumer: {e}")))?;

        info!("Using consumer {}", CONSUMER_NAME_PREFIX);
        Ok(consumer)
    }

    /// Fetch and process one batch of messages
    async fn process_batch(&self, consumer: &PullConsumer) -> Result<usize> {
        let mut messages = consumer
            .fetch()
            .max_messages(self.config.max_concurrent)
            .expires(Duration::from_secs(5))
            .messages()
            .await
            .map_err(|e| UndercurrentError::Queue(format!("Failed to fetch messages: {e}")))?;

        let mut count = 0;

        while let Some(msg_result) = messages.next().await {
            match msg_result {
                Ok(msg) => {
                    count += 1;
                    self.process_message(msg).await;
                }
                Err(e) => {
                    warn!("Error receiving message: {}", e);
                }
            }
        }

        Ok(count)
    }

    /// Process a single job message
    async fn process_message(&self, msg: jetstream::Message) {
        let request: JobRequest = match serde_json::from_slice(&msg.payload) {
            Ok(r) => r,
            Err(e) => {
                error!("Failed to parse job request: {}", e);
                // Malformed messages are dropped, not redelivered forever
                if let Err(e) = msg.ack().await {
                    warn!("Failed to ack malformed message: {}", e);
                }
                return;
            }
        };

        // Delayed jobs: not due yet, hand back with a delay
        if let Some(due) = request.scheduled_for {
            let now = chrono::Utc::now();
            if due > now {
                let wait = (due - now).to_std().unwrap_or(Duration::from_secs(1));
                debug!("Job '{}' not due for {:?}; nak with delay", request.name, wait);
                if let Err(e) = msg.ack_with(AckKind::Nak(Some(wait))).await {
                    warn!("Failed to nak delayed job: {}", e);
                }
                return;
            }
        }

        let Some(handler) = self.handlers.get(&request.name) else {
            warn!("No handler registered for job '{}'; dropping", request.name);
            if let Err(e) = msg.ack().await {
                warn!("Failed to ack unroutable job: {}", e);
            }
            return;
        };

        debug!("Running job '{}'", request.name);
        self.states.set(&request.name, JobState::Running);
        self.events
            .emit(
                self.events
                    .event(EventKind::JobStarted)
                    .with_job(request.name.as_str()),
            )
            .await;

        let started = Instant::now();
        let outcome = handler.run(&request.payload).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(count) => {
                info!(
                    "Job '{}' completed in {}ms ({} records)",
                    request.name, duration_ms, count
                );
                self.states.set(&request.name, JobState::Completed);
                self.events.log_job(&request.name, duration_ms, None).await;

                if let Err(e) = msg.ack().await {
                    warn!("Failed to ack job '{}': {}", request.name, e);
                }
            }
            Err(e) => {
                error!("Job '{}' failed after {}ms: {}", request.name, duration_ms, e);
                self.states.set(&request.name, JobState::Failed);
                self.events
                    .log_job(&request.name, duration_ms, Some(&e.to_string()))
                    .await;

                // The broker owns retry/backoff; just hand the message back
                if let Err(e) = msg.ack_with(AckKind::Nak(None)).await {
                    warn!("Failed to nak job '{}': {}", request.name, e);
                }
            }
        }
    }
}
