//! JSONL event log for job and flush outcomes
//!
//! Events flow through a bounded channel drained by a single writer task.
//! Senders await channel capacity instead of spawning unstructured tasks, so
//! a slow disk applies backpressure rather than accumulating unbounded work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Default channel capacity before senders block
const DEFAULT_CAPACITY: usize = 1024;

/// Event types emitted by the processing core
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A flush group was dispatched to its handler
    FlushDispatched,
    /// A flush group's handler returned an error
    FlushFailed,
    /// A flush group had no registered handler and was dropped
    GroupDropped,
    /// A scheduled job started running
    JobStarted,
    /// A scheduled job finished successfully
    JobCompleted,
    /// A scheduled job failed
    JobFailed,
    /// A feed was materialized (or its cache entry removed)
    FeedMaterialized,
}

/// One observability event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    /// Event timestamp
    pub timestamp: DateTime<Utc>,
    /// Event kind
    pub kind: EventKind,
    /// Node that emitted the event
    pub node_id: String,
    /// Job name (for job events)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
    /// Flush group (for flush events)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Record/operation count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    /// Duration in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Error message (for failure events)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobEvent {
    /// Create a new event
    pub fn new(kind: EventKind, node_id: String) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            node_id,
            job: None,
            group: None,
            count: None,
            duration_ms: None,
            error: None,
        }
    }

    /// Set the job name
    pub fn with_job(mut self, job: impl Into<String>) -> Self {
        self.job = Some(job.into());
        self
    }

    /// Set the flush group
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Set the record count
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    /// Set the duration
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Set the error message
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Convert to a JSONL line
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Handle for emitting events
///
/// Cheap to clone; all clones feed the same writer task. A disabled log
/// drops events without blocking.
#[derive(Clone)]
pub struct EventLog {
    tx: Option<mpsc::Sender<JobEvent>>,
    node_id: String,
}

impl EventLog {
    /// An event log that discards everything (tests, log path unset)
    pub fn disabled(node_id: impl Into<String>) -> Self {
        Self {
            tx: None,
            node_id: node_id.into(),
        }
    }

    /// Open a JSONL file and spawn the writer task draining into it
    pub fn to_file(node_id: impl Into<String>, path: PathBuf) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = BufWriter::new(file);

        let (tx, mut rx) = mpsc::channel::<JobEvent>(DEFAULT_CAPACITY);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event.to_jsonl() {
                    Ok(line) => {
                        if let Err(e) = writeln!(writer, "{}", line) {
                            error!("Failed to write job event: {}", e);
                        }
                        if let Err(e) = writer.flush() {
                            error!("Failed to flush event log: {}", e);
                        }
                    }
                    Err(e) => error!("Failed to serialize job event: {}", e),
                }
            }
        });

        info!("Job event logging initialized to {}", path.display());

        Ok(Self {
            tx: Some(tx),
            node_id: node_id.into(),
        })
    }

    /// Emit an event, waiting for channel capacity if the writer is behind
    pub async fn emit(&self, event: JobEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).await.is_err() {
                error!("Event log writer task has stopped; dropping event");
            }
        }
    }

    /// Build an event stamped with this log's node id
    pub fn event(&self, kind: EventKind) -> JobEvent {
        JobEvent::new(kind, self.node_id.clone())
    }

    /// Log a flush outcome for one group
    pub async fn log_flush(&self, group: &str, count: u64, error: Option<&str>) {
        let mut event = match error {
            None => self.event(EventKind::FlushDispatched),
            Some(_) => self.event(EventKind::FlushFailed),
        }
        .with_group(group)
        .with_count(count);

        if let Some(e) = error {
            event = event.with_error(e);
        }

        self.emit(event).await;
    }

    /// Log a job outcome
    pub async fn log_job(&self, job: &str, duration_ms: u64, error: Option<&str>) {
        let mut event = match error {
            None => self.event(EventKind::JobCompleted),
            Some(_) => self.event(EventKind::JobFailed),
        }
        .with_job(job)
        .with_duration(duration_ms);

        if let Some(e) = error {
            event = event.with_error(e);
        }

        self.emit(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = JobEvent::new(EventKind::JobCompleted, "node-1".to_string())
            .with_job("recompute_scores")
            .with_count(250)
            .with_duration(1200);

        let jsonl = event.to_jsonl().unwrap();
        assert!(jsonl.contains("job_completed"));
        assert!(jsonl.contains("recompute_scores"));
        assert!(jsonl.contains("250"));
    }

    #[test]
    fn test_failure_event_carries_error() {
        let event = JobEvent::new(EventKind::FlushFailed, "node-1".to_string())
            .with_group("content")
            .with_error("connection reset");

        let jsonl = event.to_jsonl().unwrap();
        assert!(jsonl.contains("flush_failed"));
        assert!(jsonl.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_disabled_log_is_a_noop() {
        let log = EventLog::disabled("node-1");
        // Must not block or panic with no writer attached
        log.log_job("prune_views", 5, None).await;
        log.log_flush("content", 10, Some("boom")).await;
    }
}
