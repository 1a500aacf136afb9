//! Recurring job scheduling
//!
//! Cron-pattern triggers registered idempotently by name. Re-registering a
//! name replaces that one trigger and nothing else; there is deliberately no
//! "clear the group then re-add" path, which would destroy in-flight work.
//!
//! Each fire enqueues a `JobRequest` with a per-minute dedupe id so two
//! scheduler instances firing the same trigger collapse to one delivery.

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler as CronRunner};
use tracing::{error, info};
use uuid::Uuid;

use crate::queue::{EnqueueOpts, JobQueue};
use crate::types::{Result, UndercurrentError};

/// Built-in job names
pub const JOB_RECOMPUTE_SCORES: &str = "recompute_scores";
pub const JOB_PRUNE_VIEWS: &str = "prune_views";
pub const JOB_REFRESH_KEYWORD: &str = "refresh_keyword_batch";
pub const JOB_MATERIALIZE_FEED: &str = "materialize_feed";

/// A named recurring trigger
#[derive(Debug, Clone)]
pub struct ScheduleSpec {
    /// Unique name; re-registration replaces the existing trigger
    pub name: String,
    /// Cron pattern, seconds-first
    pub pattern: String,
    /// Payload delivered on every fire
    pub payload: Value,
}

impl ScheduleSpec {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            payload,
        }
    }
}

/// Lifecycle of a scheduled job between fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Trigger installed, awaiting next fire
    Registered,
    /// Fired and enqueued, not yet picked up
    Triggered,
    /// A worker is executing the handler
    Running,
    /// Last run finished successfully
    Completed,
    /// Last run failed; next fire will try again
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Registered => "registered",
            JobState::Triggered => "triggered",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Shared per-job state, written by the scheduler and the worker
#[derive(Default)]
pub struct JobStates {
    states: DashMap<String, JobState>,
}

impl JobStates {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, name: &str, state: JobState) {
        self.states.insert(name.to_string(), state);
    }

    pub fn get(&self, name: &str) -> Option<JobState> {
        self.states.get(name).map(|s| *s)
    }
}

/// Name-keyed idempotent cron registry
pub struct JobScheduler {
    runner: CronRunner,
    queue: Arc<dyn JobQueue>,
    states: Arc<JobStates>,
    /// name -> installed cron trigger id
    registered: DashMap<String, Uuid>,
}

impl JobScheduler {
    pub async fn new(queue: Arc<dyn JobQueue>, states: Arc<JobStates>) -> Result<Self> {
        let runner = CronRunner::new()
            .await
            .map_err(|e| UndercurrentError::Scheduler(format!("Failed to create runner: {e}")))?;

        Ok(Self {
            runner,
            queue,
            states,
            registered: DashMap::new(),
        })
    }

    /// Install or replace the trigger named `spec.name`.
    ///
    /// Safe to call on every process start: the previous trigger for this
    /// name (if any) is removed first, other jobs are untouched, and a
    /// conflicting pattern under the same name replaces rather than errors.
    pub async fn register(&self, spec: ScheduleSpec) -> Result<()> {
        if let Some((_, old_id)) = self.registered.remove(&spec.name) {
            self.runner
                .remove(&old_id)
                .await
                .map_err(|e| UndercurrentError::Scheduler(format!("Failed to remove trigger: {e}")))?;
        }

        let queue = Arc::clone(&self.queue);
        let states = Arc::clone(&self.states);
        let name = spec.name.clone();
        let payload = spec.payload.clone();

        let job = Job::new_async(spec.pattern.as_str(), move |_uuid, _lock| {
            let queue = Arc::clone(&queue);
            let states = Arc::clone(&states);
            let name = name.clone();
            let payload = payload.clone();

            Box::pin(async move {
                states.set(&name, JobState::Triggered);

                // Collapse concurrent scheduler instances to one delivery
                let dedupe_id = format!("{}:{}", name, Utc::now().format("%Y%m%d%H%M"));
                let opts = EnqueueOpts {
                    delay: None,
                    dedupe_id: Some(dedupe_id),
                };

                if let Err(e) = queue.enqueue(&name, payload, opts).await {
                    error!("Failed to enqueue scheduled job '{}': {}", name, e);
                }
            })
        })
        .map_err(|e| {
            UndercurrentError::Scheduler(format!(
                "Invalid cron pattern '{}' for '{}': {e}",
                spec.pattern, spec.name
            ))
        })?;

        let id = self
            .runner
            .add(job)
            .await
            .map_err(|e| UndercurrentError::Scheduler(format!("Failed to add trigger: {e}")))?;

        self.registered.insert(spec.name.clone(), id);
        self.states.set(&spec.name, JobState::Registered);
        info!("Registered schedule '{}' ({})", spec.name, spec.pattern);
        Ok(())
    }

    /// Start firing triggers
    pub async fn start(&self) -> Result<()> {
        self.runner
            .start()
            .await
            .map_err(|e| UndercurrentError::Scheduler(format!("Failed to start runner: {e}")))
    }

    /// Number of installed triggers
    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    /// Installed trigger id for a name, if any
    pub fn trigger_id(&self, name: &str) -> Option<Uuid> {
        self.registered.get(name).map(|id| *id)
    }
}
