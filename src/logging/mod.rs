//! Observability logging for background jobs
//!
//! Job and flush outcomes are appended to a JSONL event log for dashboards
//! and alerting. Components never fail because of logging.

pub mod events;

pub use events::{EventKind, EventLog, JobEvent};
