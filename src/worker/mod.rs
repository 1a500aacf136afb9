//! Job worker
//!
//! Pulls queued `JobRequest`s from the jobs stream and dispatches each to
//! exactly one registered handler. Success acks; failure naks and leaves
//! retry/backoff to the broker.

pub mod jobs;
pub mod processor;

pub use jobs::{FeedJob, KeywordRefreshJob, RetentionPassJob, ScoringPassJob};
pub use processor::{JobHandler, Worker, WorkerConfig};
