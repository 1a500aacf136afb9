//! Undercurrent - Background processing core for social content
//!
//! The write/recompute half of a content platform: everything that happens
//! between a user action landing and a ranked feed being readable.
//!
//! ## Services
//!
//! - **Coalescer**: dedupes high-frequency write intents and flushes them as
//!   grouped bulk operations
//! - **Scoring**: recomputes time-decayed popularity scores in bounded batches
//! - **Retention**: prunes expired view events
//! - **Feed**: materializes ranked per-user feeds into a TTL-bound cache
//! - **Scheduler**: idempotent cron-pattern triggers dispatched to workers

pub mod cache;
pub mod coalescer;
pub mod config;
pub mod db;
pub mod feed;
pub mod logging;
pub mod queue;
pub mod retention;
pub mod scheduler;
pub mod scoring;
pub mod types;
pub mod worker;

pub use config::Args;
pub use types::{Result, UndercurrentError};
