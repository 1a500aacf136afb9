//! Configuration for Undercurrent workers
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::time::Duration;
use uuid::Uuid;

use crate::coalescer::CoalescerConfig;
use crate::types::{Result, UndercurrentError};

/// Undercurrent - background processing core for social content
#[derive(Parser, Debug, Clone)]
#[command(name = "undercurrent")]
#[command(about = "Background processing worker for social content")]
pub struct Args {
    /// Unique node identifier for this worker instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "undercurrent")]
    pub mongodb_db: String,

    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Path for the JSONL job event log (disabled if unset)
    #[arg(long, env = "EVENT_LOG_PATH")]
    pub event_log_path: Option<std::path::PathBuf>,

    /// Maximum buffered write intents before a synchronous flush
    #[arg(long, env = "COALESCER_MAX_OPERATIONS", default_value = "100")]
    pub coalescer_max_operations: usize,

    /// Flush delay in milliseconds for partially filled buffers
    #[arg(long, env = "COALESCER_FLUSH_DELAY_MS", default_value = "2000")]
    pub coalescer_flush_delay_ms: u64,

    /// Lookback window in hours for score recomputation
    #[arg(long, env = "SCORE_LOOKBACK_HOURS", default_value = "48")]
    pub score_lookback_hours: u64,

    /// Page size for score recomputation scans
    #[arg(long, env = "SCORE_BATCH_SIZE", default_value = "500")]
    pub score_batch_size: usize,

    /// Retention window in days for view events
    #[arg(long, env = "VIEW_RETENTION_DAYS", default_value = "30")]
    pub view_retention_days: u64,

    /// Maximum ids in a materialized feed
    #[arg(long, env = "FEED_LIMIT", default_value = "100")]
    pub feed_limit: usize,

    /// Feed cache entry TTL in seconds
    #[arg(long, env = "FEED_TTL_SECONDS", default_value = "900")]
    pub feed_ttl_seconds: u64,

    /// Maximum candidate content age in days for feeds
    #[arg(long, env = "FEED_MAX_AGE_DAYS", default_value = "14")]
    pub feed_max_age_days: u64,

    /// Cron pattern for the score recomputation job (seconds-first)
    #[arg(long, env = "SCORING_CRON", default_value = "0 */15 * * * *")]
    pub scoring_cron: String,

    /// Cron pattern for the view retention job
    #[arg(long, env = "RETENTION_CRON", default_value = "0 0 * * * *")]
    pub retention_cron: String,

    /// Cron pattern for the keyword refresh job
    #[arg(long, env = "REFRESH_CRON", default_value = "0 30 */6 * * *")]
    pub refresh_cron: String,

    /// Keyword for the synthetic refresh job
    #[arg(long, env = "REFRESH_KEYWORD", default_value = "featured")]
    pub refresh_keyword: String,

    /// Maximum age in hours a queued job may wait before it is purged
    #[arg(long, env = "JOB_MAX_AGE_HOURS", default_value = "24")]
    pub job_max_age_hours: u64,

    /// Maximum concurrent job deliveries per worker
    #[arg(long, env = "MAX_CONCURRENT", default_value = "10")]
    pub max_concurrent: usize,
}

impl Args {
    /// Validate configuration; errors here are fatal at startup
    pub fn validate(&self) -> Result<()> {
        if self.mongodb_uri.trim().is_empty() {
            return Err(UndercurrentError::Config("MONGODB_URI is required".into()));
        }
        if self.mongodb_db.trim().is_empty() {
            return Err(UndercurrentError::Config("MONGODB_DB is required".into()));
        }
        if self.nats_url.trim().is_empty() {
            return Err(UndercurrentError::Config("NATS_URL is required".into()));
        }
        if self.coalescer_max_operations == 0 {
            return Err(UndercurrentError::Config(
                "COALESCER_MAX_OPERATIONS must be at least 1".into(),
            ));
        }
        if self.score_batch_size == 0 {
            return Err(UndercurrentError::Config(
                "SCORE_BATCH_SIZE must be at least 1".into(),
            ));
        }
        if self.feed_limit == 0 {
            return Err(UndercurrentError::Config(
                "FEED_LIMIT must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Coalescer sizing for the worker.
    ///
    /// The buffer must hold at least one scoring page, so a page's updates
    /// dispatch as a single bulk call instead of fragmenting into threshold
    /// flushes mid-scan.
    pub fn coalescer_config(&self) -> CoalescerConfig {
        CoalescerConfig {
            max_operations: self.coalescer_max_operations.max(self.score_batch_size),
            flush_delay: Duration::from_millis(self.coalescer_flush_delay_ms),
        }
    }
}
