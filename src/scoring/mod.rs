//! Popularity scoring
//!
//! Time-decayed engagement scores, recomputed in bounded batches over
//! recently created content and written back through the coalescer.

mod engine;
mod formula;

pub use engine::{ScoringEngine, ScoringStats};
pub use formula::{decay, engagement_base, popularity_score, EngagementCounters};
