//! The popularity formula
//!
//! ```text
//! decay = 1 / (age_hours + 2)^1.5
//! base  = views + 5*upvotes - 2*downvotes + 4*comments + 6*saves
//! score = base * decay
//! if age_hours < 6: score = (score + 1) * 2
//! ```
//!
//! Scores may go negative when downvotes dominate; nothing clamps them.

use crate::db::schemas::ContentDoc;

/// Content younger than this gets the recency boost
pub const RECENCY_BOOST_HOURS: f64 = 6.0;

/// Raw engagement counters for one piece of content
#[derive(Debug, Clone, Copy, Default)]
pub struct EngagementCounters {
    pub views: i64,
    pub upvotes: i64,
    pub downvotes: i64,
    pub comments: i64,
    pub saves: i64,
}

impl From<&ContentDoc> for EngagementCounters {
    fn from(doc: &ContentDoc) -> Self {
        Self {
            views: doc.view_count,
            upvotes: doc.upvote_count,
            downvotes: doc.downvote_count,
            comments: doc.comment_count,
            saves: doc.save_count,
        }
    }
}

/// Time-decay multiplier; halves roughly every doubling of age
pub fn decay(age_hours: f64) -> f64 {
    1.0 / (age_hours + 2.0).powf(1.5)
}

/// Weighted engagement sum
pub fn engagement_base(counters: &EngagementCounters) -> f64 {
    (counters.views + 5 * counters.upvotes - 2 * counters.downvotes
        + 4 * counters.comments
        + 6 * counters.saves) as f64
}

/// Full popularity score for content of the given age.
///
/// The `(score + 1) * 2` recency boost is preserved exactly as shipped;
/// the additive `+1` has no documented rationale but the exact values are
/// load-bearing for downstream ranking expectations.
pub fn popularity_score(counters: &EngagementCounters, age_hours: f64) -> f64 {
    let score = engagement_base(counters) * decay(age_hours);
    if age_hours < RECENCY_BOOST_HOURS {
        (score + 1.0) * 2.0
    } else {
        score
    }
}
