//! Scoring formula properties against fixed expectations

use undercurrent::scoring::{decay, engagement_base, popularity_score, EngagementCounters};

fn counters(views: i64, up: i64, down: i64, comments: i64, saves: i64) -> EngagementCounters {
    EngagementCounters {
        views,
        upvotes: up,
        downvotes: down,
        comments,
        saves,
    }
}

#[test]
fn test_engagement_weights() {
    // views=10, up=2, down=0, comments=1, saves=0 -> 10 + 10 - 0 + 4 + 0
    assert_eq!(engagement_base(&counters(10, 2, 0, 1, 0)), 24.0);
    // Each counter in isolation
    assert_eq!(engagement_base(&counters(1, 0, 0, 0, 0)), 1.0);
    assert_eq!(engagement_base(&counters(0, 1, 0, 0, 0)), 5.0);
    assert_eq!(engagement_base(&counters(0, 0, 1, 0, 0)), -2.0);
    assert_eq!(engagement_base(&counters(0, 0, 0, 1, 0)), 4.0);
    assert_eq!(engagement_base(&counters(0, 0, 0, 0, 1)), 6.0);
}

#[test]
fn test_five_hour_boosted_fixture() {
    let c = counters(10, 2, 0, 1, 0);
    let score = popularity_score(&c, 5.0);
    // base 24 * 1/7^1.5 ~= 1.296, boosted -> (1.296 + 1) * 2 ~= 4.59
    assert!((score - 4.59).abs() < 0.01, "got {score}");
}

#[test]
fn test_decay_is_monotonically_decreasing() {
    let mut prev = decay(0.0);
    for age in 1..200 {
        let next = decay(age as f64);
        assert!(next < prev, "decay not decreasing at {age}h");
        prev = next;
    }
}

#[test]
fn test_score_decreases_hourly_past_boost_window() {
    let c = counters(250, 40, 5, 12, 3);
    let mut prev = popularity_score(&c, 6.0);
    for hour in 7..168 {
        let next = popularity_score(&c, hour as f64);
        assert!(
            next < prev,
            "score not strictly decreasing at {hour}h: {next} >= {prev}"
        );
        prev = next;
    }
}

#[test]
fn test_boost_at_least_doubles_nonnegative_scores() {
    for views in [0, 1, 10, 100, 10_000] {
        for age in [0.1, 1.0, 2.5, 4.0, 5.99] {
            let c = counters(views, views / 5, 0, views / 10, 0);
            let unboosted = engagement_base(&c) * decay(age);
            assert!(popularity_score(&c, age) >= 2.0 * unboosted);
        }
    }
}

#[test]
fn test_no_clamping_of_negative_scores() {
    let c = counters(0, 0, 100, 0, 0);
    let old = popularity_score(&c, 48.0);
    assert!(old < 0.0);

    // Even boosted content can stay negative when downvotes dominate
    let young = popularity_score(&c, 1.0);
    assert!(young < 0.0);
}

#[test]
fn test_zero_engagement_young_content_scores_two() {
    // base 0 -> decayed 0 -> boosted (0 + 1) * 2
    assert_eq!(popularity_score(&counters(0, 0, 0, 0, 0), 1.0), 2.0);
    // and exactly zero once the boost window has passed
    assert_eq!(popularity_score(&counters(0, 0, 0, 0, 0), 10.0), 0.0);
}
