use reactmon_daemon::histogram::{self, Measurement, DEFAULT_WINDOW};
use reactmon_daemon::state::AggregationState;
use reactmon_daemon::tree::ActionInterval;
use std::num::NonZeroU64;

fn record(state: &mut AggregationState, name: &str, start: i64, duration: i64) {
    state.record(ActionInterval {
        name: name.to_string(),
        start_time: start,
        end_time: start + duration,
    });
}

fn sentinel(timestamp: i64) -> Measurement {
    Measurement {
        timestamp,
        p50: 0,
        p70: 0,
        p90: 0,
        p95: 0,
        p99: 0,
        calls: 1,
    }
}

#[test]
fn test_sentinels_anchor_global_range() {
    let mut state = AggregationState::new();
    record(&mut state, "early", 500_000, 10);
    record(&mut state, "late", 3_400_000, 40);
    record(&mut state, "later", 7_900_000, 70);

    let series = state.histogram("late", DEFAULT_WINDOW);
    assert_eq!(series.len(), 3);
    assert_eq!(series[0], sentinel(0));
    assert_eq!(series[1].timestamp, 3000);
    assert_eq!(series[1].calls, 1);
    assert_eq!(series[1].p50, 40);
    assert_eq!(series[2], sentinel(7000));
}

#[test]
fn test_bucket_boundary_flushes_previous_bucket() {
    let mut state = AggregationState::new();
    record(&mut state, "op", 3_000_000, 30);
    record(&mut state, "op", 2_500_000, 10);
    record(&mut state, "op", 2_999_999, 20);

    let series = state.histogram("op", DEFAULT_WINDOW);
    let timestamps: Vec<i64> = series.iter().map(|m| m.timestamp).collect();
    assert_eq!(timestamps, vec![2000, 2000, 3000, 3000]);

    let bucket_two = &series[1];
    assert_eq!(bucket_two.calls, 2);
    assert_eq!(bucket_two.p50, 20);

    let bucket_three = &series[2];
    assert_eq!(bucket_three.calls, 1);
    assert_eq!(bucket_three.p50, 30);
    assert_eq!(bucket_three.p99, 30);
}

#[test]
fn test_quantiles_over_ten_durations() {
    let mut state = AggregationState::new();
    for (i, duration) in (1..=10).rev().enumerate() {
        record(&mut state, "op", 1_000_000 + i as i64, duration);
    }

    let series = state.histogram("op", DEFAULT_WINDOW);
    assert_eq!(series.len(), 3);
    let bucket = &series[1];
    assert_eq!(bucket.timestamp, 1000);
    assert_eq!(bucket.calls, 10);
    assert_eq!(bucket.p50, 6);
    assert_eq!(bucket.p70, 8);
    assert_eq!(bucket.p90, 10);
    assert_eq!(bucket.p95, 10);
    assert_eq!(bucket.p99, 10);
}

#[test]
fn test_custom_window() {
    let mut state = AggregationState::new();
    record(&mut state, "op", 150, 5);
    record(&mut state, "op", 250, 7);

    let window = NonZeroU64::new(100).unwrap();
    let series = state.histogram("op", window);
    let timestamps: Vec<i64> = series.iter().map(|m| m.timestamp).collect();
    assert_eq!(timestamps, vec![1000, 1000, 2000, 2000]);
}

#[test]
fn test_unknown_action_gets_only_sentinels() {
    let mut state = AggregationState::new();
    record(&mut state, "op", 1_200_000, 5);
    record(&mut state, "op", 4_800_000, 5);

    let series = state.histogram("nothing", DEFAULT_WINDOW);
    assert_eq!(series, vec![sentinel(1000), sentinel(4000)]);
}

#[test]
fn test_empty_state_gives_empty_series() {
    let state = AggregationState::new();
    assert!(state.histogram("op", DEFAULT_WINDOW).is_empty());
}

#[test]
fn test_measurement_json_keys() {
    let json = serde_json::to_value(sentinel(5000)).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "timestamp": 5000, "50%": 0, "75%": 0, "90%": 0, "95%": 0, "99%": 0, "calls": 1
        })
    );
}

#[test]
fn test_summary_sorted_by_total() {
    let mut state = AggregationState::new();
    record(&mut state, "fast", 0, 1);
    record(&mut state, "fast", 10, 3);
    record(&mut state, "slow", 20, 100);

    let summary = histogram::summarize(state.index());
    assert_eq!(summary.len(), 2);
    assert_eq!(summary[0].name, "slow");
    assert_eq!(summary[1].name, "fast");
    assert_eq!(summary[1].calls, 2);
    assert_eq!(summary[1].total, 4);
    assert_eq!(summary[1].min, 1);
    assert_eq!(summary[1].max, 3);
    assert!((summary[1].mean - 2.0).abs() < f64::EPSILON);
}

#[test]
fn test_summary_total_saturates() {
    let mut state = AggregationState::new();
    for start in [0, 1, 2] {
        state.record(ActionInterval {
            name: "huge".to_string(),
            start_time: start,
            end_time: i64::MAX,
        });
    }

    let summary = histogram::summarize(state.index());
    assert_eq!(summary[0].calls, 3);
    assert_eq!(summary[0].total, i64::MAX);
    assert!(summary[0].mean > 9.0e18);
}

#[test]
fn test_duration_histogram_buckets() {
    let mut state = AggregationState::new();
    for duration in [1, 9, 10, 50, 100, 5000] {
        record(&mut state, "op", 0, duration);
    }

    let buckets = histogram::duration_histogram(state.index().get("op"), &[100, 10]);
    let pairs: Vec<(&str, usize)> = buckets.iter().map(|b| (b.label.as_str(), b.count)).collect();
    assert_eq!(pairs, vec![("<10", 2), ("<100", 2), (">=100", 2)]);

    let single = histogram::duration_histogram(state.index().get("op"), &[]);
    assert_eq!(single.len(), 1);
    assert_eq!(single[0].count, 6);
}
