use reactmon_daemon::state::{AggregationState, Bounds, Ingest, TimestampRange};
use reactmon_daemon::tree::{ActionInterval, CallTree};
use serde_json::json;

fn interval(name: &str, start: i64, end: i64) -> ActionInterval {
    ActionInterval {
        name: name.to_string(),
        start_time: start,
        end_time: end,
    }
}

fn sample_tree(id: &str) -> CallTree {
    CallTree::from_value(json!({
        "id": id,
        "actions": [{
            "name": "root", "start_time": 1000, "stop_time": 9000,
            "actions": [
                {"name": "read", "start_time": 1500, "stop_time": 2500},
                {"name": "write", "start_time": 3000, "stop_time": 8000,
                 "actions": [{"name": "read", "start_time": 3100, "stop_time": 3200}]}
            ]
        }]
    }))
    .unwrap()
}

#[test]
fn test_ingest_same_id_twice_is_noop() {
    let mut state = AggregationState::new();
    assert_eq!(
        state.ingest(sample_tree("t1")),
        Ingest::NewlyIngested { intervals: 3 }
    );
    let range_after_first = state.range();
    let reads_after_first = state.index().get_sorted("read");

    assert_eq!(state.ingest(sample_tree("t1")), Ingest::AlreadyKnown);
    assert_eq!(state.trees().len(), 1);
    assert_eq!(state.index().interval_count(), 3);
    assert_eq!(state.range(), range_after_first);
    assert_eq!(state.index().get_sorted("read"), reads_after_first);
}

#[test]
fn test_intervals_grouped_by_name() {
    let mut state = AggregationState::new();
    state.ingest(sample_tree("t1"));
    state.ingest(sample_tree("t2"));

    assert_eq!(state.index().names(), vec!["read", "write"]);
    assert_eq!(state.index().get("read").len(), 4);
    assert_eq!(state.index().get("write").len(), 2);
    assert!(state.index().get("missing").is_empty());
    assert_eq!(state.index().get("write")[0], interval("write", 2000, 7000));
}

#[test]
fn test_range_is_monotonic() {
    let mut state = AggregationState::new();
    for start in [50, 10, 80] {
        state.record(interval("op", start, start + 1));
    }
    assert_eq!(state.range().bounds(), Some(Bounds { min: 10, max: 80 }));

    state.record(interval("op", 30, 31));
    assert_eq!(state.range().min(), Some(10));
    assert_eq!(state.range().max(), Some(80));
}

#[test]
fn test_range_ignores_end_time() {
    let mut range = TimestampRange::default();
    assert_eq!(range.bounds(), None);
    range.update(5);
    assert_eq!(range.bounds(), Some(Bounds { min: 5, max: 5 }));

    let mut state = AggregationState::new();
    state.record(interval("op", 5, 1_000_000));
    assert_eq!(state.range().max(), Some(5));
}

#[test]
fn test_get_sorted_does_not_depend_on_arrival_order() {
    let mut state = AggregationState::new();
    state.record(interval("op", 300, 310));
    state.record(interval("op", 100, 150));
    state.record(interval("op", 200, 220));

    let starts: Vec<i64> = state
        .index()
        .get_sorted("op")
        .iter()
        .map(|i| i.start_time)
        .collect();
    assert_eq!(starts, vec![100, 200, 300]);
    // Stored order is untouched.
    assert_eq!(state.index().get("op")[0].start_time, 300);
}

#[test]
fn test_recent_trees_keeps_ingestion_order() {
    let mut state = AggregationState::new();
    for id in ["a", "b", "c"] {
        state.ingest(sample_tree(id));
    }
    let recent: Vec<&str> = state.recent_trees(2).iter().map(|t| t.id.as_str()).collect();
    assert_eq!(recent, vec!["b", "c"]);
    assert_eq!(state.recent_trees(10).len(), 3);
}

#[test]
fn test_reset_clears_everything() {
    let mut state = AggregationState::new();
    state.ingest(sample_tree("t1"));
    state.reset();

    assert!(state.trees().is_empty());
    assert!(state.index().is_empty());
    assert_eq!(state.range().bounds(), None);
    assert_eq!(
        state.ingest(sample_tree("t1")),
        Ingest::NewlyIngested { intervals: 3 }
    );
}
