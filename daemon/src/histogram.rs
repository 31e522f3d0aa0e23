//! Time-bucketed latency quantiles per action name
//!
//! Intervals are grouped into fixed windows of their start time. Each
//! non-empty window becomes one [`Measurement`]; the series is framed by two
//! sentinel measurements anchored at the global range so every action's
//! chart shares the same x-axis.

use crate::state::{ActionIndex, TimestampRange};
use crate::tree::ActionInterval;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;

/// One coarse tick: 1,000,000 raw time units.
pub const DEFAULT_WINDOW: NonZeroU64 = match NonZeroU64::new(1_000_000) {
    Some(w) => w,
    None => panic!("window must be non-zero"),
};

/// Fractions reported per bucket, in `Measurement` field order.
pub const QUANTILES: [f64; 5] = [0.5, 0.7, 0.9, 0.95, 0.99];

/// Output timestamps are bucket keys scaled to milliseconds.
const TIMESTAMP_SCALE: i64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub timestamp: i64,
    #[serde(rename = "50%")]
    pub p50: i64,
    #[serde(rename = "75%")]
    pub p70: i64,
    #[serde(rename = "90%")]
    pub p90: i64,
    #[serde(rename = "95%")]
    pub p95: i64,
    #[serde(rename = "99%")]
    pub p99: i64,
    pub calls: usize,
}

impl Measurement {
    /// Summarize a non-empty bucket of durations.
    fn from_durations(bucket_key: i64, mut durations: Vec<i64>) -> Self {
        durations.sort_unstable();
        let [p50, p70, p90, p95, p99] =
            QUANTILES.map(|fraction| durations[quantile_index(durations.len(), fraction)]);
        Self {
            timestamp: bucket_key.saturating_mul(TIMESTAMP_SCALE),
            p50,
            p70,
            p90,
            p95,
            p99,
            calls: durations.len(),
        }
    }

    /// Chart anchor: statistics over the single sample `[0]`.
    fn sentinel(bucket_key: i64) -> Self {
        Self::from_durations(bucket_key, vec![0])
    }
}

/// `floor(size * fraction)` clamped into `[0, size - 1]`.
fn quantile_index(size: usize, fraction: f64) -> usize {
    let index = (size as f64 * fraction).floor() as usize;
    index.min(size.saturating_sub(1))
}

fn bucket_key(time: i64, window: i64) -> i64 {
    time.div_euclid(window)
}

/// Build the measurement series for one action.
///
/// `sorted` must be ordered by start time. An empty range (nothing recorded
/// yet) gives an empty series.
pub fn build(sorted: &[ActionInterval], range: &TimestampRange, window: NonZeroU64) -> Vec<Measurement> {
    let Some(bounds) = range.bounds() else {
        return Vec::new();
    };
    let window = i64::try_from(window.get()).unwrap_or(i64::MAX);

    let mut series = vec![Measurement::sentinel(bucket_key(bounds.min, window))];

    let mut current_key = 0;
    let mut durations = Vec::new();
    for interval in sorted {
        let key = bucket_key(interval.start_time, window);
        if key != current_key && !durations.is_empty() {
            series.push(Measurement::from_durations(
                current_key,
                std::mem::take(&mut durations),
            ));
        }
        current_key = key;
        durations.push(interval.duration());
    }
    if !durations.is_empty() {
        series.push(Measurement::from_durations(current_key, durations));
    }

    series.push(Measurement::sentinel(bucket_key(bounds.max, window)));
    series
}

/// Totals for one action name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSummary {
    pub name: String,
    pub calls: usize,
    pub total: i64,
    pub mean: f64,
    pub min: i64,
    pub max: i64,
}

/// Per-action totals, heaviest first.
pub fn summarize(index: &ActionIndex) -> Vec<ActionSummary> {
    let mut entries: Vec<ActionSummary> = index
        .iter()
        .filter(|(_, intervals)| !intervals.is_empty())
        .map(|(name, intervals)| {
            let total = intervals
                .iter()
                .map(ActionInterval::duration)
                .fold(0i64, i64::saturating_add);
            let exact: f64 = intervals.iter().map(|i| i.duration() as f64).sum();
            ActionSummary {
                name: name.to_string(),
                calls: intervals.len(),
                total,
                mean: exact / intervals.len() as f64,
                min: intervals.iter().map(ActionInterval::duration).min().unwrap_or(0),
                max: intervals.iter().map(ActionInterval::duration).max().unwrap_or(0),
            }
        })
        .collect();

    entries.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
    entries
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationBucket {
    pub label: String,
    pub count: usize,
}

/// Count durations into buckets split at `ticks`.
///
/// Bucket `i` holds durations below `ticks[i]` and at or above the previous
/// tick; a final bucket holds everything at or above the last tick.
pub fn duration_histogram(intervals: &[ActionInterval], ticks: &[i64]) -> Vec<DurationBucket> {
    let mut ticks = ticks.to_vec();
    ticks.sort_unstable();
    ticks.dedup();

    let mut counts = vec![0usize; ticks.len() + 1];
    for interval in intervals {
        let duration = interval.duration();
        let position = ticks.partition_point(|&tick| tick <= duration);
        counts[position] += 1;
    }

    let mut labels: Vec<String> = ticks.iter().map(|tick| format!("<{tick}")).collect();
    labels.push(match ticks.last() {
        Some(last) => format!(">={last}"),
        None => "all".to_string(),
    });

    labels
        .into_iter()
        .zip(counts)
        .map(|(label, count)| DurationBucket { label, count })
        .collect()
}
