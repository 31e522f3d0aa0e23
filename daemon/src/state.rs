//! In-memory aggregation state shared by the refresh loop and request handlers

use crate::histogram::{self, Measurement};
use crate::tree::{flatten, ActionInterval, CallTree};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::num::NonZeroU64;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Handle passed to both the scheduler and the query path. The three stores
/// are only ever locked together.
pub type SharedState = Arc<RwLock<AggregationState>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    AlreadyKnown,
    NewlyIngested { intervals: usize },
}

/// Ingested call trees, deduplicated by id, in ingestion order.
#[derive(Debug, Default)]
pub struct TreeStore {
    ids: HashSet<String>,
    trees: Vec<CallTree>,
}

impl TreeStore {
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn ingest(&mut self, tree: CallTree) -> bool {
        if !self.ids.insert(tree.id.clone()) {
            return false;
        }
        self.trees.push(tree);
        true
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// The last `limit` trees, oldest first.
    pub fn recent(&self, limit: usize) -> &[CallTree] {
        &self.trees[self.trees.len().saturating_sub(limit)..]
    }
}

/// Intervals grouped by action name, in arrival order.
#[derive(Debug, Default)]
pub struct ActionIndex {
    by_name: HashMap<String, Vec<ActionInterval>>,
    total: usize,
}

impl ActionIndex {
    pub fn record(&mut self, interval: ActionInterval) {
        self.total += 1;
        match self.by_name.get_mut(&interval.name) {
            Some(list) => list.push(interval),
            None => {
                self.by_name.insert(interval.name.clone(), vec![interval]);
            }
        }
    }

    pub fn get(&self, name: &str) -> &[ActionInterval] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Copy of one action's intervals sorted by start time.
    pub fn get_sorted(&self, name: &str) -> Vec<ActionInterval> {
        let mut sorted = self.get(name).to_vec();
        sorted.sort_by_key(|i| i.start_time);
        sorted
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ActionInterval])> {
        self.by_name.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn interval_count(&self) -> usize {
        self.total
    }
}

/// Widening `[min, max]` over every recorded interval start time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimestampRange {
    bounds: Option<Bounds>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: i64,
    pub max: i64,
}

impl TimestampRange {
    pub fn update(&mut self, start_time: i64) {
        self.bounds = Some(match self.bounds {
            Some(b) => Bounds {
                min: b.min.min(start_time),
                max: b.max.max(start_time),
            },
            None => Bounds {
                min: start_time,
                max: start_time,
            },
        });
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn min(&self) -> Option<i64> {
        self.bounds.map(|b| b.min)
    }

    pub fn max(&self) -> Option<i64> {
        self.bounds.map(|b| b.max)
    }
}

#[derive(Debug, Default)]
pub struct AggregationState {
    trees: TreeStore,
    index: ActionIndex,
    range: TimestampRange,
}

impl AggregationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedState {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Store a tree and record its intervals; a known id mutates nothing.
    pub fn ingest(&mut self, tree: CallTree) -> Ingest {
        if self.trees.contains(&tree.id) {
            return Ingest::AlreadyKnown;
        }
        let intervals = flatten(&tree);
        let count = intervals.len();
        self.trees.ingest(tree);
        for interval in intervals {
            self.record(interval);
        }
        Ingest::NewlyIngested { intervals: count }
    }

    pub fn record(&mut self, interval: ActionInterval) {
        self.range.update(interval.start_time);
        self.index.record(interval);
    }

    /// Drop everything, used when the monitored source changes.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn histogram(&self, name: &str, window: NonZeroU64) -> Vec<Measurement> {
        histogram::build(&self.index.get_sorted(name), &self.range, window)
    }

    pub fn trees(&self) -> &TreeStore {
        &self.trees
    }

    pub fn index(&self) -> &ActionIndex {
        &self.index
    }

    pub fn range(&self) -> TimestampRange {
        self.range
    }

    pub fn recent_trees(&self, limit: usize) -> &[CallTree] {
        self.trees.recent(limit)
    }
}
