//! Call tree model and flattening into named time intervals

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MalformedTreeError {
    #[error("call tree has no id")]
    MissingId,
    #[error("call tree {0} has no actions list")]
    MissingActions(String),
    #[error("invalid call tree: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// One timed operation as reported by the monitored process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    pub start_time: i64,
    pub stop_time: i64,
    /// Nested operations; absent in the payload means a leaf.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
}

// Nested actions are torn down iteratively so deep trees cannot overflow
// the stack when dropped.
impl Drop for Action {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.actions);
        while let Some(mut action) = pending.pop() {
            pending.append(&mut action.actions);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallTree {
    pub id: String,
    pub actions: Vec<Action>,
}

#[derive(Deserialize)]
struct RawCallTree {
    id: Option<String>,
    actions: Option<Vec<Action>>,
}

impl CallTree {
    /// Validate one tree taken out of a snapshot payload.
    pub fn from_value(value: serde_json::Value) -> Result<Self, MalformedTreeError> {
        let raw = RawCallTree::deserialize(serde_stacker::Deserializer::new(value))?;
        let id = raw.id.ok_or(MalformedTreeError::MissingId)?;
        let actions = raw
            .actions
            .ok_or_else(|| MalformedTreeError::MissingActions(id.clone()))?;
        Ok(CallTree { id, actions })
    }
}

/// A flattened action, relative to the start of its tree's first root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInterval {
    pub name: String,
    #[serde(rename = "startTime")]
    pub start_time: i64,
    #[serde(rename = "endTime")]
    pub end_time: i64,
}

impl ActionInterval {
    pub fn duration(&self) -> i64 {
        self.end_time.saturating_sub(self.start_time)
    }
}

/// Flatten a call tree into intervals in pre-order.
///
/// Top-level actions are roots and produce no interval; every descendant
/// produces one, shifted by the start time of the first root. Traversal
/// uses an explicit stack so tree depth is not bounded by the call stack.
pub fn flatten(tree: &CallTree) -> Vec<ActionInterval> {
    let Some(first) = tree.actions.first() else {
        return Vec::new();
    };
    let delta = first.start_time;

    let mut intervals = Vec::new();
    let mut stack: Vec<(&Action, bool)> = tree.actions.iter().rev().map(|a| (a, false)).collect();

    while let Some((action, emit)) = stack.pop() {
        if emit {
            intervals.push(ActionInterval {
                name: action.name.clone(),
                start_time: action.start_time.saturating_sub(delta),
                end_time: action.stop_time.saturating_sub(delta),
            });
        }
        // Reversed so the first child is popped first.
        stack.extend(action.actions.iter().rev().map(|child| (child, true)));
    }

    intervals
}
