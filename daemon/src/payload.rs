//! Locating call trees inside a snapshot payload
//!
//! Snapshots come in three shapes: an envelope with the tree list at a
//! known JSON pointer, a bare list of trees, or one tree on its own. The
//! shapes are tried in that order and the first match wins.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pointer to the tree list inside the monitor's stats envelope.
pub const DEFAULT_ENVELOPE: &str = "/react_aggregator/recent_trees";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Envelope,
    TreeList,
    SingleTree,
}

const STRATEGIES: [Strategy; 3] = [Strategy::Envelope, Strategy::TreeList, Strategy::SingleTree];

impl Strategy {
    fn try_extract(self, payload: &mut Value, envelope: &str) -> Option<Vec<Value>> {
        match self {
            Strategy::Envelope => payload
                .pointer_mut(envelope)
                .and_then(Value::as_array_mut)
                .map(std::mem::take),
            Strategy::TreeList => payload.as_array_mut().map(std::mem::take),
            Strategy::SingleTree => Some(vec![payload.take()]),
        }
    }
}

#[derive(Debug)]
pub struct Extracted {
    pub strategy: Strategy,
    pub trees: Vec<Value>,
}

/// Decode a raw snapshot with no nesting limit.
///
/// Call trees can be arbitrarily deep, so the parser's recursion limit is
/// lifted and its stack grows onto the heap as needed.
pub fn decode(raw: &[u8]) -> Result<Value, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_slice(raw);
    de.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    match de.end() {
        Ok(()) => Ok(value),
        Err(e) => {
            dispose(value);
            Err(e)
        }
    }
}

/// Drop a value of any depth without recursing.
pub fn dispose(value: Value) {
    let mut pending = vec![value];
    while let Some(mut value) = pending.pop() {
        match &mut value {
            Value::Array(items) => pending.append(items),
            Value::Object(fields) => {
                pending.extend(std::mem::take(fields).into_iter().map(|(_, v)| v));
            }
            _ => {}
        }
    }
}

/// Split a decoded payload into candidate trees. Never fails: anything that
/// is not a list is treated as a single tree and validated later.
pub fn extract(mut payload: Value, envelope: &str) -> Extracted {
    for strategy in STRATEGIES {
        if let Some(trees) = strategy.try_extract(&mut payload, envelope) {
            // Whatever surrounded the tree list.
            dispose(payload);
            return Extracted { strategy, trees };
        }
    }
    Extracted {
        strategy: Strategy::SingleTree,
        trees: vec![payload],
    }
}
