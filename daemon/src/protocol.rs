//! IPC protocol definitions (JSON messages)

use crate::config::SourceConfig;
use crate::refresh::{ActiveSource, CycleStatus};
use crate::state::Bounds;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    Ping,
    Status,
    ListActions,
    Histogram { params: HistogramParams },
    Summary,
    DurationHistogram { params: DurationHistogramParams },
    RecentTrees {
        #[serde(default)]
        params: RecentTreesParams,
    },
    SwitchSource { params: SourceConfig },
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramParams {
    pub name: String,
    /// Bucket width in raw time units; the configured default when absent.
    pub window_size: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurationHistogramParams {
    pub name: String,
    pub ticks: Vec<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecentTreesParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong,
    Response { id: Option<String>, data: serde_json::Value },
    Status { data: StatusData },
    Cycle { data: CycleStatus },
}

impl Response {
    pub fn data(data: serde_json::Value) -> Self {
        Response::Response { id: None, data }
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Self::data(serde_json::json!({ "error": message.to_string() }))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusData {
    pub trees: usize,
    pub actions: usize,
    pub intervals: usize,
    pub range: Option<Bounds>,
    pub source: ActiveSource,
    pub last_cycle: Option<CycleStatus>,
}
