//! Ingestion cycles and the background refresh loop
//!
//! A cycle fetches one snapshot, splits it into trees and applies every new
//! tree to the shared state under a single write lock, so readers see either
//! all of a cycle's mutations or none. Failures abort the cycle before the
//! state is touched and never stop the loop.

use crate::payload::{self, Strategy};
use crate::source::{DataSource, TransportError};
use crate::state::{Ingest, SharedState};
use crate::tree::CallTree;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("fetch failed: {0}")]
    Transport(#[from] TransportError),
    #[error("snapshot is not valid JSON: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

/// What one successful cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub source: String,
    pub strategy: Option<Strategy>,
    /// Candidate trees found in the payload.
    pub trees: usize,
    pub ingested: usize,
    pub known: usize,
    pub malformed: usize,
    pub intervals: usize,
}

/// Outcome of the last cycle, as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleStatus {
    Completed(CycleReport),
    Failed { source: String, error: String },
}

impl CycleStatus {
    fn new(source: String, result: &Result<CycleReport, CycleError>) -> Self {
        match result {
            Ok(report) => CycleStatus::Completed(report.clone()),
            Err(e) => CycleStatus::Failed {
                source,
                error: e.to_string(),
            },
        }
    }
}

/// Run one fetch → extract → ingest pass.
pub async fn ingest_cycle(
    source: &dyn DataSource,
    state: &SharedState,
    envelope: &str,
) -> Result<CycleReport, CycleError> {
    let raw = source.fetch_snapshot().await?;
    let payload = payload::decode(&raw)?;
    let extracted = payload::extract(payload, envelope);

    let mut report = CycleReport {
        source: source.describe(),
        strategy: Some(extracted.strategy),
        trees: extracted.trees.len(),
        ..CycleReport::default()
    };

    let mut trees = Vec::with_capacity(extracted.trees.len());
    for (position, value) in extracted.trees.into_iter().enumerate() {
        match CallTree::from_value(value) {
            Ok(tree) => trees.push(tree),
            Err(e) => {
                warn!(position, error = %e, "skipping malformed call tree");
                report.malformed += 1;
            }
        }
    }

    let mut state = state.write().await;
    for tree in trees {
        match state.ingest(tree) {
            Ingest::AlreadyKnown => report.known += 1,
            Ingest::NewlyIngested { intervals } => {
                report.ingested += 1;
                report.intervals += intervals;
            }
        }
    }

    Ok(report)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSource {
    pub description: String,
    pub live: bool,
}

impl ActiveSource {
    fn of(source: &dyn DataSource) -> Self {
        Self {
            description: source.describe(),
            live: source.is_live(),
        }
    }
}

/// Owns the active source and serializes every cycle against it.
pub struct Refresher {
    state: SharedState,
    // Held for the whole cycle: no two cycles overlap and a source switch
    // waits for the in-flight cycle.
    source: Mutex<Box<dyn DataSource>>,
    active: RwLock<ActiveSource>,
    envelope: String,
    last: RwLock<Option<CycleStatus>>,
    reports: broadcast::Sender<CycleStatus>,
}

impl Refresher {
    pub fn new(state: SharedState, source: Box<dyn DataSource>, envelope: impl Into<String>) -> Self {
        let (reports, _) = broadcast::channel(16);
        Self {
            state,
            active: RwLock::new(ActiveSource::of(source.as_ref())),
            source: Mutex::new(source),
            envelope: envelope.into(),
            last: RwLock::new(None),
            reports,
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Receive the status of every cycle from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CycleStatus> {
        self.reports.subscribe()
    }

    pub async fn last_cycle(&self) -> Option<CycleStatus> {
        self.last.read().await.clone()
    }

    /// The current source, readable while a cycle is running.
    pub async fn active_source(&self) -> ActiveSource {
        self.active.read().await.clone()
    }

    pub async fn is_live(&self) -> bool {
        self.active.read().await.live
    }

    /// Run one cycle now.
    pub async fn refresh(&self) -> CycleStatus {
        let source = self.source.lock().await;
        self.run_locked(&**source).await
    }

    /// Replace the source, clear all aggregates and load the new source once.
    pub async fn switch_source(&self, next: Box<dyn DataSource>) -> CycleStatus {
        let mut source = self.source.lock().await;
        info!(from = %source.describe(), to = %next.describe(), "switching data source");
        {
            // Readers holding the state lock never see the new source next
            // to the old aggregates.
            let mut state = self.state.write().await;
            state.reset();
            *self.active.write().await = ActiveSource::of(next.as_ref());
            *self.last.write().await = None;
        }
        *source = next;
        self.run_locked(&**source).await
    }

    async fn run_locked(&self, source: &dyn DataSource) -> CycleStatus {
        let result = ingest_cycle(source, &self.state, &self.envelope).await;
        match &result {
            Ok(report) => debug!(
                source = %report.source,
                trees = report.trees,
                ingested = report.ingested,
                known = report.known,
                malformed = report.malformed,
                intervals = report.intervals,
                "ingestion cycle completed"
            ),
            Err(e) => warn!(source = %source.describe(), error = %e, "ingestion cycle failed"),
        }

        let status = CycleStatus::new(source.describe(), &result);
        *self.last.write().await = Some(status.clone());
        // No subscribers is fine.
        let _ = self.reports.send(status.clone());
        status
    }
}

/// Background scheduler: waits `delay` between cycles and only polls live
/// sources. Static sources are loaded by an explicit `refresh` instead.
pub async fn refresh_loop(refresher: Arc<Refresher>, delay: Duration) {
    loop {
        tokio::time::sleep(delay).await;
        if !refresher.is_live().await {
            continue;
        }
        refresher.refresh().await;
    }
}
