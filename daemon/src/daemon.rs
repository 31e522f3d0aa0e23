//! Request handling on top of the shared aggregation state

use crate::config::GeneralConfig;
use crate::histogram;
use crate::protocol::{Request, Response, StatusData};
use crate::refresh::Refresher;
use crate::socket::RequestHandler;
use crate::source;
use std::num::NonZeroU64;
use std::sync::Arc;

pub struct DaemonState {
    refresher: Arc<Refresher>,
    general: GeneralConfig,
}

impl DaemonState {
    pub fn new(refresher: Arc<Refresher>, general: GeneralConfig) -> Self {
        Self { refresher, general }
    }

    pub fn refresher(&self) -> &Arc<Refresher> {
        &self.refresher
    }

    pub async fn status(&self) -> StatusData {
        // Source and aggregates change together under the state lock.
        let state = self.refresher.state().read().await;
        let source = self.refresher.active_source().await;
        let last_cycle = self.refresher.last_cycle().await;
        StatusData {
            trees: state.trees().len(),
            actions: state.index().len(),
            intervals: state.index().interval_count(),
            range: state.range().bounds(),
            source,
            last_cycle,
        }
    }
}

fn to_data<T: serde::Serialize>(value: &T) -> Response {
    match serde_json::to_value(value) {
        Ok(data) => Response::data(data),
        Err(e) => Response::error(e),
    }
}

#[async_trait::async_trait]
impl RequestHandler for DaemonState {
    async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::Status => Response::Status {
                data: self.status().await,
            },

            Request::ListActions => {
                let state = self.refresher.state().read().await;
                to_data(&state.index().names())
            }

            Request::Histogram { params } => {
                let window = match params.window_size {
                    None => self.general.window(),
                    Some(size) => match NonZeroU64::new(size) {
                        Some(window) => window,
                        None => return Response::error("window_size must be positive"),
                    },
                };
                let state = self.refresher.state().read().await;
                to_data(&state.histogram(&params.name, window))
            }

            Request::Summary => {
                let state = self.refresher.state().read().await;
                to_data(&histogram::summarize(state.index()))
            }

            Request::DurationHistogram { params } => {
                let state = self.refresher.state().read().await;
                to_data(&histogram::duration_histogram(
                    state.index().get(&params.name),
                    &params.ticks,
                ))
            }

            Request::RecentTrees { params } => {
                let limit = params.limit.unwrap_or(self.general.recent_trees);
                let state = self.refresher.state().read().await;
                to_data(&state.recent_trees(limit))
            }

            Request::SwitchSource { params } => match source::open(&params) {
                Ok(next) => to_data(&self.refresher.switch_source(next).await),
                Err(e) => Response::error(e),
            },

            Request::Refresh => to_data(&self.refresher.refresh().await),
        }
    }
}
