//! Snapshot sources: a polled remote monitor or a static file

mod file;
mod remote;

pub use file::FileSource;
pub use remote::RemoteSource;

use crate::config::SourceConfig;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch one raw snapshot payload.
    async fn fetch_snapshot(&self) -> Result<Vec<u8>, TransportError>;

    /// Live sources are polled on every tick; static ones are read once.
    fn is_live(&self) -> bool;

    fn describe(&self) -> String;
}

/// Build the source described by `config`.
pub fn open(config: &SourceConfig) -> Result<Box<dyn DataSource>, TransportError> {
    match config {
        SourceConfig::Remote {
            host,
            endpoint,
            timeout_ms,
        } => Ok(Box::new(RemoteSource::new(
            host,
            endpoint,
            Duration::from_millis(*timeout_ms),
        )?)),
        SourceConfig::File { path } => Ok(Box::new(FileSource::new(path.clone()))),
    }
}
