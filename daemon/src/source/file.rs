use super::{DataSource, TransportError};
use async_trait::async_trait;
use std::path::PathBuf;

/// A snapshot saved to disk.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl DataSource for FileSource {
    async fn fetch_snapshot(&self) -> Result<Vec<u8>, TransportError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| TransportError::Io {
                path: self.path.clone(),
                source,
            })
    }

    fn is_live(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
