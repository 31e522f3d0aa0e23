use super::{DataSource, TransportError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// A monitored process exposing its call trees over HTTP.
pub struct RemoteSource {
    client: reqwest::Client,
    url: String,
}

impl RemoteSource {
    pub fn new(host: &str, endpoint: &str, timeout: Duration) -> Result<Self, TransportError> {
        let url = snapshot_url(host, endpoint);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| TransportError::Http {
                url: url.clone(),
                source,
            })?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn snapshot_url(host: &str, endpoint: &str) -> String {
    let host = host.trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{host}/{endpoint}")
    } else {
        format!("http://{host}/{endpoint}")
    }
}

#[async_trait]
impl DataSource for RemoteSource {
    async fn fetch_snapshot(&self) -> Result<Vec<u8>, TransportError> {
        let http_err = |source| TransportError::Http {
            url: self.url.clone(),
            source,
        };
        let response = self.client.get(&self.url).send().await.map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(http_err)?;
        debug!(url = %self.url, bytes = body.len(), "fetched snapshot");
        Ok(body.to_vec())
    }

    fn is_live(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
