use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::feed::{FetchError, SnapshotSource};
use crate::snapshot::Snapshot;

/// Single-endpoint JSON source. The snapshot sits under `key_path` in the
/// response envelope.
pub struct HttpSnapshotSource {
    client: Client,
    endpoint: Url,
    key_path: String,
}

impl HttpSnapshotSource {
    pub fn new(endpoint: Url, key_path: &str, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            endpoint,
            key_path: key_path.to_string(),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self) -> Result<Snapshot, FetchError> {
        let resp = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status().as_u16()));
        }

        let body: Value = resp.json().await.map_err(|e| {
            if e.is_decode() {
                FetchError::Schema(format!("body is not JSON: {}", e))
            } else {
                FetchError::Transport(e.to_string())
            }
        })?;

        Snapshot::from_envelope(&body, &self.key_path).map_err(FetchError::Schema)
    }
}
