//! Authenticated client for the Prism v1 REST API.

use async_trait::async_trait;
use nutanix_core::{DocumentSource, FetchError};
use reqwest::header::{HeaderValue, ACCEPT};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::ClusterTarget;

/// Fetches entity documents from one Prism endpoint.
#[derive(Debug, Clone)]
pub struct PrismClient {
    client: reqwest::Client,
    base: String,
    username: String,
    password: String,
}

impl PrismClient {
    /// Builds the HTTP client for `target`.
    pub fn new(target: &ClusterTarget, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .danger_accept_invalid_certs(!target.verify_tls)
            .build()?;

        Ok(Self {
            client,
            base: target.api_base(),
            username: target.username.clone(),
            password: target.password.clone(),
        })
    }

    /// Full URL of an API path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl DocumentSource for PrismClient {
    async fn fetch(&self, path: &str) -> Result<Value, FetchError> {
        let url = self.url_for(path);
        debug!(url = %url, "Fetching Prism document");

        let mut request = self
            .client
            .get(&url)
            .header(ACCEPT, HeaderValue::from_static("application/json"));
        if !self.username.is_empty() {
            request = request.basic_auth(&self.username, Some(&self.password));
        }

        let response = request.send().await.map_err(|e| FetchError::Transport {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| FetchError::Transport {
            path: path.to_string(),
            reason: format!("Read error: {}", e),
        })?;

        serde_json::from_slice(&body).map_err(|e| FetchError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_joins_paths() {
        let target = ClusterTarget::new("https://prism:9440/");
        let client = PrismClient::new(&target, 5).unwrap();
        assert_eq!(
            client.url_for("/hosts/"),
            "https://prism:9440/PrismGateway/services/rest/v1/hosts/"
        );
        assert_eq!(
            client.url_for("cluster/"),
            "https://prism:9440/PrismGateway/services/rest/v1/cluster/"
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // port 9 (discard) on localhost is not expected to accept HTTP
        let target = ClusterTarget::new("http://127.0.0.1:9");
        let client = PrismClient::new(&target, 2).unwrap();
        let err = client.fetch("/hosts/").await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
    }
}
