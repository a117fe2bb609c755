//! Exporter configuration.

use nutanix_core::entities;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;

/// Name used for the cluster given on the command line.
pub const DEFAULT_CLUSTER: &str = "default";

/// Path of the Prism v1 REST API below the cluster URL.
pub const PRISM_API_PREFIX: &str = "/PrismGateway/services/rest/v1";

/// Exporter configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Listen address of the HTTP server.
    pub bind_addr: SocketAddr,
    /// Timeout of one Prism request.
    pub request_timeout_secs: u64,
    /// Prism clusters by name.
    pub clusters: BTreeMap<String, ClusterTarget>,
}

/// Connection settings of one Prism cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterTarget {
    /// Prism URL, e.g. `https://prism.example.com:9440`.
    pub url: String,
    /// Basic auth user; empty disables auth.
    #[serde(default)]
    pub username: String,
    /// Basic auth password.
    #[serde(default)]
    pub password: String,
    /// Verify the server certificate.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    /// Enabled collectors; all by default.
    #[serde(default = "default_collectors")]
    pub collectors: Vec<String>,
}

fn default_verify_tls() -> bool {
    true
}

fn default_collectors() -> Vec<String> {
    entities::all().iter().map(|c| c.name.to_string()).collect()
}

impl ClusterTarget {
    /// Target with default settings.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            username: String::new(),
            password: String::new(),
            verify_tls: default_verify_tls(),
            collectors: default_collectors(),
        }
    }

    /// Base URL of the REST API, with the Prism gateway prefix appended
    /// unless the configured URL already carries it.
    pub fn api_base(&self) -> String {
        let url = self.url.trim_end_matches('/');
        if url.contains("/PrismGateway") {
            url.to_string()
        } else {
            format!("{}{}", url, PRISM_API_PREFIX)
        }
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9405)),
            request_timeout_secs: 30,
            clusters: BTreeMap::new(),
        }
    }
}

impl ExporterConfig {
    /// Loads a `.toml` or `.json` file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => {
                let config: ExporterConfig = toml::from_str(&contents)?;
                Ok(config)
            }
            "json" => {
                let config: ExporterConfig = serde_json::from_str(&contents)?;
                Ok(config)
            }
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        }
    }

    /// Checks that every cluster is usable.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.clusters.is_empty() {
            anyhow::bail!("No clusters configured");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than zero");
        }
        for (name, target) in &self.clusters {
            let url = reqwest::Url::parse(&target.url)
                .map_err(|e| anyhow::anyhow!("Cluster {}: invalid url {:?}: {}", name, target.url, e))?;
            if !matches!(url.scheme(), "http" | "https") {
                anyhow::bail!("Cluster {}: unsupported scheme {}", name, url.scheme());
            }
            if target.collectors.is_empty() {
                anyhow::bail!("Cluster {}: no collectors enabled", name);
            }
            for collector in &target.collectors {
                if entities::by_name(collector).is_none() {
                    anyhow::bail!("Cluster {}: unknown collector {}", name, collector);
                }
            }
        }
        Ok(())
    }

    /// Cluster served when a scrape does not name one.
    pub fn default_cluster(&self) -> Option<&str> {
        if self.clusters.contains_key(DEFAULT_CLUSTER) {
            Some(DEFAULT_CLUSTER)
        } else {
            self.clusters.keys().next().map(String::as_str)
        }
    }
}
