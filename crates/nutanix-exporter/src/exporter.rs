//! Collectors of one Prism cluster and their combined scrape.

use futures::future::join_all;
use nutanix_core::{
    entities, CollectorError, DocumentSource, EntityCollector, ScrapeReport, SeriesDefinition,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::client::PrismClient;
use crate::config::ClusterTarget;

/// Result of one collector within a cluster scrape.
#[derive(Debug)]
pub struct CollectorOutcome {
    /// Collector name.
    pub collector: &'static str,
    /// Declared series after the scrape, ordered by key.
    pub series: Vec<Arc<SeriesDefinition>>,
    /// Report of the scrape, or why it failed.
    pub result: Result<ScrapeReport, CollectorError>,
    /// Wall time of the scrape.
    pub duration: Duration,
}

impl CollectorOutcome {
    /// Whether the scrape succeeded.
    pub fn success(&self) -> bool {
        self.result.is_ok()
    }
}

/// One scrape of every collector of a cluster.
#[derive(Debug)]
pub struct ClusterScrape {
    /// Cluster name.
    pub cluster: String,
    /// One outcome per collector, in configuration order.
    pub outcomes: Vec<CollectorOutcome>,
}

/// The entity collectors attached to one Prism cluster.
#[derive(Debug)]
pub struct ClusterExporter {
    name: String,
    collectors: Vec<EntityCollector>,
}

impl ClusterExporter {
    /// Builds collectors for the named entity types over `source`.
    pub fn new(
        name: &str,
        source: Arc<dyn DocumentSource>,
        collectors: &[String],
    ) -> anyhow::Result<Self> {
        let mut built = Vec::with_capacity(collectors.len());
        for collector in collectors {
            let Some(config) = entities::by_name(collector) else {
                anyhow::bail!("Unknown collector: {}", collector);
            };
            built.push(EntityCollector::new(config, Arc::clone(&source))?);
        }
        Ok(Self {
            name: name.to_string(),
            collectors: built,
        })
    }

    /// Builds the collectors of a configured cluster over a Prism client.
    pub fn from_target(name: &str, target: &ClusterTarget, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = PrismClient::new(target, timeout_secs)?;
        info!(cluster = name, url = %target.api_base(), collectors = ?target.collectors, "Configured cluster");
        Self::new(name, Arc::new(client), &target.collectors)
    }

    /// Total number of declared series over all collectors.
    pub fn series_count(&self) -> usize {
        self.collectors.iter().map(|c| c.registry().len()).sum()
    }

    /// Scrapes every collector concurrently. A failing collector does not
    /// affect the others.
    pub async fn scrape_all(&self) -> ClusterScrape {
        let futures: Vec<_> = self
            .collectors
            .iter()
            .map(|collector| async move {
                let start = Instant::now();
                let result = collector.scrape().await;
                CollectorOutcome {
                    collector: collector.name(),
                    series: collector.series(),
                    result,
                    duration: start.elapsed(),
                }
            })
            .collect();

        ClusterScrape {
            cluster: self.name.clone(),
            outcomes: join_all(futures).await,
        }
    }
}
