//! HTTP endpoints of the exporter.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;

use crate::config::ExporterConfig;
use crate::exporter::ClusterExporter;
use crate::exposition;

/// Errors returned by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// `?cluster=` names a cluster that is not configured.
    #[error("Unknown cluster: {0}")]
    UnknownCluster(String),
    /// No cluster to fall back to.
    #[error("No clusters configured")]
    NoClusters,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::UnknownCluster(_) => StatusCode::NOT_FOUND,
            ApiError::NoClusters => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, self.to_string()).into_response()
    }
}

/// Query string of `/metrics`.
#[derive(Debug, Default, Deserialize)]
pub struct MetricsQuery {
    /// Cluster to scrape.
    pub cluster: Option<String>,
}

/// HTTP surface of the exporter: one scrape of the selected cluster per
/// `/metrics` request.
#[derive(Debug)]
pub struct ExporterApi {
    bind_addr: SocketAddr,
    exporters: BTreeMap<String, Arc<ClusterExporter>>,
    default_cluster: Option<String>,
}

impl ExporterApi {
    /// Creates the API; without an explicit default the first cluster by
    /// name is served.
    pub fn new(
        bind_addr: SocketAddr,
        exporters: BTreeMap<String, Arc<ClusterExporter>>,
        default_cluster: Option<String>,
    ) -> Self {
        let default_cluster = default_cluster.or_else(|| exporters.keys().next().cloned());
        Self {
            bind_addr,
            exporters,
            default_cluster,
        }
    }

    /// Builds one exporter per configured cluster.
    pub fn from_config(config: &ExporterConfig) -> anyhow::Result<Self> {
        let mut exporters = BTreeMap::new();
        for (name, target) in &config.clusters {
            let exporter = ClusterExporter::from_target(name, target, config.request_timeout_secs)?;
            exporters.insert(name.clone(), Arc::new(exporter));
        }
        Ok(Self::new(
            config.bind_addr,
            exporters,
            config.default_cluster().map(str::to_string),
        ))
    }

    /// Exporter for `cluster`, or the default one.
    pub fn exporter(&self, cluster: Option<&str>) -> Result<&Arc<ClusterExporter>, ApiError> {
        let name = match cluster {
            Some(name) => name,
            None => self.default_cluster.as_deref().ok_or(ApiError::NoClusters)?,
        };
        self.exporters
            .get(name)
            .ok_or_else(|| ApiError::UnknownCluster(name.to_string()))
    }

    /// Routes of the exporter.
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/", get(index_handler))
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .with_state(self)
    }

    /// Serves until ctrl-c.
    pub async fn serve(self) -> anyhow::Result<()> {
        let addr = self.bind_addr;
        let router = Arc::new(self).router();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Exporter listening on {}", addr);

        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

async fn index_handler() -> Html<&'static str> {
    Html(
        "<html><head><title>Nutanix Exporter</title></head><body>\
         <h1>Nutanix Exporter</h1>\
         <p><a href=\"/metrics\">Metrics</a></p>\
         </body></html>",
    )
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn ready_handler(State(state): State<Arc<ExporterApi>>) -> Json<serde_json::Value> {
    let clusters: BTreeMap<&str, usize> = state
        .exporters
        .iter()
        .map(|(name, exporter)| (name.as_str(), exporter.series_count()))
        .collect();
    Json(serde_json::json!({
        "status": "ok",
        "clusters": clusters
    }))
}

async fn metrics_handler(
    State(state): State<Arc<ExporterApi>>,
    Query(query): Query<MetricsQuery>,
) -> Result<Response, ApiError> {
    let exporter = state.exporter(query.cluster.as_deref())?;
    let scrape = exporter.scrape_all().await;
    let body = exposition::render(&scrape);
    Ok(([(header::CONTENT_TYPE, exposition::CONTENT_TYPE)], body).into_response())
}
