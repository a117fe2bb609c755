#![warn(missing_docs)]

//! Prometheus exporter for Nutanix Prism clusters.
//!
//! Wires the schema engine of `nutanix-core` to the Prism REST API and serves
//! the result in the Prometheus text format.

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod exporter;
pub mod exposition;

pub use api::{ApiError, ExporterApi};
pub use client::PrismClient;
pub use config::{ClusterTarget, ExporterConfig};
pub use exporter::{ClusterExporter, ClusterScrape, CollectorOutcome};
