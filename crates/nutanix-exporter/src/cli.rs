//! Command line interface.

use crate::api::ExporterApi;
use crate::config::{ClusterTarget, ExporterConfig, DEFAULT_CLUSTER};
use crate::exporter::ClusterExporter;
use crate::exposition;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Command line of the exporter binary.
#[derive(Parser, Debug)]
#[command(name = "nutanix-exporter")]
#[command(about = "Prometheus exporter for Nutanix Prism", version, long_about = None)]
pub struct Cli {
    /// Default log filter when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info", env = "NUTANIX_EXPORTER_LOG")]
    pub log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[allow(missing_docs)]
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve /metrics over HTTP.
    Serve {
        /// Config file (TOML or JSON); defaults apply when it is missing.
        #[arg(short, long, default_value = "/etc/nutanix-exporter/config.toml")]
        config: PathBuf,
        /// Overrides `bind_addr` from the config file.
        #[arg(short, long)]
        listen: Option<SocketAddr>,
        #[allow(missing_docs)]
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Scrape one cluster once and print the exposition to stdout.
    Scrape {
        /// Config file (TOML or JSON); defaults apply when it is missing.
        #[arg(short, long, default_value = "/etc/nutanix-exporter/config.toml")]
        config: PathBuf,
        /// Cluster to scrape; defaults to `default` or the first configured.
        #[arg(long)]
        cluster: Option<String>,
        #[allow(missing_docs)]
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Parse and validate a config file.
    CheckConfig {
        /// Config file to check.
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Single-cluster settings given on the command line or in the environment.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Prism URL, registered as the `default` cluster.
    #[arg(long, env = "NUTANIX_PRISM_URL")]
    pub prism_url: Option<String>,
    /// Prism user, applied to clusters without one.
    #[arg(long, env = "NUTANIX_USERNAME")]
    pub username: Option<String>,
    /// Prism password, applied to clusters without one.
    #[arg(long, env = "NUTANIX_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// Skip TLS certificate verification.
    #[arg(long)]
    pub insecure: bool,
}

impl TargetArgs {
    /// Applies the overrides: `--prism-url` replaces the default cluster,
    /// credentials fill clusters that have none.
    pub fn apply(&self, config: &mut ExporterConfig) {
        if let Some(url) = &self.prism_url {
            let mut target = config
                .clusters
                .remove(DEFAULT_CLUSTER)
                .unwrap_or_else(|| ClusterTarget::new(url));
            target.url = url.clone();
            config.clusters.insert(DEFAULT_CLUSTER.to_string(), target);
        }

        for target in config.clusters.values_mut() {
            if let Some(username) = &self.username {
                if target.username.is_empty() {
                    target.username = username.clone();
                }
            }
            if let Some(password) = &self.password {
                if target.password.is_empty() {
                    target.password = password.clone();
                }
            }
            if self.insecure {
                target.verify_tls = false;
            }
        }
    }
}

/// Loads the config file, falling back to defaults when it does not exist,
/// then applies command-line overrides.
pub fn load_config(path: &Path, target: &TargetArgs) -> Result<ExporterConfig> {
    let mut config = if path.exists() {
        ExporterConfig::from_file(path)?
    } else {
        tracing::warn!("Config file not found, using defaults: {}", path.display());
        ExporterConfig::default()
    };
    target.apply(&mut config);
    Ok(config)
}

impl Cli {
    /// Runs the selected subcommand.
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Serve {
                ref config,
                listen,
                ref target,
            } => serve(config, listen, target).await,
            Command::Scrape {
                ref config,
                ref cluster,
                ref target,
            } => scrape_once(config, cluster.as_deref(), target).await,
            Command::CheckConfig { ref config } => check_config(config),
        }
    }
}

async fn serve(path: &Path, listen: Option<SocketAddr>, target: &TargetArgs) -> Result<()> {
    let mut config = load_config(path, target)?;
    if let Some(addr) = listen {
        config.bind_addr = addr;
    }
    config.validate()?;

    let api = ExporterApi::from_config(&config)?;
    api.serve().await
}

async fn scrape_once(path: &Path, cluster: Option<&str>, target: &TargetArgs) -> Result<()> {
    let config = load_config(path, target)?;
    config.validate()?;

    let name = match cluster {
        Some(name) => name,
        None => config
            .default_cluster()
            .ok_or_else(|| anyhow::anyhow!("No clusters configured"))?,
    };
    let Some(cluster_target) = config.clusters.get(name) else {
        anyhow::bail!("Unknown cluster: {}", name);
    };

    let exporter = ClusterExporter::from_target(name, cluster_target, config.request_timeout_secs)?;
    let scrape = exporter.scrape_all().await;
    for outcome in &scrape.outcomes {
        if let Err(e) = &outcome.result {
            tracing::warn!(collector = outcome.collector, error = %e, "Collector failed");
        }
    }
    print!("{}", exposition::render(&scrape));
    Ok(())
}

fn check_config(path: &Path) -> Result<()> {
    let config = ExporterConfig::from_file(path)?;
    config.validate()?;

    println!("Config OK: {}", path.display());
    println!("  bind_addr: {}", config.bind_addr);
    for (name, target) in &config.clusters {
        println!(
            "  cluster {}: {} (collectors: {})",
            name,
            target.api_base(),
            target.collectors.join(", ")
        );
    }
    Ok(())
}
