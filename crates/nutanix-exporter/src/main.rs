use anyhow::Result;
use clap::Parser;
use nutanix_exporter::cli::Cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout is reserved for `scrape` output
    let text = (!json).then(|| fmt::layer().with_writer(std::io::stderr));
    let json = json.then(|| fmt::layer().json().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    tracing::info!("Nutanix exporter {} starting", env!("CARGO_PKG_VERSION"));

    cli.run().await
}
