use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rediff::cli::Args;
use rediff::{ConnectionPool, DiffConfig, Reconciler, ReportOptions};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let loaded = DiffConfig::load(args.config.as_deref()).map(|base| args.into_config(base));

    let quiet = loaded.as_ref().map(|c| c.quiet).unwrap_or(false);
    init_logging(quiet);

    let result = match loaded {
        Ok(config) => run(config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(quiet: bool) {
    let default = if quiet { "rediff=warn" } else { "rediff=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(config: DiffConfig) -> Result<()> {
    config.validate()?;

    let (endpoint_a, endpoint_b) = config.endpoints()?;
    let pool = ConnectionPool::connect(&endpoint_a, &endpoint_b, config.pool_size, config.selection).await?;

    let mut reconciler = Reconciler::new(Arc::new(pool), &config)?;
    let report = reconciler.run().await?;

    if config.json {
        println!("{}", report.to_json()?);
    } else {
        report.display(ReportOptions::from(&config));
    }

    Ok(())
}
