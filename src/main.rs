// Command-line entry point.
// Builds and prints the consolidated view of a single project.

use std::process::ExitCode;
use std::sync::Arc;

use scavenger::cache::ResponseCache;
use scavenger::github::GitHub;
use scavenger::{Aggregator, Config, ScavengerError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let Some(target) = std::env::args().nth(1) else {
        eprintln!("usage: scavenger <owner>/<name>");
        return ExitCode::from(2);
    };
    let Some((owner, name)) = target.split_once('/') else {
        eprintln!("expected <owner>/<name>, got '{}'", target);
        return ExitCode::from(2);
    };

    match run(owner, name).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Failed to build project view");
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scavenger=info"));

    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run(owner: &str, name: &str) -> Result<(), ScavengerError> {
    let config = Config::from_env();
    info!(database = %config.cache.database, enabled = config.cache.enabled, "Starting scavenger");

    let cache = Arc::new(ResponseCache::from_config(&config.cache)?);
    cache.start().await?;

    let github = GitHub::from_config(Arc::clone(&cache), &config)?;
    let aggregator = Aggregator::new(Arc::new(github));
    let result = aggregator.build_view(owner, name).await;

    cache.stop().await;

    let view = result?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
