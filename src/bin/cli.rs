//! Youth mobility aggregator CLI
//!
//! Runs the HTTP service, or a single uncached scrape for debugging.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand};
use mobility::{
    config,
    error::{AppError, Result},
    pipeline::{Aggregator, ProjectService},
    server,
    services::SourceRegistry,
    utils::http::HttpFetcher,
};

/// Open calls for youth exchanges and training courses
#[derive(Parser, Debug)]
#[command(
    name = "mobility",
    version,
    about = "Youth mobility project aggregator"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API
    Serve,

    /// Scrape once, bypassing the cache, and print JSON
    Scrape {
        /// Source or group id (default: every source)
        #[arg(long)]
        source: Option<String>,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = config::load_config(&cli.config)?;
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Serve => {
            config.validate()?;
            let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
                .parse()
                .map_err(|e| AppError::config(format!("invalid server address: {e}")))?;
            let service = Arc::new(ProjectService::from_config(&config)?);
            log::info!(
                "Selectable ids: {}",
                service.registry().ids().join(", ")
            );
            server::serve(service, addr).await?;
        }

        Command::Scrape { source } => {
            config.validate()?;
            let fetcher = Arc::new(HttpFetcher::from_config(&config.crawler)?);
            let registry = SourceRegistry::from_config(&config, fetcher)?;
            let sources = match &source {
                Some(id) => registry
                    .select(id)
                    .ok_or_else(|| AppError::UnknownSource(id.clone()))?,
                None => registry.all().to_vec(),
            };

            let aggregator = Aggregator::from_config(&config.crawler);
            let outcome = aggregator
                .scrape_all(&sources, Local::now().date_naive())
                .await;
            for failure in &outcome.failures {
                log::error!("{}: {}", failure.source_id, failure.message);
            }
            println!("{}", serde_json::to_string_pretty(&outcome.projects)?);
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} sources, {} groups)",
                config.sources.len(),
                config.groups.len()
            );
        }
    }

    Ok(())
}
