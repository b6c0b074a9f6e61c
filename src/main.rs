//! Request logger demo server.
//!
//! Loads a logger configuration, builds the text logger, and serves a demo
//! router with every exchange logged through it.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use request_logger::config::{load_config, LoggerConfig};
use request_logger::http::server::{DemoServer, HEALTH_PATH};
use request_logger::{Logger, RequestLoggingLayer};

#[derive(Parser)]
#[command(name = "request-logger")]
#[command(about = "Demo server for the request logging layer", long_about = None)]
struct Cli {
    /// TOML logger configuration; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:3000")]
    bind: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "request_logger=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => LoggerConfig::default(),
    };

    tracing::info!(
        label = %config.label,
        level = %config.level,
        timezones = config.timezones.len(),
        "Configuration loaded"
    );

    let logger = Arc::new(Logger::from_config(&config)?);
    logger.info("request-logger starting");

    let layer = RequestLoggingLayer::from_config(&config, logger.clone())
        .skip(|req| req.uri().path() == HEALTH_PATH)
        .build();

    let listener = TcpListener::bind(&cli.bind).await?;
    let server = DemoServer::new(layer, Duration::from_secs(cli.timeout_secs));
    server.run(listener).await?;

    logger.info("request-logger stopped");
    Ok(())
}
