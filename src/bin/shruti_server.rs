use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use shruti_trainer::config::AppConfig;
use shruti_trainer::engine::EngineHandle;
use shruti_trainer::http::run_http_server;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "shruti-server",
    about = "WebSocket pitch analysis service for Shruti Trainer"
)]
struct Cli {
    /// JSON configuration file (defaults to $SHRUTI_CONFIG or config/shruti.json)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Bind address, overriding the configuration file
    #[arg(long, env = "SHRUTI_ADDR")]
    addr: Option<String>,
    /// Worker threads for pitch estimation, overriding the configuration file
    #[arg(long)]
    workers: Option<usize>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };
    if let Some(addr) = cli.addr {
        config.server.bind_addr = addr;
    }
    if let Some(workers) = cli.workers {
        config.ingestion.worker_threads = workers;
    }

    let addr: SocketAddr = config
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("parsing bind address {}", config.server.bind_addr))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    runtime.block_on(serve(config, addr))?;

    Ok(ExitCode::from(0))
}

async fn serve(config: AppConfig, addr: SocketAddr) -> Result<()> {
    let engine = Arc::new(EngineHandle::new(config).context("starting engine")?);
    let sweeper = engine.spawn_sweeper();
    let result = run_http_server(Arc::clone(&engine), addr).await;
    sweeper.abort();
    result
}
