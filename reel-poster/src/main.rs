//! reel-poster - poster URL resolver for reelshelf
//!
//! `serve` runs the HTTP API; `resolve` resolves URLs from the command line
//! and prints one JSON report (or HTML fragment) per URL.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reel_common::config::{ConfigResolver, LoggingConfig, TomlConfig};
use reel_common::events::EventBus;
use reel_poster::api::{build_router, AppState};
use reel_poster::{context_from_config, process_cache, resolve_request, HttpImageLoader, ImageRequest};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::signal;
use tracing::{error, info};

/// Command-line arguments for reel-poster
#[derive(Parser, Debug)]
#[command(name = "reel-poster")]
#[command(about = "Poster URL resolver for reelshelf")]
#[command(version)]
struct Args {
    /// Config file (defaults to $REELSHELF_CONFIG, then the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long, env = "REELSHELF_PORT")]
        port: Option<u16>,
    },
    /// Resolve poster URLs and print the result
    Resolve {
        /// Poster URLs to resolve, in order
        #[arg(required = true)]
        urls: Vec<String>,

        /// Alt text applied to every poster
        #[arg(long)]
        alt: Option<String>,

        /// Print HTML fragments instead of JSON reports
        #[arg(long)]
        html: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_resolver = ConfigResolver::new(args.config.clone());
    let config = config_resolver.load().context("Failed to load configuration")?;

    init_logging(&config.logging)?;

    info!(
        "Starting reel-poster v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match config_resolver.config_path() {
        Some(path) if path.exists() => info!("Config file: {}", path.display()),
        _ => info!("No config file, using compiled defaults"),
    }

    match args.command {
        Command::Serve { port } => serve(config, port).await,
        Command::Resolve { urls, alt, html } => resolve_urls(config, urls, alt, html).await,
    }
}

/// Initialize tracing; RUST_LOG wins over the configured level
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

async fn serve(config: TomlConfig, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(config.port);
    let events = EventBus::new(config.event_bus_capacity);
    let cache = process_cache();
    let ctx = context_from_config(&config, cache.clone(), Some(events.clone()));
    let loader = HttpImageLoader::new(&config.http, config.static_assets_path.clone())
        .context("Failed to build image loader")?;

    info!(
        fallbacks = ctx.chain.len(),
        placeholder = %ctx.placeholder,
        "Resolver configured"
    );

    let state = AppState::new(ctx, Arc::new(loader), cache, events, config.concurrency);
    let app = build_router(state, config.static_assets_path.clone());

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("reel-poster listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn resolve_urls(config: TomlConfig, urls: Vec<String>, alt: Option<String>, html: bool) -> Result<()> {
    let ctx = context_from_config(&config, process_cache(), None);
    let loader = HttpImageLoader::new(&config.http, config.static_assets_path.clone())
        .context("Failed to build image loader")?;

    // Sequential so a repeated URL benefits from the success cache
    for url in urls {
        let mut request = ImageRequest::new(url);
        request.alt_text = alt.clone();

        let report = resolve_request(request, &ctx, &loader).await;
        if html {
            println!("{}", report.rendered.to_html());
        } else {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
