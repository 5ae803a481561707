//! HTTP dispatch server.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                    HTTP DISPATCH                      │
//!                     │                                                       │
//!   Client Request    │  ┌──────────┐   ┌───────────┐   ┌───────────────┐     │
//!   ──────────────────┼─▶│   net    │──▶│ executor  │──▶│     http      │     │
//!                     │  │ acceptor │   │  workers  │   │ app + routes  │     │
//!                     │  └──────────┘   └─────▲─────┘   └───────┬───────┘     │
//!                     │                       │                 │ async route │
//!                     │                       │                 ▼             │
//!   202 Accepted      │                       │         ┌───────────────┐     │
//!   ◀─────────────────┼───────────────────────┼─────────│     jobs      │     │
//!                     │                       └─────────│ registry +    │     │
//!                     │                       job body  │ matchers      │     │
//!                     │                                 └───────────────┘     │
//!                     │  ┌─────────────────────────────────────────────────┐  │
//!                     │  │ config · observability · admin · lifecycle      │  │
//!                     │  └─────────────────────────────────────────────────┘  │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::routing::get;
use clap::Parser;
use notify::RecommendedWatcher;

use http_dispatch::config::watcher::ConfigWatcher;
use http_dispatch::config::{load_config, RuntimeConfig};
use http_dispatch::executor::BoxError;
use http_dispatch::jobs::AsyncRequest;
use http_dispatch::lifecycle::wait_for_signal;
use http_dispatch::observability::{logging, metrics};
use http_dispatch::{AppBuilder, AsyncRoute, Runtime};

#[derive(Parser)]
#[command(name = "http-dispatch")]
#[command(about = "HTTP server with coalescing asynchronous jobs", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => RuntimeConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "http-dispatch starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let runtime = Arc::new(Runtime::new(config, application())?);
    runtime.start().await?;

    let _watcher = match &args.config {
        Some(path) => watch_config(Arc::clone(&runtime), path)
            .map_err(|e| tracing::warn!(error = %e, "Config hot reload disabled"))
            .ok(),
        None => None,
    };

    wait_for_signal().await;
    runtime.stop().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Routes served by the standalone binary.
fn application() -> AppBuilder {
    AppBuilder::new()
        .route("/health", get(|| async { "ok" }))
        .async_route("/tasks/{name}", AsyncRoute::new("log-task", log_task))
}

async fn log_task(request: AsyncRequest) -> Result<(), BoxError> {
    tracing::info!(
        job_id = %request.id,
        resource = %request.route.target.resource,
        params = ?request.route.target.params,
        has_content = request.route.content.is_some(),
        "Task executed"
    );
    Ok(())
}

/// Apply validated config reloads until the runtime stops.
fn watch_config(runtime: Arc<Runtime>, path: &Path) -> Result<RecommendedWatcher, notify::Error> {
    let (watcher, mut updates) = ConfigWatcher::new(path);
    let handle = watcher.run()?;
    let mut shutdown = runtime.shutdown().subscribe();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                update = updates.recv() => match update {
                    Some(config) => match runtime.reload(&config) {
                        Ok(()) => tracing::info!("Configuration reloaded"),
                        Err(e) => tracing::error!(error = %e, "Failed to apply reloaded configuration"),
                    },
                    None => break,
                },
            }
        }
    });

    Ok(handle)
}
