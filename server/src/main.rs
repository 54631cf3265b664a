//! `rmmgate` binary — thin CLI shell over the [`rmmgate_server`] library crate.

use std::sync::Arc;

use clap::Parser;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use rmmgate_core::MemoryStore;
use rmmgate_server::AppContext;

/// Metadata search gateway — HTTP API translating URL query parameters
/// into document-store queries.
#[derive(Parser)]
#[command(name = "rmmgate", version, about, long_about = None)]
struct Cli {
    /// Bind to 0.0.0.0 instead of 127.0.0.1 (localhost)
    #[arg(long)]
    bind_all: bool,

    /// Listen on this port instead of auto-scanning for a free one
    #[arg(long)]
    port: Option<u16>,
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("received SIGINT, shutting down"),
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl+C");
        info!("received Ctrl+C, shutting down");
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("rmmgate=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let store = Arc::new(MemoryStore::new());
    let ctx = AppContext { store, start_time: std::time::Instant::now() };

    let app = rmmgate_server::build_router()
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(ctx);

    let bind_addr = if cli.bind_all { "0.0.0.0" } else { "127.0.0.1" };
    let explicit_port = cli.port.or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()));

    let listener = if let Some(port) = explicit_port {
        tokio::net::TcpListener::bind(format!("{bind_addr}:{port}")).await.unwrap_or_else(|e| {
            error!(port = port, error = %e, "could not bind to port");
            eprintln!("  PORT={port} was set explicitly. Choose a different port.");
            std::process::exit(1);
        })
    } else {
        const BASE: u16 = 8787;
        const RANGE: u16 = 10;
        let mut found = None;
        for port in BASE..BASE + RANGE {
            if let Ok(l) = tokio::net::TcpListener::bind(format!("{bind_addr}:{port}")).await {
                found = Some(l);
                break;
            }
        }
        found.unwrap_or_else(|| {
            error!(range_start = BASE, range_end = BASE + RANGE - 1, "no free port found");
            eprintln!("  Try: PORT=<port> rmmgate");
            std::process::exit(1);
        })
    };

    let port = listener.local_addr().unwrap().port();
    info!(port = port, "rmmgate listening on http://{bind_addr}:{port}");
    eprintln!("RMMGATE_PORT={port}");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.unwrap();
}
