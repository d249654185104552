//! Gutter Server
//!
//! HTTP service that featurizes scanned spreads, collects oracle labels and
//! trains the split estimator.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gutter_server::config::Config;
use gutter_server::state::AppState;
use gutter_server::{app, db, split};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "gutter_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting Gutter Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        provider = ?config.oracle.provider,
        url = %config.oracle.base_url,
        model = %config.oracle.model,
        "Oracle configured"
    );

    // Initialize database
    let db_pool = db::create_pool(&config.database.url)
        .await
        .context("Failed to initialize database")?;
    tracing::info!("Database initialized at {}", config.database.url);

    let oracle = split::build_oracle(&config.oracle).context("Failed to build oracle")?;
    if !oracle.is_available().await {
        tracing::warn!("Oracle '{}' is not reachable; labeling requests will fail", oracle.name());
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let app = app(AppState::new(config, db_pool, oracle));

    // Start server with graceful shutdown
    tracing::info!("Gutter Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
