use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use leadgrid::config::Config;
use leadgrid::AppState;

#[derive(Parser, Debug)]
#[command(name = "leadgrid")]
#[command(author, version, about = "Lead management API server", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "LEADGRID_CONFIG", default_value = "leadgrid.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Leadgrid v{}", env!("CARGO_PKG_VERSION"));

    // Initialize database
    let db = leadgrid::db::init(&config.database).await?;

    let state = Arc::new(AppState::new(config.clone(), db));
    let api_router = leadgrid::api::create_router(state);

    // Serve the frontend build, if any, with SPA fallback
    let app = match &config.server.static_dir {
        Some(static_dir) => {
            let index_file = static_dir.join("index.html");
            let serve_static =
                ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file));
            tracing::info!(dir = %static_dir.display(), "Serving static files");
            api_router.fallback_service(serve_static)
        }
        None => api_router,
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
