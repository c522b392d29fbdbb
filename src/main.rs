//! ERP Services - Main Application Entry Point
//!
//! A multi-tenant REST API covering CRM customers, a double-entry finance
//! ledger with receivables, procurement controls (three-way match, guided
//! buying, supplier risk), warehouse EDI X12, catalog/PunchOut and
//! integration sync jobs. Domain events fan out to registered webhooks.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: API key with SHA-256 hashing
//! - **Events**: bounded in-process bus drained by a webhook dispatcher
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Start the event dispatcher
//! 5. Build HTTP router with routes and middleware
//! 6. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod state;

use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::services::event_bus::{self, EventBus};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let (events, receiver) = EventBus::new(config.event_buffer_size);
    let dispatcher = event_bus::spawn_dispatcher(
        pool.clone(),
        receiver,
        Duration::from_secs(config.webhook_timeout_secs),
    );

    let addr = format!("0.0.0.0:{}", config.server_port);
    let app = routes::build_router(AppState::new(pool, events, config));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router (and with it every EventBus sender) is gone; let the
    // dispatcher drain what was already queued.
    if let Err(e) = dispatcher.await {
        tracing::error!(error = %e, "Event dispatcher task failed");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler the server simply runs until killed
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
