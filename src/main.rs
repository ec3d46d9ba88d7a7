use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use lexcase_api::config;
use lexcase_api::database::DatabaseManager;
use lexcase_api::services::invoice_service::spawn_overdue_sweeper;
use lexcase_api::storage::LocalStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();
    lexcase_api::init_tracing();

    let config = config::config();
    tracing::info!("Starting LexCase API in {:?} mode", config.environment);

    config.check_startup()?;
    if config.security.jwt_secret.is_empty() {
        tracing::warn!("JWT_SECRET is not set; logins will fail until it is configured");
    }

    // The server still starts without a database so /health can report it
    match DatabaseManager::pool().await {
        Ok(pool) => {
            if config.database.run_migrations {
                if let Err(e) = DatabaseManager::migrate().await {
                    tracing::error!(error = %e, "failed to apply migrations");
                }
            }
            if config.invoices.overdue_sweep_secs > 0 {
                spawn_overdue_sweeper(pool, Duration::from_secs(config.invoices.overdue_sweep_secs));
            }
        }
        Err(e) => tracing::warn!(error = %e, "database unavailable at startup"),
    }

    let store = LocalStore::from_config();
    tracing::info!(dir = %store.root().display(), "document storage");
    let app = lexcase_api::routes::app(Arc::new(store));

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("LexCase API listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    DatabaseManager::close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}
