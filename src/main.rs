use anyhow::Context;
use tracing_subscriber::EnvFilter;

use mssp_api::app::app;
use mssp_api::config::config;
use mssp_api::database::DatabaseManager;
use mssp_api::integrations::crypto;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mssp_api=info,tower_http=info")),
        )
        .init();

    let config = config();
    tracing::info!("Starting MSSP API in {:?} mode", config.environment);

    // Fail fast when production has no usable encryption key
    let encryptor = crypto::encryptor().context("credential encryption is not configured")?;
    if !encryptor.is_encrypting() {
        tracing::warn!("ENCRYPTION_KEY is not set; data source credentials are stored unencrypted");
    }

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("MSSP API listening on http://{}", bind_addr);

    axum::serve(listener, app())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    DatabaseManager::close_all().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}
