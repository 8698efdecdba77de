pub mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::server::config::ServerConfig;

/// Connects to the database, ensures the schema and serves the ingestion
/// API until Ctrl-C.
pub async fn run(config: Arc<ServerConfig>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let db_pool = crate::db::connect(&config.database_url, 10).await?;

    let addr: SocketAddr = config.listen_address.parse()?;
    let app = crate::web::create_axum_router(db_pool, config.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Ingestion API listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(Box::new)?;

    info!("Server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received.");
    }
}
