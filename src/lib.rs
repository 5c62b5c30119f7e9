pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::routes;

pub use error::{NetworkError, Result};

// Export logic types
pub use logic::{ConnectionManager, RequestValidator};

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, PostgresStore, Store};

use std::sync::Arc;

use crate::config::{AppConfig, StorageBackend};

/// Build the router for a store; used by the server and by in-process tests
pub fn create_app<S: Store + 'static>(store: Arc<S>) -> axum::Router {
    let manager = Arc::new(ConnectionManager::new(store));
    api::routes::create_router().with_state(manager)
}

async fn serve<S: Store + 'static>(store: Arc<S>, config: &AppConfig) -> anyhow::Result<()> {
    // Load seed data for demonstration (optional)
    if std::env::var("LOAD_SEED_DATA").unwrap_or_default() == "true" {
        seed::load_seed_data(&*store).await?;
    }

    let bind_address = config.server_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    log::info!("AppNet metadata server running on http://{}", bind_address);

    axum::serve(listener, create_app(store)).await?;

    Ok(())
}

pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    match config.storage.backend {
        StorageBackend::Memory => {
            log::warn!("Using in-memory storage; data is lost on restart");
            serve(Arc::new(MemoryStore::new()), &config).await
        }
        StorageBackend::Postgres => {
            log::info!("Connecting to PostgreSQL...");
            let postgres_store =
                PostgresStore::new(&config.database_url(), config.max_connections()).await?;

            log::info!("Running database migrations...");
            postgres_store.migrate().await?;

            serve(Arc::new(postgres_store), &config).await
        }
    }
}
