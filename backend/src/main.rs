//! Stock approval server
//!
//! Serves the intake and issuance workflows over HTTP, backed by PostgreSQL
//! or, when no database URL is configured, by the in-memory store.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use sqlx::postgres::PgPoolOptions;
use stock_approval::{
    create_app,
    store::{MemoryStore, PgStore, WorkflowStore},
    AppState, Config,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stock_approval=debug,tower_http=debug,sqlx=warn".into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.log.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting stock approval server");
    tracing::info!("Environment: {}", config.environment);

    let store: Arc<dyn WorkflowStore> = if config.uses_database() {
        tracing::info!("Connecting to database...");
        let db_pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
            .connect(&config.database.url)
            .await?;
        tracing::info!("Database connection established");

        // Run migrations in development
        if config.environment == "development" {
            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&db_pool).await?;
            tracing::info!("Migrations completed");
        }

        Arc::new(PgStore::new(db_pool))
    } else {
        tracing::warn!("No database URL configured, using the in-memory store");
        Arc::new(MemoryStore::new())
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let app = create_app(AppState::new(store, config));

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
