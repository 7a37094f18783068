use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studyshare::config::Config;
use studyshare::db::Database;
use studyshare::services::AuthService;
use studyshare::storage::{build_blob_store, select_backend};
use studyshare::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studyshare=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting studyshare...");

    // Load configuration
    let config = Config::load()?;
    let config = Arc::new(config);
    tracing::info!("Configuration loaded");

    // Initialize database
    let db = Database::connect(&config.database).await?;
    db.run_migrations().await?;
    AuthService::ensure_admin(&db, &config).await?;
    tracing::info!(engine = db.engine_name(), "Database initialized");

    // Select and construct the blob backend once for the process lifetime
    let backend = select_backend(&config.storage);
    let store = build_blob_store(&config.storage);
    tracing::info!(backend = backend.as_str(), "Storage backend selected");

    // Create app state
    let state = AppState {
        db,
        config: config.clone(),
        store,
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
