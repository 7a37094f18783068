pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod storage;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Database;
use crate::storage::BlobStore;

/// Application state shared across handlers. The blob backend is selected
/// once at startup and injected here; it is never re-queried per request.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub store: Arc<dyn BlobStore>,
}

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .route("/files", get(handlers::files::list_files))
        .route("/files/:id", get(handlers::files::get_file))
        .route("/files/:id/view", get(handlers::files::view_file))
        .route("/files/:id/download", get(handlers::files::download_file))
        .route("/files/:id/content", get(handlers::files::file_content))
        .route("/files/:id/comments", post(handlers::comments::add_comment))
        .route("/notifications", get(handlers::notifications::latest));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/files/upload", post(handlers::files::upload_file))
        .route("/files/:id/delete", post(handlers::files::delete_file))
        .route(
            "/comments/:id/delete",
            post(handlers::comments::delete_comment),
        )
        .route("/admin/overview", get(handlers::admin::overview))
        .route("/admin/users", post(handlers::admin::create_user))
        // Uploads up to the 30MB catalog limit, with room for form overhead
        .layer(DefaultBodyLimit::max(33 * 1024 * 1024))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/api/v1", public_routes.merge(protected_routes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
