use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::AppState;

/// Liveness check reporting the active database engine and blob backend
/// GET /health
pub async fn health(State(state): State<AppState>) -> Response {
    match state.db.fetch_one::<(i32,)>("SELECT 1", &[]).await {
        Ok(_) => Json(serde_json::json!({
            "status": "ok",
            "database": state.db.engine_name(),
            "storage": state.store.kind().as_str(),
        }))
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "status": "error",
                "message": e.to_string(),
            })),
        )
            .into_response(),
    }
}
