use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::models::{CurrentUser, User};
use crate::services::AuthService;
use crate::AppState;

/// Authentication middleware: validates the bearer token and loads the
/// caller as a `CurrentUser` request extension.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => {
            return Err(AppError::Unauthorized(
                "Missing or invalid Authorization header".to_string(),
            ));
        }
    };

    let claims = AuthService::validate_token(token, &state.config)?;
    let user_id: i64 = claims
        .sub
        .parse()
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

    let user: User = state
        .db
        .fetch_optional("SELECT * FROM users WHERE id = ?", &[user_id.into()])
        .await
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?
        .ok_or_else(|| AppError::Unauthorized("Invalid token".to_string()))?;

    let current_user = CurrentUser {
        id: user.id,
        role: user.get_role(),
        username: user.username,
    };

    request.extensions_mut().insert(current_user);

    Ok(next.run(request).await)
}

/// Best-effort identity for routes that serve both authenticated and
/// anonymous callers (comment submission).
pub async fn maybe_current_user(state: &AppState, headers: &HeaderMap) -> Option<CurrentUser> {
    let header = headers.get("Authorization")?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?;
    let claims = AuthService::validate_token(token, &state.config).ok()?;
    let user_id: i64 = claims.sub.parse().ok()?;

    let user: User = state
        .db
        .fetch_optional("SELECT * FROM users WHERE id = ?", &[user_id.into()])
        .await
        .ok()
        .flatten()?;

    Some(CurrentUser {
        id: user.id,
        role: user.get_role(),
        username: user.username,
    })
}
