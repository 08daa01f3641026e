use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::state::AppState;

/// Requires `Authorization: Bearer <token>` when `state.auth_token` is set.
/// With no token configured the middleware is a no-op — auth is a boundary
/// concern left to the deployment, not the core.
pub async fn require_bearer_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = &state.auth_token else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == expected.as_str() => next.run(request).await,
        _ => (StatusCode::UNAUTHORIZED, "Unauthorized\n").into_response(),
    }
}
