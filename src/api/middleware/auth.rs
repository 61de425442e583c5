use crate::AppState;
use crate::api::error::AppError;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

/// Resolve the bearer token into an [`Identity`](crate::services::identity::Identity)
/// and make it available to handlers as a request extension.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Couldn't find JWT".to_string()))?;

    let identity = state.identity.resolve_identity(&token)?;
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
