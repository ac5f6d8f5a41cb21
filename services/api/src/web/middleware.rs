//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
    Extension,
};
use lms_core::{Identity, WorkflowError};
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiError;
use crate::web::state::AppState;

/// Name of the cookie carrying the auth session id.
pub const SESSION_COOKIE: &str = "session";

/// Reads a cookie value from the request's `Cookie` header.
pub fn cookie_value<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name && !value.is_empty()).then_some(value)
        })
}

/// Middleware that validates the auth session cookie.
///
/// If valid, inserts the `Identity` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session_id = cookie_value(req.headers(), SESSION_COOKIE)
        .ok_or(WorkflowError::Unauthenticated)?
        .to_string();

    let identity = state.auth.authenticate(&session_id).await.map_err(|e| {
        debug!(error = %e, "Rejected auth session");
        e
    })?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Middleware for admin routes. Must run after `require_auth`.
pub async fn require_staff(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    state.auth.require_staff(&identity).await?;
    Ok(next.run(req).await)
}
