//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: login, logout, current user and the CSRF cookie
//! bootstrap used by the browser client.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use lms_core::{AuthSession, Identity, WorkflowError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::web::middleware::{cookie_value, SESSION_COOKIE};
use crate::web::rest::MessageResponse;
use crate::web::state::AppState;

/// Name of the cookie carrying the anti-forgery token.
pub const CSRF_COOKIE: &str = "csrftoken";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub username: String,
    pub email: String,
}

//=========================================================================================
// Cookie Helpers
//=========================================================================================

fn secure_attr(state: &AppState) -> &'static str {
    if state.config.cookie_secure {
        " Secure;"
    } else {
        ""
    }
}

/// The `Set-Cookie` value that hands a new auth session to the browser.
pub(crate) fn session_cookie(state: &AppState, session: &AuthSession) -> String {
    format!(
        "{}={}; HttpOnly;{} SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        session.id,
        secure_attr(state),
        state.settings.session_ttl.num_seconds()
    )
}

fn cleared_session_cookie(state: &AppState) -> String {
    format!(
        "{}=; HttpOnly;{} SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE,
        secure_attr(state)
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

fn login_failure(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(LoginResponse {
            success: false,
            message: Some(message.to_string()),
        }),
    )
        .into_response()
}

/// POST /login - Login with an active account
#[utoipa::path(
    post,
    path = "/api/v1/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Malformed body", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = LoginResponse)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Ok(Json(req)) = payload else {
        return Ok(login_failure(StatusCode::BAD_REQUEST, "Invalid JSON"));
    };

    match state.auth.login(&req.email, &req.password).await {
        Ok(session) => Ok((
            StatusCode::OK,
            [(header::SET_COOKIE, session_cookie(&state, &session))],
            Json(LoginResponse {
                success: true,
                message: None,
            }),
        )
            .into_response()),
        Err(WorkflowError::InvalidCredential) => {
            Ok(login_failure(StatusCode::UNAUTHORIZED, "Invalid credentials"))
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /logout - Invalidate the current session, if any
#[utoipa::path(
    post,
    path = "/api/v1/logout",
    responses((status = 200, description = "Logged out", body = MessageResponse))
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    if let Some(session_id) = cookie_value(&headers, SESSION_COOKIE) {
        state.auth.logout(session_id).await?;
    }

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cleared_session_cookie(&state))],
        Json(MessageResponse::new("Logged out")),
    ))
}

/// GET /user - The logged-in account
#[utoipa::path(
    get,
    path = "/api/v1/user",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn user_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<UserResponse>> {
    let account = state.auth.current_user(&identity).await?;
    Ok(Json(UserResponse {
        username: account.username,
        email: account.email,
    }))
}

/// GET /set-csrf-token - Hand the browser an anti-forgery cookie
#[utoipa::path(
    get,
    path = "/api/v1/set-csrf-token",
    responses((status = 200, description = "Cookie set", body = MessageResponse))
)]
pub async fn set_csrf_token_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let token = Uuid::new_v4().simple().to_string();
    debug!("Issued CSRF cookie");
    let cookie = format!(
        "{}={}; SameSite=Lax;{} Path=/",
        CSRF_COOKIE,
        token,
        secure_attr(&state)
    );
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(MessageResponse::new("CSRF cookie set")),
    )
}
