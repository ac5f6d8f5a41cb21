//! services/api/src/web/otp.rs
//!
//! One-time code endpoints. A successful verification activates the account
//! and logs it in.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiResult;
use crate::web::auth::session_cookie;
use crate::web::extract::JsonBody;
use crate::web::rest::{EmailRequest, MessageResponse};
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
}

#[derive(Serialize, ToSchema)]
pub struct VerifyOtpResponse {
    pub message: String,
    pub email: String,
}

/// POST /send-otp - Mail a fresh verification code
#[utoipa::path(
    post,
    path = "/api/v1/send-otp",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Code sent", body = MessageResponse),
        (status = 400, description = "Missing or invalid email"),
        (status = 502, description = "The email could not be delivered")
    )
)]
pub async fn send_otp_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<EmailRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state.otp.issue(&req.email).await?;
    Ok(Json(MessageResponse::new("OTP sent successfully")))
}

/// POST /verify-otp - Verify a code, activate the account and log in
#[utoipa::path(
    post,
    path = "/api/v1/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Verified and logged in", body = VerifyOtpResponse),
        (status = 400, description = "Invalid, used or expired code, or no such user")
    )
)]
pub async fn verify_otp_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<VerifyOtpRequest>,
) -> ApiResult<impl IntoResponse> {
    let verified = state.otp.verify(&req.email, &req.otp).await?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&state, &verified.session))],
        Json(VerifyOtpResponse {
            message: "OTP verified successfully. You are now logged in.".to_string(),
            email: verified.email,
        }),
    ))
}
