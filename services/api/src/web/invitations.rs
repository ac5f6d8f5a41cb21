//! services/api/src/web/invitations.rs
//!
//! Invitation endpoints: issuing, link generation, token lookup and
//! redemption into an inactive account.

use axum::{
    extract::{Path, State},
    Json,
};
use lms_core::{CohortId, RegistrationRequest, SpecializationId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;

use crate::error::ApiResult;
use crate::web::extract::JsonBody;
use crate::web::rest::{EmailRequest, MessageResponse};
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    pub cohort_id: Option<CohortId>,
    pub specialization_id: Option<SpecializationId>,
}

#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
    /// Whether the verification code reached the mail provider. When false the
    /// client should offer `/send-otp`.
    pub otp_sent: bool,
}

#[derive(Serialize, ToSchema)]
pub struct EmailResponse {
    pub email: String,
}

#[derive(Serialize, ToSchema)]
pub struct InviteLinkResponse {
    pub invite_link: String,
}

/// POST /send-invitation - Email a registration link
#[utoipa::path(
    post,
    path = "/api/v1/send-invitation",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Invitation sent", body = MessageResponse),
        (status = 400, description = "Missing or invalid email"),
        (status = 502, description = "The email could not be delivered")
    )
)]
pub async fn send_invitation_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<EmailRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state.invitations.issue(&req.email).await?;
    Ok(Json(MessageResponse::new("Invitation sent successfully!")))
}

/// POST /generate-invite-url - Create an invitation and return its link without mailing it
#[utoipa::path(
    post,
    path = "/api/v1/generate-invite-url",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Invitation created", body = InviteLinkResponse),
        (status = 400, description = "Missing or invalid email")
    )
)]
pub async fn generate_invite_url_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<EmailRequest>,
) -> ApiResult<Json<InviteLinkResponse>> {
    let issued = state.invitations.generate_link(&req.email).await?;
    Ok(Json(InviteLinkResponse {
        invite_link: issued.invite_link,
    }))
}

/// GET /get-email-from-token/{token} - The email an invitation was issued to
#[utoipa::path(
    get,
    path = "/api/v1/get-email-from-token/{token}",
    params(("token" = String, Path, description = "Invitation token")),
    responses(
        (status = 200, description = "Invitation email", body = EmailResponse),
        (status = 404, description = "Invalid token")
    )
)]
pub async fn get_email_from_token_handler(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> ApiResult<Json<EmailResponse>> {
    let email = state.invitations.resolve_email(&token).await?;
    Ok(Json(EmailResponse { email }))
}

/// POST /register-from-invite/{token} - Redeem an invitation
///
/// Creates an inactive account and immediately mails a verification code.
#[utoipa::path(
    post,
    path = "/api/v1/register-from-invite/{token}",
    params(("token" = String, Path, description = "Invitation token")),
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created, awaiting OTP verification", body = RegisterResponse),
        (status = 400, description = "Passwords do not match, or invalid or expired invitation"),
        (status = 404, description = "Unknown cohort or specialization"),
        (status = 409, description = "An account already uses this email")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> ApiResult<Json<RegisterResponse>> {
    let email = req.email.trim().to_string();
    state
        .invitations
        .redeem(
            &token,
            RegistrationRequest {
                email: email.clone(),
                password: req.password,
                confirm_password: req.confirm_password,
                cohort_id: req.cohort_id,
                specialization_id: req.specialization_id,
            },
        )
        .await?;

    // The account exists at this point; a failed send only means the client
    // has to ask for a new code.
    let otp_sent = match state.otp.issue(&email).await {
        Ok(_) => true,
        Err(e) => {
            warn!(email = %email, error = %e, "Registered account but could not send OTP");
            false
        }
    };

    Ok(Json(RegisterResponse {
        message: "User registered successfully, awaiting OTP verification".to_string(),
        otp_sent,
    }))
}
