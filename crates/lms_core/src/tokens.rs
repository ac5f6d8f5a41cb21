//! crates/lms_core/src/tokens.rs
//!
//! Token and code generation plus the expiry predicate shared by
//! invitations, OTP codes and auth sessions.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::error::{WorkflowError, WorkflowResult};

/// Lifetimes and links used by the onboarding workflows.
#[derive(Debug, Clone)]
pub struct OnboardingSettings {
    /// Base URL of the web client; invitation links point below it.
    pub frontend_url: String,
    pub invitation_ttl: Duration,
    pub otp_ttl: Duration,
    pub session_ttl: Duration,
}

impl Default for OnboardingSettings {
    fn default() -> Self {
        Self {
            frontend_url: "http://localhost:3000".to_string(),
            invitation_ttl: Duration::hours(24),
            otp_ttl: Duration::minutes(10),
            session_ttl: Duration::days(30),
        }
    }
}

impl OnboardingSettings {
    pub fn invite_link(&self, token: &str) -> String {
        format!("{}/register/{}/", self.frontend_url.trim_end_matches('/'), token)
    }
}

/// A record is expired once `now` is strictly past its expiry instant.
pub fn is_expired(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> bool {
    now > expires_at
}

/// An unguessable invitation token (random UUID v4).
pub fn new_invitation_token() -> String {
    Uuid::new_v4().to_string()
}

/// An opaque session identifier for the auth cookie.
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// A uniformly random six-digit code.
pub fn new_otp_code<R: Rng>(rng: &mut R) -> String {
    rng.gen_range(100_000..=999_999u32).to_string()
}

/// Trims the address and rejects blank or malformed input.
pub fn normalize_email(email: &str) -> WorkflowResult<String> {
    let email = email.trim();
    if email.is_empty() {
        return Err(WorkflowError::Validation("Email is required".to_string()));
    }
    if !email.validate_email() {
        return Err(WorkflowError::Validation(format!(
            "'{}' is not a valid email address",
            email
        )));
    }
    Ok(email.to_string())
}
