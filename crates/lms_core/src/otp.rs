//! crates/lms_core/src/otp.rs
//!
//! One-time password issuance and verification. A verified code activates the
//! account registered under its email and opens a login session.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::establish_session;
use crate::domain::{AccountId, AuthSession, EmailMessage, OtpCode};
use crate::error::{WorkflowError, WorkflowResult};
use crate::ports::{Clock, DatabaseService, NotificationService, OtpConsumption, PortError};
use crate::tokens::{is_expired, new_otp_code, normalize_email, OnboardingSettings};

/// The result of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedOtp {
    pub account_id: AccountId,
    pub email: String,
    pub session: AuthSession,
}

#[derive(Clone)]
pub struct OtpWorkflow {
    db: Arc<dyn DatabaseService>,
    notifier: Arc<dyn NotificationService>,
    clock: Arc<dyn Clock>,
    settings: Arc<OnboardingSettings>,
}

impl OtpWorkflow {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        notifier: Arc<dyn NotificationService>,
        clock: Arc<dyn Clock>,
        settings: Arc<OnboardingSettings>,
    ) -> Self {
        Self {
            db,
            notifier,
            clock,
            settings,
        }
    }

    /// Stores a fresh code for `email` and mails it. An undeliverable code is
    /// deleted again and reported as `Delivery`.
    pub async fn issue(&self, email: &str) -> WorkflowResult<String> {
        let email = normalize_email(email)?;
        let created_at = self.clock.now();
        let otp = OtpCode {
            id: Uuid::new_v4(),
            email: email.clone(),
            code: new_otp_code(&mut rand::thread_rng()),
            created_at,
            expires_at: created_at + self.settings.otp_ttl,
            is_used: false,
        };
        self.db.create_otp(&otp).await?;

        let message = EmailMessage {
            to: email.clone(),
            subject: "Your OTP Code".to_string(),
            body_text: format!(
                "Your OTP is {}. It expires in {} minutes.",
                otp.code,
                self.settings.otp_ttl.num_minutes()
            ),
        };
        if let Err(e) = self.notifier.send_email(message).await {
            error!(email = %email, error = %e, "Failed to send OTP email");
            if let Err(cleanup) = self.db.delete_otp(otp.id).await {
                warn!(email = %email, error = %cleanup, "Failed to delete undelivered OTP");
            }
            return Err(WorkflowError::Delivery(e.to_string()));
        }

        info!(email = %email, expires_at = %otp.expires_at, "OTP issued");
        Ok(otp.code)
    }

    /// Checks `code` for `email`, activates the account and opens a session.
    ///
    /// A wrong code and an already-used code both fail with `InvalidOtp`. The
    /// expiry check only runs once a matching unused record exists.
    pub async fn verify(&self, email: &str, code: &str) -> WorkflowResult<VerifiedOtp> {
        let email = email.trim();
        let code = code.trim();

        let otp = match self.db.find_unused_otp(email, code).await {
            Ok(otp) => otp,
            Err(PortError::NotFound(_)) => return Err(WorkflowError::InvalidOtp),
            Err(e) => return Err(e.into()),
        };
        if is_expired(self.clock.now(), otp.expires_at) {
            info!(email = %email, "Rejected expired OTP");
            return Err(WorkflowError::OtpExpired);
        }

        let account = match self.db.consume_otp(&otp).await {
            Ok(OtpConsumption::Activated(account)) => account,
            Ok(OtpConsumption::AccountMissing) => {
                warn!(email = %email, "OTP verified for an email without an account");
                return Err(WorkflowError::AccountNotFound);
            }
            // Lost the race against a concurrent verification of the same code.
            Err(PortError::NotFound(_)) => return Err(WorkflowError::InvalidOtp),
            Err(e) => return Err(e.into()),
        };

        let session = establish_session(
            self.db.as_ref(),
            self.clock.as_ref(),
            &self.settings,
            account.id,
        )
        .await?;

        info!(account_id = %account.id, email = %account.email, "OTP verified, account activated");
        Ok(VerifiedOtp {
            account_id: account.id,
            email: account.email,
            session,
        })
    }
}
