//! crates/lms_core/src/invitation.rs
//!
//! Invitation issuance and token-gated registration.
//!
//! An invitation is `Issued` until it is consumed by a successful registration.
//! Expiry is never stored: it is read off `expires_at` when the token is used.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{
    Account, AccountId, CohortId, EmailMessage, Invitation, NewAccount, NewProfile,
    SpecializationId,
};
use crate::error::{WorkflowError, WorkflowResult};
use crate::ports::{Clock, CredentialService, DatabaseService, NotificationService, PortError};
use crate::tokens::{is_expired, new_invitation_token, normalize_email, OnboardingSettings};

/// What the issuer gets back after an invitation is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedInvitation {
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub invite_link: String,
}

/// A registration submitted against an invitation token.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub cohort_id: Option<CohortId>,
    pub specialization_id: Option<SpecializationId>,
}

#[derive(Clone)]
pub struct InvitationWorkflow {
    db: Arc<dyn DatabaseService>,
    notifier: Arc<dyn NotificationService>,
    credentials: Arc<dyn CredentialService>,
    clock: Arc<dyn Clock>,
    settings: Arc<OnboardingSettings>,
}

impl InvitationWorkflow {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        notifier: Arc<dyn NotificationService>,
        credentials: Arc<dyn CredentialService>,
        clock: Arc<dyn Clock>,
        settings: Arc<OnboardingSettings>,
    ) -> Self {
        Self {
            db,
            notifier,
            credentials,
            clock,
            settings,
        }
    }

    /// Stores an invitation for `email` and mails the registration link.
    ///
    /// If the email cannot be delivered `Delivery` is returned and the store is
    /// put back as it was: the new token is withdrawn and an invitation that
    /// the address already held is restored.
    pub async fn issue(&self, email: &str) -> WorkflowResult<IssuedInvitation> {
        let email = normalize_email(email)?;
        let previous = match self.db.find_invitation_by_email(&email).await {
            Ok(invitation) => Some(invitation),
            Err(PortError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
        let issued = self.store_invitation(email.clone()).await?;

        let message = EmailMessage {
            to: email.clone(),
            subject: "You're Invited to Register".to_string(),
            body_text: format!("Click the link to register: {}", issued.invite_link),
        };
        if let Err(e) = self.notifier.send_email(message).await {
            error!(email = %email, error = %e, "Failed to send invitation email");
            let rollback = match &previous {
                Some(invitation) => self.db.upsert_invitation(invitation).await,
                None => self.db.delete_invitation(&issued.token).await,
            };
            if let Err(cleanup) = rollback {
                warn!(email = %email, error = %cleanup, "Failed to withdraw undelivered invitation");
            }
            return Err(WorkflowError::Delivery(e.to_string()));
        }

        info!(email = %email, expires_at = %issued.expires_at, "Invitation sent");
        Ok(issued)
    }

    /// Stores an invitation for `email` without sending anything. A previous
    /// invitation for the same email is replaced, so only the newest link works.
    pub async fn generate_link(&self, email: &str) -> WorkflowResult<IssuedInvitation> {
        let email = normalize_email(email)?;
        self.store_invitation(email).await
    }

    async fn store_invitation(&self, email: String) -> WorkflowResult<IssuedInvitation> {
        let token = new_invitation_token();
        let expires_at = self.clock.now() + self.settings.invitation_ttl;

        self.db
            .upsert_invitation(&Invitation {
                email,
                token: token.clone(),
                expires_at,
            })
            .await?;

        let invite_link = self.settings.invite_link(&token);
        Ok(IssuedInvitation {
            token,
            expires_at,
            invite_link,
        })
    }

    /// Looks up the email an invitation token was issued to. Expiry is not checked.
    pub async fn resolve_email(&self, token: &str) -> WorkflowResult<String> {
        match self.db.find_invitation_by_token(token).await {
            Ok(invitation) => Ok(invitation.email),
            Err(PortError::NotFound(_)) => Err(WorkflowError::NotFound("Invalid token".to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Consumes the invitation and creates an inactive account with its profile.
    ///
    /// The profile carries the requested cohort and specialization; the store
    /// derives its courses as part of the same write.
    pub async fn redeem(
        &self,
        token: &str,
        request: RegistrationRequest,
    ) -> WorkflowResult<AccountId> {
        if request.password != request.confirm_password {
            return Err(WorkflowError::Validation("Passwords do not match".to_string()));
        }
        if request.password.is_empty() {
            return Err(WorkflowError::Validation("Password is required".to_string()));
        }
        let email = request.email.trim().to_string();

        let invitation = match self.db.find_invitation(token, &email).await {
            Ok(invitation) => invitation,
            Err(PortError::NotFound(_)) => return Err(WorkflowError::InvalidInvitation),
            Err(e) => return Err(e.into()),
        };
        if is_expired(self.clock.now(), invitation.expires_at) {
            info!(email = %email, "Rejected expired invitation");
            return Err(WorkflowError::InvalidInvitation);
        }

        if let Some(cohort_id) = request.cohort_id {
            self.db.get_cohort(cohort_id).await?;
        }
        if let Some(specialization_id) = request.specialization_id {
            self.db.get_specialization(specialization_id).await?;
        }
        match self.db.get_account_by_email(&email).await {
            Ok(_) => {
                return Err(WorkflowError::Conflict(
                    "An account with this email already exists".to_string(),
                ))
            }
            Err(PortError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let hashed_password = self.credentials.hash_password(&request.password)?;
        let account_id = Uuid::new_v4();
        let account = NewAccount {
            id: account_id,
            username: email.clone(),
            email: email.clone(),
            hashed_password,
            is_active: false,
            is_staff: false,
        };
        let profile = NewProfile {
            account_id,
            email: email.clone(),
            cohort_id: request.cohort_id,
            specialization_id: request.specialization_id,
            ..Default::default()
        };

        let account: Account = match self.db.redeem_invitation(token, account, profile).await {
            Ok(account) => account,
            // Another request consumed the invitation first.
            Err(PortError::NotFound(_)) => return Err(WorkflowError::InvalidInvitation),
            Err(e) => return Err(e.into()),
        };

        info!(account_id = %account.id, email = %account.email, "Registered account from invitation");
        Ok(account.id)
    }
}
