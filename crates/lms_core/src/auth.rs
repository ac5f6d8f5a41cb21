//! crates/lms_core/src/auth.rs
//!
//! Login, logout and per-request identity resolution over auth sessions.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{Account, AccountId, AuthSession, Identity, NewAccount, NewProfile};
use crate::error::{WorkflowError, WorkflowResult};
use crate::ports::{Clock, CredentialService, DatabaseService, PortError};
use crate::tokens::{is_expired, new_session_id, normalize_email, OnboardingSettings};

/// Creates and stores a new session for `account_id`.
pub(crate) async fn establish_session(
    db: &dyn DatabaseService,
    clock: &dyn Clock,
    settings: &OnboardingSettings,
    account_id: AccountId,
) -> WorkflowResult<AuthSession> {
    let session = AuthSession {
        id: new_session_id(),
        account_id,
        expires_at: clock.now() + settings.session_ttl,
    };
    db.create_auth_session(&session).await?;
    Ok(session)
}

#[derive(Clone)]
pub struct AuthWorkflow {
    db: Arc<dyn DatabaseService>,
    credentials: Arc<dyn CredentialService>,
    clock: Arc<dyn Clock>,
    settings: Arc<OnboardingSettings>,
}

impl AuthWorkflow {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        credentials: Arc<dyn CredentialService>,
        clock: Arc<dyn Clock>,
        settings: Arc<OnboardingSettings>,
    ) -> Self {
        Self {
            db,
            credentials,
            clock,
            settings,
        }
    }

    /// Checks the credentials of an active account and opens a session.
    ///
    /// Unknown emails, wrong passwords and inactive accounts are all reported
    /// as `InvalidCredential`. An account without a profile gets an empty one.
    pub async fn login(&self, email: &str, password: &str) -> WorkflowResult<AuthSession> {
        let creds = match self.db.get_credentials_by_email(email.trim()).await {
            Ok(creds) => creds,
            Err(PortError::NotFound(_)) => return Err(WorkflowError::InvalidCredential),
            Err(e) => return Err(e.into()),
        };
        if !self
            .credentials
            .verify_password(password, &creds.hashed_password)?
        {
            return Err(WorkflowError::InvalidCredential);
        }
        if !creds.is_active {
            info!(account_id = %creds.account_id, "Login refused for inactive account");
            return Err(WorkflowError::InvalidCredential);
        }

        self.ensure_profile(creds.account_id).await?;

        let session = establish_session(
            self.db.as_ref(),
            self.clock.as_ref(),
            &self.settings,
            creds.account_id,
        )
        .await?;
        info!(account_id = %creds.account_id, "Login successful");
        Ok(session)
    }

    async fn ensure_profile(&self, account_id: AccountId) -> WorkflowResult<()> {
        match self.db.get_profile(account_id).await {
            Ok(_) => return Ok(()),
            Err(PortError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        let account = self.db.get_account(account_id).await?;
        let profile = NewProfile {
            account_id,
            email: account.email,
            preferred_name: Some(account.username),
            ..Default::default()
        };
        match self.db.create_profile(profile).await {
            Ok(_) => Ok(()),
            Err(PortError::Conflict(what)) => {
                warn!(account_id = %account_id, conflict = %what, "Could not create default profile");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Ends the session. Unknown sessions are ignored.
    pub async fn logout(&self, session_id: &str) -> WorkflowResult<()> {
        match self.db.delete_auth_session(session_id).await {
            Ok(()) | Err(PortError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolves a session cookie value to the caller's identity.
    pub async fn authenticate(&self, session_id: &str) -> WorkflowResult<Identity> {
        let session = match self.db.get_auth_session(session_id).await {
            Ok(session) => session,
            Err(PortError::NotFound(_)) => return Err(WorkflowError::Unauthenticated),
            Err(e) => return Err(e.into()),
        };
        if is_expired(self.clock.now(), session.expires_at) {
            self.logout(session_id).await?;
            return Err(WorkflowError::Unauthenticated);
        }
        Ok(Identity {
            account_id: session.account_id,
            session_id: session.id,
        })
    }

    pub async fn current_user(&self, identity: &Identity) -> WorkflowResult<Account> {
        match self.db.get_account(identity.account_id).await {
            Ok(account) => Ok(account),
            Err(PortError::NotFound(_)) => Err(WorkflowError::Unauthenticated),
            Err(e) => Err(e.into()),
        }
    }

    /// Fails with `Forbidden` unless the caller is a staff account.
    pub async fn require_staff(&self, identity: &Identity) -> WorkflowResult<Account> {
        let account = self.current_user(identity).await?;
        if !account.is_staff {
            return Err(WorkflowError::Forbidden);
        }
        Ok(account)
    }

    /// Creates an active staff account unless one already uses `email`.
    /// Returns whether an account was created.
    pub async fn bootstrap_staff(&self, email: &str, password: &str) -> WorkflowResult<bool> {
        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(WorkflowError::Validation("Password is required".to_string()));
        }
        match self.db.get_account_by_email(&email).await {
            Ok(_) => {
                info!(email = %email, "Staff account already exists - skipping bootstrap");
                return Ok(false);
            }
            Err(PortError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let hashed_password = self.credentials.hash_password(password)?;
        let account = self
            .db
            .create_account(NewAccount {
                id: Uuid::new_v4(),
                username: email.clone(),
                email,
                hashed_password,
                is_active: true,
                is_staff: true,
            })
            .await?;
        info!(account_id = %account.id, email = %account.email, "Bootstrapped staff account");
        Ok(true)
    }
}
