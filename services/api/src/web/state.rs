//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use lms_core::{
    AuthWorkflow, CatalogService, Clock, CredentialService, DatabaseService, EnrollmentService,
    InvitationWorkflow, NotificationService, OnboardingSettings, OtpWorkflow,
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub settings: Arc<OnboardingSettings>,
    pub invitations: InvitationWorkflow,
    pub otp: OtpWorkflow,
    pub auth: AuthWorkflow,
    pub enrollment: EnrollmentService,
    pub catalog: CatalogService,
}

impl AppState {
    /// Wires every workflow to the same set of port implementations.
    pub fn new(
        config: Arc<Config>,
        db: Arc<dyn DatabaseService>,
        notifier: Arc<dyn NotificationService>,
        credentials: Arc<dyn CredentialService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let settings = Arc::new(config.onboarding_settings());
        Self {
            invitations: InvitationWorkflow::new(
                db.clone(),
                notifier.clone(),
                credentials.clone(),
                clock.clone(),
                settings.clone(),
            ),
            otp: OtpWorkflow::new(db.clone(), notifier, clock.clone(), settings.clone()),
            auth: AuthWorkflow::new(db.clone(), credentials, clock, settings.clone()),
            enrollment: EnrollmentService::new(db.clone()),
            catalog: CatalogService::new(db),
            settings,
            config,
        }
    }
}
