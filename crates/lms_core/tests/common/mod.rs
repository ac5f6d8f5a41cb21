//! Shared fakes and fixtures for the workflow integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use lms_core::domain::{AccountCredentials, NewAccount, NewProfile};
use lms_core::ports::OtpConsumption;
use lms_core::{
    Account, AccountId, AuthSession, AuthWorkflow, CatalogService, Clock, Cohort, CohortId, Course,
    CourseBundle, CourseId, CourseProvider, CourseStatus, CredentialService, DatabaseService,
    EmailMessage, EnrollmentService, InMemoryDatabase, Invitation, InvitationWorkflow, NewCohort,
    NewCourse, NewSpecialization, NotificationService, OnboardingSettings, OtpCode, OtpWorkflow,
    PortError, PortResult, Specialization, SpecializationId, UserProfile,
};
use tokio::sync::Barrier;
use uuid::Uuid;

/// A clock that only moves when told to.
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn new() -> Self {
        Self(Mutex::new(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()))
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Stores passwords reversed; enough to prove the hash is used.
pub struct ReversingCredentials;

impl CredentialService for ReversingCredentials {
    fn hash_password(&self, password: &str) -> PortResult<String> {
        Ok(password.chars().rev().collect())
    }

    fn verify_password(&self, password: &str, hashed_password: &str) -> PortResult<bool> {
        Ok(password.chars().rev().collect::<String>() == hashed_password)
    }
}

/// Records every email and can be switched into a failing mode.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<EmailMessage>>,
    pub failing: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn fail(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn last(&self) -> Option<EmailMessage> {
        self.sent.lock().unwrap().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationService for RecordingNotifier {
    async fn send_email(&self, message: EmailMessage) -> PortResult<()> {
        if *self.failing.lock().unwrap() {
            return Err(PortError::Unexpected("smtp unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

pub struct Harness {
    pub db: Arc<InMemoryDatabase>,
    pub clock: Arc<FixedClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub invitations: InvitationWorkflow,
    pub otp: OtpWorkflow,
    pub auth: AuthWorkflow,
    pub enrollment: EnrollmentService,
    pub catalog: CatalogService,
}

impl Harness {
    pub fn new() -> Self {
        let db = Arc::new(InMemoryDatabase::new());
        Self::with_store(db.clone(), db)
    }

    /// Builds the workflows over `store`; `db` is the in-memory store behind it
    /// that assertions read from.
    pub fn with_store(db: Arc<InMemoryDatabase>, store: Arc<dyn DatabaseService>) -> Self {
        let clock = Arc::new(FixedClock::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let credentials = Arc::new(ReversingCredentials);
        let settings = Arc::new(OnboardingSettings {
            frontend_url: "https://lms.test".to_string(),
            ..Default::default()
        });

        Self {
            invitations: InvitationWorkflow::new(
                store.clone(),
                notifier.clone(),
                credentials.clone(),
                clock.clone(),
                settings.clone(),
            ),
            otp: OtpWorkflow::new(store.clone(), notifier.clone(), clock.clone(), settings.clone()),
            auth: AuthWorkflow::new(store.clone(), credentials, clock.clone(), settings),
            enrollment: EnrollmentService::new(store.clone()),
            catalog: CatalogService::new(store),
            db,
            clock,
            notifier,
        }
    }

    pub async fn cohort(&self, name: &str) -> Cohort {
        self.catalog
            .create_cohort(NewCohort {
                name: name.to_string(),
                start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
            })
            .await
            .expect("create cohort")
    }

    pub async fn specialization(&self, cohort: &Cohort, name: &str) -> Specialization {
        self.catalog
            .create_specialization(NewSpecialization {
                name: name.to_string(),
                cohort_id: cohort.id,
            })
            .await
            .expect("create specialization")
    }

    pub async fn course(&self, spec: &Specialization, title: &str) -> Course {
        self.catalog
            .create_course(NewCourse {
                title: title.to_string(),
                description: format!("{title} description"),
                provider: CourseProvider::KatSteynberg,
                status: CourseStatus::Incomplete,
                due_date: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
                materials: vec![serde_json::json!({"kind": "video", "url": "https://v.test/1"})],
                cohort_id: spec.cohort_id,
                specialization_id: spec.id,
            })
            .await
            .expect("create course")
    }
}

/// Wraps the in-memory store and, once armed, holds every call to
/// `redeem_invitation` and `consume_otp` until two callers have arrived. Both
/// racers have then passed the workflow's reads before either write lands.
pub struct RendezvousDatabase {
    inner: Arc<InMemoryDatabase>,
    gate: Mutex<Option<Arc<Barrier>>>,
}

impl RendezvousDatabase {
    pub fn new(inner: Arc<InMemoryDatabase>) -> Self {
        Self {
            inner,
            gate: Mutex::new(None),
        }
    }

    pub fn arm(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Barrier::new(2)));
    }

    async fn rendezvous(&self) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(barrier) = gate {
            barrier.wait().await;
        }
    }
}

#[async_trait]
impl DatabaseService for RendezvousDatabase {
    async fn create_cohort(&self, cohort: NewCohort) -> PortResult<Cohort> {
        self.inner.create_cohort(cohort).await
    }

    async fn get_cohort(&self, cohort_id: CohortId) -> PortResult<Cohort> {
        self.inner.get_cohort(cohort_id).await
    }

    async fn delete_cohort(&self, cohort_id: CohortId) -> PortResult<()> {
        self.inner.delete_cohort(cohort_id).await
    }

    async fn create_specialization(
        &self,
        specialization: NewSpecialization,
    ) -> PortResult<Specialization> {
        self.inner.create_specialization(specialization).await
    }

    async fn get_specialization(
        &self,
        specialization_id: SpecializationId,
    ) -> PortResult<Specialization> {
        self.inner.get_specialization(specialization_id).await
    }

    async fn create_course(&self, course: NewCourse) -> PortResult<Course> {
        self.inner.create_course(course).await
    }

    async fn courses_for_pair(
        &self,
        cohort_id: CohortId,
        specialization_id: SpecializationId,
    ) -> PortResult<Vec<Course>> {
        self.inner.courses_for_pair(cohort_id, specialization_id).await
    }

    async fn get_courses(&self, course_ids: &[CourseId]) -> PortResult<Vec<Course>> {
        self.inner.get_courses(course_ids).await
    }

    async fn replace_bundle(
        &self,
        cohort_id: CohortId,
        specialization_id: SpecializationId,
        course_ids: &[CourseId],
    ) -> PortResult<CourseBundle> {
        self.inner
            .replace_bundle(cohort_id, specialization_id, course_ids)
            .await
    }

    async fn get_bundle(
        &self,
        cohort_id: CohortId,
        specialization_id: SpecializationId,
    ) -> PortResult<CourseBundle> {
        self.inner.get_bundle(cohort_id, specialization_id).await
    }

    async fn create_account(&self, account: NewAccount) -> PortResult<Account> {
        self.inner.create_account(account).await
    }

    async fn get_account(&self, account_id: AccountId) -> PortResult<Account> {
        self.inner.get_account(account_id).await
    }

    async fn get_account_by_email(&self, email: &str) -> PortResult<Account> {
        self.inner.get_account_by_email(email).await
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<AccountCredentials> {
        self.inner.get_credentials_by_email(email).await
    }

    async fn get_profile(&self, account_id: AccountId) -> PortResult<UserProfile> {
        self.inner.get_profile(account_id).await
    }

    async fn create_profile(&self, profile: NewProfile) -> PortResult<UserProfile> {
        self.inner.create_profile(profile).await
    }

    async fn save_profile(&self, profile: &UserProfile) -> PortResult<UserProfile> {
        self.inner.save_profile(profile).await
    }

    async fn upsert_invitation(&self, invitation: &Invitation) -> PortResult<()> {
        self.inner.upsert_invitation(invitation).await
    }

    async fn find_invitation_by_token(&self, token: &str) -> PortResult<Invitation> {
        self.inner.find_invitation_by_token(token).await
    }

    async fn find_invitation_by_email(&self, email: &str) -> PortResult<Invitation> {
        self.inner.find_invitation_by_email(email).await
    }

    async fn find_invitation(&self, token: &str, email: &str) -> PortResult<Invitation> {
        self.inner.find_invitation(token, email).await
    }

    async fn delete_invitation(&self, token: &str) -> PortResult<()> {
        self.inner.delete_invitation(token).await
    }

    async fn redeem_invitation(
        &self,
        token: &str,
        account: NewAccount,
        profile: NewProfile,
    ) -> PortResult<Account> {
        self.rendezvous().await;
        self.inner.redeem_invitation(token, account, profile).await
    }

    async fn create_otp(&self, otp: &OtpCode) -> PortResult<()> {
        self.inner.create_otp(otp).await
    }

    async fn find_unused_otp(&self, email: &str, code: &str) -> PortResult<OtpCode> {
        self.inner.find_unused_otp(email, code).await
    }

    async fn delete_otp(&self, otp_id: Uuid) -> PortResult<()> {
        self.inner.delete_otp(otp_id).await
    }

    async fn consume_otp(&self, otp: &OtpCode) -> PortResult<OtpConsumption> {
        self.rendezvous().await;
        self.inner.consume_otp(otp).await
    }

    async fn create_auth_session(&self, session: &AuthSession) -> PortResult<()> {
        self.inner.create_auth_session(session).await
    }

    async fn get_auth_session(&self, session_id: &str) -> PortResult<AuthSession> {
        self.inner.get_auth_session(session_id).await
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.inner.delete_auth_session(session_id).await
    }
}
