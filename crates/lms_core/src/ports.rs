//! crates/lms_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the database, the mail provider and the password hasher.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Account, AccountCredentials, AccountId, AuthSession, Cohort, CohortId, Course,
    CourseBundle, CourseId, EmailMessage, Invitation, NewAccount, NewCohort, NewCourse,
    NewProfile, NewSpecialization, OtpCode, Specialization, SpecializationId, UserProfile,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Outcome of atomically consuming an OTP record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpConsumption {
    /// The code was burnt, the account activated and the record deleted.
    Activated(Account),
    /// The code was burnt but no account carries its email.
    AccountMissing,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The entity store.
///
/// Every write that can change a profile's (cohort, specialization) pair or the
/// set of courses matching it must re-derive `registered_courses` for the
/// affected profiles before it becomes visible to readers.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Catalog ---
    async fn create_cohort(&self, cohort: NewCohort) -> PortResult<Cohort>;

    async fn get_cohort(&self, cohort_id: CohortId) -> PortResult<Cohort>;

    /// Deletes a cohort with its specializations, courses and bundles. Profiles
    /// referencing any of them keep existing with the reference cleared.
    async fn delete_cohort(&self, cohort_id: CohortId) -> PortResult<()>;

    async fn create_specialization(
        &self,
        specialization: NewSpecialization,
    ) -> PortResult<Specialization>;

    async fn get_specialization(
        &self,
        specialization_id: SpecializationId,
    ) -> PortResult<Specialization>;

    /// Inserts a course and enrolls every profile on its pair.
    async fn create_course(&self, course: NewCourse) -> PortResult<Course>;

    async fn courses_for_pair(
        &self,
        cohort_id: CohortId,
        specialization_id: SpecializationId,
    ) -> PortResult<Vec<Course>>;

    /// Returns the courses that exist among `course_ids`, ordered by id.
    async fn get_courses(&self, course_ids: &[CourseId]) -> PortResult<Vec<Course>>;

    // --- Course Bundles ---
    /// Creates the bundle if absent and replaces its course set with the
    /// existing courses among `course_ids`.
    async fn replace_bundle(
        &self,
        cohort_id: CohortId,
        specialization_id: SpecializationId,
        course_ids: &[CourseId],
    ) -> PortResult<CourseBundle>;

    async fn get_bundle(
        &self,
        cohort_id: CohortId,
        specialization_id: SpecializationId,
    ) -> PortResult<CourseBundle>;

    // --- Accounts ---
    async fn create_account(&self, account: NewAccount) -> PortResult<Account>;

    async fn get_account(&self, account_id: AccountId) -> PortResult<Account>;

    async fn get_account_by_email(&self, email: &str) -> PortResult<Account>;

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<AccountCredentials>;

    // --- Profiles ---
    async fn get_profile(&self, account_id: AccountId) -> PortResult<UserProfile>;

    async fn create_profile(&self, profile: NewProfile) -> PortResult<UserProfile>;

    /// Persists the editable fields of `profile` and re-derives its courses in
    /// the same atomic unit. The returned profile carries the derived set.
    async fn save_profile(&self, profile: &UserProfile) -> PortResult<UserProfile>;

    // --- Invitations ---
    /// Inserts the invitation, replacing any invitation already held by its email.
    async fn upsert_invitation(&self, invitation: &Invitation) -> PortResult<()>;

    async fn find_invitation_by_token(&self, token: &str) -> PortResult<Invitation>;

    async fn find_invitation_by_email(&self, email: &str) -> PortResult<Invitation>;

    async fn find_invitation(&self, token: &str, email: &str) -> PortResult<Invitation>;

    async fn delete_invitation(&self, token: &str) -> PortResult<()>;

    /// Atomically deletes the invitation matching `token` and the account's
    /// email, then creates the account and its profile. Fails with `NotFound`
    /// if the invitation is already gone.
    async fn redeem_invitation(
        &self,
        token: &str,
        account: NewAccount,
        profile: NewProfile,
    ) -> PortResult<Account>;

    // --- OTP Codes ---
    async fn create_otp(&self, otp: &OtpCode) -> PortResult<()>;

    /// Finds an unused code for `email`, regardless of expiry.
    async fn find_unused_otp(&self, email: &str, code: &str) -> PortResult<OtpCode>;

    async fn delete_otp(&self, otp_id: uuid::Uuid) -> PortResult<()>;

    /// Atomically marks the record used, activates the account with the
    /// record's email and deletes the record. Fails with `NotFound` if the
    /// record was already used.
    async fn consume_otp(&self, otp: &OtpCode) -> PortResult<OtpConsumption>;

    // --- Auth Sessions ---
    async fn create_auth_session(&self, session: &AuthSession) -> PortResult<()>;

    async fn get_auth_session(&self, session_id: &str) -> PortResult<AuthSession>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Delivers an email. Errors mean the message was not accepted.
    async fn send_email(&self, message: EmailMessage) -> PortResult<()>;
}

/// Opaque password hashing and verification.
pub trait CredentialService: Send + Sync {
    fn hash_password(&self, password: &str) -> PortResult<String>;

    fn verify_password(&self, password: &str, hashed_password: &str) -> PortResult<bool>;
}

/// The source of "now" for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
