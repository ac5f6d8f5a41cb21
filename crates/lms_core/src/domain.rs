//! crates/lms_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type CohortId = i64;
pub type SpecializationId = i64;
pub type CourseId = i64;
pub type AccountId = Uuid;

//=========================================================================================
// Catalog: Cohorts, Specializations, Courses
//=========================================================================================

/// A timed group of enrollees sharing a curriculum track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cohort {
    pub id: CohortId,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct NewCohort {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// A named sub-track within exactly one cohort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specialization {
    pub id: SpecializationId,
    pub name: String,
    pub cohort_id: CohortId,
}

#[derive(Debug, Clone)]
pub struct NewSpecialization {
    pub name: String,
    pub cohort_id: CohortId,
}

/// Returned when a stored enum column holds an unknown label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseProvider {
    KatSteynberg,
    OtherProvider,
}

impl CourseProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseProvider::KatSteynberg => "Kat Steynberg",
            CourseProvider::OtherProvider => "Other Provider",
        }
    }
}

impl FromStr for CourseProvider {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Kat Steynberg" => Ok(CourseProvider::KatSteynberg),
            "Other Provider" => Ok(CourseProvider::OtherProvider),
            other => Err(UnknownVariant {
                kind: "course provider",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for CourseProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CourseStatus {
    #[default]
    Incomplete,
    InProgress,
    Complete,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Incomplete => "Incomplete",
            CourseStatus::InProgress => "In-Progress",
            CourseStatus::Complete => "Complete",
        }
    }
}

impl FromStr for CourseStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Incomplete" => Ok(CourseStatus::Incomplete),
            "In-Progress" => Ok(CourseStatus::InProgress),
            "Complete" => Ok(CourseStatus::Complete),
            other => Err(UnknownVariant {
                kind: "course status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A course delivered to one (cohort, specialization) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub description: String,
    pub provider: CourseProvider,
    pub status: CourseStatus,
    pub due_date: NaiveDate,
    /// Ordered, opaque course material entries.
    pub materials: Vec<serde_json::Value>,
    pub cohort_id: CohortId,
    pub specialization_id: SpecializationId,
}

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub provider: CourseProvider,
    pub status: CourseStatus,
    pub due_date: NaiveDate,
    pub materials: Vec<serde_json::Value>,
    pub cohort_id: CohortId,
    pub specialization_id: SpecializationId,
}

/// Administrator-curated course set for a (cohort, specialization) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseBundle {
    pub cohort_id: CohortId,
    pub specialization_id: SpecializationId,
    pub course_ids: BTreeSet<CourseId>,
}

//=========================================================================================
// Accounts and Profiles
//=========================================================================================

// Represents an account identity - used throughout app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub is_staff: bool,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    pub account_id: AccountId,
    pub email: String,
    pub hashed_password: String,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    pub is_active: bool,
    pub is_staff: bool,
}

/// Personal data attached one-to-one to an account.
///
/// `registered_courses` is derived from `(cohort_id, specialization_id)` by the
/// store on every write and is never edited directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub account_id: AccountId,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub preferred_name: Option<String>,
    pub physical_address: String,
    pub cohort_id: Option<CohortId>,
    pub specialization_id: Option<SpecializationId>,
    pub registered_courses: BTreeSet<CourseId>,
}

#[derive(Debug, Clone, Default)]
pub struct NewProfile {
    pub account_id: AccountId,
    pub email: String,
    pub name: String,
    pub surname: String,
    pub preferred_name: Option<String>,
    pub physical_address: String,
    pub cohort_id: Option<CohortId>,
    pub specialization_id: Option<SpecializationId>,
}

/// A partial profile edit. `None` leaves a field untouched; for the nullable
/// references, `Some(None)` clears them.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub preferred_name: Option<Option<String>>,
    pub physical_address: Option<String>,
    pub cohort_id: Option<Option<CohortId>>,
    pub specialization_id: Option<Option<SpecializationId>>,
}

impl ProfileUpdate {
    pub fn apply_to(self, profile: &mut UserProfile) {
        if let Some(name) = self.name {
            profile.name = name;
        }
        if let Some(surname) = self.surname {
            profile.surname = surname;
        }
        if let Some(preferred_name) = self.preferred_name {
            profile.preferred_name = preferred_name.filter(|n| !n.trim().is_empty());
        }
        if let Some(address) = self.physical_address {
            profile.physical_address = address;
        }
        if let Some(cohort_id) = self.cohort_id {
            profile.cohort_id = cohort_id;
        }
        if let Some(specialization_id) = self.specialization_id {
            profile.specialization_id = specialization_id;
        }
    }

    /// The cohort/specialization ids this update would point the profile at.
    pub fn referenced_ids(&self) -> (Option<CohortId>, Option<SpecializationId>) {
        (self.cohort_id.flatten(), self.specialization_id.flatten())
    }
}

//=========================================================================================
// Onboarding Records
//=========================================================================================

/// A single-use registration grant for one email address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    pub email: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// A one-time numeric code proving control of an email address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpCode {
    pub id: Uuid,
    pub email: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub id: String,
    pub account_id: AccountId,
    pub expires_at: DateTime<Utc>,
}

/// The authenticated caller of a request, resolved from its session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub account_id: AccountId,
    pub session_id: String,
}

/// An outbound email handed to the notification port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_text: String,
}
