pub mod auth;
pub mod catalog;
pub mod domain;
pub mod enrollment;
pub mod error;
pub mod invitation;
pub mod memory;
pub mod otp;
pub mod ports;
pub mod tokens;

pub use auth::AuthWorkflow;
pub use catalog::CatalogService;
pub use domain::{
    Account, AccountId, AuthSession, Cohort, CohortId, Course, CourseBundle, CourseId,
    CourseProvider, CourseStatus, EmailMessage, Identity, Invitation, NewCohort, NewCourse,
    NewSpecialization, OtpCode, ProfileUpdate, Specialization, SpecializationId, UserProfile,
};
pub use enrollment::EnrollmentService;
pub use error::{WorkflowError, WorkflowResult};
pub use invitation::{InvitationWorkflow, IssuedInvitation, RegistrationRequest};
pub use memory::InMemoryDatabase;
pub use otp::{OtpWorkflow, VerifiedOtp};
pub use ports::{
    Clock, CredentialService, DatabaseService, NotificationService, PortError, PortResult,
    SystemClock,
};
pub use tokens::OnboardingSettings;
