//! services/api/src/web/rest.rs
//!
//! Shared REST payloads and the master definition for the OpenAPI
//! specification.

use chrono::NaiveDate;
use lms_core::{CohortId, Course, CourseId, SpecializationId};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::web::{admin, auth, invitations, otp, profile};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        invitations::send_invitation_handler,
        invitations::generate_invite_url_handler,
        invitations::get_email_from_token_handler,
        invitations::register_handler,
        otp::send_otp_handler,
        otp::verify_otp_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::user_handler,
        auth::set_csrf_token_handler,
        profile::get_profile_handler,
        profile::update_profile_handler,
        profile::get_user_courses_handler,
        admin::assign_courses_handler,
        admin::get_bundle_handler,
        admin::create_cohort_handler,
        admin::delete_cohort_handler,
        admin::create_specialization_handler,
        admin::create_course_handler,
    ),
    components(
        schemas(
            MessageResponse, ErrorResponse, EmailRequest, CourseResponse,
            invitations::RegisterRequest, invitations::RegisterResponse,
            invitations::EmailResponse, invitations::InviteLinkResponse,
            otp::VerifyOtpRequest, otp::VerifyOtpResponse,
            auth::LoginRequest, auth::LoginResponse, auth::UserResponse,
            profile::ProfileResponse, profile::ProfilePatch, profile::CoursesResponse,
            admin::AssignCoursesRequest, admin::BundleResponse, admin::CreateCohortRequest, admin::CohortResponse,
            admin::CreateSpecializationRequest, admin::SpecializationResponse,
            admin::CreateCourseRequest,
        )
    ),
    tags(
        (name = "LMS Onboarding API", description = "Invitations, OTP verification, profiles and course enrollment.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Body of every error response.
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// A request carrying only an email address. A missing key reads as blank.
#[derive(Deserialize, ToSchema)]
pub struct EmailRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Serialize, ToSchema)]
pub struct CourseResponse {
    pub id: CourseId,
    pub title: String,
    pub description: String,
    pub provider: String,
    pub status: String,
    pub due_date: NaiveDate,
    #[schema(value_type = Vec<Object>)]
    pub materials: Vec<serde_json::Value>,
    pub cohort_id: CohortId,
    pub specialization_id: SpecializationId,
}

impl From<Course> for CourseResponse {
    fn from(course: Course) -> Self {
        Self {
            id: course.id,
            title: course.title,
            description: course.description,
            provider: course.provider.as_str().to_string(),
            status: course.status.as_str().to_string(),
            due_date: course.due_date,
            materials: course.materials,
            cohort_id: course.cohort_id,
            specialization_id: course.specialization_id,
        }
    }
}
