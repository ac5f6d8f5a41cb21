//! services/api/src/web/profile.rs
//!
//! The logged-in user's profile and derived course list.

use axum::{extract::State, Extension, Json};
use lms_core::{CohortId, Course, Identity, ProfileUpdate, SpecializationId, UserProfile};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiResult;
use crate::web::extract::JsonBody;
use crate::web::rest::CourseResponse;
use crate::web::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    /// The owning account's username.
    pub user: String,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub preferred_name: Option<String>,
    pub physical_address: String,
    pub cohort_id: Option<CohortId>,
    pub specialization_id: Option<SpecializationId>,
    pub registered_courses: Vec<CourseResponse>,
}

/// Distinguishes an explicit `null` (clear the field) from an absent key
/// (leave it alone).
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A partial update. Absent keys are left unchanged; `null` clears the
/// nullable fields.
#[derive(Deserialize, ToSchema, Default)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub surname: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub preferred_name: Option<Option<String>>,
    pub physical_address: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<i64>)]
    pub cohort_id: Option<Option<CohortId>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<i64>)]
    pub specialization_id: Option<Option<SpecializationId>>,
}

impl From<ProfilePatch> for ProfileUpdate {
    fn from(patch: ProfilePatch) -> Self {
        ProfileUpdate {
            name: patch.name,
            surname: patch.surname,
            preferred_name: patch.preferred_name,
            physical_address: patch.physical_address,
            cohort_id: patch.cohort_id,
            specialization_id: patch.specialization_id,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CoursesResponse {
    pub courses: Vec<CourseResponse>,
}

async fn render(
    state: &AppState,
    identity: &Identity,
    profile: UserProfile,
    courses: Vec<Course>,
) -> ApiResult<ProfileResponse> {
    let account = state.auth.current_user(identity).await?;
    Ok(ProfileResponse {
        user: account.username,
        name: profile.name,
        surname: profile.surname,
        email: profile.email,
        preferred_name: profile.preferred_name,
        physical_address: profile.physical_address,
        cohort_id: profile.cohort_id,
        specialization_id: profile.specialization_id,
        registered_courses: courses.into_iter().map(CourseResponse::from).collect(),
    })
}

/// GET /profile - The current user's profile
#[utoipa::path(
    get,
    path = "/api/v1/profile",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Not logged in"),
        (status = 404, description = "No profile yet")
    )
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<ProfileResponse>> {
    let (profile, courses) = state.enrollment.profile_with_courses(&identity).await?;
    Ok(Json(render(&state, &identity, profile, courses).await?))
}

/// PATCH /profile - Update the current user's profile
///
/// Changing the cohort or specialization re-derives the registered courses.
#[utoipa::path(
    patch,
    path = "/api/v1/profile",
    request_body = ProfilePatch,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "Invalid field value"),
        (status = 401, description = "Not logged in"),
        (status = 404, description = "Unknown cohort or specialization"),
        (status = 409, description = "Preferred name is already taken")
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    JsonBody(patch): JsonBody<ProfilePatch>,
) -> ApiResult<Json<ProfileResponse>> {
    let saved = state
        .enrollment
        .update_profile(&identity, patch.into())
        .await?;
    let courses = state.enrollment.courses_of(&saved).await?;
    Ok(Json(render(&state, &identity, saved, courses).await?))
}

/// GET /get-user-courses - The current user's registered courses
#[utoipa::path(
    get,
    path = "/api/v1/get-user-courses",
    responses(
        (status = 200, description = "Registered courses", body = CoursesResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn get_user_courses_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<CoursesResponse>> {
    let courses = state.enrollment.registered_courses(&identity).await?;
    Ok(Json(CoursesResponse {
        courses: courses.into_iter().map(CourseResponse::from).collect(),
    }))
}
