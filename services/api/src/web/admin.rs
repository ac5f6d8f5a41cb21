//! services/api/src/web/admin.rs
//!
//! Staff-only catalog maintenance and course bundle assignment.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use lms_core::{
    CohortId, CourseId, CourseProvider, CourseStatus, NewCohort, NewCourse, NewSpecialization,
    SpecializationId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::{ApiError, ApiResult};
use crate::web::extract::JsonBody;
use crate::web::rest::{CourseResponse, MessageResponse};
use crate::web::state::AppState;

//=========================================================================================
// Payloads
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct AssignCoursesRequest {
    pub cohort_id: CohortId,
    pub specialization_id: SpecializationId,
    #[serde(default)]
    pub course_ids: Vec<CourseId>,
}

#[derive(Serialize, ToSchema)]
pub struct BundleResponse {
    pub cohort_id: CohortId,
    pub specialization_id: SpecializationId,
    pub courses: Vec<CourseResponse>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateCohortRequest {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Serialize, ToSchema)]
pub struct CohortResponse {
    pub id: CohortId,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateSpecializationRequest {
    pub name: String,
    pub cohort_id: CohortId,
}

#[derive(Serialize, ToSchema)]
pub struct SpecializationResponse {
    pub id: SpecializationId,
    pub name: String,
    pub cohort_id: CohortId,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateCourseRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// `Kat Steynberg` or `Other Provider`.
    pub provider: String,
    /// `Incomplete` (default), `In-Progress` or `Complete`.
    pub status: Option<String>,
    pub due_date: NaiveDate,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub materials: Vec<serde_json::Value>,
    pub cohort_id: CohortId,
    pub specialization_id: SpecializationId,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /assign-courses-to-specialization - Replace the course bundle of a pair
#[utoipa::path(
    post,
    path = "/api/v1/assign-courses-to-specialization",
    request_body = AssignCoursesRequest,
    responses(
        (status = 200, description = "Bundle replaced", body = MessageResponse),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Staff only"),
        (status = 404, description = "Unknown cohort or specialization")
    )
)]
pub async fn assign_courses_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<AssignCoursesRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .enrollment
        .assign_bundle(req.cohort_id, req.specialization_id, &req.course_ids)
        .await?;
    Ok(Json(MessageResponse::new("Courses assigned successfully")))
}

/// GET /admin/bundles/{cohort_id}/{specialization_id} - The courses assigned to a pair
#[utoipa::path(
    get,
    path = "/api/v1/admin/bundles/{cohort_id}/{specialization_id}",
    params(
        ("cohort_id" = i64, Path, description = "Cohort id"),
        ("specialization_id" = i64, Path, description = "Specialization id")
    ),
    responses(
        (status = 200, description = "Assigned courses", body = BundleResponse),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Staff only"),
        (status = 404, description = "Nothing assigned to this pair")
    )
)]
pub async fn get_bundle_handler(
    State(state): State<Arc<AppState>>,
    Path((cohort_id, specialization_id)): Path<(CohortId, SpecializationId)>,
) -> ApiResult<Json<BundleResponse>> {
    let (bundle, courses) = state
        .enrollment
        .bundle(cohort_id, specialization_id)
        .await?;
    Ok(Json(BundleResponse {
        cohort_id: bundle.cohort_id,
        specialization_id: bundle.specialization_id,
        courses: courses.into_iter().map(CourseResponse::from).collect(),
    }))
}

/// POST /admin/cohorts - Create a cohort
#[utoipa::path(
    post,
    path = "/api/v1/admin/cohorts",
    request_body = CreateCohortRequest,
    responses(
        (status = 201, description = "Cohort created", body = CohortResponse),
        (status = 400, description = "Invalid dates or name"),
        (status = 409, description = "Name already in use")
    )
)]
pub async fn create_cohort_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateCohortRequest>,
) -> ApiResult<(StatusCode, Json<CohortResponse>)> {
    let cohort = state
        .catalog
        .create_cohort(NewCohort {
            name: req.name,
            start_date: req.start_date,
            end_date: req.end_date,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CohortResponse {
            id: cohort.id,
            name: cohort.name,
            start_date: cohort.start_date,
            end_date: cohort.end_date,
        }),
    ))
}

/// DELETE /admin/cohorts/{id} - Delete a cohort and everything under it
#[utoipa::path(
    delete,
    path = "/api/v1/admin/cohorts/{id}",
    params(("id" = i64, Path, description = "Cohort id")),
    responses(
        (status = 200, description = "Cohort deleted", body = MessageResponse),
        (status = 404, description = "Unknown cohort")
    )
)]
pub async fn delete_cohort_handler(
    State(state): State<Arc<AppState>>,
    Path(cohort_id): Path<CohortId>,
) -> ApiResult<Json<MessageResponse>> {
    state.catalog.delete_cohort(cohort_id).await?;
    Ok(Json(MessageResponse::new("Cohort deleted")))
}

/// POST /admin/specializations - Create a specialization within a cohort
#[utoipa::path(
    post,
    path = "/api/v1/admin/specializations",
    request_body = CreateSpecializationRequest,
    responses(
        (status = 201, description = "Specialization created", body = SpecializationResponse),
        (status = 404, description = "Unknown cohort"),
        (status = 409, description = "Name already in use")
    )
)]
pub async fn create_specialization_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateSpecializationRequest>,
) -> ApiResult<(StatusCode, Json<SpecializationResponse>)> {
    let specialization = state
        .catalog
        .create_specialization(NewSpecialization {
            name: req.name,
            cohort_id: req.cohort_id,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SpecializationResponse {
            id: specialization.id,
            name: specialization.name,
            cohort_id: specialization.cohort_id,
        }),
    ))
}

/// POST /admin/courses - Create a course; matching profiles are enrolled
#[utoipa::path(
    post,
    path = "/api/v1/admin/courses",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Course created", body = CourseResponse),
        (status = 400, description = "Invalid provider, status or pairing"),
        (status = 404, description = "Unknown cohort or specialization")
    )
)]
pub async fn create_course_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateCourseRequest>,
) -> ApiResult<(StatusCode, Json<CourseResponse>)> {
    let provider = req
        .provider
        .parse::<CourseProvider>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let status = match req.status.as_deref() {
        Some(label) => label
            .parse::<CourseStatus>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => CourseStatus::default(),
    };

    let course = state
        .catalog
        .create_course(NewCourse {
            title: req.title,
            description: req.description,
            provider,
            status,
            due_date: req.due_date,
            materials: req.materials,
            cohort_id: req.cohort_id,
            specialization_id: req.specialization_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(CourseResponse::from(course))))
}
