pub mod admin;
pub mod auth;
pub mod extract;
pub mod invitations;
pub mod middleware;
pub mod otp;
pub mod profile;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use middleware::{require_auth, require_staff};
use state::AppState;

/// Prefix every route is nested under.
pub const API_PREFIX: &str = "/api/v1";

/// JSON 405 for a known path hit with the wrong method.
async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Builds the full API router. CORS and the Swagger UI are layered on by the binary.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route(
            "/send-invitation",
            post(invitations::send_invitation_handler).fallback(method_not_allowed),
        )
        .route(
            "/generate-invite-url",
            post(invitations::generate_invite_url_handler).fallback(method_not_allowed),
        )
        .route(
            "/get-email-from-token/{token}",
            get(invitations::get_email_from_token_handler).fallback(method_not_allowed),
        )
        .route(
            "/register/{token}",
            post(invitations::register_handler).fallback(method_not_allowed),
        )
        .route(
            "/register-from-invite/{token}",
            post(invitations::register_handler).fallback(method_not_allowed),
        )
        .route(
            "/send-otp",
            post(otp::send_otp_handler).fallback(method_not_allowed),
        )
        .route(
            "/verify-otp",
            post(otp::verify_otp_handler).fallback(method_not_allowed),
        )
        .route(
            "/login",
            post(auth::login_handler).fallback(method_not_allowed),
        )
        .route(
            "/logout",
            post(auth::logout_handler).fallback(method_not_allowed),
        )
        .route(
            "/set-csrf-token",
            get(auth::set_csrf_token_handler).fallback(method_not_allowed),
        );

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/user",
            get(auth::user_handler).fallback(method_not_allowed),
        )
        .route(
            "/profile",
            get(profile::get_profile_handler)
                .patch(profile::update_profile_handler)
                .fallback(method_not_allowed),
        )
        .route(
            "/get-user-courses",
            get(profile::get_user_courses_handler).fallback(method_not_allowed),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    // Staff routes; the outer layer authenticates, the inner one checks the role.
    let staff_routes = Router::new()
        .route(
            "/assign-courses-to-specialization",
            post(admin::assign_courses_handler).fallback(method_not_allowed),
        )
        .route(
            "/admin/bundles/{cohort_id}/{specialization_id}",
            get(admin::get_bundle_handler).fallback(method_not_allowed),
        )
        .route(
            "/admin/cohorts",
            post(admin::create_cohort_handler).fallback(method_not_allowed),
        )
        .route(
            "/admin/cohorts/{id}",
            delete(admin::delete_cohort_handler).fallback(method_not_allowed),
        )
        .route(
            "/admin/specializations",
            post(admin::create_specialization_handler).fallback(method_not_allowed),
        )
        .route(
            "/admin/courses",
            post(admin::create_course_handler).fallback(method_not_allowed),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_staff,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(staff_routes);

    Router::new()
        .nest(API_PREFIX, api_router)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
