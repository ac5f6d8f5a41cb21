mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use chrono::Duration;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn invited_learner_reaches_their_courses() {
    let app = TestApp::new().await;
    let staff = app.staff_cookie().await;
    let cohort = app.create_cohort(&staff, "2026 Spring").await;
    let spec = app.create_specialization(&staff, cohort, "Data").await;
    let course = app.create_course(&staff, cohort, spec, "SQL").await;

    let res = app
        .post("/api/v1/send-invitation", json!({ "email": "ana@lms.test" }))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Invitation sent successfully!");

    let token = app.invitation_token("ana@lms.test");
    let res = app
        .get(&format!("/api/v1/get-email-from-token/{token}"), None)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["email"], "ana@lms.test");

    let res = app
        .post(
            &format!("/api/v1/register-from-invite/{token}"),
            json!({
                "email": "ana@lms.test",
                "password": "pw-123456",
                "confirm_password": "pw-123456",
                "cohort_id": cohort,
                "specialization_id": spec
            }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);
    assert_eq!(res.body["otp_sent"], true);

    // Not active until the code is verified.
    let res = app.login("ana@lms.test", "pw-123456").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["success"], false);

    let res = app
        .post(
            "/api/v1/verify-otp",
            json!({ "email": "ana@lms.test", "otp": app.otp_code("ana@lms.test") }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["email"], "ana@lms.test");
    let cookie = res.session_cookie().expect("session cookie");
    assert!(res.set_cookie()[0].contains("HttpOnly"));

    let res = app.get("/api/v1/user", Some(&cookie)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["email"], "ana@lms.test");

    let res = app.get("/api/v1/profile", Some(&cookie)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["cohort_id"], cohort);
    assert_eq!(res.body["registered_courses"][0]["id"], course);
    assert_eq!(res.body["registered_courses"][0]["provider"], "Kat Steynberg");

    let res = app.get("/api/v1/get-user-courses", Some(&cookie)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["courses"].as_array().unwrap().len(), 1);

    // The same credentials now log in.
    let res = app.login("ana@lms.test", "pw-123456").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
    assert!(res.session_cookie().is_some());
}

#[tokio::test]
async fn send_invitation_requires_an_email() {
    let app = TestApp::new().await;

    let res = app.post("/api/v1/send-invitation", json!({})).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "Email is required");
    assert_eq!(app.db.invitation_count(), 0);
}

#[tokio::test]
async fn undelivered_invitation_is_reported_and_withdrawn() {
    let app = TestApp::new().await;
    app.notifier.fail(true);

    let res = app
        .post("/api/v1/send-invitation", json!({ "email": "bo@lms.test" }))
        .await;

    assert_eq!(res.status, StatusCode::BAD_GATEWAY);
    assert_eq!(res.error(), "Failed to send email");
    assert_eq!(app.db.invitation_count(), 0);
}

#[tokio::test]
async fn generated_link_points_at_the_frontend() {
    let app = TestApp::new().await;

    let res = app
        .post("/api/v1/generate-invite-url", json!({ "email": "cy@lms.test" }))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    let link = res.body["invite_link"].as_str().unwrap();
    assert!(link.starts_with("https://lms.test/register/"));
    assert!(app.notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_token_is_not_found() {
    let app = TestApp::new().await;

    let res = app
        .get("/api/v1/get-email-from-token/no-such-token", None)
        .await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.error(), "Invalid token");
}

#[tokio::test]
async fn registration_rejects_mismatched_passwords_and_reuse() {
    let app = TestApp::new().await;
    app.post("/api/v1/send-invitation", json!({ "email": "di@lms.test" }))
        .await;
    let token = app.invitation_token("di@lms.test");
    let uri = format!("/api/v1/register/{token}");

    let res = app
        .post(
            &uri,
            json!({ "email": "di@lms.test", "password": "a", "confirm_password": "b" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "Passwords do not match");
    assert_eq!(app.db.invitation_count(), 1);

    let body = json!({ "email": "di@lms.test", "password": "pw", "confirm_password": "pw" });
    assert_eq!(app.post(&uri, body.clone()).await.status, StatusCode::OK);

    let res = app.post(&uri, body).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "Invalid or expired invitation");
}

#[tokio::test]
async fn otp_failures_are_reported() {
    let app = TestApp::new().await;
    app.post("/api/v1/send-invitation", json!({ "email": "ed@lms.test" }))
        .await;
    let token = app.invitation_token("ed@lms.test");
    app.post(
        &format!("/api/v1/register/{token}"),
        json!({ "email": "ed@lms.test", "password": "pw", "confirm_password": "pw" }),
    )
    .await;
    let code = app.otp_code("ed@lms.test");
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let res = app
        .post("/api/v1/verify-otp", json!({ "email": "ed@lms.test", "otp": wrong }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "Invalid OTP or OTP already used");

    app.clock.advance(Duration::minutes(11));
    let res = app
        .post("/api/v1/verify-otp", json!({ "email": "ed@lms.test", "otp": code }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "OTP has expired");

    // A fresh code still works.
    let res = app
        .post("/api/v1/send-otp", json!({ "email": "ed@lms.test" }))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let res = app
        .post(
            "/api/v1/verify-otp",
            json!({ "email": "ed@lms.test", "otp": app.otp_code("ed@lms.test") }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn wrong_method_is_a_json_405() {
    let app = TestApp::new().await;

    let res = app.get("/api/v1/send-invitation", None).await;

    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.error(), "Method not allowed");
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let app = TestApp::new().await;
    let broken = |uri: &str| {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap()
    };

    let res = app.send(broken("/api/v1/send-otp")).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "Invalid JSON");

    let res = app.send(broken("/api/v1/login")).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body, json!({ "success": false, "message": "Invalid JSON" }));
}

#[tokio::test]
async fn bad_credentials_are_unauthorized() {
    let app = TestApp::new().await;

    let res = app.login(common::STAFF_EMAIL, "not-the-password").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        res.body,
        json!({ "success": false, "message": "Invalid credentials" })
    );

    let res = app.login("nobody@lms.test", "pw").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = TestApp::new().await;
    let cookie = app.onboard("fi@lms.test", None, None).await;
    assert_eq!(app.get("/api/v1/user", Some(&cookie)).await.status, StatusCode::OK);

    let res = app
        .request(Method::POST, "/api/v1/logout", None, Some(&cookie))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.set_cookie()[0].contains("Max-Age=0"));

    let res = app.get("/api/v1/user", Some(&cookie)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error(), "Not logged in");

    // Logging out twice is harmless.
    let res = app
        .request(Method::POST, "/api/v1/logout", None, Some(&cookie))
        .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_need_a_session() {
    let app = TestApp::new().await;

    for uri in ["/api/v1/user", "/api/v1/profile", "/api/v1/get-user-courses"] {
        let res = app.get(uri, None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{uri}");
    }
    let res = app.get("/api/v1/profile", Some("session=forged")).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn csrf_endpoint_sets_a_cookie() {
    let app = TestApp::new().await;

    let res = app.get("/api/v1/set-csrf-token", None).await;

    assert_eq!(res.status, StatusCode::OK);
    assert!(res.set_cookie().iter().any(|c| c.starts_with("csrftoken=")));
}

#[tokio::test]
async fn admin_routes_are_staff_only() {
    let app = TestApp::new().await;
    let body = json!({ "name": "X", "start_date": "2026-01-01", "end_date": "2026-02-01" });

    let res = app
        .request(Method::POST, "/api/v1/admin/cohorts", Some(body.clone()), None)
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let learner = app.onboard("gu@lms.test", None, None).await;
    let res = app
        .request(Method::POST, "/api/v1/admin/cohorts", Some(body), Some(&learner))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.error(), "You do not have permission to perform this action");
}

#[tokio::test]
async fn course_creation_validates_provider() {
    let app = TestApp::new().await;
    let staff = app.staff_cookie().await;
    let cohort = app.create_cohort(&staff, "Autumn").await;
    let spec = app.create_specialization(&staff, cohort, "Web").await;

    let res = app
        .request(
            Method::POST,
            "/api/v1/admin/courses",
            Some(json!({
                "title": "HTML",
                "provider": "Somebody Else",
                "due_date": "2026-06-30",
                "cohort_id": cohort,
                "specialization_id": spec
            })),
            Some(&staff),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .request(
            Method::POST,
            "/api/v1/admin/cohorts",
            Some(json!({ "name": "Autumn", "start_date": "2026-01-01", "end_date": "2026-02-01" })),
            Some(&staff),
        )
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn switching_specialization_rederives_courses() {
    let app = TestApp::new().await;
    let staff = app.staff_cookie().await;
    let cohort = app.create_cohort(&staff, "2026 Summer").await;
    let data = app.create_specialization(&staff, cohort, "Data").await;
    let web = app.create_specialization(&staff, cohort, "Web").await;
    let sql = app.create_course(&staff, cohort, data, "SQL").await;
    let css = app.create_course(&staff, cohort, web, "CSS").await;

    let cookie = app.onboard("ha@lms.test", Some(cohort), Some(data)).await;
    let res = app.get("/api/v1/get-user-courses", Some(&cookie)).await;
    assert_eq!(res.body["courses"][0]["id"], sql);

    let res = app
        .request(
            Method::PATCH,
            "/api/v1/profile",
            Some(json!({ "specialization_id": web, "preferred_name": "Ha" })),
            Some(&cookie),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);
    assert_eq!(res.body["preferred_name"], "Ha");
    let courses = res.body["registered_courses"].as_array().unwrap();
    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0]["id"], css);

    // Preferred names are unique across learners.
    let other = app.onboard("io@lms.test", None, None).await;
    let res = app
        .request(
            Method::PATCH,
            "/api/v1/profile",
            Some(json!({ "preferred_name": "Ha" })),
            Some(&other),
        )
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn bundles_and_cohort_deletion_reach_learners() {
    let app = TestApp::new().await;
    let staff = app.staff_cookie().await;
    let cohort = app.create_cohort(&staff, "2026 Winter").await;
    let spec = app.create_specialization(&staff, cohort, "Ops").await;
    let linux = app.create_course(&staff, cohort, spec, "Linux").await;
    let cookie = app.onboard("jo@lms.test", Some(cohort), Some(spec)).await;

    let res = app
        .request(
            Method::POST,
            "/api/v1/assign-courses-to-specialization",
            Some(json!({ "cohort_id": cohort, "specialization_id": spec, "course_ids": [linux] })),
            Some(&staff),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Courses assigned successfully");

    let bundle_uri = format!("/api/v1/admin/bundles/{cohort}/{spec}");
    let res = app.get(&bundle_uri, Some(&staff)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["courses"][0]["id"], linux);
    assert_eq!(app.get(&bundle_uri, Some(&cookie)).await.status, StatusCode::FORBIDDEN);

    let res = app
        .request(
            Method::POST,
            "/api/v1/assign-courses-to-specialization",
            Some(json!({ "cohort_id": 9999, "specialization_id": spec, "course_ids": [] })),
            Some(&staff),
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app
        .request(
            Method::DELETE,
            &format!("/api/v1/admin/cohorts/{cohort}"),
            None,
            Some(&staff),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app.get(&bundle_uri, Some(&staff)).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app.get("/api/v1/profile", Some(&cookie)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["cohort_id"].is_null());
    assert!(res.body["specialization_id"].is_null());
    assert!(res.body["registered_courses"].as_array().unwrap().is_empty());
}
