//! Common test utilities for the HTTP integration tests.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`, backed by
//! the in-memory store, a recording mailer and a clock the tests control.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use api_lib::config::Config;
use api_lib::web::{build_router, state::AppState};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use lms_core::{
    Clock, CredentialService, EmailMessage, InMemoryDatabase, NotificationService, PortError,
    PortResult,
};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const STAFF_EMAIL: &str = "staff@lms.test";
pub const STAFF_PASSWORD: &str = "staff-password";

pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Keeps hashing out of the request path so the suite stays fast.
pub struct PlainCredentials;

impl CredentialService for PlainCredentials {
    fn hash_password(&self, password: &str) -> PortResult<String> {
        Ok(format!("plain${password}"))
    }

    fn verify_password(&self, password: &str, hashed_password: &str) -> PortResult<bool> {
        Ok(hashed_password == format!("plain${password}"))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<EmailMessage>>,
    pub failing: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn fail(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn last_to(&self, email: &str) -> EmailMessage {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.to == email)
            .cloned()
            .unwrap_or_else(|| panic!("no email sent to {email}"))
    }
}

#[async_trait]
impl NotificationService for RecordingNotifier {
    async fn send_email(&self, message: EmailMessage) -> PortResult<()> {
        if *self.failing.lock().unwrap() {
            return Err(PortError::Unexpected("provider down".to_string()));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// What a test sees of one HTTP exchange.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// The `session=<id>` pair from `Set-Cookie`, ready for a `Cookie` header.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .find(|pair| pair.starts_with("session=") && pair.len() > "session=".len())
            .map(str::to_string)
    }

    pub fn set_cookie(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    pub fn error(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub db: Arc<InMemoryDatabase>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<FixedClock>,
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://unused/lms_test".to_string()),
        "FRONTEND_URL" => Some("https://lms.test".to_string()),
        "COOKIE_SECURE" => Some("false".to_string()),
        _ => None,
    })
    .expect("test config")
}

impl TestApp {
    pub async fn new() -> Self {
        let db = Arc::new(InMemoryDatabase::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(FixedClock(Mutex::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        )));
        let state = Arc::new(AppState::new(
            Arc::new(test_config()),
            db.clone(),
            notifier.clone(),
            Arc::new(PlainCredentials),
            clock.clone(),
        ));
        state
            .auth
            .bootstrap_staff(STAFF_EMAIL, STAFF_PASSWORD)
            .await
            .expect("bootstrap staff");

        Self {
            router: build_router(state.clone()),
            state,
            db,
            notifier,
            clock,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(body), None).await
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, None, cookie).await
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.post("/api/v1/login", json!({ "email": email, "password": password }))
            .await
    }

    pub async fn staff_cookie(&self) -> String {
        self.login(STAFF_EMAIL, STAFF_PASSWORD)
            .await
            .session_cookie()
            .expect("staff session")
    }

    /// Invitation token from the most recent invitation mailed to `email`.
    pub fn invitation_token(&self, email: &str) -> String {
        let body = self.notifier.last_to(email).body_text;
        let start = body.find("/register/").expect("invite link") + "/register/".len();
        body[start..].trim_end_matches('/').to_string()
    }

    /// The six-digit code from the most recent OTP mailed to `email`.
    pub fn otp_code(&self, email: &str) -> String {
        self.notifier
            .last_to(email)
            .body_text
            .chars()
            .filter(char::is_ascii_digit)
            .take(6)
            .collect()
    }

    // --- Catalog fixtures through the admin API ---

    pub async fn create_cohort(&self, staff: &str, name: &str) -> i64 {
        let res = self
            .request(
                Method::POST,
                "/api/v1/admin/cohorts",
                Some(json!({
                    "name": name,
                    "start_date": "2026-01-01",
                    "end_date": "2026-12-31"
                })),
                Some(staff),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);
        res.body["id"].as_i64().unwrap()
    }

    pub async fn create_specialization(&self, staff: &str, cohort_id: i64, name: &str) -> i64 {
        let res = self
            .request(
                Method::POST,
                "/api/v1/admin/specializations",
                Some(json!({ "name": name, "cohort_id": cohort_id })),
                Some(staff),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);
        res.body["id"].as_i64().unwrap()
    }

    pub async fn create_course(
        &self,
        staff: &str,
        cohort_id: i64,
        specialization_id: i64,
        title: &str,
    ) -> i64 {
        let res = self
            .request(
                Method::POST,
                "/api/v1/admin/courses",
                Some(json!({
                    "title": title,
                    "description": format!("{title} basics"),
                    "provider": "Kat Steynberg",
                    "due_date": "2026-06-30",
                    "materials": [{"kind": "video", "url": "https://v.test/1"}],
                    "cohort_id": cohort_id,
                    "specialization_id": specialization_id
                })),
                Some(staff),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);
        res.body["id"].as_i64().unwrap()
    }

    /// Runs invitation, registration and OTP verification over HTTP and
    /// returns the learner's session cookie.
    pub async fn onboard(
        &self,
        email: &str,
        cohort_id: Option<i64>,
        specialization_id: Option<i64>,
    ) -> String {
        let res = self
            .post("/api/v1/send-invitation", json!({ "email": email }))
            .await;
        assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);

        let token = self.invitation_token(email);
        let res = self
            .post(
                &format!("/api/v1/register-from-invite/{token}"),
                json!({
                    "email": email,
                    "password": "learner-pw",
                    "confirm_password": "learner-pw",
                    "cohort_id": cohort_id,
                    "specialization_id": specialization_id
                }),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);

        let res = self
            .post(
                "/api/v1/verify-otp",
                json!({ "email": email, "otp": self.otp_code(email) }),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);
        res.session_cookie().expect("session cookie")
    }
}
