//! services/api/src/web/extract.rs
//!
//! Request extractors that report their failures as `ApiError`.

use crate::error::ApiError;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Like `axum::Json`, but a malformed body becomes `400 {"error": "Invalid JSON"}`
/// instead of axum's plain-text rejection.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                debug!(reason = %rejection.body_text(), "Rejected request body");
                Err(match rejection {
                    JsonRejection::MissingJsonContentType(_) => {
                        ApiError::BadRequest("Expected a JSON request body".to_string())
                    }
                    _ => ApiError::BadRequest("Invalid JSON".to_string()),
                })
            }
        }
    }
}
