use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;

/// ApiJson
///
/// JSON body extractor for the API. Unlike `axum::Json` it only accepts a JSON object
/// (serde would otherwise fill a struct positionally from an array), and every rejection
/// is an `ApiError`, so malformed bodies get the usual `{ "message": ... }` 400.
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(request, state).await?;
        if !value.is_object() {
            return Err(invalid_body("body is not a JSON object"));
        }

        serde_json::from_value(value)
            .map(ApiJson)
            .map_err(|err| invalid_body(&err.to_string()))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        invalid_body(&rejection.body_text())
    }
}

fn invalid_body(detail: &str) -> ApiError {
    tracing::debug!(%detail, "request body rejected");
    ApiError::Validation(INVALID_BODY.to_string())
}

pub const INVALID_BODY: &str = "Invalid request body";
