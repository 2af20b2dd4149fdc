use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::error::{Error, ErrorKind};

pub const INVALID_CREDENTIALS_MSG: &str = "Invalid credentials";
pub const INTERNAL_SERVER_ERROR_MSG: &str = "Internal Server Error";

/// Body of successful mutations.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

impl StatusResponse {
    #[must_use]
    pub fn ok() -> Self {
        Self { status: "ok" }
    }
}

/// API error that converts to a proper HTTP response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    #[must_use]
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_SERVER_ERROR_MSG)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e.kind() {
            ErrorKind::DuplicateAsset | ErrorKind::DuplicateUser => Self::bad_request(e.to_string()),
            ErrorKind::NotFoundAsset => Self::not_found("Asset not found"),
            // indistinguishable on purpose: no login enumeration
            ErrorKind::UserNotFound | ErrorKind::InvalidPassword => {
                Self::bad_request(INVALID_CREDENTIALS_MSG)
            }
            ErrorKind::NotFoundAccessToken => Self::new(StatusCode::UNAUTHORIZED, "Unauthorized"),
            ErrorKind::DuplicateAccessToken => {
                tracing::error!(error = ?e, "Access token attempts exhausted");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Duplicate access token generation",
                )
            }
            ErrorKind::Timeout => {
                tracing::error!(error = ?e, "Request timed out");
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "Request timed out")
            }
            ErrorKind::Infrastructure | ErrorKind::Config => {
                tracing::error!(error = ?e, "Request failed");
                Self::internal()
            }
        }
    }
}

/// Runs blocking store work off the async executor.
pub async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => {
            tracing::error!(error = %e, "Blocking task failed");
            Err(ApiError::internal())
        }
    }
}
