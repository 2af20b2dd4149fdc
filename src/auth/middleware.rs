use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderValue, StatusCode, header::AUTHORIZATION, header::WWW_AUTHENTICATE, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::token::{is_well_formed, parse_bearer};
use crate::error::ErrorKind;
use crate::server::AppState;
use crate::types::AccessToken;

/// Extractor that requires a live bearer token.
pub struct RequireAuth(pub AccessToken);

impl RequireAuth {
    #[must_use]
    pub fn owner_uuid(&self) -> &str {
        &self.0.owner_uuid
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidToken,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InvalidScheme => (StatusCode::UNAUTHORIZED, "Invalid authorization scheme"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "error": message });

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"assetvault\""),
            );
        }

        response
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuth)?
            .to_str()
            .map_err(|_| AuthError::InvalidScheme)?;

        let raw_token = parse_bearer(header).ok_or(AuthError::InvalidScheme)?;
        if !is_well_formed(raw_token) {
            return Err(AuthError::InvalidToken);
        }

        let services = state.services.clone();
        let raw_token = raw_token.to_string();
        let token = tokio::task::spawn_blocking(move || services.auth.authenticate(&raw_token))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Token lookup task failed");
                AuthError::InternalError
            })?
            .map_err(|e| match e.kind() {
                ErrorKind::NotFoundAccessToken => AuthError::InvalidToken,
                _ => {
                    tracing::error!(error = ?e, "Token lookup failed");
                    AuthError::InternalError
                }
            })?;

        Ok(RequireAuth(token))
    }
}
