use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::server::AppState;
use crate::server::dto::Credentials;
use crate::server::response::{ApiError, StatusResponse, blocking};
use crate::server::validation::validate_credentials;

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    validate_credentials(&credentials.login, &credentials.password)?;

    let services = state.services.clone();
    blocking(move || {
        services
            .users
            .create_user(&credentials.login, &credentials.password)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(StatusResponse::ok())))
}
