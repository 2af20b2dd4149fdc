use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use super::handlers::{assets, auth, users};
use super::response::{ApiError, blocking};
use crate::services::Services;

pub struct AppState {
    pub services: Arc<Services>,
    /// Largest accepted request body in bytes.
    pub body_limit: usize,
}

impl AppState {
    #[must_use]
    pub fn new(services: Arc<Services>, body_limit: usize) -> Self {
        Self {
            services,
            body_limit,
        }
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let services = state.services.clone();
    blocking(move || services.health_check()).await?;

    Ok(Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "state": "running",
    }))
    .into_response())
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.body_limit;

    Router::new()
        .route("/health", get(health))
        .route("/api/users", post(users::create_user))
        .route("/api/auth", post(auth::authenticate))
        .route("/api/assets", get(assets::list_assets))
        .route("/api/upload-asset/{name}", post(assets::upload_asset))
        .route(
            "/api/asset/{name}",
            get(assets::download_asset).delete(assets::delete_asset),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
