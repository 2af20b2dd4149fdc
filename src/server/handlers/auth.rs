use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json,
    extract::{ConnectInfo, FromRequestParts, State},
    http::request::Parts,
};

use crate::server::AppState;
use crate::server::dto::{Credentials, TokenResponse};
use crate::server::response::{ApiError, INVALID_CREDENTIALS_MSG, blocking};

/// Peer IP address of the connection, or `"unknown"` when the server was
/// not started with connect info.
pub struct ClientIp(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map_or_else(|| "unknown".to_string(), |ConnectInfo(addr)| addr.ip().to_string());
        Ok(ClientIp(ip))
    }
}

pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    Json(credentials): Json<Credentials>,
) -> Result<Json<TokenResponse>, ApiError> {
    if credentials.login.is_empty() || credentials.password.is_empty() {
        return Err(ApiError::bad_request(INVALID_CREDENTIALS_MSG));
    }

    let services = state.services.clone();
    let token = blocking(move || {
        services
            .auth
            .issue_token(&credentials.login, &credentials.password, &ip)
    })
    .await?;

    Ok(Json(TokenResponse { token }))
}
