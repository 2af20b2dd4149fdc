use serde::{Deserialize, Serialize};

/// Login and password pair, used both to register and to authenticate.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct AssetsListResponse {
    pub assets: Vec<String>,
}
