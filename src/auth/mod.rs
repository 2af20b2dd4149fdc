mod middleware;
mod password;
mod service;
mod token;

pub use middleware::{AuthError, RequireAuth};
pub use password::CredentialHasher;
pub use service::{AuthTokenService, DEFAULT_MAX_TOKEN_ATTEMPTS};
pub use token::{RandomTokenGenerator, TokenGenerator, is_well_formed, parse_bearer};
