pub mod dto;
mod handlers;
pub mod range;
pub mod response;
mod router;
pub mod validation;

pub use handlers::auth::ClientIp;
pub use router::{AppState, create_router};
