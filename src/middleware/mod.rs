mod auth;
mod error_handler;

pub use auth::{auth_optional, auth_required};
pub use error_handler::log_errors;
