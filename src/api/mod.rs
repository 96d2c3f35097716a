mod error;
pub mod models;
mod server;
pub mod services;
pub mod state;
pub(crate) mod utils;
mod validation;

pub use error::{ApiError, status_for_failure, status_for_fetch};
pub use server::{router, run};
pub use state::AppState;
pub use validation::{RequestValidationError, validate_resolve_request};
