//! Error handling for the clinicgate API server.

pub mod response;
pub mod types;

pub use types::{ApiError, ApiResult};
