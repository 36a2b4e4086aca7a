//! HTTP middleware and application-level error mapping.

mod error;

pub use error::{AppError, AppResult};
