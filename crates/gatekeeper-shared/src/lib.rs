//! # Gatekeeper Shared
//!
//! Request/response shapes of the HTTP API, shared between the server and
//! any Rust client of the service.

pub mod dto;
pub mod response;

pub use response::ErrorResponse;
