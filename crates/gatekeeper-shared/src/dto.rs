//! Data Transfer Objects - request/response types for the API.

use serde::{Deserialize, Serialize};

/// Body of `POST /v1/check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    /// Resource being accessed, e.g. "api.users.create".
    pub resource: String,
    /// User or client identifier the budget is enforced for.
    pub identifier: String,
    /// Optional override of the configured default algorithm.
    #[serde(default)]
    pub algorithm: Option<String>,
    /// Number of units to consume. Defaults to 1.
    #[serde(default)]
    pub count: Option<i64>,
}

/// Decision payload returned by check and status endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// RFC 3339 timestamp at which the full budget is available again.
    pub reset_at: String,
    /// Seconds to wait before retrying. Present only on denial.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// Confirmation payload for `POST /v1/reset/{key}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
