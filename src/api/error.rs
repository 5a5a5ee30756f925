//! Error taxonomy for backend calls.

use thiserror::Error;

/// Failures surfaced by the API layer. Validation errors are resolved before
/// any request is made; AuthExpired is kept distinct so the caller can force
/// re-authentication instead of offering a retry.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Local, pre-network validation failure. No data is lost.
    #[error("{0}")]
    Validation(String),
    /// HTTP 401: the session token is no longer accepted.
    #[error("authentication expired; sign in again")]
    AuthExpired,
    /// Any other transport or server failure, with the server-provided
    /// message when one was available.
    #[error("{0}")]
    Network(String),
}

impl ApiError {
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ApiError::AuthExpired)
    }
}
