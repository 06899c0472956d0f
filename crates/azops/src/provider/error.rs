//! Cloud provider error types.

use thiserror::Error;

use crate::retry::Retryable;

/// Errors returned by a [`CloudProvider`](super::CloudProvider).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Transient control-plane error: {0}")]
    Transient(String),

    #[error("Request throttled: {0}")]
    Throttled(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to establish session: {0}")]
    Session(String),

    #[error("Deployment '{name}' failed: {message}")]
    DeploymentFailed { name: String, message: String },
}

impl Retryable for ProviderError {
    /// Returns true if the error is likely transient and the call can be retried.
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Transient(_) | ProviderError::Throttled(_)
        )
    }
}
