use std::path::PathBuf;
use thiserror::Error;

use crate::error::StateError;
use crate::provider::ProviderError;

/// Failures while applying a single changed file.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Failed to read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid change file '{path}': {message}")]
    InvalidDocument { path: PathBuf, message: String },

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Scope '{0}' is not inside a management group")]
    NoTargetManagementGroup(String),

    #[error("Scope '{0}' is not inside a subscription")]
    NotInSubscription(String),

    #[error("No enrollment account is available to create subscriptions")]
    NoEnrollmentAccount,

    #[error("Enrollment account '{0}' was not found")]
    EnrollmentAccountNotFound(String),
}
