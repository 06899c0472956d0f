//! Scope resolution errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while mapping identifiers or paths onto scopes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("Identifier '{0}' does not match any known scope shape")]
    Parse(String),

    #[error("Unable to determine scope type from '{0}'")]
    AmbiguousPath(PathBuf),

    #[error("State file '{0}' does not carry a scope identifier")]
    MissingIdentifier(PathBuf),

    #[error("Failed to read '{path}': {message}")]
    Read { path: PathBuf, message: String },
}
