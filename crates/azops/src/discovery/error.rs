use thiserror::Error;

use crate::scope::ScopeError;

/// Failures that stop a traversal before it starts.
///
/// Everything that goes wrong inside a branch is recorded as a warning in
/// the report instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("Invalid start scope: {0}")]
    InvalidStart(#[from] ScopeError),

    #[error("Hierarchy cache holds no management groups to discover")]
    EmptyHierarchy,
}
