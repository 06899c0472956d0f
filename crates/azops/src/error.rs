use std::path::PathBuf;
use thiserror::Error;

use crate::discovery::DiscoveryError;
use crate::dispatch::DispatchError;
use crate::provider::ProviderError;
use crate::scope::ScopeError;

#[derive(Error, Debug)]
pub enum AzOpsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scope error: {0}")]
    Scope(#[from] ScopeError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Settings validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write state file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read state file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid state document '{path}': {message}")]
    InvalidDocument { path: PathBuf, message: String },

    #[error("Failed to serialize state document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Scope '{0}' has no state file of its own")]
    NotPersistable(String),
}

pub type Result<T> = std::result::Result<T, AzOpsError>;
