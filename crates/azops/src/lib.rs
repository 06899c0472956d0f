//! GitOps reconciliation of a cloud governance hierarchy.
//!
//! Discovery mirrors the tenant, management groups, subscriptions, resource
//! groups and resources onto a tree of JSON state files. Dispatch takes the
//! files changed in a commit range and applies them back to the cloud.

pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod hierarchy;
pub mod logging;
pub mod provider;
pub mod retry;
pub mod scope;
pub mod state;

pub use config::{load_settings, load_settings_from_str, Settings};
pub use discovery::{DiscoveryEngine, DiscoveryOptions, DiscoveryReport};
pub use dispatch::{parse_name_status, ApplyReport, ChangeDispatcher, ChangeSet, DispatchSettings};
pub use error::{AzOpsError, ConfigError, Result, StateError};
pub use hierarchy::HierarchyCache;
pub use provider::{CloudProvider, InMemoryProvider, ProviderError};
pub use retry::{retry, RetryPolicy, Retryable};
pub use scope::{
    resolve_from_id, resolve_from_path, ScopeContext, ScopeDescriptor, ScopeError, ScopeKind,
    StateLayout,
};
pub use state::{FileStateStore, StateDocument, StateStore};
