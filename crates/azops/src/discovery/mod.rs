//! Discovery: mirrors the cloud hierarchy into the state tree.
//!
//! Traversal is depth-first and sequential, except for the resource groups
//! of a subscription, which run on a bounded set of workers.

pub mod engine;
pub mod error;
pub mod options;
pub mod report;

pub use engine::DiscoveryEngine;
pub use error::DiscoveryError;
pub use options::DiscoveryOptions;
pub use report::{DiscoveryReport, DiscoveryWarning, WarningKind};
