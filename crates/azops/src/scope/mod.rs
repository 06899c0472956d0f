//! Scope model: identifier ⇄ descriptor ⇄ state-file path.
//!
//! A scope is a point in the cloud hierarchy (tenant root, management group,
//! subscription, resource group or resource). Every scope maps onto exactly
//! one location in the state tree, and every tracked location maps back to
//! exactly one scope.

pub mod context;
pub mod descriptor;
pub mod error;
pub mod resolver;

pub use context::{ScopeContext, StateLayout, STATE_DIRECTORY};
pub use descriptor::{
    ManagementGroupRef, ResourceParent, Scope, ScopeDescriptor, ScopeKind, SubscriptionRef,
};
pub use error::ScopeError;
pub use resolver::{management_group_path, resolve_from_id, resolve_from_path};
