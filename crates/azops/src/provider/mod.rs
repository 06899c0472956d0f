//! Cloud control-plane seam.
//!
//! Everything the discovery engine and change dispatcher need from the cloud
//! goes through [`CloudProvider`]. Network transport and authentication live
//! behind implementations of this trait; [`memory::InMemoryProvider`] is a
//! complete offline implementation used for replay and tests.

pub mod error;
pub mod memory;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

pub use error::ProviderError;
pub use memory::{InMemoryProvider, Operation};
pub use types::*;

/// Result type for provider calls.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Capability set of the cloud control plane.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Opens an independent session for a parallel worker.
    fn session(&self) -> Result<Arc<dyn CloudProvider>>;

    async fn list_management_groups(&self) -> Result<Vec<ManagementGroupInfo>>;

    async fn get_management_group_children(&self, name: &str) -> Result<ManagementGroupDetails>;

    async fn list_subscriptions(&self) -> Result<Vec<SubscriptionInfo>>;

    async fn list_resource_groups(&self, subscription_id: &str) -> Result<Vec<ResourceGroupInfo>>;

    async fn list_resources(
        &self,
        subscription_id: &str,
        resource_group: &str,
    ) -> Result<Vec<ResourceSummary>>;

    /// Fetches a resource with expanded properties.
    async fn get_resource(&self, resource_id: &str) -> Result<Value>;

    async fn list_policy_definitions(&self, scope_id: &str) -> Result<Vec<Value>>;

    async fn list_policy_set_definitions(&self, scope_id: &str) -> Result<Vec<Value>>;

    async fn list_policy_assignments(&self, scope_id: &str) -> Result<Vec<Value>>;

    async fn list_role_definitions(&self, scope_id: &str) -> Result<Vec<Value>>;

    async fn list_role_assignments(&self, scope_id: &str) -> Result<Vec<Value>>;

    async fn list_enrollment_accounts(&self) -> Result<Vec<EnrollmentAccount>>;

    async fn create_subscription(&self, request: &SubscriptionRequest) -> Result<SubscriptionInfo>;

    async fn assign_management_group(
        &self,
        management_group: &str,
        subscription_id: &str,
    ) -> Result<()>;

    async fn register_provider(&self, subscription_id: &str, namespace: &str) -> Result<()>;

    async fn register_feature(
        &self,
        subscription_id: &str,
        namespace: &str,
        feature: &str,
    ) -> Result<()>;

    async fn deploy(&self, request: &DeploymentRequest) -> Result<DeploymentOutcome>;
}
