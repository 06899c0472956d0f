//! Plain data exchanged with the cloud control plane.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// The kind of a management-group child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChildKind {
    ManagementGroup,
    Subscription,
}

impl ChildKind {
    pub fn resource_type(&self) -> &'static str {
        match self {
            ChildKind::ManagementGroup => "/providers/Microsoft.Management/managementGroups",
            ChildKind::Subscription => "/subscriptions",
        }
    }
}

/// A direct child of a management group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildEntry {
    /// Full resource identifier of the child.
    pub id: String,
    /// Short name: management-group name or subscription GUID.
    pub name: String,
    pub display_name: String,
    pub kind: ChildKind,
}

impl ChildEntry {
    pub fn management_group(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: format!("/providers/Microsoft.Management/managementGroups/{}", name),
            name,
            display_name: display_name.into(),
            kind: ChildKind::ManagementGroup,
        }
    }

    pub fn subscription(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        let name = id.into();
        Self {
            id: format!("/subscriptions/{}", name),
            name,
            display_name: display_name.into(),
            kind: ChildKind::Subscription,
        }
    }

    /// State-file entity describing this child.
    pub fn to_entity(&self) -> Value {
        json!({
            "Id": self.id,
            "Type": self.kind.resource_type(),
            "Name": self.name,
            "DisplayName": self.display_name,
        })
    }
}

/// A management group as returned by a tenant-wide listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementGroupInfo {
    pub name: String,
    pub display_name: String,
    /// Short name of the parent group, if any.
    pub parent: Option<String>,
}

/// A management group with its expanded children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementGroupDetails {
    pub name: String,
    pub display_name: String,
    pub parent: Option<String>,
    #[serde(default)]
    pub children: Vec<ChildEntry>,
}

/// A subscription visible to the principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    pub subscription_id: String,
    pub display_name: String,
    /// Lifecycle state, e.g. `Enabled` or `Disabled`.
    pub state: String,
}

impl SubscriptionInfo {
    pub fn to_entity(&self) -> Value {
        json!({
            "Id": format!("/subscriptions/{}", self.subscription_id),
            "Type": ChildKind::Subscription.resource_type(),
            "Name": self.subscription_id,
            "DisplayName": self.display_name,
            "State": self.state,
        })
    }
}

/// A resource group inside a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupInfo {
    pub id: String,
    pub name: String,
    pub location: String,
    /// Identifier of the external owner, when the group is managed by another service.
    #[serde(default)]
    pub managed_by: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ResourceGroupInfo {
    /// Returns true if another service owns this group.
    pub fn is_externally_managed(&self) -> bool {
        self.managed_by
            .as_deref()
            .is_some_and(|owner| !owner.trim().is_empty())
    }

    pub fn to_entity(&self) -> Value {
        json!({
            "ResourceId": self.id,
            "ResourceGroupName": self.name,
            "Location": self.location,
            "ManagedBy": self.managed_by,
            "Tags": self.tags,
        })
    }
}

/// Minimal listing entry for a resource; details come from `get_resource`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSummary {
    pub id: String,
    pub name: String,
    pub resource_type: String,
}

/// A billing account allowed to create subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentAccount {
    pub object_id: String,
    pub principal_name: String,
}

/// Parameters for creating a new subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    pub name: String,
    pub offer_type: String,
    pub enrollment_account_object_id: String,
}

/// Target level of a template deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "level")]
pub enum DeploymentLevel {
    Tenant,
    ManagementGroup {
        management_group: String,
    },
    Subscription {
        subscription_id: String,
    },
    ResourceGroup {
        subscription_id: String,
        resource_group: String,
    },
}

impl std::fmt::Display for DeploymentLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentLevel::Tenant => write!(f, "tenant"),
            DeploymentLevel::ManagementGroup { management_group } => {
                write!(f, "managementGroup/{}", management_group)
            }
            DeploymentLevel::Subscription { subscription_id } => {
                write!(f, "subscription/{}", subscription_id)
            }
            DeploymentLevel::ResourceGroup {
                subscription_id,
                resource_group,
            } => write!(f, "subscription/{}/resourceGroup/{}", subscription_id, resource_group),
        }
    }
}

/// ARM deployment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentMode {
    Incremental,
    Complete,
}

/// A template deployment request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRequest {
    pub name: String,
    /// Identifier of the scope the parameter file belongs to.
    pub scope_id: String,
    pub level: DeploymentLevel,
    /// Deployment metadata region; not used for resource-group deployments.
    pub location: Option<String>,
    pub template: Value,
    pub parameters: Value,
    pub mode: DeploymentMode,
}

/// Result of a template deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentOutcome {
    pub name: String,
    pub provisioning_state: String,
}
