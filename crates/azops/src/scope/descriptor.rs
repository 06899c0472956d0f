//! Scope descriptor types.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Provider/type token for management-group self-descriptors.
pub const MANAGEMENT_GROUP_TOKEN: &str = "Microsoft.Management_managementGroups";
/// Provider/type token for subscription self-descriptors.
pub const SUBSCRIPTION_TOKEN: &str = "Microsoft.Subscription_subscriptions";
/// Provider/type token for resource-group self-descriptors.
pub const RESOURCE_GROUP_TOKEN: &str = "Microsoft.Resources_resourceGroups";

/// Suffix of parameter-style state files.
pub const PARAMETERS_SUFFIX: &str = ".parameters.json";
/// Suffix of raw-template state files.
pub const TEMPLATE_SUFFIX: &str = ".json";

/// The kind of a scope, in classification precedence order (highest last).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeKind {
    Root,
    ManagementGroup,
    Subscription,
    ResourceGroup,
    Resource,
}

impl ScopeKind {
    /// Returns the ARM resource type this kind of scope is deployed as.
    pub fn resource_type(&self) -> Option<&'static str> {
        match self {
            ScopeKind::Root => None,
            ScopeKind::ManagementGroup => Some("Microsoft.Management/managementGroups"),
            ScopeKind::Subscription => Some("Microsoft.Subscription/subscriptions"),
            ScopeKind::ResourceGroup => Some("Microsoft.Resources/resourceGroups"),
            ScopeKind::Resource => None,
        }
    }
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeKind::Root => write!(f, "root"),
            ScopeKind::ManagementGroup => write!(f, "managementGroup"),
            ScopeKind::Subscription => write!(f, "subscription"),
            ScopeKind::ResourceGroup => write!(f, "resourceGroup"),
            ScopeKind::Resource => write!(f, "resource"),
        }
    }
}

/// A management group as seen from one of its descendants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementGroupRef {
    /// Short management-group name (the last identifier segment).
    pub id: String,
    pub display_name: String,
}

/// A subscription as seen from one of its descendants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRef {
    /// Subscription GUID.
    pub id: String,
    pub display_name: String,
}

/// The container a resource lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ResourceParent {
    ManagementGroup {
        management_group: ManagementGroupRef,
    },
    Subscription {
        subscription: SubscriptionRef,
        management_group: Option<ManagementGroupRef>,
    },
    ResourceGroup {
        subscription: SubscriptionRef,
        management_group: Option<ManagementGroupRef>,
        resource_group: String,
    },
}

/// Variant-specific ancestry of a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Scope {
    Root,
    ManagementGroup {
        management_group: ManagementGroupRef,
    },
    Subscription {
        subscription: SubscriptionRef,
        /// Parent management group, when the hierarchy knows it.
        management_group: Option<ManagementGroupRef>,
    },
    ResourceGroup {
        subscription: SubscriptionRef,
        management_group: Option<ManagementGroupRef>,
        resource_group: String,
    },
    Resource {
        parent: ResourceParent,
        /// Resource provider namespace, e.g. `Microsoft.Network`.
        provider: String,
        /// Resource type segments joined with `_`, e.g. `virtualNetworks_subnets`.
        resource_type: String,
    },
}

/// A fully resolved scope: identifier, display name, state path and ancestry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeDescriptor {
    /// The raw identifier this descriptor was resolved from.
    pub id: String,
    pub name: String,
    /// Root directory for `Root`, the state file for every other kind.
    pub state_path: PathBuf,
    pub scope: Scope,
}

impl ScopeDescriptor {
    pub fn kind(&self) -> ScopeKind {
        match &self.scope {
            Scope::Root => ScopeKind::Root,
            Scope::ManagementGroup { .. } => ScopeKind::ManagementGroup,
            Scope::Subscription { .. } => ScopeKind::Subscription,
            Scope::ResourceGroup { .. } => ScopeKind::ResourceGroup,
            Scope::Resource { .. } => ScopeKind::Resource,
        }
    }

    /// The closest management group in this scope's ancestry (or itself).
    pub fn management_group(&self) -> Option<&ManagementGroupRef> {
        match &self.scope {
            Scope::Root => None,
            Scope::ManagementGroup { management_group } => Some(management_group),
            Scope::Subscription {
                management_group, ..
            }
            | Scope::ResourceGroup {
                management_group, ..
            } => management_group.as_ref(),
            Scope::Resource { parent, .. } => match parent {
                ResourceParent::ManagementGroup { management_group } => Some(management_group),
                ResourceParent::Subscription {
                    management_group, ..
                }
                | ResourceParent::ResourceGroup {
                    management_group, ..
                } => management_group.as_ref(),
            },
        }
    }

    /// The subscription this scope belongs to (or is).
    pub fn subscription(&self) -> Option<&SubscriptionRef> {
        match &self.scope {
            Scope::Subscription { subscription, .. }
            | Scope::ResourceGroup { subscription, .. } => Some(subscription),
            Scope::Resource {
                parent:
                    ResourceParent::Subscription { subscription, .. }
                    | ResourceParent::ResourceGroup { subscription, .. },
                ..
            } => Some(subscription),
            _ => None,
        }
    }

    /// The resource group this scope belongs to (or is).
    pub fn resource_group(&self) -> Option<&str> {
        match &self.scope {
            Scope::ResourceGroup { resource_group, .. } => Some(resource_group),
            Scope::Resource {
                parent: ResourceParent::ResourceGroup { resource_group, .. },
                ..
            } => Some(resource_group),
            _ => None,
        }
    }

    /// Resource provider namespace, for resources only.
    pub fn resource_provider(&self) -> Option<&str> {
        match &self.scope {
            Scope::Resource { provider, .. } => Some(provider),
            _ => None,
        }
    }

    /// The ARM resource type of this scope, e.g. `Microsoft.Network/virtualNetworks/subnets`.
    pub fn resource_type(&self) -> Option<String> {
        match &self.scope {
            Scope::Resource {
                provider,
                resource_type,
                ..
            } => Some(format!("{}/{}", provider, resource_type.replace('_', "/"))),
            _ => self.kind().resource_type().map(str::to_string),
        }
    }

    /// Returns the state file for the requested export mode.
    ///
    /// `state_path` is always stored in the layout's own mode; this swaps the
    /// `.parameters` infix in or out.
    pub fn state_file(&self, export_raw: bool) -> Option<PathBuf> {
        if self.kind() == ScopeKind::Root {
            return None;
        }
        Some(swap_suffix(&self.state_path, export_raw))
    }
}

/// Formats a `"{DisplayName} ({Id})"` directory segment.
pub fn directory_segment(display_name: &str, id: &str) -> String {
    format!("{} ({})", display_name, id)
}

/// Builds the leaf file name of a state file.
pub fn state_file_name(token: &str, name: &str, export_raw: bool) -> String {
    let suffix = if export_raw {
        TEMPLATE_SUFFIX
    } else {
        PARAMETERS_SUFFIX
    };
    format!("{}-{}{}", token, name, suffix)
}

fn swap_suffix(path: &Path, export_raw: bool) -> PathBuf {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return path.to_path_buf();
    };

    let stem = file_name
        .strip_suffix(PARAMETERS_SUFFIX)
        .or_else(|| file_name.strip_suffix(TEMPLATE_SUFFIX))
        .unwrap_or(file_name);

    let suffix = if export_raw {
        TEMPLATE_SUFFIX
    } else {
        PARAMETERS_SUFFIX
    };
    path.with_file_name(format!("{}{}", stem, suffix))
}
