//! Read-only snapshot of the management-group tree and subscription list.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::provider::{ChildEntry, ChildKind, SubscriptionInfo};

/// One management group in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementGroupNode {
    /// Short management-group name.
    pub name: String,
    pub display_name: String,
    /// Short name of the parent group, if any.
    #[serde(default)]
    pub parent: Option<String>,
    /// Direct children in provider order.
    #[serde(default)]
    pub children: Vec<ChildEntry>,
}

impl ManagementGroupNode {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_child(mut self, child: ChildEntry) -> Self {
        self.children.push(child);
        self
    }

    /// Full resource identifier of this group.
    pub fn id(&self) -> String {
        format!("/providers/Microsoft.Management/managementGroups/{}", self.name)
    }
}

/// Serialized form of the cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HierarchySnapshot {
    #[serde(default)]
    management_groups: Vec<ManagementGroupNode>,
    #[serde(default)]
    subscriptions: Vec<SubscriptionInfo>,
}

/// Hierarchy cache consulted by scope resolution.
///
/// Lookups are case-insensitive, since cloud identifiers are. A miss is a
/// normal outcome: the principal may not see every branch of the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HierarchySnapshot", into = "HierarchySnapshot")]
pub struct HierarchyCache {
    /// Keyed by lower-cased management-group name.
    management_groups: BTreeMap<String, ManagementGroupNode>,
    subscriptions: Vec<SubscriptionInfo>,
}

impl From<HierarchySnapshot> for HierarchyCache {
    fn from(snapshot: HierarchySnapshot) -> Self {
        let cache = snapshot
            .management_groups
            .into_iter()
            .fold(HierarchyCache::new(), HierarchyCache::with_management_group);
        snapshot
            .subscriptions
            .into_iter()
            .fold(cache, HierarchyCache::with_subscription)
    }
}

impl From<HierarchyCache> for HierarchySnapshot {
    fn from(cache: HierarchyCache) -> Self {
        Self {
            management_groups: cache.management_groups.into_values().collect(),
            subscriptions: cache.subscriptions,
        }
    }
}

impl HierarchyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a management group.
    pub fn with_management_group(mut self, node: ManagementGroupNode) -> Self {
        self.management_groups.insert(node.name.to_lowercase(), node);
        self
    }

    /// Adds or replaces a subscription.
    pub fn with_subscription(mut self, subscription: SubscriptionInfo) -> Self {
        self.subscriptions.retain(|s| {
            !s.subscription_id
                .eq_ignore_ascii_case(&subscription.subscription_id)
        });
        self.subscriptions.push(subscription);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.management_groups.is_empty() && self.subscriptions.is_empty()
    }

    /// Looks up a management group by its short name.
    pub fn lookup_management_group(&self, name: &str) -> Option<&ManagementGroupNode> {
        self.management_groups.get(&name.to_lowercase())
    }

    /// Iterates management groups in name order.
    pub fn management_groups(&self) -> impl Iterator<Item = &ManagementGroupNode> {
        self.management_groups.values()
    }

    /// Management groups whose parent is absent or unknown to the cache.
    pub fn top_level_management_groups(&self) -> Vec<&ManagementGroupNode> {
        self.management_groups
            .values()
            .filter(|node| match &node.parent {
                Some(parent) => self.lookup_management_group(parent).is_none(),
                None => true,
            })
            .collect()
    }

    /// Finds the group listing `child_name` (management-group name or
    /// subscription id) among its direct children, with the matching entry.
    pub fn find_child_entry(
        &self,
        child_name: &str,
    ) -> Option<(&ManagementGroupNode, &ChildEntry)> {
        self.management_groups.values().find_map(|node| {
            node.children
                .iter()
                .find(|child| child.name.eq_ignore_ascii_case(child_name))
                .map(|child| (node, child))
        })
    }

    /// Finds the parent group of a child by the child's short name.
    pub fn find_parent_of_child(&self, child_name: &str) -> Option<&ManagementGroupNode> {
        self.find_child_entry(child_name).map(|(node, _)| node)
    }

    /// Finds the parent group of a subscription by the subscription's display name.
    pub fn find_parent_by_child_subscription_display_name(
        &self,
        display_name: &str,
    ) -> Option<&ManagementGroupNode> {
        self.management_groups.values().find(|node| {
            node.children.iter().any(|child| {
                child.kind == ChildKind::Subscription
                    && child.display_name.eq_ignore_ascii_case(display_name)
            })
        })
    }

    pub fn list_subscriptions(&self) -> &[SubscriptionInfo] {
        &self.subscriptions
    }

    pub fn lookup_subscription(&self, subscription_id: &str) -> Option<&SubscriptionInfo> {
        self.subscriptions
            .iter()
            .find(|s| s.subscription_id.eq_ignore_ascii_case(subscription_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cache() -> HierarchyCache {
        HierarchyCache::new()
            .with_management_group(
                ManagementGroupNode::new("tenant-root", "Tenant Root Group")
                    .with_child(ChildEntry::management_group("mg-prod", "Production")),
            )
            .with_management_group(
                ManagementGroupNode::new("mg-prod", "Production")
                    .with_parent("tenant-root")
                    .with_child(ChildEntry::subscription("sub-1", "Prod")),
            )
            .with_subscription(SubscriptionInfo {
                subscription_id: "sub-1".to_string(),
                display_name: "Prod".to_string(),
                state: "Enabled".to_string(),
            })
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let cache = sample_cache();
        let node = cache.lookup_management_group("MG-PROD").unwrap();
        assert_eq!(node.display_name, "Production");
        assert!(cache.lookup_subscription("SUB-1").is_some());
    }

    #[test]
    fn test_miss_is_not_an_error() {
        let cache = sample_cache();
        assert!(cache.lookup_management_group("unknown").is_none());
        assert!(cache.find_parent_of_child("unknown").is_none());
        assert!(cache.lookup_subscription("unknown").is_none());
    }

    #[test]
    fn test_find_parent_of_child() {
        let cache = sample_cache();
        assert_eq!(cache.find_parent_of_child("sub-1").unwrap().name, "mg-prod");
        assert_eq!(
            cache.find_parent_of_child("mg-prod").unwrap().name,
            "tenant-root"
        );
        assert_eq!(
            cache
                .find_parent_by_child_subscription_display_name("Prod")
                .unwrap()
                .name,
            "mg-prod"
        );
    }

    #[test]
    fn test_find_parent_by_display_name_ignores_case() {
        let cache = sample_cache();
        let parent = cache
            .find_parent_by_child_subscription_display_name("PROD")
            .unwrap();
        assert_eq!(parent.name, "mg-prod");
        assert!(cache
            .find_parent_by_child_subscription_display_name("Production")
            .is_none());
    }

    #[test]
    fn test_top_level_groups_include_orphans() {
        let cache = sample_cache().with_management_group(
            ManagementGroupNode::new("orphan", "Orphan").with_parent("invisible-parent"),
        );
        let names: Vec<_> = cache
            .top_level_management_groups()
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(names, vec!["orphan", "tenant-root"]);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let cache = sample_cache();
        let json = serde_json::to_string(&cache).unwrap();
        let restored: HierarchyCache = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, cache);
    }

    #[test]
    fn test_with_subscription_replaces_existing() {
        let cache = sample_cache().with_subscription(SubscriptionInfo {
            subscription_id: "SUB-1".to_string(),
            display_name: "Renamed".to_string(),
            state: "Enabled".to_string(),
        });
        assert_eq!(cache.list_subscriptions().len(), 1);
        assert_eq!(cache.list_subscriptions()[0].display_name, "Renamed");
    }
}
