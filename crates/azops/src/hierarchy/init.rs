//! Builds a [`HierarchyCache`] from live provider queries.

use std::collections::{BTreeMap, HashSet, VecDeque};

use super::cache::{HierarchyCache, ManagementGroupNode};
use crate::provider::{ChildKind, CloudProvider, ManagementGroupInfo, ProviderError};

impl HierarchyCache {
    /// Walks the management-group tree breadth-first from `root_group` and
    /// records every subscription the principal can see.
    ///
    /// Branches the principal cannot expand are kept as childless nodes and
    /// logged; only an unreachable `root_group` fails the initialization.
    pub async fn initialize(
        provider: &dyn CloudProvider,
        root_group: &str,
    ) -> Result<Self, ProviderError> {
        let listed: BTreeMap<String, ManagementGroupInfo> = match provider
            .list_management_groups()
            .await
        {
            Ok(groups) => groups
                .into_iter()
                .map(|g| (g.name.to_lowercase(), g))
                .collect(),
            Err(e) => {
                log::warn!("Failed to list management groups, continuing with tree walk: {}", e);
                BTreeMap::new()
            }
        };

        let mut cache = HierarchyCache::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([root_group.to_string()]);

        while let Some(name) = queue.pop_front() {
            if !visited.insert(name.to_lowercase()) {
                continue;
            }

            match provider.get_management_group_children(&name).await {
                Ok(details) => {
                    for child in &details.children {
                        if child.kind == ChildKind::ManagementGroup {
                            queue.push_back(child.name.clone());
                        }
                    }
                    cache = cache.with_management_group(ManagementGroupNode {
                        name: details.name,
                        display_name: details.display_name,
                        parent: details.parent,
                        children: details.children,
                    });
                }
                Err(e) if name.eq_ignore_ascii_case(root_group) => return Err(e),
                Err(e) => {
                    log::warn!(
                        "Unable to expand management group '{}', keeping it without children: {}",
                        name,
                        e
                    );
                    let node = match listed.get(&name.to_lowercase()) {
                        Some(info) => ManagementGroupNode {
                            name: info.name.clone(),
                            display_name: info.display_name.clone(),
                            parent: info.parent.clone(),
                            children: Vec::new(),
                        },
                        None => ManagementGroupNode::new(name.clone(), name.clone()),
                    };
                    cache = cache.with_management_group(node);
                }
            }
        }

        match provider.list_subscriptions().await {
            Ok(subscriptions) => {
                cache = subscriptions
                    .into_iter()
                    .fold(cache, HierarchyCache::with_subscription);
            }
            Err(e) => log::warn!("Failed to list subscriptions: {}", e),
        }

        log::info!(
            "Hierarchy cache initialized: {} management groups, {} subscriptions",
            cache.management_groups().count(),
            cache.list_subscriptions().len()
        );

        Ok(cache)
    }
}
