//! Recursive traversal of the cloud hierarchy into state files.

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use super::error::DiscoveryError;
use super::options::DiscoveryOptions;
use super::report::{DiscoveryReport, WarningKind};
use crate::config::Settings;
use crate::provider::{ChildKind, CloudProvider, ProviderError, ResourceGroupInfo};
use crate::retry::{retry, RetryPolicy};
use crate::scope::{resolve_from_id, ScopeContext, ScopeDescriptor, ScopeKind};
use crate::state::StateStore;

const POLICY_DEFINITIONS: &str = "policyDefinitions";
const POLICY_SET_DEFINITIONS: &str = "policySetDefinitions";
const POLICY_ASSIGNMENTS: &str = "policyAssignments";
const ROLE_DEFINITIONS: &str = "roleDefinitions";
const ROLE_ASSIGNMENTS: &str = "roleAssignments";
const PROVIDERS: &str = "/providers/";

/// Walks the hierarchy from a start scope and persists every scope it visits.
///
/// Cloning is cheap; every field is shared.
#[derive(Clone)]
pub struct DiscoveryEngine {
    ctx: Arc<ScopeContext>,
    provider: Arc<dyn CloudProvider>,
    store: Arc<dyn StateStore>,
    workers: usize,
    retry: RetryPolicy,
}

impl DiscoveryEngine {
    pub fn new(
        ctx: Arc<ScopeContext>,
        provider: Arc<dyn CloudProvider>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            ctx,
            provider,
            store,
            workers: 4,
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_settings(
        settings: &Settings,
        ctx: Arc<ScopeContext>,
        provider: Arc<dyn CloudProvider>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self::new(ctx, provider, store)
            .with_workers(settings.discovery.resource_group_workers)
            .with_retry_policy(settings.retry_policy())
    }

    /// Maximum number of resource groups discovered at once.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn context(&self) -> &ScopeContext {
        &self.ctx
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Discovers `start_id` and everything below it.
    ///
    /// Only an unparsable start identifier is an error; branch failures end
    /// up as warnings in the report.
    pub async fn discover(
        &self,
        start_id: &str,
        options: &DiscoveryOptions,
    ) -> Result<DiscoveryReport, DiscoveryError> {
        let descriptor = resolve_from_id(&self.ctx, start_id)?;
        let mut report = DiscoveryReport::new();

        self.discover_scope(descriptor, options, &mut report).await;

        report.finish();
        log::info!(
            "Discovery of {} finished: {} files written, {} warnings",
            start_id,
            report.written.len(),
            report.warnings.len()
        );
        Ok(report)
    }

    /// Discovers every top-level management group in the hierarchy cache.
    pub async fn discover_tenant(
        &self,
        options: &DiscoveryOptions,
    ) -> Result<DiscoveryReport, DiscoveryError> {
        let top_level: Vec<String> = self
            .ctx
            .hierarchy()
            .top_level_management_groups()
            .iter()
            .map(|node| node.id())
            .collect();
        if top_level.is_empty() {
            return Err(DiscoveryError::EmptyHierarchy);
        }

        let mut report = DiscoveryReport::new();
        for id in top_level {
            match resolve_from_id(&self.ctx, &id) {
                Ok(descriptor) => self.discover_scope(descriptor, options, &mut report).await,
                Err(e) => report.warn(&id, WarningKind::Resolution, e.to_string()),
            }
        }

        report.finish();
        Ok(report)
    }

    fn discover_scope<'a>(
        &'a self,
        descriptor: ScopeDescriptor,
        options: &'a DiscoveryOptions,
        report: &'a mut DiscoveryReport,
    ) -> BoxFuture<'a, ()> {
        let span = tracing::info_span!(
            "discovery.scope",
            kind = %descriptor.kind(),
            scope = %descriptor.id
        );
        async move {
            match descriptor.kind() {
                ScopeKind::Root => report.warn(
                    &descriptor.id,
                    WarningKind::RootNotDispatched,
                    "the tenant root is only reached through its management groups",
                ),
                ScopeKind::ManagementGroup => {
                    self.management_group(&descriptor, options, report).await
                }
                ScopeKind::Subscription => self.subscription(&descriptor, options, report).await,
                ScopeKind::ResourceGroup => {
                    self.single_resource_group(&descriptor, options, report)
                        .await
                }
                ScopeKind::Resource => self.resource(&descriptor, options, report).await,
            }
        }
        .instrument(span)
        .boxed()
    }

    async fn management_group(
        &self,
        descriptor: &ScopeDescriptor,
        options: &DiscoveryOptions,
        report: &mut DiscoveryReport,
    ) {
        let Some(management_group) = descriptor.management_group() else {
            return;
        };
        let node = self
            .ctx
            .hierarchy()
            .lookup_management_group(&management_group.id)
            .cloned();

        let entity = match &node {
            Some(node) => {
                for child in &node.children {
                    match resolve_from_id(&self.ctx, &child.id) {
                        Ok(child_descriptor) => {
                            self.discover_scope(child_descriptor, options, report).await
                        }
                        Err(e) => report.warn(&child.id, WarningKind::Resolution, e.to_string()),
                    }
                }
                json!({
                    "Id": node.id(),
                    "Type": ChildKind::ManagementGroup.resource_type(),
                    "Name": node.name,
                    "DisplayName": node.display_name,
                    "ParentId": node.parent.as_ref().map(|p| format!(
                        "/providers/Microsoft.Management/managementGroups/{}",
                        p
                    )),
                    "Children": node.children.iter().map(|c| c.to_entity()).collect::<Vec<_>>(),
                })
            }
            None => {
                report.warn(
                    &descriptor.id,
                    WarningKind::ManagementGroupNotCached,
                    "management group is not in the hierarchy cache, children are not visited",
                );
                json!({
                    "Id": descriptor.id,
                    "Type": ChildKind::ManagementGroup.resource_type(),
                    "Name": management_group.id,
                    "DisplayName": management_group.display_name,
                })
            }
        };

        let path = self.persist(descriptor, &entity, options, report);
        self.metadata(descriptor, path, options, report).await;
    }

    async fn subscription(
        &self,
        descriptor: &ScopeDescriptor,
        options: &DiscoveryOptions,
        report: &mut DiscoveryReport,
    ) {
        let Some(subscription) = descriptor.subscription() else {
            return;
        };
        let subscription_id = subscription.id.clone();

        if !options.skip_resource_group {
            let provider: &dyn CloudProvider = self.provider.as_ref();
            let listing = retry(
                &self.retry,
                &format!("list resource groups of {}", subscription_id),
                || provider.list_resource_groups(&subscription_id),
            )
            .await;

            match listing {
                Ok(groups) => self.fan_out(&descriptor.id, groups, options, report).await,
                Err(e) => report.warn(
                    &descriptor.id,
                    WarningKind::ListingExhausted,
                    format!("resource-group phase aborted: {}", e),
                ),
            }
        }

        let hierarchy = self.ctx.hierarchy();
        let entity = match (
            hierarchy.find_child_entry(&subscription_id),
            hierarchy.lookup_subscription(&subscription_id),
        ) {
            (Some((_, entry)), _) => entry.to_entity(),
            (None, Some(info)) => info.to_entity(),
            (None, None) => json!({
                "Id": descriptor.id,
                "Type": ChildKind::Subscription.resource_type(),
                "Name": subscription_id,
                "DisplayName": subscription.display_name,
            }),
        };

        let path = self.persist(descriptor, &entity, options, report);
        self.metadata(descriptor, path, options, report).await;
    }

    /// Runs the resource-group handler for each group on bounded parallel
    /// workers. Externally managed groups are recorded and not dispatched.
    /// A worker that panics is reported against `subscription_id`.
    async fn fan_out(
        &self,
        subscription_id: &str,
        groups: Vec<ResourceGroupInfo>,
        options: &DiscoveryOptions,
        report: &mut DiscoveryReport,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for group in groups {
            if group.is_externally_managed() {
                record_externally_managed(&group, report);
                continue;
            }

            let engine = self.clone();
            let options = options.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let mut worker_report = DiscoveryReport::new();
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    worker_report.warn(&group.id, WarningKind::Worker, "worker pool closed");
                    return worker_report;
                };
                engine
                    .resource_group_worker(group, &options, &mut worker_report)
                    .await;
                worker_report
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(worker_report) => report.merge(worker_report),
                Err(e) => report.warn(
                    subscription_id,
                    WarningKind::Worker,
                    format!("worker failed: {}", e),
                ),
            }
        }
    }

    /// Worker entry point: runs on its own provider session.
    async fn resource_group_worker(
        self,
        group: ResourceGroupInfo,
        options: &DiscoveryOptions,
        report: &mut DiscoveryReport,
    ) {
        let provider = match self.provider.session() {
            Ok(provider) => provider,
            Err(e) => {
                report.warn(
                    &group.id,
                    WarningKind::Worker,
                    format!("failed to open provider session: {}", e),
                );
                return;
            }
        };
        let engine = DiscoveryEngine { provider, ..self };
        let span = tracing::info_span!("discovery.resource_group", scope = %group.id);
        engine
            .resource_group(group, options, report)
            .instrument(span)
            .await;
    }

    /// Resource-group start scope: looks the group up, then runs the handler.
    async fn single_resource_group(
        &self,
        descriptor: &ScopeDescriptor,
        options: &DiscoveryOptions,
        report: &mut DiscoveryReport,
    ) {
        let (Some(subscription), Some(name)) =
            (descriptor.subscription(), descriptor.resource_group())
        else {
            return;
        };

        let provider: &dyn CloudProvider = self.provider.as_ref();
        let listing = retry(
            &self.retry,
            &format!("list resource groups of {}", subscription.id),
            || provider.list_resource_groups(&subscription.id),
        )
        .await;

        let groups = match listing {
            Ok(groups) => groups,
            Err(e) => {
                report.warn(&descriptor.id, WarningKind::ListingExhausted, e.to_string());
                return;
            }
        };

        match groups.into_iter().find(|g| g.name.eq_ignore_ascii_case(name)) {
            Some(group) if group.is_externally_managed() => {
                record_externally_managed(&group, report)
            }
            Some(group) => self.resource_group(group, options, report).await,
            None => report.warn(
                &descriptor.id,
                WarningKind::ResourceAccess,
                "resource group not found in its subscription",
            ),
        }
    }

    async fn resource_group(
        &self,
        group: ResourceGroupInfo,
        options: &DiscoveryOptions,
        report: &mut DiscoveryReport,
    ) {
        if group.is_externally_managed() {
            record_externally_managed(&group, report);
            return;
        }

        let descriptor = match resolve_from_id(&self.ctx, &group.id) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                report.warn(&group.id, WarningKind::Resolution, e.to_string());
                return;
            }
        };
        let Some(subscription_id) = descriptor.subscription().map(|s| s.id.clone()) else {
            return;
        };

        let path = self.persist(&descriptor, &group.to_entity(), options, report);

        let provider: &dyn CloudProvider = self.provider.as_ref();
        let listing = retry(
            &self.retry,
            &format!("list resources of {}", group.id),
            || provider.list_resources(&subscription_id, &group.name),
        )
        .await;

        match listing {
            Ok(resources) => {
                for summary in resources {
                    match resolve_from_id(&self.ctx, &summary.id) {
                        Ok(resource) => self.resource(&resource, options, report).await,
                        Err(e) => report.warn(&summary.id, WarningKind::Resolution, e.to_string()),
                    }
                }
            }
            Err(e) => report.warn(
                &group.id,
                WarningKind::ListingExhausted,
                format!("resource listing aborted: {}", e),
            ),
        }

        self.metadata(&descriptor, path, options, report).await;
    }

    async fn resource(
        &self,
        descriptor: &ScopeDescriptor,
        options: &DiscoveryOptions,
        report: &mut DiscoveryReport,
    ) {
        match self.provider.get_resource(&descriptor.id).await {
            Ok(entity) => {
                self.persist(descriptor, &entity, options, report);
            }
            Err(e) => report.warn(&descriptor.id, WarningKind::ResourceAccess, e.to_string()),
        }
    }

    /// Writes a scope's state file; a failure becomes a warning.
    fn persist(
        &self,
        descriptor: &ScopeDescriptor,
        entity: &Value,
        options: &DiscoveryOptions,
        report: &mut DiscoveryReport,
    ) -> Option<PathBuf> {
        match self
            .store
            .write_state(descriptor, entity, options.export_raw_template)
        {
            Ok(path) => {
                report.record_written(path.clone());
                Some(path)
            }
            Err(e) => {
                report.warn(&descriptor.id, WarningKind::StateWrite, e.to_string());
                None
            }
        }
    }

    /// Fetches the policy and role collections scoped to `descriptor`,
    /// persists each item, and merges the collections into the scope's own
    /// file for subscriptions and management groups.
    async fn metadata(
        &self,
        descriptor: &ScopeDescriptor,
        self_path: Option<PathBuf>,
        options: &DiscoveryOptions,
        report: &mut DiscoveryReport,
    ) {
        let scope_id = descriptor.id.as_str();
        let mut bag = Map::new();

        if !options.skip_policy {
            let definitions = self.provider.list_policy_definitions(scope_id).await;
            if let Some(items) =
                self.scoped_items(descriptor, POLICY_DEFINITIONS, definitions, options, report)
            {
                bag.insert(POLICY_DEFINITIONS.to_string(), Value::Array(items));
            }

            let set_definitions = self.provider.list_policy_set_definitions(scope_id).await;
            if let Some(items) = self.scoped_items(
                descriptor,
                POLICY_SET_DEFINITIONS,
                set_definitions,
                options,
                report,
            ) {
                bag.insert(POLICY_SET_DEFINITIONS.to_string(), Value::Array(items));
            }

            let assignments = self.provider.list_policy_assignments(scope_id).await;
            if let Some(items) =
                self.scoped_items(descriptor, POLICY_ASSIGNMENTS, assignments, options, report)
            {
                bag.insert(POLICY_ASSIGNMENTS.to_string(), Value::Array(items));
            }
        }

        if !options.skip_role {
            let definitions = self.provider.list_role_definitions(scope_id).await;
            self.scoped_items(descriptor, ROLE_DEFINITIONS, definitions, options, report);

            let assignments = self.provider.list_role_assignments(scope_id).await;
            if let Some(items) =
                self.scoped_items(descriptor, ROLE_ASSIGNMENTS, assignments, options, report)
            {
                let items = if options.generalize { Vec::new() } else { items };
                bag.insert(ROLE_ASSIGNMENTS.to_string(), Value::Array(items));
            }
        }

        let merges_into_self = matches!(
            descriptor.kind(),
            ScopeKind::Subscription | ScopeKind::ManagementGroup
        );
        if !merges_into_self || bag.is_empty() {
            return;
        }
        let Some(path) = self_path else {
            return;
        };
        if let Err(e) = self.store.merge_properties(&path, bag) {
            report.warn(&descriptor.id, WarningKind::StateWrite, e.to_string());
        }
    }

    /// Keeps the items defined directly at `descriptor` and writes each one
    /// as a resource state file. Returns `None` if the fetch failed.
    fn scoped_items(
        &self,
        descriptor: &ScopeDescriptor,
        collection: &str,
        fetched: Result<Vec<Value>, ProviderError>,
        options: &DiscoveryOptions,
        report: &mut DiscoveryReport,
    ) -> Option<Vec<Value>> {
        let items = match fetched {
            Ok(items) => items,
            Err(e) => {
                report.warn(
                    &descriptor.id,
                    WarningKind::MetadataFetch,
                    format!("failed to fetch {}: {}", collection, e),
                );
                return None;
            }
        };

        let scoped: Vec<(String, Value)> = items
            .into_iter()
            .filter_map(|item| scoped_id(&item, descriptor, collection).map(|id| (id, item)))
            .collect();

        for (id, item) in &scoped {
            match resolve_from_id(&self.ctx, id) {
                Ok(item_descriptor) => {
                    self.persist(&item_descriptor, item, options, report);
                }
                Err(e) => report.warn(id, WarningKind::Resolution, e.to_string()),
            }
        }

        log::debug!(
            "{} {} scoped to {}",
            scoped.len(),
            collection,
            descriptor.id
        );
        Some(scoped.into_iter().map(|(_, item)| item).collect())
    }
}

/// Identifier under which an item defined at `descriptor` is stored, or
/// `None` if the item belongs to another scope.
///
/// Role definitions carry a tenant-level id whatever scope defines them, so
/// their first assignable scope decides and the id is placed below that
/// scope. Built-in roles (assignable at `/`) never match.
fn scoped_id(item: &Value, descriptor: &ScopeDescriptor, collection: &str) -> Option<String> {
    let id = item.get("id").and_then(Value::as_str)?;
    let prefix = format!("{}{}", descriptor.id, PROVIDERS);

    if collection == ROLE_DEFINITIONS {
        if let Some(scopes) = item
            .pointer("/properties/assignableScopes")
            .and_then(Value::as_array)
        {
            let defining = scopes.first().and_then(Value::as_str)?;
            if !defining
                .trim_end_matches('/')
                .eq_ignore_ascii_case(&descriptor.id)
            {
                return None;
            }
            let tail = id.rfind(PROVIDERS).map(|at| &id[at + PROVIDERS.len()..])?;
            return Some(format!("{}{}", prefix, tail));
        }
    }

    id.to_lowercase()
        .starts_with(&prefix.to_lowercase())
        .then(|| id.to_string())
}

fn record_externally_managed(group: &ResourceGroupInfo, report: &mut DiscoveryReport) {
    report.warn(
        &group.id,
        WarningKind::ExternallyManaged,
        format!(
            "managed by {}",
            group.managed_by.as_deref().unwrap_or_default()
        ),
    );
}
