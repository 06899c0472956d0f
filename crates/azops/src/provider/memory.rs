//! In-memory cloud model implementing [`CloudProvider`].
//!
//! Serves offline replay of a captured tenant and the test suite. Faults can
//! be injected per operation and key, and every mutating call is recorded.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use super::error::ProviderError;
use super::types::*;
use super::{CloudProvider, Result};

/// Provider operations that can carry an injected fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Session,
    ListManagementGroups,
    GetManagementGroupChildren,
    ListSubscriptions,
    ListResourceGroups,
    ListResources,
    GetResource,
    ListPolicyDefinitions,
    ListPolicySetDefinitions,
    ListPolicyAssignments,
    ListRoleDefinitions,
    ListRoleAssignments,
    ListEnrollmentAccounts,
    CreateSubscription,
    AssignManagementGroup,
    RegisterProvider,
    RegisterFeature,
    Deploy,
}

/// Wildcard fault key matching every call of an operation.
pub const ANY_KEY: &str = "*";

#[derive(Debug, Clone)]
struct Fault {
    error: ProviderError,
    /// `None` fails forever.
    remaining: Option<u32>,
}

#[derive(Debug, Default)]
struct CloudModel {
    management_groups: BTreeMap<String, ManagementGroupDetails>,
    subscriptions: Vec<SubscriptionInfo>,
    resource_groups: BTreeMap<String, Vec<ResourceGroupInfo>>,
    resources: Vec<Value>,
    policy_definitions: Vec<Value>,
    policy_set_definitions: Vec<Value>,
    policy_assignments: Vec<Value>,
    role_definitions: Vec<Value>,
    role_assignments: Vec<Value>,
    enrollment_accounts: Vec<EnrollmentAccount>,
    faults: HashMap<(Operation, String), Fault>,
    calls: HashMap<Operation, u32>,
    deployments: Vec<DeploymentRequest>,
    created_subscriptions: Vec<SubscriptionRequest>,
    assignments: Vec<(String, String)>,
    registered_providers: Vec<(String, String)>,
    registered_features: Vec<(String, String, String)>,
}

impl CloudModel {
    /// Counts the call and returns the injected fault for it, if any.
    fn check(&mut self, operation: Operation, key: &str) -> Result<()> {
        *self.calls.entry(operation).or_insert(0) += 1;

        let exact = (operation, key.to_lowercase());
        let wildcard = (operation, ANY_KEY.to_string());
        let slot = if self.faults.contains_key(&exact) {
            exact
        } else if self.faults.contains_key(&wildcard) {
            wildcard
        } else {
            return Ok(());
        };

        let Some(fault) = self.faults.get_mut(&slot) else {
            return Ok(());
        };
        match fault.remaining {
            None => Err(fault.error.clone()),
            Some(0) => {
                self.faults.remove(&slot);
                Ok(())
            }
            Some(n) => {
                fault.remaining = Some(n - 1);
                Err(fault.error.clone())
            }
        }
    }
}

/// Thread-safe in-memory cloud; clones share the same model.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    model: Arc<Mutex<CloudModel>>,
}

fn id_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn id_of(value: &Value) -> &str {
    value.get("id").and_then(Value::as_str).unwrap_or_default()
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn model(&self) -> MutexGuard<'_, CloudModel> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Model construction
    // ------------------------------------------------------------------

    pub fn add_management_group(&self, name: &str, display_name: &str, parent: Option<&str>) {
        let mut model = self.model();
        if let Some(parent) = parent {
            if let Some(node) = model.management_groups.get_mut(&parent.to_lowercase()) {
                node.children
                    .push(ChildEntry::management_group(name, display_name));
            }
        }
        model.management_groups.insert(
            name.to_lowercase(),
            ManagementGroupDetails {
                name: name.to_string(),
                display_name: display_name.to_string(),
                parent: parent.map(str::to_string),
                children: Vec::new(),
            },
        );
    }

    pub fn add_subscription(
        &self,
        subscription_id: &str,
        display_name: &str,
        management_group: &str,
    ) {
        let mut model = self.model();
        if let Some(node) = model
            .management_groups
            .get_mut(&management_group.to_lowercase())
        {
            node.children
                .push(ChildEntry::subscription(subscription_id, display_name));
        }
        model.subscriptions.push(SubscriptionInfo {
            subscription_id: subscription_id.to_string(),
            display_name: display_name.to_string(),
            state: "Enabled".to_string(),
        });
    }

    /// Adds a resource group and returns its identifier.
    pub fn add_resource_group(
        &self,
        subscription_id: &str,
        name: &str,
        location: &str,
        managed_by: Option<&str>,
    ) -> String {
        let id = format!("/subscriptions/{}/resourceGroups/{}", subscription_id, name);
        self.model()
            .resource_groups
            .entry(subscription_id.to_lowercase())
            .or_default()
            .push(ResourceGroupInfo {
                id: id.clone(),
                name: name.to_string(),
                location: location.to_string(),
                managed_by: managed_by.map(str::to_string),
                tags: BTreeMap::new(),
            });
        id
    }

    /// Adds a resource; `value` must carry `id`, `name` and `type`.
    pub fn add_resource(&self, value: Value) {
        self.model().resources.push(value);
    }

    pub fn add_policy_definition(&self, value: Value) {
        self.model().policy_definitions.push(value);
    }

    pub fn add_policy_set_definition(&self, value: Value) {
        self.model().policy_set_definitions.push(value);
    }

    pub fn add_policy_assignment(&self, value: Value) {
        self.model().policy_assignments.push(value);
    }

    pub fn add_role_definition(&self, value: Value) {
        self.model().role_definitions.push(value);
    }

    pub fn add_role_assignment(&self, value: Value) {
        self.model().role_assignments.push(value);
    }

    pub fn add_enrollment_account(&self, object_id: &str, principal_name: &str) {
        self.model().enrollment_accounts.push(EnrollmentAccount {
            object_id: object_id.to_string(),
            principal_name: principal_name.to_string(),
        });
    }

    // ------------------------------------------------------------------
    // Fault injection
    // ------------------------------------------------------------------

    /// Fails the next `times` calls of `operation` for `key` with a transient error.
    pub fn fail_times(&self, operation: Operation, key: &str, times: u32) {
        self.inject(
            operation,
            key,
            ProviderError::Transient(format!("injected failure for {}", key)),
            Some(times),
        );
    }

    /// Fails every call of `operation` for `key` with a transient error.
    pub fn fail_always(&self, operation: Operation, key: &str) {
        self.inject(
            operation,
            key,
            ProviderError::Transient(format!("injected failure for {}", key)),
            None,
        );
    }

    /// Denies every call of `operation` for `key`.
    pub fn deny(&self, operation: Operation, key: &str) {
        self.inject(operation, key, ProviderError::Forbidden(key.to_string()), None);
    }

    fn inject(
        &self,
        operation: Operation,
        key: &str,
        error: ProviderError,
        remaining: Option<u32>,
    ) {
        self.model()
            .faults
            .insert((operation, key.to_lowercase()), Fault { error, remaining });
    }

    // ------------------------------------------------------------------
    // Recorded calls
    // ------------------------------------------------------------------

    pub fn call_count(&self, operation: Operation) -> u32 {
        self.model().calls.get(&operation).copied().unwrap_or(0)
    }

    pub fn deployments(&self) -> Vec<DeploymentRequest> {
        self.model().deployments.clone()
    }

    pub fn created_subscriptions(&self) -> Vec<SubscriptionRequest> {
        self.model().created_subscriptions.clone()
    }

    /// `(management group, subscription id)` pairs.
    pub fn assignments(&self) -> Vec<(String, String)> {
        self.model().assignments.clone()
    }

    /// `(subscription id, namespace)` pairs.
    pub fn registered_providers(&self) -> Vec<(String, String)> {
        self.model().registered_providers.clone()
    }

    /// `(subscription id, namespace, feature)` triples.
    pub fn registered_features(&self) -> Vec<(String, String, String)> {
        self.model().registered_features.clone()
    }
}

#[async_trait]
impl CloudProvider for InMemoryProvider {
    fn session(&self) -> Result<Arc<dyn CloudProvider>> {
        self.model().check(Operation::Session, ANY_KEY)?;
        Ok(Arc::new(self.clone()))
    }

    async fn list_management_groups(&self) -> Result<Vec<ManagementGroupInfo>> {
        let mut model = self.model();
        model.check(Operation::ListManagementGroups, ANY_KEY)?;
        Ok(model
            .management_groups
            .values()
            .map(|g| ManagementGroupInfo {
                name: g.name.clone(),
                display_name: g.display_name.clone(),
                parent: g.parent.clone(),
            })
            .collect())
    }

    async fn get_management_group_children(&self, name: &str) -> Result<ManagementGroupDetails> {
        let mut model = self.model();
        model.check(Operation::GetManagementGroupChildren, name)?;
        model
            .management_groups
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("management group {}", name)))
    }

    async fn list_subscriptions(&self) -> Result<Vec<SubscriptionInfo>> {
        let mut model = self.model();
        model.check(Operation::ListSubscriptions, ANY_KEY)?;
        Ok(model.subscriptions.clone())
    }

    async fn list_resource_groups(&self, subscription_id: &str) -> Result<Vec<ResourceGroupInfo>> {
        let mut model = self.model();
        model.check(Operation::ListResourceGroups, subscription_id)?;
        Ok(model
            .resource_groups
            .get(&subscription_id.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn list_resources(
        &self,
        subscription_id: &str,
        resource_group: &str,
    ) -> Result<Vec<ResourceSummary>> {
        let mut model = self.model();
        model.check(
            Operation::ListResources,
            &format!("{}/{}", subscription_id, resource_group),
        )?;

        let prefix = format!(
            "/subscriptions/{}/resourceGroups/{}/providers/",
            subscription_id, resource_group
        )
        .to_lowercase();

        Ok(model
            .resources
            .iter()
            .filter(|r| id_of(r).to_lowercase().starts_with(&prefix))
            .map(|r| ResourceSummary {
                id: id_of(r).to_string(),
                name: r
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                resource_type: r
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect())
    }

    async fn get_resource(&self, resource_id: &str) -> Result<Value> {
        let mut model = self.model();
        model.check(Operation::GetResource, resource_id)?;
        model
            .resources
            .iter()
            .find(|r| id_eq(id_of(r), resource_id))
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(resource_id.to_string()))
    }

    async fn list_policy_definitions(&self, scope_id: &str) -> Result<Vec<Value>> {
        let mut model = self.model();
        model.check(Operation::ListPolicyDefinitions, scope_id)?;
        Ok(model.policy_definitions.clone())
    }

    async fn list_policy_set_definitions(&self, scope_id: &str) -> Result<Vec<Value>> {
        let mut model = self.model();
        model.check(Operation::ListPolicySetDefinitions, scope_id)?;
        Ok(model.policy_set_definitions.clone())
    }

    async fn list_policy_assignments(&self, scope_id: &str) -> Result<Vec<Value>> {
        let mut model = self.model();
        model.check(Operation::ListPolicyAssignments, scope_id)?;
        Ok(model.policy_assignments.clone())
    }

    async fn list_role_definitions(&self, scope_id: &str) -> Result<Vec<Value>> {
        let mut model = self.model();
        model.check(Operation::ListRoleDefinitions, scope_id)?;
        Ok(model.role_definitions.clone())
    }

    async fn list_role_assignments(&self, scope_id: &str) -> Result<Vec<Value>> {
        let mut model = self.model();
        model.check(Operation::ListRoleAssignments, scope_id)?;
        Ok(model.role_assignments.clone())
    }

    async fn list_enrollment_accounts(&self) -> Result<Vec<EnrollmentAccount>> {
        let mut model = self.model();
        model.check(Operation::ListEnrollmentAccounts, ANY_KEY)?;
        Ok(model.enrollment_accounts.clone())
    }

    async fn create_subscription(&self, request: &SubscriptionRequest) -> Result<SubscriptionInfo> {
        let mut model = self.model();
        model.check(Operation::CreateSubscription, &request.name)?;

        let sequence = model.created_subscriptions.len() + 1;
        let subscription = SubscriptionInfo {
            subscription_id: format!("00000000-0000-0000-0000-{:012}", sequence),
            display_name: request.name.clone(),
            state: "Enabled".to_string(),
        };
        model.created_subscriptions.push(request.clone());
        model.subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    async fn assign_management_group(
        &self,
        management_group: &str,
        subscription_id: &str,
    ) -> Result<()> {
        let mut model = self.model();
        model.check(Operation::AssignManagementGroup, subscription_id)?;
        model
            .assignments
            .push((management_group.to_string(), subscription_id.to_string()));
        Ok(())
    }

    async fn register_provider(&self, subscription_id: &str, namespace: &str) -> Result<()> {
        let mut model = self.model();
        model.check(Operation::RegisterProvider, namespace)?;
        model
            .registered_providers
            .push((subscription_id.to_string(), namespace.to_string()));
        Ok(())
    }

    async fn register_feature(
        &self,
        subscription_id: &str,
        namespace: &str,
        feature: &str,
    ) -> Result<()> {
        let mut model = self.model();
        model.check(Operation::RegisterFeature, feature)?;
        model.registered_features.push((
            subscription_id.to_string(),
            namespace.to_string(),
            feature.to_string(),
        ));
        Ok(())
    }

    async fn deploy(&self, request: &DeploymentRequest) -> Result<DeploymentOutcome> {
        let mut model = self.model();
        model.check(Operation::Deploy, &request.name)?;
        model.deployments.push(request.clone());
        Ok(DeploymentOutcome {
            name: request.name.clone(),
            provisioning_state: "Succeeded".to_string(),
        })
    }
}
