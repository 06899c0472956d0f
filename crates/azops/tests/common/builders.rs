//! Builders for test tenants and fixture documents.

#![allow(dead_code)]

use azops::InMemoryProvider;
use serde_json::{json, Value};

use super::harness::TENANT_ROOT;

pub const PROD_SUB: &str = "00000000-0000-0000-0000-00000000aaaa";
pub const DEV_SUB: &str = "00000000-0000-0000-0000-00000000bbbb";

const LOCATION: &str = "westeurope";

const TENANT_TEMPLATE_SCHEMA: &str =
    "https://schema.management.azure.com/schemas/2019-08-01/tenantDeploymentTemplate.json#";
const PARAMETERS_SCHEMA: &str =
    "https://schema.management.azure.com/schemas/2019-04-01/deploymentParameters.json#";

pub fn management_group_id(name: &str) -> String {
    format!("/providers/Microsoft.Management/managementGroups/{}", name)
}

pub fn subscription_id(subscription: &str) -> String {
    format!("/subscriptions/{}", subscription)
}

pub fn resource_group_id(subscription: &str, resource_group: &str) -> String {
    format!("/subscriptions/{}/resourceGroups/{}", subscription, resource_group)
}

/// Builder for an in-memory tenant.
pub struct CloudBuilder {
    cloud: InMemoryProvider,
}

impl CloudBuilder {
    /// Starts a tenant with only the root management group.
    pub fn new() -> Self {
        let cloud = InMemoryProvider::new();
        cloud.add_management_group(TENANT_ROOT, "Tenant Root", None);
        Self { cloud }
    }

    pub fn management_group(self, name: &str, display_name: &str, parent: &str) -> Self {
        self.cloud.add_management_group(name, display_name, Some(parent));
        self
    }

    pub fn subscription(self, id: &str, display_name: &str, management_group: &str) -> Self {
        self.cloud.add_subscription(id, display_name, management_group);
        self
    }

    pub fn resource_group(self, subscription: &str, name: &str) -> Self {
        self.group(subscription, name, None)
    }

    /// Adds a resource group owned by another resource.
    pub fn managed_resource_group(self, subscription: &str, name: &str, owner: &str) -> Self {
        self.group(subscription, name, Some(owner))
    }

    fn group(self, subscription: &str, name: &str, owner: Option<&str>) -> Self {
        self.cloud.add_resource_group(subscription, name, LOCATION, owner);
        self
    }

    pub fn resource(
        self,
        subscription: &str,
        resource_group: &str,
        resource_type: &str,
        name: &str,
    ) -> Self {
        self.cloud.add_resource(json!({
            "id": format!(
                "{}/providers/{}/{}",
                resource_group_id(subscription, resource_group),
                resource_type,
                name
            ),
            "name": name,
            "type": resource_type,
            "location": LOCATION,
            "properties": { "provisioningState": "Succeeded" }
        }));
        self
    }

    /// Adds a policy assignment defined at `scope_id`.
    pub fn policy_assignment(self, scope_id: &str, name: &str) -> Self {
        self.cloud.add_policy_assignment(json!({
            "id": format!(
                "{}/providers/Microsoft.Authorization/policyAssignments/{}",
                scope_id, name
            ),
            "name": name,
            "type": "Microsoft.Authorization/policyAssignments",
            "properties": { "scope": scope_id }
        }));
        self
    }

    /// Adds a role assignment defined at `scope_id`.
    pub fn role_assignment(self, scope_id: &str, name: &str) -> Self {
        self.cloud.add_role_assignment(json!({
            "id": format!(
                "{}/providers/Microsoft.Authorization/roleAssignments/{}",
                scope_id, name
            ),
            "name": name,
            "type": "Microsoft.Authorization/roleAssignments",
            "properties": { "principalId": "11111111-1111-1111-1111-111111111111" }
        }));
        self
    }

    /// Adds a custom role definition. Like the real service, its id is
    /// tenant-level; the first assignable scope is where it is defined.
    pub fn role_definition(self, name: &str, assignable_scopes: &[&str]) -> Self {
        self.cloud.add_role_definition(json!({
            "id": format!("/providers/Microsoft.Authorization/roleDefinitions/{}", name),
            "name": name,
            "type": "Microsoft.Authorization/roleDefinitions",
            "properties": {
                "roleName": name,
                "type": "CustomRole",
                "assignableScopes": assignable_scopes
            }
        }));
        self
    }

    pub fn enrollment_account(self, object_id: &str, principal_name: &str) -> Self {
        self.cloud.add_enrollment_account(object_id, principal_name);
        self
    }

    pub fn build(self) -> InMemoryProvider {
        self.cloud
    }
}

impl Default for CloudBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Two branches below the tenant root, one subscription each, with a
/// resource group holding one web site in the production subscription.
pub fn sample_tenant() -> CloudBuilder {
    CloudBuilder::new()
        .management_group("mg-prod", "Production", TENANT_ROOT)
        .management_group("mg-dev", "Development", TENANT_ROOT)
        .subscription(PROD_SUB, "Prod", "mg-prod")
        .subscription(DEV_SUB, "Dev", "mg-dev")
        .resource_group(PROD_SUB, "App-RG")
        .resource(PROD_SUB, "App-RG", "Microsoft.Web/sites", "web1")
        .resource_group(DEV_SUB, "dev-rg")
}

/// A template whose `apiVersionLookup` lists `resource_types`.
pub fn main_template(resource_types: &[&str]) -> Value {
    let lookup: serde_json::Map<String, Value> = resource_types
        .iter()
        .map(|t| (t.to_string(), json!("2022-06-01")))
        .collect();
    json!({
        "$schema": TENANT_TEMPLATE_SCHEMA,
        "contentVersion": "1.0.0.0",
        "parameters": { "input": { "type": "object" } },
        "variables": { "apiVersionLookup": lookup },
        "resources": []
    })
}

/// A parameter file wrapping `entity`.
pub fn parameters_file(entity: Value) -> Value {
    json!({
        "$schema": PARAMETERS_SCHEMA,
        "contentVersion": "1.0.0.0",
        "parameters": { "input": { "value": entity } }
    })
}
