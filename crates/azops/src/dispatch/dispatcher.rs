//! Routes changed state files to deployment operations.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;

use super::classify::{
    base_name, classify, ChangeClass, PARAMETERS_SUFFIX, SUBSCRIPTION_SUFFIX,
};
use super::diff::ChangeSet;
use super::error::DispatchError;
use super::report::{AppliedChange, ApplyReport, SkipReason};
use crate::config::Settings;
use crate::provider::{
    CloudProvider, DeploymentLevel, DeploymentMode, DeploymentRequest, SubscriptionRequest,
};
use crate::scope::{resolve_from_path, ResourceParent, Scope, ScopeContext, ScopeDescriptor};
use crate::state::StateDocument;

/// Offer type used for new subscriptions unless the file names one.
pub const DEFAULT_OFFER_TYPE: &str = "MS-AZR-0017P";

const MAX_DEPLOYMENT_NAME_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Template used when a parameter file has no sibling template.
    pub main_template: Option<PathBuf>,
    pub default_region: String,
    /// Principal name of the enrollment account for new subscriptions.
    pub enrollment_account: Option<String>,
    pub deployment_name_prefix: String,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for DispatchSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            main_template: settings.main_template.clone(),
            default_region: settings.deployment.default_region.clone(),
            enrollment_account: settings.deployment.enrollment_account.clone(),
            deployment_name_prefix: settings.deployment.deployment_name_prefix.clone(),
        }
    }
}

/// Result of handling one file.
enum Handled {
    Applied(String),
    Skipped(SkipReason, String),
}

/// Applies changed files to the cloud, one at a time.
pub struct ChangeDispatcher {
    ctx: Arc<ScopeContext>,
    provider: Arc<dyn CloudProvider>,
    settings: DispatchSettings,
}

impl ChangeDispatcher {
    pub fn new(
        ctx: Arc<ScopeContext>,
        provider: Arc<dyn CloudProvider>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            ctx,
            provider,
            settings,
        }
    }

    pub async fn apply_change_set(&self, changes: &ChangeSet) -> ApplyReport {
        self.apply(&changes.changed, &changes.deleted).await
    }

    /// Applies `changed` in order and reports `deleted` without acting on it.
    pub async fn apply(&self, changed: &[PathBuf], deleted: &[PathBuf]) -> ApplyReport {
        let mut report = ApplyReport::new();
        let main_template = self.load_main_template();

        for path in changed {
            let span = tracing::info_span!("dispatch.change", path = %path.display());
            self.apply_change(path, main_template.as_ref(), &mut report)
                .instrument(span)
                .await;
        }

        for path in deleted {
            log::warn!(
                "Deletion of {} detected, deletions are reported only",
                path.display()
            );
            report.deletions.push(path.clone());
        }

        report.finish();
        log::info!(
            "Applied {} changes ({} skipped, {} failed, {} deletions reported)",
            report.deployed.len(),
            report.skipped.len(),
            report.failed.len(),
            report.deletions.len()
        );
        report
    }

    async fn apply_change(
        &self,
        path: &Path,
        main_template: Option<&Value>,
        report: &mut ApplyReport,
    ) {
        let class = classify(path);
        if class == ChangeClass::NotJson {
            report.skip(path.to_path_buf(), SkipReason::NotJson, "not a JSON file");
            return;
        }

        let descriptor = match resolve_from_path(&self.ctx, path) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                report.skip(path.to_path_buf(), SkipReason::UnresolvedScope, e.to_string());
                return;
            }
        };

        let outcome = match class {
            ChangeClass::Subscription => self.upsert_subscription(path, &descriptor).await,
            ChangeClass::ProviderFeatures => self.register_features(path, &descriptor).await,
            ChangeClass::ResourceProviders => self.register_providers(path, &descriptor).await,
            ChangeClass::Parameters => self.deploy(path, &descriptor, main_template).await,
            ChangeClass::Unrecognized | ChangeClass::NotJson => Ok(Handled::Skipped(
                SkipReason::Unrecognized,
                "no handler for this file name".to_string(),
            )),
        };

        match outcome {
            Ok(Handled::Applied(action)) => report.applied(AppliedChange {
                path: path.to_path_buf(),
                class,
                scope_id: descriptor.id.clone(),
                action,
            }),
            Ok(Handled::Skipped(reason, message)) => {
                report.skip(path.to_path_buf(), reason, message)
            }
            Err(e) => report.fail(path.to_path_buf(), e.to_string()),
        }
    }

    /// Creates the subscription named by the file unless it already exists,
    /// then moves it under the file's management group.
    async fn upsert_subscription(
        &self,
        path: &Path,
        descriptor: &ScopeDescriptor,
    ) -> Result<Handled, DispatchError> {
        let document = read_json(path)?;
        let name = string_field(&document, &["name", "Name"])
            .unwrap_or_else(|| base_name(path, SUBSCRIPTION_SUFFIX));
        let offer_type = string_field(&document, &["offerType", "OfferType"])
            .unwrap_or_else(|| DEFAULT_OFFER_TYPE.to_string());
        let management_group = descriptor
            .management_group()
            .map(|group| group.id.clone())
            .ok_or_else(|| DispatchError::NoTargetManagementGroup(descriptor.id.clone()))?;

        let subscriptions = self.provider.list_subscriptions().await?;
        if let Some(existing) = subscriptions
            .iter()
            .find(|s| s.display_name.eq_ignore_ascii_case(&name))
        {
            return Ok(Handled::Skipped(
                SkipReason::UpToDate,
                format!(
                    "subscription '{}' already exists as {}",
                    name, existing.subscription_id
                ),
            ));
        }

        let accounts = self.provider.list_enrollment_accounts().await?;
        let account = match &self.settings.enrollment_account {
            Some(principal) => accounts
                .iter()
                .find(|a| a.principal_name.eq_ignore_ascii_case(principal))
                .ok_or_else(|| DispatchError::EnrollmentAccountNotFound(principal.clone()))?,
            None => accounts.first().ok_or(DispatchError::NoEnrollmentAccount)?,
        };

        let created = self
            .provider
            .create_subscription(&SubscriptionRequest {
                name: name.clone(),
                offer_type,
                enrollment_account_object_id: account.object_id.clone(),
            })
            .await?;
        self.provider
            .assign_management_group(&management_group, &created.subscription_id)
            .await?;

        Ok(Handled::Applied(format!(
            "created subscription '{}' ({}) under {}",
            name, created.subscription_id, management_group
        )))
    }

    /// Registers `[{ProviderName, FeatureName}]` entries in the owning subscription.
    async fn register_features(
        &self,
        path: &Path,
        descriptor: &ScopeDescriptor,
    ) -> Result<Handled, DispatchError> {
        let subscription = descriptor
            .subscription()
            .ok_or_else(|| DispatchError::NotInSubscription(descriptor.id.clone()))?;
        let entries = json_entries(path, read_json(path)?)?;

        let mut registered = 0;
        for entry in &entries {
            let (Some(namespace), Some(feature)) = (
                string_field(entry, &["ProviderName", "providerName"]),
                string_field(entry, &["FeatureName", "featureName"]),
            ) else {
                return Err(DispatchError::InvalidDocument {
                    path: path.to_path_buf(),
                    message: "entries need ProviderName and FeatureName".to_string(),
                });
            };
            self.provider
                .register_feature(&subscription.id, &namespace, &feature)
                .await?;
            registered += 1;
        }

        Ok(Handled::Applied(format!("registered {} features", registered)))
    }

    /// Registers `[{ProviderNamespace, RegistrationState}]` entries whose
    /// desired state is `Registered`.
    async fn register_providers(
        &self,
        path: &Path,
        descriptor: &ScopeDescriptor,
    ) -> Result<Handled, DispatchError> {
        let subscription = descriptor
            .subscription()
            .ok_or_else(|| DispatchError::NotInSubscription(descriptor.id.clone()))?;
        let entries = json_entries(path, read_json(path)?)?;

        let mut registered = 0;
        for entry in &entries {
            let Some(namespace) = string_field(entry, &["ProviderNamespace", "providerNamespace"])
            else {
                return Err(DispatchError::InvalidDocument {
                    path: path.to_path_buf(),
                    message: "entries need ProviderNamespace".to_string(),
                });
            };
            let wanted = string_field(entry, &["RegistrationState", "registrationState"])
                .is_some_and(|state| state.eq_ignore_ascii_case("Registered"));
            if !wanted {
                log::debug!("Leaving {} as is", namespace);
                continue;
            }
            self.provider
                .register_provider(&subscription.id, &namespace)
                .await?;
            registered += 1;
        }

        Ok(Handled::Applied(format!(
            "registered {} resource providers",
            registered
        )))
    }

    /// Deploys a parameter file with its sibling template, or with the main
    /// template when that template supports the file's resource type.
    async fn deploy(
        &self,
        path: &Path,
        descriptor: &ScopeDescriptor,
        main_template: Option<&Value>,
    ) -> Result<Handled, DispatchError> {
        let bytes = std::fs::read(path).map_err(|e| DispatchError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let document = StateDocument::from_slice(path, &bytes)?;

        let base = base_name(path, PARAMETERS_SUFFIX);
        let sibling = path.with_file_name(format!("{}.json", base));

        let template = if sibling.is_file() {
            log::debug!("Using sibling template {}", sibling.display());
            read_json(&sibling)?
        } else {
            let Some(main_template) = main_template else {
                return Ok(Handled::Skipped(
                    SkipReason::NoTemplate,
                    "no sibling template and no main template configured".to_string(),
                ));
            };
            let resource_type = deployment_type(&document, descriptor).unwrap_or_default();
            if !supports_type(main_template, &resource_type) {
                return Ok(Handled::Skipped(
                    SkipReason::UnsupportedTemplate,
                    format!("main template does not support '{}'", resource_type),
                ));
            }
            main_template.clone()
        };

        let level = deployment_level(descriptor);
        let location = match level {
            DeploymentLevel::ResourceGroup { .. } => None,
            _ => Some(self.settings.default_region.clone()),
        };
        let request = DeploymentRequest {
            name: deployment_name(&self.settings.deployment_name_prefix, &base),
            scope_id: descriptor.id.clone(),
            level,
            location,
            template,
            parameters: document
                .parameters_object()
                .cloned()
                .unwrap_or_else(|| json!({})),
            mode: DeploymentMode::Incremental,
        };

        log::info!("Deploying {} at {}", request.name, request.level);
        let outcome = self.provider.deploy(&request).await?;
        Ok(Handled::Applied(format!(
            "deployment {} {}",
            outcome.name, outcome.provisioning_state
        )))
    }

    fn load_main_template(&self) -> Option<Value> {
        let path = self.settings.main_template.as_ref()?;
        match read_json(path) {
            Ok(template) => Some(template),
            Err(e) => {
                log::warn!("Main template unavailable: {}", e);
                None
            }
        }
    }
}

fn read_json(path: &Path) -> Result<Value, DispatchError> {
    let bytes = std::fs::read(path).map_err(|e| DispatchError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_slice(&bytes).map_err(|e| DispatchError::InvalidDocument {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// A list file holds an array of entries; a single object counts as one.
fn json_entries(path: &Path, document: Value) -> Result<Vec<Value>, DispatchError> {
    match document {
        Value::Array(entries) => Ok(entries),
        Value::Object(_) => Ok(vec![document]),
        _ => Err(DispatchError::InvalidDocument {
            path: path.to_path_buf(),
            message: "expected an array of entries".to_string(),
        }),
    }
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// The resource type a parameter file deploys: the entity's declared type
/// when it is a provider type, else the type of its scope.
fn deployment_type(document: &StateDocument, descriptor: &ScopeDescriptor) -> Option<String> {
    document
        .declared_type()
        .filter(|t| t.contains('/') && !t.starts_with('/'))
        .map(str::to_string)
        .or_else(|| descriptor.resource_type())
}

/// True if `resource_type` is a key of the template's `variables.apiVersionLookup`.
fn supports_type(template: &Value, resource_type: &str) -> bool {
    template
        .pointer("/variables/apiVersionLookup")
        .and_then(Value::as_object)
        .is_some_and(|lookup| {
            lookup
                .keys()
                .any(|key| key.eq_ignore_ascii_case(resource_type))
        })
}

fn deployment_level(descriptor: &ScopeDescriptor) -> DeploymentLevel {
    match &descriptor.scope {
        Scope::Root => DeploymentLevel::Tenant,
        Scope::ManagementGroup { management_group }
        | Scope::Resource {
            parent: ResourceParent::ManagementGroup { management_group },
            ..
        } => DeploymentLevel::ManagementGroup {
            management_group: management_group.id.clone(),
        },
        Scope::Subscription { subscription, .. }
        | Scope::Resource {
            parent: ResourceParent::Subscription { subscription, .. },
            ..
        } => DeploymentLevel::Subscription {
            subscription_id: subscription.id.clone(),
        },
        Scope::ResourceGroup {
            subscription,
            resource_group,
            ..
        }
        | Scope::Resource {
            parent:
                ResourceParent::ResourceGroup {
                    subscription,
                    resource_group,
                    ..
                },
            ..
        } => DeploymentLevel::ResourceGroup {
            subscription_id: subscription.id.clone(),
            resource_group: resource_group.clone(),
        },
    }
}

/// `{prefix}-{base}`, restricted to characters deployment names accept.
fn deployment_name(prefix: &str, base: &str) -> String {
    let raw = if prefix.is_empty() {
        base.to_string()
    } else {
        format!("{}-{}", prefix, base)
    };
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '(' | ')') {
                c
            } else {
                '-'
            }
        })
        .take(MAX_DEPLOYMENT_NAME_LEN)
        .collect()
}
