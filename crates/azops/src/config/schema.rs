use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::scope::StateLayout;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Root of the mirrored state tree.
    #[serde(default = "default_state_root")]
    pub state_root: PathBuf,
    /// Shared deployment template used when a parameter file has no sibling template.
    #[serde(default)]
    pub main_template: Option<PathBuf>,
    #[serde(default)]
    pub discovery: DiscoverySettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub deployment: DeploymentSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

fn default_state_root() -> PathBuf {
    PathBuf::from("azops")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_root: default_state_root(),
            main_template: None,
            discovery: DiscoverySettings::default(),
            retry: RetrySettings::default(),
            deployment: DeploymentSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Settings {
    pub fn layout(&self) -> StateLayout {
        StateLayout::new(&self.state_root).with_raw_templates(self.discovery.export_raw_template)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.base_delay_ms),
        )
        .with_max_delay(Duration::from_millis(self.retry.max_delay_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoverySettings {
    #[serde(default)]
    pub skip_policy: bool,
    #[serde(default)]
    pub skip_role: bool,
    #[serde(default)]
    pub skip_resource_group: bool,
    #[serde(default)]
    pub export_raw_template: bool,
    /// Produce environment-neutral output (role assignments are dropped).
    #[serde(default)]
    pub generalize: bool,
    /// Property names removed from every entity before it is written.
    #[serde(default)]
    pub excluded_properties: Vec<String>,
    #[serde(default = "default_worker_count")]
    pub resource_group_workers: usize,
}

fn default_worker_count() -> usize {
    num_cpus::get().clamp(1, 4)
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            skip_policy: false,
            skip_role: false,
            skip_resource_group: false,
            export_raw_template: false,
            generalize: false,
            excluded_properties: Vec::new(),
            resource_group_workers: default_worker_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    300_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSettings {
    /// Region recorded on tenant, management-group and subscription deployments.
    #[serde(default = "default_region")]
    pub default_region: String,
    /// Principal name of the enrollment account used for new subscriptions.
    #[serde(default)]
    pub enrollment_account: Option<String>,
    #[serde(default = "default_deployment_name_prefix")]
    pub deployment_name_prefix: String,
}

fn default_region() -> String {
    "northeurope".to_string()
}

fn default_deployment_name_prefix() -> String {
    "AzOps".to_string()
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            default_region: default_region(),
            enrollment_account: None,
            deployment_name_prefix: default_deployment_name_prefix(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
