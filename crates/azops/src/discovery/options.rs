use serde::{Deserialize, Serialize};

use crate::config::DiscoverySettings;

/// Per-run switches for a discovery traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryOptions {
    pub skip_policy: bool,
    pub skip_role: bool,
    pub skip_resource_group: bool,
    /// Write raw templates instead of parameter files.
    pub export_raw_template: bool,
    /// Empty the role-assignment collection merged into parent scopes.
    pub generalize: bool,
}

impl From<&DiscoverySettings> for DiscoveryOptions {
    fn from(settings: &DiscoverySettings) -> Self {
        Self {
            skip_policy: settings.skip_policy,
            skip_role: settings.skip_role,
            skip_resource_group: settings.skip_resource_group,
            export_raw_template: settings.export_raw_template,
            generalize: settings.generalize,
        }
    }
}
