use serde::Serialize;
use std::path::Path;

pub const SUBSCRIPTION_SUFFIX: &str = ".subscription.json";
pub const PROVIDER_FEATURES_SUFFIX: &str = ".providerfeatures.json";
pub const RESOURCE_PROVIDERS_SUFFIX: &str = ".resourceproviders.json";
pub const PARAMETERS_SUFFIX: &str = ".parameters.json";

/// How a changed file is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeClass {
    NotJson,
    /// `*.subscription.json`: subscription upsert.
    Subscription,
    /// `*.providerfeatures.json`: feature registration.
    ProviderFeatures,
    /// `*.resourceproviders.json`: resource-provider registration.
    ResourceProviders,
    /// `*.parameters.json`: template deployment.
    Parameters,
    /// Any other JSON file.
    Unrecognized,
}

/// Classifies a path by file-name suffix. The first matching suffix wins,
/// so `x.subscription.json` is never a template deployment.
pub fn classify(path: &Path) -> ChangeClass {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return ChangeClass::NotJson;
    };
    let file_name = file_name.to_ascii_lowercase();

    if !file_name.ends_with(".json") {
        return ChangeClass::NotJson;
    }

    [
        (SUBSCRIPTION_SUFFIX, ChangeClass::Subscription),
        (PROVIDER_FEATURES_SUFFIX, ChangeClass::ProviderFeatures),
        (RESOURCE_PROVIDERS_SUFFIX, ChangeClass::ResourceProviders),
        (PARAMETERS_SUFFIX, ChangeClass::Parameters),
    ]
    .into_iter()
    .find(|(suffix, _)| file_name.ends_with(suffix))
    .map(|(_, class)| class)
    .unwrap_or(ChangeClass::Unrecognized)
}

/// File name with `suffix` removed (case-insensitive), or the file stem.
pub fn base_name(path: &Path, suffix: &str) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let lowered = file_name.to_ascii_lowercase();
    if lowered.ends_with(suffix) {
        file_name[..file_name.len() - suffix.len()].to_string()
    } else {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_order() {
        assert_eq!(classify(Path::new("a/x.subscription.json")), ChangeClass::Subscription);
        assert_eq!(
            classify(Path::new("a/x.ProviderFeatures.json")),
            ChangeClass::ProviderFeatures
        );
        assert_eq!(
            classify(Path::new("a/x.resourceproviders.json")),
            ChangeClass::ResourceProviders
        );
        assert_eq!(classify(Path::new("a/x.parameters.json")), ChangeClass::Parameters);
        assert_eq!(classify(Path::new("a/x.json")), ChangeClass::Unrecognized);
        assert_eq!(classify(Path::new("a/README.md")), ChangeClass::NotJson);
        assert_eq!(classify(Path::new("a/json")), ChangeClass::NotJson);
    }

    #[test]
    fn test_base_name() {
        assert_eq!(
            base_name(Path::new("a/policy.Parameters.json"), PARAMETERS_SUFFIX),
            "policy"
        );
        assert_eq!(base_name(Path::new("a/other.json"), PARAMETERS_SUFFIX), "other");
    }
}
