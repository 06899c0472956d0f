use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Category of a non-fatal discovery event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningKind {
    /// Resource group owned by another service; skipped with its resources.
    ExternallyManaged,
    /// A single resource could not be fetched.
    ResourceAccess,
    /// A listing call kept failing until the retry budget ran out.
    ListingExhausted,
    /// A policy or role collection could not be fetched.
    MetadataFetch,
    StateWrite,
    /// An identifier returned by the provider could not be resolved.
    Resolution,
    ManagementGroupNotCached,
    RootNotDispatched,
    /// A resource-group worker failed to start or panicked.
    Worker,
}

impl WarningKind {
    /// Informational records describe an intended skip, not a failure.
    pub fn is_informational(&self) -> bool {
        matches!(self, WarningKind::ExternallyManaged)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryWarning {
    /// Identifier of the scope the event belongs to.
    pub scope: String,
    pub kind: WarningKind,
    pub message: String,
}

/// Outcome of a discovery run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    /// State files written, in completion order.
    pub written: Vec<PathBuf>,
    pub warnings: Vec<DiscoveryWarning>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for DiscoveryReport {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryReport {
    pub fn new() -> Self {
        Self {
            written: Vec::new(),
            warnings: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub(crate) fn record_written(&mut self, path: PathBuf) {
        self.written.push(path);
    }

    /// Records a warning and logs it.
    pub(crate) fn warn(&mut self, scope: &str, kind: WarningKind, message: impl Into<String>) {
        let message = message.into();
        if kind.is_informational() {
            log::info!("Skipping {}: {}", scope, message);
        } else {
            log::warn!("{:?} for {}: {}", kind, scope, message);
        }
        self.warnings.push(DiscoveryWarning {
            scope: scope.to_string(),
            kind,
            message,
        });
    }

    /// Folds a worker's report into this one.
    pub(crate) fn merge(&mut self, other: DiscoveryReport) {
        self.written.extend(other.written);
        self.warnings.extend(other.warnings);
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn warnings_of(&self, kind: WarningKind) -> impl Iterator<Item = &DiscoveryWarning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }

    /// Informational skip records.
    pub fn skipped(&self) -> impl Iterator<Item = &DiscoveryWarning> {
        self.warnings.iter().filter(|w| w.kind.is_informational())
    }

    /// True if no branch failed. Informational skips do not count.
    pub fn is_clean(&self) -> bool {
        self.warnings.iter().all(|w| w.kind.is_informational())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_informational_skips_keep_report_clean() {
        let mut report = DiscoveryReport::new();
        report.warn(
            "/subscriptions/s/resourceGroups/rg",
            WarningKind::ExternallyManaged,
            "managed",
        );
        assert!(report.is_clean());
        assert_eq!(report.skipped().count(), 1);

        report.warn("/subscriptions/s", WarningKind::ListingExhausted, "throttled");
        assert!(!report.is_clean());
        assert_eq!(report.warnings_of(WarningKind::ListingExhausted).count(), 1);
    }

    #[test]
    fn test_merge_and_finish() {
        let mut report = DiscoveryReport::new();
        let mut worker = DiscoveryReport::new();
        worker.record_written(PathBuf::from("a.json"));
        worker.warn("x", WarningKind::ResourceAccess, "denied");

        report.merge(worker);
        report.finish();

        assert_eq!(report.written, vec![PathBuf::from("a.json")]);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.finished_at.unwrap() >= report.started_at);
    }
}
