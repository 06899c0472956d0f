use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use super::classify::ChangeClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    NotJson,
    /// The file does not belong to a tracked scope.
    UnresolvedScope,
    /// Neither a sibling template nor a main template is available.
    NoTemplate,
    /// The main template does not support the declared resource type.
    UnsupportedTemplate,
    Unrecognized,
    /// The subscription already exists.
    UpToDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedChange {
    pub path: PathBuf,
    pub reason: SkipReason,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedChange {
    pub path: PathBuf,
    pub class: ChangeClass,
    /// Identifier of the scope the change was applied at.
    pub scope_id: String,
    /// What was done, e.g. the deployment name.
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedChange {
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of applying a change set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    pub deployed: Vec<AppliedChange>,
    pub skipped: Vec<SkippedChange>,
    /// Deleted paths; reported only, never acted on.
    pub deletions: Vec<PathBuf>,
    pub failed: Vec<FailedChange>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for ApplyReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplyReport {
    pub fn new() -> Self {
        Self {
            deployed: Vec::new(),
            skipped: Vec::new(),
            deletions: Vec::new(),
            failed: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub(crate) fn skip(&mut self, path: PathBuf, reason: SkipReason, message: impl Into<String>) {
        let message = message.into();
        log::warn!("Skipping {} ({:?}): {}", path.display(), reason, message);
        self.skipped.push(SkippedChange {
            path,
            reason,
            message,
        });
    }

    pub(crate) fn fail(&mut self, path: PathBuf, message: impl Into<String>) {
        let message = message.into();
        log::error!("Failed to apply {}: {}", path.display(), message);
        self.failed.push(FailedChange { path, message });
    }

    pub(crate) fn applied(&mut self, change: AppliedChange) {
        log::info!(
            "Applied {} at {}: {}",
            change.path.display(),
            change.scope_id,
            change.action
        );
        self.deployed.push(change);
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn skipped_for(&self, reason: SkipReason) -> impl Iterator<Item = &SkippedChange> {
        self.skipped.iter().filter(move |s| s.reason == reason)
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
