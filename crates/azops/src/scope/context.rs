//! Immutable resolution context shared by the resolver, discovery and dispatch.

use std::path::{Path, PathBuf};

use crate::hierarchy::HierarchyCache;

/// Name of the hidden metadata directory holding state files.
pub const STATE_DIRECTORY: &str = ".AzState";

/// Where and how state files are laid out on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    /// Root of the mirrored tree; the tenant root scope maps here.
    pub root: PathBuf,
    /// Export raw templates (`.json`) instead of parameter files (`.parameters.json`).
    pub export_raw_template: bool,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            export_raw_template: false,
        }
    }

    pub fn with_raw_templates(mut self, export_raw_template: bool) -> Self {
        self.export_raw_template = export_raw_template;
        self
    }
}

/// Snapshot of everything scope resolution depends on.
///
/// Built once per run and never mutated; a cache refresh produces a new
/// context through [`ScopeContext::refreshed`].
#[derive(Debug, Clone)]
pub struct ScopeContext {
    layout: StateLayout,
    hierarchy: HierarchyCache,
}

impl ScopeContext {
    pub fn new(layout: StateLayout, hierarchy: HierarchyCache) -> Self {
        Self { layout, hierarchy }
    }

    /// Returns a new context with the same layout and a fresh hierarchy.
    pub fn refreshed(&self, hierarchy: HierarchyCache) -> Self {
        Self {
            layout: self.layout.clone(),
            hierarchy,
        }
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    pub fn hierarchy(&self) -> &HierarchyCache {
        &self.hierarchy
    }

    pub fn root(&self) -> &Path {
        &self.layout.root
    }
}
