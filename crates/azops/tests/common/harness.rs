//! Test harness for discovery and dispatch runs.
//!
//! Owns a temporary directory holding the state tree and the in-memory cloud
//! both sides talk to.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use azops::discovery::DiscoveryOptions;
use azops::scope::management_group_path;
use azops::{
    ChangeDispatcher, DiscoveryEngine, DiscoveryReport, DispatchSettings, FileStateStore,
    HierarchyCache, InMemoryProvider, RetryPolicy, ScopeContext, StateLayout,
};
use serde_json::Value;
use tempfile::TempDir;

/// Root management group every test tenant hangs off.
pub const TENANT_ROOT: &str = "tenant-root";

pub struct TestHarness {
    temp_dir: TempDir,
    pub state_root: PathBuf,
    pub cloud: InMemoryProvider,
}

impl TestHarness {
    /// Creates a harness with an empty cloud.
    pub fn new() -> Self {
        Self::with_cloud(InMemoryProvider::new())
    }

    /// Creates a harness around an already populated cloud.
    pub fn with_cloud(cloud: InMemoryProvider) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state_root = temp_dir.path().join("azops");
        std::fs::create_dir_all(&state_root).expect("Failed to create state root");

        Self {
            temp_dir,
            state_root,
            cloud,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Snapshots the cloud hierarchy below [`TENANT_ROOT`] into a scope context.
    pub async fn context(&self) -> Arc<ScopeContext> {
        self.context_with_layout(StateLayout::new(&self.state_root)).await
    }

    pub async fn context_with_layout(&self, layout: StateLayout) -> Arc<ScopeContext> {
        let hierarchy = HierarchyCache::initialize(&self.cloud, TENANT_ROOT)
            .await
            .expect("Failed to initialize hierarchy");
        Arc::new(ScopeContext::new(layout, hierarchy))
    }

    /// Retry policy that gives up after three attempts without real waiting.
    pub fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1)).with_max_delay(Duration::from_millis(5))
    }

    pub fn engine(&self, ctx: Arc<ScopeContext>) -> DiscoveryEngine {
        self.engine_with_store(ctx, FileStateStore::new())
    }

    pub fn engine_with_store(
        &self,
        ctx: Arc<ScopeContext>,
        store: FileStateStore,
    ) -> DiscoveryEngine {
        DiscoveryEngine::new(ctx, Arc::new(self.cloud.clone()), Arc::new(store))
            .with_workers(2)
            .with_retry_policy(Self::fast_retry())
    }

    pub fn dispatcher(
        &self,
        ctx: Arc<ScopeContext>,
        settings: DispatchSettings,
    ) -> ChangeDispatcher {
        ChangeDispatcher::new(ctx, Arc::new(self.cloud.clone()), settings)
    }

    /// Discovers the whole tenant with default options.
    pub async fn discover_tenant(&self, ctx: Arc<ScopeContext>) -> DiscoveryReport {
        self.engine(ctx)
            .discover_tenant(&DiscoveryOptions::default())
            .await
            .expect("Tenant discovery failed")
    }

    /// Directory of a management group in the state tree.
    pub fn management_group_dir(&self, ctx: &ScopeContext, name: &str) -> PathBuf {
        management_group_path(ctx, name).expect("Management group is not cached")
    }

    /// Writes `value` as pretty JSON at `path`, creating parent directories.
    pub fn write_json(&self, path: &Path, value: &Value) -> PathBuf {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        let json = serde_json::to_string_pretty(value).expect("Failed to serialize json");
        std::fs::write(path, json).expect("Failed to write json file");
        path.to_path_buf()
    }

    /// Writes raw text at `path`, creating parent directories.
    pub fn write_text(&self, path: &Path, content: &str) -> PathBuf {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(path, content).expect("Failed to write file");
        path.to_path_buf()
    }

    pub fn read_json(&self, path: &Path) -> Value {
        let bytes = std::fs::read(path).expect("Failed to read json file");
        serde_json::from_slice(&bytes).expect("Invalid json")
    }

    /// Every file below the state root with its bytes.
    pub fn snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        let mut files = BTreeMap::new();
        collect_files(&self.state_root, &mut files);
        files
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_files(dir: &Path, files: &mut BTreeMap<PathBuf, Vec<u8>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, files);
        } else {
            let bytes = std::fs::read(&path).expect("Failed to read state file");
            files.insert(path, bytes);
        }
    }
}
