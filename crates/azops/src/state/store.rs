use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::document::{strip_properties, StateDocument};
use crate::error::StateError;
use crate::scope::{ScopeDescriptor, ScopeKind};

/// Persistence seam for state files.
pub trait StateStore: Send + Sync {
    /// Writes `entity` as the state file of `descriptor` and returns its path.
    fn write_state(
        &self,
        descriptor: &ScopeDescriptor,
        entity: &Value,
        export_raw: bool,
    ) -> Result<PathBuf, StateError>;

    fn read_state(&self, path: &Path) -> Result<StateDocument, StateError>;

    /// Merges `bag` into the `properties` object of the file at `path`.
    fn merge_properties(&self, path: &Path, bag: Map<String, Value>) -> Result<(), StateError>;
}

/// [`StateStore`] writing JSON files into the state tree.
pub struct FileStateStore {
    /// Keys removed from every entity before it is written.
    excluded_properties: Vec<String>,
}

impl FileStateStore {
    pub fn new() -> Self {
        Self {
            excluded_properties: Vec::new(),
        }
    }

    pub fn with_excluded_properties(mut self, excluded: Vec<String>) -> Self {
        self.excluded_properties = excluded;
        self
    }

    pub fn excluded_properties(&self) -> &[String] {
        &self.excluded_properties
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StateError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| StateError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Writes `bytes` to `path` unless the file already holds exactly them.
    /// New content goes to a sibling temp file first and is renamed into place.
    fn write_document(&self, path: &Path, document: &StateDocument) -> Result<(), StateError> {
        let bytes = document.to_bytes()?;

        if let Ok(existing) = std::fs::read(path) {
            if existing == bytes {
                log::trace!("State unchanged: {}", path.display());
                return Ok(());
            }
        }

        if let Some(parent) = path.parent() {
            self.ensure_directory(parent)?;
        }

        let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
        temp_name.push(".tmp");
        let temp_path = path.with_file_name(temp_name);

        std::fs::write(&temp_path, &bytes).map_err(|e| StateError::WriteFile {
            path: temp_path.clone(),
            source: e,
        })?;
        std::fs::rename(&temp_path, path).map_err(|e| StateError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        log::debug!("Wrote state file {}", path.display());
        Ok(())
    }
}

impl Default for FileStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for FileStateStore {
    fn write_state(
        &self,
        descriptor: &ScopeDescriptor,
        entity: &Value,
        export_raw: bool,
    ) -> Result<PathBuf, StateError> {
        let path = descriptor
            .state_file(export_raw)
            .ok_or_else(|| StateError::NotPersistable(descriptor.id.clone()))?;

        let mut entity = entity.clone();
        strip_properties(&mut entity, &self.excluded_properties);

        let identifier_key = match descriptor.kind() {
            ScopeKind::ManagementGroup | ScopeKind::Subscription => "Id",
            _ => "ResourceId",
        };
        if let Value::Object(map) = &mut entity {
            map.entry(identifier_key)
                .or_insert_with(|| Value::String(descriptor.id.clone()));
        }

        let document = if export_raw {
            StateDocument::raw_template(entity)
        } else {
            StateDocument::parameters(entity)
        };

        self.write_document(&path, &document)?;
        Ok(path)
    }

    fn read_state(&self, path: &Path) -> Result<StateDocument, StateError> {
        let bytes = std::fs::read(path).map_err(|e| StateError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        StateDocument::from_slice(path, &bytes)
    }

    fn merge_properties(&self, path: &Path, mut bag: Map<String, Value>) -> Result<(), StateError> {
        let mut document = self.read_state(path)?;

        for value in bag.values_mut() {
            strip_properties(value, &self.excluded_properties);
        }

        if !document.merge_properties(bag) {
            return Err(StateError::InvalidDocument {
                path: path.to_path_buf(),
                message: "document has no entity to merge properties into".to_string(),
            });
        }

        self.write_document(path, &document)
    }
}
