//! Parent repository for JSON storage

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::error::DuesError;
use crate::models::{Parent, ParentId};

use super::file_io::{read_json, write_json_atomic};

/// Serializable parent data structure
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct ParentData {
    parents: Vec<Parent>,
}

/// Repository for parent (payer) persistence
pub struct ParentRepository {
    path: PathBuf,
    data: RwLock<HashMap<ParentId, Parent>>,
    dirty: AtomicBool,
}

impl ParentRepository {
    /// Create a new parent repository
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Load parents from disk
    pub fn load(&self) -> Result<(), DuesError> {
        let file_data: ParentData = read_json(&self.path)?;

        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        data.clear();
        for parent in file_data.parents {
            data.insert(parent.id, parent);
        }
        self.dirty.store(false, Ordering::SeqCst);

        Ok(())
    }

    /// Save parents to disk; clears the dirty flag on success
    pub fn save(&self) -> Result<(), DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut parents: Vec<_> = data.values().cloned().collect();
        parents.sort_by(|a, b| a.last_name.cmp(&b.last_name).then(a.first_name.cmp(&b.first_name)));

        write_json_atomic(&self.path, &ParentData { parents })?;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Whether this repository has in-memory changes not yet written to disk
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Get a parent by ID
    pub fn get(&self, id: ParentId) -> Result<Option<Parent>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(data.get(&id).cloned())
    }

    /// Get all parents
    pub fn get_all(&self) -> Result<Vec<Parent>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut parents: Vec<_> = data.values().cloned().collect();
        parents.sort_by(|a, b| a.last_name.cmp(&b.last_name).then(a.first_name.cmp(&b.first_name)));
        Ok(parents)
    }

    /// Insert or update a parent
    pub fn upsert(&self, parent: Parent) -> Result<(), DuesError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        data.insert(parent.id, parent);
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Delete a parent
    pub fn delete(&self, id: ParentId) -> Result<bool, DuesError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        let removed = data.remove(&id).is_some();
        if removed {
            self.dirty.store(true, Ordering::SeqCst);
        }
        Ok(removed)
    }

    /// Count parents
    pub fn count(&self) -> Result<usize, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(data.len())
    }
}
