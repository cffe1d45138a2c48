//! Cost type registry for JSON storage
//!
//! Cost categories are free-form names with a uniqueness constraint.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::error::DuesError;

use super::file_io::{read_json, write_json_atomic};

/// Serializable cost type data structure
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct CostTypeData {
    cost_types: Vec<String>,
}

/// Repository for the cost category list
pub struct CostTypeRepository {
    path: PathBuf,
    data: RwLock<Vec<String>>,
    dirty: AtomicBool,
}

impl CostTypeRepository {
    /// Create a new cost type repository
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(Vec::new()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Load cost types from disk
    pub fn load(&self) -> Result<(), DuesError> {
        let file_data: CostTypeData = read_json(&self.path)?;

        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        *data = file_data.cost_types;
        self.dirty.store(false, Ordering::SeqCst);

        Ok(())
    }

    /// Save cost types to disk; clears the dirty flag on success
    pub fn save(&self) -> Result<(), DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        write_json_atomic(
            &self.path,
            &CostTypeData {
                cost_types: data.clone(),
            },
        )?;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Whether this repository has in-memory changes not yet written to disk
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Get all cost type names
    pub fn get_all(&self) -> Result<Vec<String>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(data.clone())
    }

    /// Whether a cost type with this name exists
    pub fn contains(&self, name: &str) -> Result<bool, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(data.iter().any(|t| t == name))
    }

    /// Add a cost type; the name must be non-empty and unique
    pub fn add(&self, name: &str) -> Result<(), DuesError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DuesError::Validation("Cost type name cannot be empty".into()));
        }

        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        if data.iter().any(|t| t == name) {
            return Err(DuesError::Duplicate {
                entity_type: "CostType",
                identifier: name.to_string(),
            });
        }

        data.push(name.to_string());
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Rename a cost type; the new name must be unique
    pub fn rename(&self, old_name: &str, new_name: &str) -> Result<(), DuesError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(DuesError::Validation("Cost type name cannot be empty".into()));
        }
        if new_name == old_name {
            return Ok(());
        }

        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        if data.iter().any(|t| t == new_name) {
            return Err(DuesError::Duplicate {
                entity_type: "CostType",
                identifier: new_name.to_string(),
            });
        }

        let slot = data.iter_mut().find(|t| *t == old_name).ok_or_else(|| {
            DuesError::NotFound {
                entity_type: "CostType",
                identifier: old_name.to_string(),
            }
        })?;
        *slot = new_name.to_string();
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Remove a cost type by name
    pub fn remove(&self, name: &str) -> Result<(), DuesError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        let before = data.len();
        data.retain(|t| t != name);
        if data.len() == before {
            return Err(DuesError::NotFound {
                entity_type: "CostType",
                identifier: name.to_string(),
            });
        }
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }
}
