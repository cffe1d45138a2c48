//! Bank statement repository for JSON storage

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::error::DuesError;
use crate::models::{BankStatement, StatementId};

use super::file_io::{read_json, write_json_atomic};

/// Serializable statement data structure
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct StatementData {
    statements: Vec<BankStatement>,
}

/// Repository for bank statement persistence
pub struct StatementRepository {
    path: PathBuf,
    data: RwLock<HashMap<StatementId, BankStatement>>,
    dirty: AtomicBool,
}

impl StatementRepository {
    /// Create a new statement repository
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Load statements from disk
    pub fn load(&self) -> Result<(), DuesError> {
        let file_data: StatementData = read_json(&self.path)?;

        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        data.clear();
        for statement in file_data.statements {
            data.insert(statement.id, statement);
        }
        self.dirty.store(false, Ordering::SeqCst);

        Ok(())
    }

    /// Save statements to disk; clears the dirty flag on success
    pub fn save(&self) -> Result<(), DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut statements: Vec<_> = data.values().cloned().collect();
        statements.sort_by(|a, b| b.imported_at.cmp(&a.imported_at));

        write_json_atomic(&self.path, &StatementData { statements })?;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Whether this repository has in-memory changes not yet written to disk
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Get a statement by ID
    pub fn get(&self, id: StatementId) -> Result<Option<BankStatement>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(data.get(&id).cloned())
    }

    /// Get all statements, newest import first
    pub fn get_all(&self) -> Result<Vec<BankStatement>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut statements: Vec<_> = data.values().cloned().collect();
        statements.sort_by(|a, b| b.imported_at.cmp(&a.imported_at));
        Ok(statements)
    }

    /// Insert or update a statement
    pub fn upsert(&self, statement: BankStatement) -> Result<(), DuesError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        data.insert(statement.id, statement);
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Delete a statement
    pub fn delete(&self, id: StatementId) -> Result<bool, DuesError> {
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

    /// Count statements
    pub fn count(&self) -> Result<usize, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_upsert_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("statements.json");
        let repo = StatementRepository::new(path.clone());
        repo.load().unwrap();

        let statement = BankStatement::new("izpisek-2024-03.xml");
        let id = statement.id;
        repo.upsert(statement).unwrap();
        repo.save().unwrap();

        let repo2 = StatementRepository::new(path);
        repo2.load().unwrap();
        let loaded = repo2.get(id).unwrap().unwrap();
        assert_eq!(loaded.file_name, "izpisek-2024-03.xml");
    }
}
