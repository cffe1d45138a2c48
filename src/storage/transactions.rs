//! Bank transaction repository for JSON storage
//!
//! Indexed by statement (statement deletion) and by bank reference
//! (idempotent re-import).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::error::DuesError;
use crate::models::{BankTransaction, StatementId, TransactionId};

use super::file_io::{read_json, write_json_atomic};

/// Serializable transaction data structure
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct TransactionData {
    transactions: Vec<BankTransaction>,
}

/// Repository for bank transaction persistence with indexing
pub struct TransactionRepository {
    path: PathBuf,
    data: RwLock<HashMap<TransactionId, BankTransaction>>,
    /// Index: statement_id -> transaction_ids
    by_statement: RwLock<HashMap<StatementId, Vec<TransactionId>>>,
    dirty: AtomicBool,
}

impl TransactionRepository {
    /// Create a new transaction repository
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(HashMap::new()),
            by_statement: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Load transactions from disk and build indexes
    pub fn load(&self) -> Result<(), DuesError> {
        let file_data: TransactionData = read_json(&self.path)?;

        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        let mut by_statement = self
            .by_statement
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        data.clear();
        by_statement.clear();

        for txn in file_data.transactions {
            by_statement.entry(txn.statement_id).or_default().push(txn.id);
            data.insert(txn.id, txn);
        }
        self.dirty.store(false, Ordering::SeqCst);

        Ok(())
    }

    /// Save transactions to disk; clears the dirty flag on success
    pub fn save(&self) -> Result<(), DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut transactions: Vec<_> = data.values().cloned().collect();
        transactions.sort_by(|a, b| b.booking_date.cmp(&a.booking_date));

        write_json_atomic(&self.path, &TransactionData { transactions })?;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Whether this repository has in-memory changes not yet written to disk
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Get a transaction by ID
    pub fn get(&self, id: TransactionId) -> Result<Option<BankTransaction>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(data.get(&id).cloned())
    }

    /// Get all transactions, newest booking first
    pub fn get_all(&self) -> Result<Vec<BankTransaction>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut transactions: Vec<_> = data.values().cloned().collect();
        transactions.sort_by(|a, b| b.booking_date.cmp(&a.booking_date));
        Ok(transactions)
    }

    /// Get the transactions imported from a statement
    pub fn get_by_statement(
        &self,
        statement_id: StatementId,
    ) -> Result<Vec<BankTransaction>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        let by_statement = self
            .by_statement
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let ids = by_statement
            .get(&statement_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        Ok(ids.iter().filter_map(|id| data.get(id).cloned()).collect())
    }

    /// Find a transaction by its bank-assigned reference
    pub fn find_by_bank_reference(
        &self,
        bank_reference: &str,
    ) -> Result<Option<BankTransaction>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(data
            .values()
            .find(|t| t.bank_reference.as_deref() == Some(bank_reference))
            .cloned())
    }

    /// Insert or update a transaction
    pub fn upsert(&self, txn: BankTransaction) -> Result<(), DuesError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        let mut by_statement = self
            .by_statement
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        // Remove from old index if updating
        if let Some(old) = data.get(&txn.id) {
            if let Some(ids) = by_statement.get_mut(&old.statement_id) {
                ids.retain(|&id| id != txn.id);
            }
        }

        by_statement.entry(txn.statement_id).or_default().push(txn.id);
        data.insert(txn.id, txn);
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Delete a transaction
    pub fn delete(&self, id: TransactionId) -> Result<bool, DuesError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        let mut by_statement = self
            .by_statement
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        if let Some(txn) = data.remove(&id) {
            if let Some(ids) = by_statement.get_mut(&txn.statement_id) {
                ids.retain(|&tid| tid != id);
            }
            self.dirty.store(true, Ordering::SeqCst);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Count transactions
    pub fn count(&self) -> Result<usize, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(data.len())
    }
}
