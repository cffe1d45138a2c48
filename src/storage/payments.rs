//! Payment repository for JSON storage

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::error::DuesError;
use crate::models::{ParentId, Payment, PaymentId, TransactionId};

use super::file_io::{read_json, write_json_atomic};

/// Serializable payment data structure
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct PaymentData {
    payments: Vec<Payment>,
}

/// Repository for payment persistence
pub struct PaymentRepository {
    path: PathBuf,
    data: RwLock<HashMap<PaymentId, Payment>>,
    dirty: AtomicBool,
}

impl PaymentRepository {
    /// Create a new payment repository
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Load payments from disk
    pub fn load(&self) -> Result<(), DuesError> {
        let file_data: PaymentData = read_json(&self.path)?;

        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        data.clear();
        for payment in file_data.payments {
            data.insert(payment.id, payment);
        }
        self.dirty.store(false, Ordering::SeqCst);

        Ok(())
    }

    /// Save payments to disk; clears the dirty flag on success
    pub fn save(&self) -> Result<(), DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut payments: Vec<_> = data.values().cloned().collect();
        payments.sort_by(|a, b| {
            b.payment_date
                .cmp(&a.payment_date)
                .then(b.created_at.cmp(&a.created_at))
        });

        write_json_atomic(&self.path, &PaymentData { payments })?;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Whether this repository has in-memory changes not yet written to disk
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Get a payment by ID
    pub fn get(&self, id: PaymentId) -> Result<Option<Payment>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(data.get(&id).cloned())
    }

    /// Get all payments, newest first
    pub fn get_all(&self) -> Result<Vec<Payment>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut payments: Vec<_> = data.values().cloned().collect();
        payments.sort_by(|a, b| b.payment_date.cmp(&a.payment_date));
        Ok(payments)
    }

    /// Get payments from a parent
    pub fn get_by_parent(&self, parent_id: ParentId) -> Result<Vec<Payment>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(data
            .values()
            .filter(|p| p.parent_id == Some(parent_id))
            .cloned()
            .collect())
    }

    /// Find the payment created from a bank transaction
    pub fn find_by_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<Payment>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(data
            .values()
            .find(|p| p.bank_transaction_id == Some(transaction_id))
            .cloned())
    }

    /// Insert or update a payment
    pub fn upsert(&self, payment: Payment) -> Result<(), DuesError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        data.insert(payment.id, payment);
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Delete a payment
    pub fn delete(&self, id: PaymentId) -> Result<bool, DuesError> {
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

    /// Count payments
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
    use crate::models::Money;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn create_test_repo() -> (TempDir, PaymentRepository) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("payments.json");
        let repo = PaymentRepository::new(path);
        (temp_dir, repo)
    }

    #[test]
    fn test_find_by_transaction() {
        let (_temp_dir, repo) = create_test_repo();
        repo.load().unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let txn = TransactionId::new();
        let payment =
            Payment::from_bank_transaction(ParentId::new(), Money::from_cents(4500), date, txn);
        let id = payment.id;
        repo.upsert(payment).unwrap();

        let found = repo.find_by_transaction(txn).unwrap().unwrap();
        assert_eq!(found.id, id);

        assert!(repo.find_by_transaction(TransactionId::new()).unwrap().is_none());
    }

    #[test]
    fn test_get_all_newest_first() {
        let (_temp_dir, repo) = create_test_repo();
        repo.load().unwrap();

        let older = Payment::new(
            None,
            Money::from_cents(100),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        let newer = Payment::new(
            None,
            Money::from_cents(200),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        );
        repo.upsert(older).unwrap();
        repo.upsert(newer).unwrap();

        let all = repo.get_all().unwrap();
        assert_eq!(all[0].amount.cents(), 200);
    }

    #[test]
    fn test_save_and_reload() {
        let (temp_dir, repo) = create_test_repo();
        repo.load().unwrap();

        let payment = Payment::new(
            Some(ParentId::new()),
            Money::from_cents(4500),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        );
        let id = payment.id;
        repo.upsert(payment).unwrap();
        repo.save().unwrap();

        let repo2 = PaymentRepository::new(temp_dir.path().join("payments.json"));
        repo2.load().unwrap();
        assert!(repo2.get(id).unwrap().is_some());
    }
}
