//! Allocation repository for JSON storage
//!
//! Allocations are indexed both ways: by payment (cascade removal) and by
//! cost (paid-state re-derivation).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::error::DuesError;
use crate::models::{Allocation, AllocationId, CostId, Money, PaymentId};

use super::file_io::{read_json, write_json_atomic};

/// Serializable allocation data structure
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct AllocationData {
    allocations: Vec<Allocation>,
}

/// Repository for allocation persistence with indexing
pub struct AllocationRepository {
    path: PathBuf,
    data: RwLock<HashMap<AllocationId, Allocation>>,
    /// Index: payment_id -> allocation_ids
    by_payment: RwLock<HashMap<PaymentId, Vec<AllocationId>>>,
    /// Index: cost_id -> allocation_ids
    by_cost: RwLock<HashMap<CostId, Vec<AllocationId>>>,
    dirty: AtomicBool,
}

impl AllocationRepository {
    /// Create a new allocation repository
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(HashMap::new()),
            by_payment: RwLock::new(HashMap::new()),
            by_cost: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Load allocations from disk and build indexes
    pub fn load(&self) -> Result<(), DuesError> {
        let file_data: AllocationData = read_json(&self.path)?;

        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        let mut by_payment = self
            .by_payment
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        let mut by_cost = self
            .by_cost
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        data.clear();
        by_payment.clear();
        by_cost.clear();

        for allocation in file_data.allocations {
            by_payment
                .entry(allocation.payment_id)
                .or_default()
                .push(allocation.id);
            by_cost
                .entry(allocation.cost_id)
                .or_default()
                .push(allocation.id);
            data.insert(allocation.id, allocation);
        }
        self.dirty.store(false, Ordering::SeqCst);

        Ok(())
    }

    /// Save allocations to disk; clears the dirty flag on success
    pub fn save(&self) -> Result<(), DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut allocations: Vec<_> = data.values().cloned().collect();
        allocations.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        write_json_atomic(&self.path, &AllocationData { allocations })?;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Whether this repository has in-memory changes not yet written to disk
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Get an allocation by ID
    pub fn get(&self, id: AllocationId) -> Result<Option<Allocation>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(data.get(&id).cloned())
    }

    /// Get all allocations
    pub fn get_all(&self) -> Result<Vec<Allocation>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(data.values().cloned().collect())
    }

    /// Get the allocations drawing from a payment
    pub fn get_by_payment(&self, payment_id: PaymentId) -> Result<Vec<Allocation>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        let by_payment = self
            .by_payment
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let ids = by_payment
            .get(&payment_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        Ok(ids.iter().filter_map(|id| data.get(id).cloned()).collect())
    }

    /// Get the allocations covering a cost
    pub fn get_by_cost(&self, cost_id: CostId) -> Result<Vec<Allocation>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        let by_cost = self
            .by_cost
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let ids = by_cost.get(&cost_id).map(|v| v.as_slice()).unwrap_or(&[]);
        Ok(ids.iter().filter_map(|id| data.get(id).cloned()).collect())
    }

    /// Sum of all allocations covering a cost
    pub fn total_for_cost(&self, cost_id: CostId) -> Result<Money, DuesError> {
        Ok(self.get_by_cost(cost_id)?.iter().map(|a| a.amount).sum())
    }

    /// Insert or update an allocation
    pub fn upsert(&self, allocation: Allocation) -> Result<(), DuesError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        let mut by_payment = self
            .by_payment
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        let mut by_cost = self
            .by_cost
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        // Remove from old indexes if updating
        if let Some(old) = data.get(&allocation.id) {
            if let Some(ids) = by_payment.get_mut(&old.payment_id) {
                ids.retain(|&id| id != allocation.id);
            }
            if let Some(ids) = by_cost.get_mut(&old.cost_id) {
                ids.retain(|&id| id != allocation.id);
            }
        }

        by_payment
            .entry(allocation.payment_id)
            .or_default()
            .push(allocation.id);
        by_cost
            .entry(allocation.cost_id)
            .or_default()
            .push(allocation.id);

        data.insert(allocation.id, allocation);
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Delete an allocation
    pub fn delete(&self, id: AllocationId) -> Result<bool, DuesError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        let mut by_payment = self
            .by_payment
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        let mut by_cost = self
            .by_cost
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        if let Some(allocation) = data.remove(&id) {
            if let Some(ids) = by_payment.get_mut(&allocation.payment_id) {
                ids.retain(|&aid| aid != id);
            }
            if let Some(ids) = by_cost.get_mut(&allocation.cost_id) {
                ids.retain(|&aid| aid != id);
            }
            self.dirty.store(true, Ordering::SeqCst);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Delete every allocation drawing from a payment; returns the removed
    /// allocations
    pub fn delete_by_payment(&self, payment_id: PaymentId) -> Result<Vec<Allocation>, DuesError> {
        let removed = self.get_by_payment(payment_id)?;
        for allocation in &removed {
            self.delete(allocation.id)?;
        }
        Ok(removed)
    }

    /// Count allocations
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

    fn create_test_repo() -> (TempDir, AllocationRepository) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("allocations.json");
        let repo = AllocationRepository::new(path);
        (temp_dir, repo)
    }

    #[test]
    fn test_indexes_both_ways() {
        let (_temp_dir, repo) = create_test_repo();
        repo.load().unwrap();

        let payment = PaymentId::new();
        let cost_a = CostId::new();
        let cost_b = CostId::new();

        repo.upsert(Allocation::new(payment, cost_a, Money::from_cents(3000)))
            .unwrap();
        repo.upsert(Allocation::new(payment, cost_b, Money::from_cents(2000)))
            .unwrap();

        assert_eq!(repo.get_by_payment(payment).unwrap().len(), 2);
        assert_eq!(repo.get_by_cost(cost_a).unwrap().len(), 1);
        assert_eq!(repo.total_for_cost(cost_a).unwrap().cents(), 3000);
    }

    #[test]
    fn test_total_for_cost_spans_payments() {
        let (_temp_dir, repo) = create_test_repo();
        repo.load().unwrap();

        let cost = CostId::new();
        repo.upsert(Allocation::new(PaymentId::new(), cost, Money::from_cents(2000)))
            .unwrap();
        repo.upsert(Allocation::new(PaymentId::new(), cost, Money::from_cents(2000)))
            .unwrap();

        assert_eq!(repo.total_for_cost(cost).unwrap().cents(), 4000);
    }

    #[test]
    fn test_delete_by_payment() {
        let (_temp_dir, repo) = create_test_repo();
        repo.load().unwrap();

        let payment = PaymentId::new();
        let other_payment = PaymentId::new();
        let cost = CostId::new();

        repo.upsert(Allocation::new(payment, cost, Money::from_cents(2000)))
            .unwrap();
        repo.upsert(Allocation::new(other_payment, cost, Money::from_cents(2000)))
            .unwrap();

        let removed = repo.delete_by_payment(payment).unwrap();
        assert_eq!(removed.len(), 1);

        // The other payment's allocation remains
        assert_eq!(repo.get_by_cost(cost).unwrap().len(), 1);
        assert_eq!(repo.total_for_cost(cost).unwrap().cents(), 2000);
    }

    #[test]
    fn test_save_and_reload_rebuilds_indexes() {
        let (temp_dir, repo) = create_test_repo();
        repo.load().unwrap();

        let payment = PaymentId::new();
        let cost = CostId::new();
        repo.upsert(Allocation::new(payment, cost, Money::from_cents(2000)))
            .unwrap();
        repo.save().unwrap();

        let repo2 = AllocationRepository::new(temp_dir.path().join("allocations.json"));
        repo2.load().unwrap();
        assert_eq!(repo2.get_by_payment(payment).unwrap().len(), 1);
        assert_eq!(repo2.get_by_cost(cost).unwrap().len(), 1);
    }
}
