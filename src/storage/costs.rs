//! Cost repository for JSON storage
//!
//! Indexes costs by member and by recurring template so allocation and
//! scheduler scans stay cheap.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::error::DuesError;
use crate::models::{Cost, CostId, MemberId};

use super::file_io::{read_json, write_json_atomic};

/// Serializable cost data structure
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct CostData {
    costs: Vec<Cost>,
}

/// Repository for cost persistence with indexing
pub struct CostRepository {
    path: PathBuf,
    data: RwLock<HashMap<CostId, Cost>>,
    /// Index: member_id -> cost_ids
    by_member: RwLock<HashMap<MemberId, Vec<CostId>>>,
    /// Index: template cost_id -> generated instance cost_ids
    by_template: RwLock<HashMap<CostId, Vec<CostId>>>,
    dirty: AtomicBool,
}

impl CostRepository {
    /// Create a new cost repository
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(HashMap::new()),
            by_member: RwLock::new(HashMap::new()),
            by_template: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Load costs from disk and build indexes
    pub fn load(&self) -> Result<(), DuesError> {
        let file_data: CostData = read_json(&self.path)?;

        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        let mut by_member = self
            .by_member
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        let mut by_template = self
            .by_template
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        data.clear();
        by_member.clear();
        by_template.clear();

        for cost in file_data.costs {
            by_member.entry(cost.member_id).or_default().push(cost.id);
            if let Some(template_id) = cost.recurring_template_id {
                by_template.entry(template_id).or_default().push(cost.id);
            }
            data.insert(cost.id, cost);
        }
        self.dirty.store(false, Ordering::SeqCst);

        Ok(())
    }

    /// Save costs to disk; clears the dirty flag on success
    pub fn save(&self) -> Result<(), DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut costs: Vec<_> = data.values().cloned().collect();
        costs.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        write_json_atomic(&self.path, &CostData { costs })?;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Whether this repository has in-memory changes not yet written to disk
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Get a cost by ID
    pub fn get(&self, id: CostId) -> Result<Option<Cost>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(data.get(&id).cloned())
    }

    /// Get all costs
    pub fn get_all(&self) -> Result<Vec<Cost>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut costs: Vec<_> = data.values().cloned().collect();
        costs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(costs)
    }

    /// Get all costs of a member
    pub fn get_by_member(&self, member_id: MemberId) -> Result<Vec<Cost>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        let by_member = self
            .by_member
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let ids = by_member.get(&member_id).map(|v| v.as_slice()).unwrap_or(&[]);
        let mut costs: Vec<_> = ids.iter().filter_map(|id| data.get(id).cloned()).collect();
        costs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(costs)
    }

    /// Get all recurring templates (recurring costs that are not themselves
    /// generated instances)
    pub fn get_templates(&self) -> Result<Vec<Cost>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut templates: Vec<_> = data.values().filter(|c| c.is_template()).cloned().collect();
        templates.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(templates)
    }

    /// Get the instances generated from a template
    pub fn get_instances_of(&self, template_id: CostId) -> Result<Vec<Cost>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        let by_template = self
            .by_template
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let ids = by_template
            .get(&template_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        Ok(ids.iter().filter_map(|id| data.get(id).cloned()).collect())
    }

    /// Insert or update a cost
    pub fn upsert(&self, cost: Cost) -> Result<(), DuesError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        let mut by_member = self
            .by_member
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        let mut by_template = self
            .by_template
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        // Remove from old indexes if updating
        if let Some(old) = data.get(&cost.id) {
            if let Some(ids) = by_member.get_mut(&old.member_id) {
                ids.retain(|&id| id != cost.id);
            }
            if let Some(template_id) = old.recurring_template_id {
                if let Some(ids) = by_template.get_mut(&template_id) {
                    ids.retain(|&id| id != cost.id);
                }
            }
        }

        by_member.entry(cost.member_id).or_default().push(cost.id);
        if let Some(template_id) = cost.recurring_template_id {
            by_template.entry(template_id).or_default().push(cost.id);
        }

        data.insert(cost.id, cost);
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Delete a cost
    pub fn delete(&self, id: CostId) -> Result<bool, DuesError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        let mut by_member = self
            .by_member
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        let mut by_template = self
            .by_template
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        if let Some(cost) = data.remove(&id) {
            if let Some(ids) = by_member.get_mut(&cost.member_id) {
                ids.retain(|&cid| cid != id);
            }
            if let Some(template_id) = cost.recurring_template_id {
                if let Some(ids) = by_template.get_mut(&template_id) {
                    ids.retain(|&cid| cid != id);
                }
            }
            self.dirty.store(true, Ordering::SeqCst);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Count costs
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
    use crate::models::{Money, Recurrence, RecurrencePeriod};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn create_test_repo() -> (TempDir, CostRepository) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("costs.json");
        let repo = CostRepository::new(path);
        (temp_dir, repo)
    }

    fn monthly() -> Recurrence {
        Recurrence {
            period: RecurrencePeriod::Monthly,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: None,
            day_of_month: Some(1),
        }
    }

    #[test]
    fn test_get_by_member() {
        let (_temp_dir, repo) = create_test_repo();
        repo.load().unwrap();

        let member_a = MemberId::new();
        let member_b = MemberId::new();

        repo.upsert(Cost::new(member_a, "Fee", Money::from_cents(4500), "training"))
            .unwrap();
        repo.upsert(Cost::new(member_a, "Camp", Money::from_cents(9000), "camp"))
            .unwrap();
        repo.upsert(Cost::new(member_b, "Fee", Money::from_cents(4500), "training"))
            .unwrap();

        assert_eq!(repo.get_by_member(member_a).unwrap().len(), 2);
        assert_eq!(repo.get_by_member(member_b).unwrap().len(), 1);
    }

    #[test]
    fn test_templates_and_instances() {
        let (_temp_dir, repo) = create_test_repo();
        repo.load().unwrap();

        let member = MemberId::new();
        let template = Cost::template(
            member,
            "Training fee",
            Money::from_cents(4500),
            "training",
            monthly(),
        );
        let template_id = template.id;
        repo.upsert(template).unwrap();

        let mut instance = Cost::new(member, "Training fee", Money::from_cents(4500), "training");
        instance.recurring_template_id = Some(template_id);
        repo.upsert(instance).unwrap();

        let templates = repo.get_templates().unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].id, template_id);

        let instances = repo.get_instances_of(template_id).unwrap();
        assert_eq!(instances.len(), 1);
    }

    #[test]
    fn test_save_and_reload_rebuilds_indexes() {
        let (temp_dir, repo) = create_test_repo();
        repo.load().unwrap();

        let member = MemberId::new();
        repo.upsert(Cost::new(member, "Fee", Money::from_cents(4500), "training"))
            .unwrap();
        repo.save().unwrap();

        let repo2 = CostRepository::new(temp_dir.path().join("costs.json"));
        repo2.load().unwrap();
        assert_eq!(repo2.get_by_member(member).unwrap().len(), 1);
    }
}
