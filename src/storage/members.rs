//! Member repository for JSON storage

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::error::DuesError;
use crate::models::{Member, MemberId, ParentId};

use super::file_io::{read_json, write_json_atomic};

/// Serializable member data structure
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct MemberData {
    members: Vec<Member>,
}

/// Repository for member persistence
pub struct MemberRepository {
    path: PathBuf,
    data: RwLock<HashMap<MemberId, Member>>,
    dirty: AtomicBool,
}

impl MemberRepository {
    /// Create a new member repository
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Load members from disk
    pub fn load(&self) -> Result<(), DuesError> {
        let file_data: MemberData = read_json(&self.path)?;

        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        data.clear();
        for member in file_data.members {
            data.insert(member.id, member);
        }
        self.dirty.store(false, Ordering::SeqCst);

        Ok(())
    }

    /// Save members to disk; clears the dirty flag on success
    pub fn save(&self) -> Result<(), DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut members: Vec<_> = data.values().cloned().collect();
        members.sort_by(|a, b| a.last_name.cmp(&b.last_name).then(a.first_name.cmp(&b.first_name)));

        write_json_atomic(&self.path, &MemberData { members })?;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Whether this repository has in-memory changes not yet written to disk
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Get a member by ID
    pub fn get(&self, id: MemberId) -> Result<Option<Member>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(data.get(&id).cloned())
    }

    /// Get all members
    pub fn get_all(&self) -> Result<Vec<Member>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut members: Vec<_> = data.values().cloned().collect();
        members.sort_by(|a, b| a.last_name.cmp(&b.last_name).then(a.first_name.cmp(&b.first_name)));
        Ok(members)
    }

    /// Get members billed to the given parent (legacy single-parent links
    /// are folded in by `Member::payer_ids`)
    pub fn get_by_parent(&self, parent_id: ParentId) -> Result<Vec<Member>, DuesError> {
        let data = self
            .data
            .read()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(data
            .values()
            .filter(|m| m.is_linked_to(parent_id))
            .cloned()
            .collect())
    }

    /// Insert or update a member
    pub fn upsert(&self, member: Member) -> Result<(), DuesError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| DuesError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        data.insert(member.id, member);
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Delete a member
    pub fn delete(&self, id: MemberId) -> Result<bool, DuesError> {
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

    /// Count members
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

    fn create_test_repo() -> (TempDir, MemberRepository) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("members.json");
        let repo = MemberRepository::new(path);
        (temp_dir, repo)
    }

    #[test]
    fn test_get_by_parent() {
        let (_temp_dir, repo) = create_test_repo();
        repo.load().unwrap();

        let parent_a = ParentId::new();
        let parent_b = ParentId::new();

        repo.upsert(Member::new("Ana", "Kovač", vec![parent_a])).unwrap();
        repo.upsert(Member::new("Jan", "Kovač", vec![parent_a, parent_b]))
            .unwrap();
        repo.upsert(Member::new("Nik", "Zupan", vec![parent_b])).unwrap();

        assert_eq!(repo.get_by_parent(parent_a).unwrap().len(), 2);
        assert_eq!(repo.get_by_parent(parent_b).unwrap().len(), 2);
    }

    #[test]
    fn test_get_by_parent_legacy_field() {
        let (_temp_dir, repo) = create_test_repo();
        repo.load().unwrap();

        let parent = ParentId::new();
        let mut member = Member::new("Ana", "Kovač", Vec::new());
        member.parent_id = Some(parent);
        repo.upsert(member).unwrap();

        assert_eq!(repo.get_by_parent(parent).unwrap().len(), 1);
    }

    #[test]
    fn test_save_and_reload() {
        let (temp_dir, repo) = create_test_repo();
        repo.load().unwrap();

        let member = Member::new("Ana", "Kovač", vec![ParentId::new()]);
        let id = member.id;
        repo.upsert(member).unwrap();
        repo.save().unwrap();

        let repo2 = MemberRepository::new(temp_dir.path().join("members.json"));
        repo2.load().unwrap();
        assert!(repo2.get(id).unwrap().is_some());
    }
}
