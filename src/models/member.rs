//! Member and parent (payer) models
//!
//! A parent is the billing-responsible party for one or more members. The
//! member side of the link is a normalized `parent_ids` list; a legacy
//! single `parent_id` field is still accepted on deserialization and folded
//! in through the `payer_ids` accessor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{MemberId, ParentId};

/// A parent responsible for paying member costs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parent {
    /// Unique identifier
    pub id: ParentId,

    /// First name
    pub first_name: String,

    /// Last name
    pub last_name: String,

    /// Contact email (empty if unknown)
    #[serde(default)]
    pub email: String,

    /// Contact phone (empty if unknown)
    #[serde(default)]
    pub phone: String,

    /// Bank account identifier (IBAN) used for high-confidence matching
    pub iban: Option<String>,

    /// When the parent was created
    pub created_at: DateTime<Utc>,

    /// When the parent was last modified
    pub updated_at: DateTime<Utc>,
}

impl Parent {
    /// Create a new parent
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ParentId::new(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: String::new(),
            phone: String::new(),
            iban: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a parent with a bank account identifier
    pub fn with_iban(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        iban: impl Into<String>,
    ) -> Self {
        let mut parent = Self::new(first_name, last_name);
        parent.iban = Some(iban.into());
        parent
    }

    /// Full display name
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Validate the parent
    pub fn validate(&self) -> Result<(), String> {
        if self.first_name.trim().is_empty() && self.last_name.trim().is_empty() {
            return Err("Parent name cannot be empty".into());
        }
        Ok(())
    }
}

impl fmt::Display for Parent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

/// Membership status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    #[default]
    Active,
    Inactive,
    Archived,
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Inactive => write!(f, "Inactive"),
            Self::Archived => write!(f, "Archived"),
        }
    }
}

/// A club member whose costs are billed to one or more parents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    /// Unique identifier
    pub id: MemberId,

    /// First name
    pub first_name: String,

    /// Last name
    pub last_name: String,

    /// Membership status
    #[serde(default)]
    pub status: MemberStatus,

    /// Free-form notes
    #[serde(default)]
    pub notes: String,

    /// All parents linked to this member
    #[serde(default)]
    pub parent_ids: Vec<ParentId>,

    /// Legacy single-parent field from older data files; read-only compat,
    /// folded into `payer_ids()` when `parent_ids` is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ParentId>,

    /// When the member was created
    pub created_at: DateTime<Utc>,

    /// When the member was last modified
    pub updated_at: DateTime<Utc>,
}

impl Member {
    /// Create a new member linked to the given parents
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        parent_ids: Vec<ParentId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: MemberId::new(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            status: MemberStatus::Active,
            notes: String::new(),
            parent_ids,
            parent_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Full display name
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// The member's payers, with the legacy single-parent field folded in.
    ///
    /// This is the only place the legacy shape is consumed; engine code
    /// always goes through this accessor.
    pub fn payer_ids(&self) -> Vec<ParentId> {
        if !self.parent_ids.is_empty() {
            self.parent_ids.clone()
        } else {
            self.parent_id.into_iter().collect()
        }
    }

    /// Whether this member is billed to the given parent
    pub fn is_linked_to(&self, parent_id: ParentId) -> bool {
        self.payer_ids().contains(&parent_id)
    }

    /// Validate the member
    pub fn validate(&self) -> Result<(), String> {
        if self.first_name.trim().is_empty() && self.last_name.trim().is_empty() {
            return Err("Member name cannot be empty".into());
        }
        Ok(())
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payer_ids_prefers_list() {
        let parent_a = ParentId::new();
        let parent_b = ParentId::new();
        let mut member = Member::new("Ana", "Kovač", vec![parent_a]);
        member.parent_id = Some(parent_b);

        // The normalized list wins over the legacy field
        assert_eq!(member.payer_ids(), vec![parent_a]);
    }

    #[test]
    fn test_payer_ids_falls_back_to_legacy_field() {
        let legacy_parent = ParentId::new();
        let mut member = Member::new("Ana", "Kovač", Vec::new());
        member.parent_id = Some(legacy_parent);

        assert_eq!(member.payer_ids(), vec![legacy_parent]);
        assert!(member.is_linked_to(legacy_parent));
    }

    #[test]
    fn test_legacy_field_deserializes() {
        let parent = ParentId::new();
        let json = format!(
            r#"{{
                "id": "{}",
                "first_name": "Jan",
                "last_name": "Novak",
                "parent_id": "{}",
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-01T00:00:00Z"
            }}"#,
            MemberId::new().as_uuid(),
            parent.as_uuid()
        );

        let member: Member = serde_json::from_str(&json).unwrap();
        assert_eq!(member.payer_ids(), vec![parent]);
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let member = Member::new("", "", Vec::new());
        assert!(member.validate().is_err());
    }

    #[test]
    fn test_parent_full_name() {
        let parent = Parent::new("Maja", "Horvat");
        assert_eq!(parent.full_name(), "Maja Horvat");
    }
}
