//! Audit entry data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Engine actions recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A bank statement import completed
    StatementImported,
    /// A bank transaction was confirmed into a payment
    ImportConfirmed,
    /// A payment was recorded (manual or imported)
    PaymentCreated,
    /// A payment was deleted and its effects cascaded
    PaymentDeleted,
    /// A recurring template generated a cost instance
    CostGenerated,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StatementImported => write!(f, "statement_imported"),
            Self::ImportConfirmed => write!(f, "import_confirmed"),
            Self::PaymentCreated => write!(f, "payment_created"),
            Self::PaymentDeleted => write!(f, "payment_deleted"),
            Self::CostGenerated => write!(f, "cost_generated"),
        }
    }
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the action occurred (UTC)
    pub timestamp: DateTime<Utc>,

    /// The recorded action
    pub action: AuditAction,

    /// Human-readable description
    pub description: String,
}

impl AuditEntry {
    /// Create a new audit entry stamped now
    pub fn new(action: AuditAction, description: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_round_trip() {
        let entry = AuditEntry::new(AuditAction::ImportConfirmed, "Transaction confirmed");
        let json = serde_json::to_string(&entry).unwrap();
        let parsed: AuditEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.action, AuditAction::ImportConfirmed);
        assert_eq!(parsed.description, "Transaction confirmed");
    }
}
