//! Storage layer for clubdues
//!
//! Provides JSON file storage with atomic writes and in-memory repositories.
//! The in-memory state is the source of truth: every mutation lands in
//! memory synchronously and marks its repository dirty; `Storage::flush`
//! writes dirty repositories out. A failed write is logged and the
//! in-memory state is kept — the engine favors responsiveness over strict
//! write-through consistency, which is a documented gap.

pub mod allocations;
pub mod cost_types;
pub mod costs;
pub mod file_io;
pub mod members;
pub mod parents;
pub mod payments;
pub mod statements;
pub mod transactions;

pub use allocations::AllocationRepository;
pub use cost_types::CostTypeRepository;
pub use costs::CostRepository;
pub use file_io::{read_json, write_json_atomic};
pub use members::MemberRepository;
pub use parents::ParentRepository;
pub use payments::PaymentRepository;
pub use statements::StatementRepository;
pub use transactions::TransactionRepository;

use crate::audit::{AuditAction, AuditEntry, AuditLogger};
use crate::config::paths::DuesPaths;
use crate::error::{DuesError, DuesResult};

/// The entity families the engine persists
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntityKind {
    Parents,
    Members,
    Costs,
    Payments,
    Allocations,
    Statements,
    Transactions,
    CostTypes,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parents => write!(f, "parents"),
            Self::Members => write!(f, "members"),
            Self::Costs => write!(f, "costs"),
            Self::Payments => write!(f, "payments"),
            Self::Allocations => write!(f, "allocations"),
            Self::Statements => write!(f, "statements"),
            Self::Transactions => write!(f, "transactions"),
            Self::CostTypes => write!(f, "cost_types"),
        }
    }
}

/// Main storage coordinator that provides access to all repositories
pub struct Storage {
    paths: DuesPaths,
    audit: AuditLogger,
    pub parents: ParentRepository,
    pub members: MemberRepository,
    pub costs: CostRepository,
    pub payments: PaymentRepository,
    pub allocations: AllocationRepository,
    pub statements: StatementRepository,
    pub transactions: TransactionRepository,
    pub cost_types: CostTypeRepository,
}

impl Storage {
    /// Create a new Storage instance
    pub fn new(paths: DuesPaths) -> Result<Self, DuesError> {
        // Ensure directories exist
        paths.ensure_directories()?;

        Ok(Self {
            audit: AuditLogger::new(paths.audit_log()),
            parents: ParentRepository::new(paths.parents_file()),
            members: MemberRepository::new(paths.members_file()),
            costs: CostRepository::new(paths.costs_file()),
            payments: PaymentRepository::new(paths.payments_file()),
            allocations: AllocationRepository::new(paths.allocations_file()),
            statements: StatementRepository::new(paths.statements_file()),
            transactions: TransactionRepository::new(paths.transactions_file()),
            cost_types: CostTypeRepository::new(paths.cost_types_file()),
            paths,
        })
    }

    /// Get the paths configuration
    pub fn paths(&self) -> &DuesPaths {
        &self.paths
    }

    /// Load all data from disk
    pub fn load_all(&mut self) -> Result<(), DuesError> {
        self.parents.load()?;
        self.members.load()?;
        self.costs.load()?;
        self.payments.load()?;
        self.allocations.load()?;
        self.statements.load()?;
        self.transactions.load()?;
        self.cost_types.load()?;
        Ok(())
    }

    /// The repositories whose in-memory state has not been written yet
    pub fn pending_writes(&self) -> Vec<EntityKind> {
        let mut pending = Vec::new();
        if self.parents.is_dirty() {
            pending.push(EntityKind::Parents);
        }
        if self.members.is_dirty() {
            pending.push(EntityKind::Members);
        }
        if self.costs.is_dirty() {
            pending.push(EntityKind::Costs);
        }
        if self.payments.is_dirty() {
            pending.push(EntityKind::Payments);
        }
        if self.allocations.is_dirty() {
            pending.push(EntityKind::Allocations);
        }
        if self.statements.is_dirty() {
            pending.push(EntityKind::Statements);
        }
        if self.transactions.is_dirty() {
            pending.push(EntityKind::Transactions);
        }
        if self.cost_types.is_dirty() {
            pending.push(EntityKind::CostTypes);
        }
        pending
    }

    /// Write out every repository with pending changes.
    ///
    /// A failed write is logged and the repository stays queued for the
    /// next flush; the in-memory state is never reverted.
    pub fn flush(&self) {
        for kind in self.pending_writes() {
            let result = match kind {
                EntityKind::Parents => self.parents.save(),
                EntityKind::Members => self.members.save(),
                EntityKind::Costs => self.costs.save(),
                EntityKind::Payments => self.payments.save(),
                EntityKind::Allocations => self.allocations.save(),
                EntityKind::Statements => self.statements.save(),
                EntityKind::Transactions => self.transactions.save(),
                EntityKind::CostTypes => self.cost_types.save(),
            };
            if let Err(e) = result {
                log::error!("Failed to persist {}: {}", kind, e);
            }
        }
    }

    /// Remove a cost type, refusing while any cost still uses it
    pub fn remove_cost_type(&self, name: &str) -> DuesResult<()> {
        let in_use = self.costs.get_all()?.iter().any(|c| c.cost_type == name);
        if in_use {
            return Err(DuesError::Validation(format!(
                "Cost type '{}' is used by existing costs",
                name
            )));
        }
        self.cost_types.remove(name)
    }

    /// Record an engine action in the audit log. Audit failures are logged
    /// and never propagate.
    pub fn log_action(&self, action: AuditAction, description: impl Into<String>) {
        let entry = AuditEntry::new(action, description);
        if let Err(e) = self.audit.log(&entry) {
            log::warn!("Failed to write audit entry: {}", e);
        }
    }

    /// Read back the audit log (oldest first)
    pub fn audit_entries(&self) -> DuesResult<Vec<AuditEntry>> {
        self.audit.read_all()
    }

    /// Check if storage has been initialized (has any data)
    pub fn is_initialized(&self) -> bool {
        self.paths.settings_file().exists()
    }
}
