//! Audit logging for engine actions
//!
//! Imports, confirmations, deletions, and recurring generation leave an
//! append-only trail so operators can reconstruct what the engine did.

pub mod entry;
pub mod logger;

pub use entry::{AuditAction, AuditEntry};
pub use logger::AuditLogger;
