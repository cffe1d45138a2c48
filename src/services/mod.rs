//! Service layer for clubdues
//!
//! The engine proper: statement parsing, payer matching, allocation,
//! reconciliation orchestration, cascades, and recurring generation.
//! Services hold a borrowed `Storage` and keep all business rules out of
//! the models and repositories.

pub mod allocation;
pub mod cascade;
pub mod matcher;
pub mod parser;
pub mod reconciliation;
pub mod recurring;

pub use allocation::{auto_select, candidate_costs, validate, AllocationEntry};
pub use cascade::{CascadeOutcome, CascadeService};
pub use matcher::{match_payer, MatchInput, PayerMatch};
pub use parser::{parse_statement, ParsedStatement, ParsedTransaction};
pub use reconciliation::{
    AllocationSession, ImportSummary, NewPayment, ReconciliationService,
};
pub use recurring::RecurringService;
