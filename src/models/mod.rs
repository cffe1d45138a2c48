//! Core data models for clubdues
//!
//! All models are plain serde-serializable structs with strongly-typed IDs.
//! Business rules live in the service layer; models carry only their own
//! invariants (validation, derived flags).

pub mod cost;
pub mod ids;
pub mod member;
pub mod money;
pub mod payment;
pub mod statement;

pub use cost::{Cost, CostStatus, Recurrence, RecurrencePeriod};
pub use ids::{
    AllocationId, CostId, MemberId, ParentId, PaymentId, StatementId, TransactionId,
};
pub use member::{Member, MemberStatus, Parent};
pub use money::{Money, MoneyParseError};
pub use payment::{Allocation, Payment, PaymentMethod, PaymentStatus};
pub use statement::{
    BankStatement, BankTransaction, MatchConfidence, StatementStatus, TransactionStatus,
};
