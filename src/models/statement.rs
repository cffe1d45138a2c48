//! Bank statement and bank transaction models
//!
//! A bank statement is one imported camt.052 file; bank transactions are its
//! credit entries. Transactions move unmatched → matched → confirmed and are
//! reverted when the payment created from them is deleted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{ParentId, PaymentId, StatementId, TransactionId};
use super::money::Money;

/// Import status of a bank statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatementStatus {
    /// Import in progress
    #[default]
    Processing,
    /// Import finished
    Completed,
    /// Import aborted (malformed or incomplete document)
    Failed,
}

impl fmt::Display for StatementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processing => write!(f, "Processing"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// An imported bank statement file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankStatement {
    /// Unique identifier
    pub id: StatementId,

    /// Name of the imported file
    pub file_name: String,

    /// When the import ran
    pub imported_at: DateTime<Utc>,

    /// Import status
    #[serde(default)]
    pub status: StatementStatus,

    /// Number of transactions imported from this statement
    #[serde(default)]
    pub total_transactions: usize,

    /// Number of transactions matched to a parent
    #[serde(default)]
    pub matched_transactions: usize,

    /// Number of transactions left unmatched
    #[serde(default)]
    pub unmatched_transactions: usize,
}

impl BankStatement {
    /// Create a new statement record for an import that just started
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            id: StatementId::new(),
            file_name: file_name.into(),
            imported_at: Utc::now(),
            status: StatementStatus::Processing,
            total_transactions: 0,
            matched_transactions: 0,
            unmatched_transactions: 0,
        }
    }
}

/// Heuristic certainty of an automatic payer match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchConfidence {
    High,
    Medium,
    Low,
    #[default]
    None,
}

impl fmt::Display for MatchConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "High"),
            Self::Medium => write!(f, "Medium"),
            Self::Low => write!(f, "Low"),
            Self::None => write!(f, "None"),
        }
    }
}

/// Match status of a bank transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// No payer identified yet
    #[default]
    Unmatched,
    /// A payer has been identified (automatically or by an operator)
    Matched,
    /// A payment has been created from this transaction
    Confirmed,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmatched => write!(f, "Unmatched"),
            Self::Matched => write!(f, "Matched"),
            Self::Confirmed => write!(f, "Confirmed"),
        }
    }
}

/// One credit entry from an imported bank statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankTransaction {
    /// Unique identifier
    pub id: TransactionId,

    /// The statement this transaction was imported from
    pub statement_id: StatementId,

    /// Booking date
    pub booking_date: NaiveDate,

    /// Value date, when the bank supplies one
    pub value_date: Option<NaiveDate>,

    /// Credited amount
    pub amount: Money,

    /// Currency code as printed by the bank
    #[serde(default)]
    pub currency: String,

    /// Payer name as printed by the bank
    #[serde(default)]
    pub payer_name: String,

    /// Payer account identifier (IBAN), when supplied
    pub payer_iban: Option<String>,

    /// Remittance description text
    #[serde(default)]
    pub description: String,

    /// Bank-assigned reference used for de-duplication across re-imports.
    /// Entries the bank supplies no reference for get a generated id and
    /// cannot be de-duplicated.
    pub bank_reference: Option<String>,

    /// Creditor/remittance reference, when supplied
    pub reference: Option<String>,

    /// Bank fee charged on this entry
    #[serde(default)]
    pub bank_fee: Money,

    /// The parent this transaction was matched to
    pub matched_parent_id: Option<ParentId>,

    /// Confidence of the automatic match
    #[serde(default)]
    pub match_confidence: MatchConfidence,

    /// Match status
    #[serde(default)]
    pub status: TransactionStatus,

    /// The payment created from this transaction, once confirmed
    pub payment_id: Option<PaymentId>,
}

impl BankTransaction {
    /// The status this transaction falls back to when its payment link is
    /// removed: matched while a payer is still identified, else unmatched.
    pub fn reverted_status(&self) -> TransactionStatus {
        if self.matched_parent_id.is_some() {
            TransactionStatus::Matched
        } else {
            TransactionStatus::Unmatched
        }
    }
}
