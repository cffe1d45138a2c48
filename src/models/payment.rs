//! Payment and allocation models
//!
//! A payment is money collected from a parent; allocations assign portions
//! of a payment to specific costs. A confirmed payment's allocations must
//! sum exactly to its amount.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{AllocationId, CostId, ParentId, PaymentId, TransactionId};
use super::money::Money;

/// Status of a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Recorded but not yet allocated to costs
    #[default]
    Pending,
    /// Linked to costs but not finalized
    Allocated,
    /// Fully processed; allocations sum to the payment amount
    Confirmed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Allocated => write!(f, "Allocated"),
            Self::Confirmed => write!(f, "Confirmed"),
        }
    }
}

/// How a payment was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    BankTransfer,
    Cash,
    Card,
    Other,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BankTransfer => write!(f, "Bank transfer"),
            Self::Cash => write!(f, "Cash"),
            Self::Card => write!(f, "Card"),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// A payment collected from a parent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier
    pub id: PaymentId,

    /// The paying parent; None while the payment is unmatched
    pub parent_id: Option<ParentId>,

    /// Free-text payer name, used for display while `parent_id` is None
    #[serde(default)]
    pub payer_name: String,

    /// Payment amount
    pub amount: Money,

    /// Date the payment was made
    pub payment_date: NaiveDate,

    /// Payment method
    #[serde(default)]
    pub method: PaymentMethod,

    /// Optional bank or operator reference
    pub reference: Option<String>,

    /// Free-form notes
    #[serde(default)]
    pub notes: String,

    /// Whether this payment originated from a bank statement import
    #[serde(default)]
    pub imported_from_bank: bool,

    /// The bank transaction this payment was confirmed from, if any
    pub bank_transaction_id: Option<TransactionId>,

    /// Current status
    #[serde(default)]
    pub status: PaymentStatus,

    /// When the payment was created
    pub created_at: DateTime<Utc>,

    /// When the payment was last modified
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Create a new manual payment
    pub fn new(parent_id: Option<ParentId>, amount: Money, payment_date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new(),
            parent_id,
            payer_name: String::new(),
            amount,
            payment_date,
            method: PaymentMethod::BankTransfer,
            reference: None,
            notes: String::new(),
            imported_from_bank: false,
            bank_transaction_id: None,
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a payment confirmed from an imported bank transaction
    pub fn from_bank_transaction(
        parent_id: ParentId,
        amount: Money,
        payment_date: NaiveDate,
        transaction_id: TransactionId,
    ) -> Self {
        let mut payment = Self::new(Some(parent_id), amount, payment_date);
        payment.imported_from_bank = true;
        payment.bank_transaction_id = Some(transaction_id);
        payment
    }

    /// Whether the payment has a resolved payer
    pub fn is_matched(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Set the status
    pub fn set_status(&mut self, status: PaymentStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Validate the payment
    pub fn validate(&self) -> Result<(), String> {
        if !self.amount.is_positive() {
            return Err("Payment amount must be positive".into());
        }
        Ok(())
    }
}

/// The assignment of part or all of a payment's amount to a specific cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    /// Unique identifier
    pub id: AllocationId,

    /// The payment this allocation draws from
    pub payment_id: PaymentId,

    /// The cost this allocation covers
    pub cost_id: CostId,

    /// Allocated amount; never exceeds the cost's amount
    pub amount: Money,

    /// When the allocation was created
    pub created_at: DateTime<Utc>,
}

impl Allocation {
    /// Create a new allocation
    pub fn new(payment_id: PaymentId, cost_id: CostId, amount: Money) -> Self {
        Self {
            id: AllocationId::new(),
            payment_id,
            cost_id,
            amount,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_payment_defaults() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let payment = Payment::new(None, Money::from_cents(5000), date);

        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(!payment.imported_from_bank);
        assert!(!payment.is_matched());
    }

    #[test]
    fn test_from_bank_transaction() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let parent = ParentId::new();
        let txn = TransactionId::new();
        let payment = Payment::from_bank_transaction(parent, Money::from_cents(5000), date, txn);

        assert!(payment.imported_from_bank);
        assert_eq!(payment.bank_transaction_id, Some(txn));
        assert!(payment.is_matched());
    }

    #[test]
    fn test_validate_rejects_non_positive_amount() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let payment = Payment::new(None, Money::zero(), date);
        assert!(payment.validate().is_err());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&PaymentStatus::Confirmed).unwrap();
        assert_eq!(json, r#""confirmed""#);
        let method = serde_json::to_string(&PaymentMethod::BankTransfer).unwrap();
        assert_eq!(method, r#""bank_transfer""#);
    }
}
