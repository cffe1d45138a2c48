//! Custom error types for clubdues
//!
//! This module defines the error hierarchy for the engine using thiserror
//! for ergonomic error definitions.

use thiserror::Error;

use crate::models::Money;

/// The main error type for clubdues operations
#[derive(Error, Debug)]
pub enum DuesError {
    /// Malformed statement document (not well-formed XML)
    #[error("Invalid statement format: {0}")]
    Format(String),

    /// Recognizable statement document missing required elements
    #[error("Statement schema error: {0}")]
    Schema(String),

    /// Allocation sum does not equal the payment amount
    #[error("Allocation mismatch: payment is {payment}, allocated {allocated}")]
    Mismatch { payment: Money, allocated: Money },

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Duplicate entity errors
    #[error("{entity_type} already exists: {identifier}")]
    Duplicate {
        entity_type: &'static str,
        identifier: String,
    },

    /// Validation errors for data models
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),
}

impl DuesError {
    /// Create a "not found" error for parents
    pub fn parent_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Parent",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for members
    pub fn member_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Member",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for costs
    pub fn cost_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Cost",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for payments
    pub fn payment_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Payment",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for bank transactions
    pub fn transaction_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "BankTransaction",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for bank statements
    pub fn statement_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "BankStatement",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// For a `Mismatch` error, whether the proposed allocations exceed the
    /// payment amount. Over- and under-allocation are the same error kind;
    /// callers word the message differently.
    pub fn is_over_allocated(&self) -> bool {
        matches!(self, Self::Mismatch { payment, allocated } if allocated > payment)
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for DuesError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DuesError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for clubdues operations
pub type DuesResult<T> = Result<T, DuesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DuesError::Format("unexpected end of document".into());
        assert_eq!(
            err.to_string(),
            "Invalid statement format: unexpected end of document"
        );
    }

    #[test]
    fn test_not_found_error() {
        let err = DuesError::payment_not_found("pay-1234");
        assert_eq!(err.to_string(), "Payment not found: pay-1234");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_mismatch_direction() {
        let over = DuesError::Mismatch {
            payment: Money::from_cents(5000),
            allocated: Money::from_cents(6000),
        };
        assert!(over.is_over_allocated());

        let under = DuesError::Mismatch {
            payment: Money::from_cents(5000),
            allocated: Money::from_cents(3000),
        };
        assert!(!under.is_over_allocated());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let dues_err: DuesError = io_err.into();
        assert!(matches!(dues_err, DuesError::Io(_)));
    }
}
