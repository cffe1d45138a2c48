//! Payment edit/delete cascades
//!
//! Removing or editing a payment invalidates derived state in two places:
//! the paid-state of every cost its allocations covered, and the match
//! status of the bank transaction it was confirmed from. Re-derivation runs
//! after every allocation-affecting mutation, not only on delete.

use chrono::NaiveDate;

use crate::audit::AuditAction;
use crate::error::{DuesError, DuesResult};
use crate::models::{
    CostId, CostStatus, Money, Payment, PaymentId, PaymentMethod, PaymentStatus, TransactionId,
};
use crate::storage::Storage;

/// What a cascade touched, reported back to the caller
#[derive(Debug, Clone, Default)]
pub struct CascadeOutcome {
    /// Costs that fell back from paid to pending
    pub reopened_costs: Vec<CostId>,
    /// The bank transaction whose confirmation was reverted, if any
    pub reverted_transaction: Option<TransactionId>,
}

/// Service for payment deletion and allocation-affecting edits
pub struct CascadeService<'a> {
    storage: &'a Storage,
}

impl<'a> CascadeService<'a> {
    /// Create a new cascade service
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Delete a payment and cascade: remove its allocations, re-derive the
    /// status of every cost they covered, revert the linked bank
    /// transaction, then delete the payment record itself.
    pub fn delete_payment(&self, payment_id: PaymentId) -> DuesResult<CascadeOutcome> {
        let payment = self
            .storage
            .payments
            .get(payment_id)?
            .ok_or_else(|| DuesError::payment_not_found(payment_id.to_string()))?;

        let removed = self.storage.allocations.delete_by_payment(payment_id)?;

        let mut touched: Vec<CostId> = removed.iter().map(|a| a.cost_id).collect();
        touched.sort();
        touched.dedup();

        let mut outcome = CascadeOutcome::default();
        for cost_id in touched {
            if self.rederive_cost_status(cost_id)? == Some(CostStatus::Pending) {
                outcome.reopened_costs.push(cost_id);
            }
        }

        outcome.reverted_transaction = self.revert_linked_transaction(&payment)?;

        self.storage.payments.delete(payment_id)?;
        self.storage.log_action(
            AuditAction::PaymentDeleted,
            format!(
                "Payment of {} deleted; {} cost(s) reopened",
                payment.amount,
                outcome.reopened_costs.len()
            ),
        );

        Ok(outcome)
    }

    /// Change a payment's amount. An amount change invalidates any existing
    /// allocation set, so allocations are dropped, the touched costs are
    /// re-derived, and the payment returns to pending for re-allocation.
    pub fn set_payment_amount(
        &self,
        payment_id: PaymentId,
        amount: Money,
    ) -> DuesResult<CascadeOutcome> {
        if !amount.is_positive() {
            return Err(DuesError::Validation("Payment amount must be positive".into()));
        }

        let mut payment = self
            .storage
            .payments
            .get(payment_id)?
            .ok_or_else(|| DuesError::payment_not_found(payment_id.to_string()))?;

        let mut outcome = CascadeOutcome::default();
        if payment.amount == amount {
            return Ok(outcome);
        }

        let removed = self.storage.allocations.delete_by_payment(payment_id)?;
        let mut touched: Vec<CostId> = removed.iter().map(|a| a.cost_id).collect();
        touched.sort();
        touched.dedup();

        for cost_id in touched {
            if self.rederive_cost_status(cost_id)? == Some(CostStatus::Pending) {
                outcome.reopened_costs.push(cost_id);
            }
        }

        payment.amount = amount;
        payment.set_status(PaymentStatus::Pending);
        self.storage.payments.upsert(payment)?;

        Ok(outcome)
    }

    /// Update non-allocation-affecting payment details. No re-derivation
    /// runs on this path.
    pub fn update_payment_details(
        &self,
        payment_id: PaymentId,
        payment_date: Option<NaiveDate>,
        method: Option<PaymentMethod>,
        reference: Option<Option<String>>,
        notes: Option<String>,
    ) -> DuesResult<()> {
        let mut payment = self
            .storage
            .payments
            .get(payment_id)?
            .ok_or_else(|| DuesError::payment_not_found(payment_id.to_string()))?;

        if let Some(date) = payment_date {
            payment.payment_date = date;
        }
        if let Some(method) = method {
            payment.method = method;
        }
        if let Some(reference) = reference {
            payment.reference = reference;
        }
        if let Some(notes) = notes {
            payment.notes = notes;
        }
        payment.updated_at = chrono::Utc::now();

        self.storage.payments.upsert(payment)
    }

    /// Re-derive a cost's status from the allocations that currently cover
    /// it: paid iff covered in full. Cancelled costs are left untouched.
    /// Returns the new status when it changed.
    pub fn rederive_cost_status(&self, cost_id: CostId) -> DuesResult<Option<CostStatus>> {
        let mut cost = self
            .storage
            .costs
            .get(cost_id)?
            .ok_or_else(|| DuesError::cost_not_found(cost_id.to_string()))?;

        if cost.status == CostStatus::Cancelled {
            return Ok(None);
        }

        let covered = self.storage.allocations.total_for_cost(cost_id)?;
        let derived = if covered >= cost.amount {
            CostStatus::Paid
        } else {
            CostStatus::Pending
        };

        if cost.status == derived {
            return Ok(None);
        }

        cost.set_status(derived);
        self.storage.costs.upsert(cost)?;
        Ok(Some(derived))
    }

    /// Revert the bank transaction a payment was confirmed from: clear the
    /// payment link and fall back to matched/unmatched by whether a payer
    /// is still identified. Returns the reverted transaction's id.
    fn revert_linked_transaction(
        &self,
        payment: &Payment,
    ) -> DuesResult<Option<TransactionId>> {
        let Some(transaction_id) = payment.bank_transaction_id else {
            return Ok(None);
        };

        // The transaction may be gone (its statement was deleted); that is
        // not an error on this path
        let Some(mut txn) = self.storage.transactions.get(transaction_id)? else {
            return Ok(None);
        };

        txn.status = txn.reverted_status();
        txn.payment_id = None;
        self.storage.transactions.upsert(txn)?;
        Ok(Some(transaction_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::paths::DuesPaths;
    use crate::models::{
        Allocation, BankTransaction, Cost, MatchConfidence, MemberId, ParentId, Payment,
        StatementId, TransactionStatus,
    };
    use tempfile::TempDir;

    fn create_test_storage() -> (TempDir, Storage) {
        let temp_dir = TempDir::new().unwrap();
        let paths = DuesPaths::with_base_dir(temp_dir.path().to_path_buf());
        let mut storage = Storage::new(paths).unwrap();
        storage.load_all().unwrap();
        (temp_dir, storage)
    }

    fn pending_cost(storage: &Storage, amount_cents: i64) -> Cost {
        let cost = Cost::new(
            MemberId::new(),
            "Fee",
            Money::from_cents(amount_cents),
            "training",
        );
        storage.costs.upsert(cost.clone()).unwrap();
        cost
    }

    fn payment(storage: &Storage, amount_cents: i64) -> Payment {
        let payment = Payment::new(
            Some(ParentId::new()),
            Money::from_cents(amount_cents),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        );
        storage.payments.upsert(payment.clone()).unwrap();
        payment
    }

    #[test]
    fn test_delete_reopens_partially_covered_cost() {
        // A 40.00 cost paid by two 20.00 allocations from different
        // payments; deleting one payment reopens the cost and leaves the
        // other allocation in place
        let (_temp_dir, storage) = create_test_storage();
        let service = CascadeService::new(&storage);

        let mut cost = pending_cost(&storage, 4000);
        let payment_a = payment(&storage, 2000);
        let payment_b = payment(&storage, 2000);

        storage
            .allocations
            .upsert(Allocation::new(payment_a.id, cost.id, Money::from_cents(2000)))
            .unwrap();
        storage
            .allocations
            .upsert(Allocation::new(payment_b.id, cost.id, Money::from_cents(2000)))
            .unwrap();
        cost.set_status(CostStatus::Paid);
        storage.costs.upsert(cost.clone()).unwrap();

        let outcome = service.delete_payment(payment_a.id).unwrap();

        assert_eq!(outcome.reopened_costs, vec![cost.id]);
        assert_eq!(
            storage.costs.get(cost.id).unwrap().unwrap().status,
            CostStatus::Pending
        );
        // The other payment's allocation survives
        let remaining = storage.allocations.get_by_cost(cost.id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].payment_id, payment_b.id);
        assert!(storage.payments.get(payment_a.id).unwrap().is_none());
    }

    #[test]
    fn test_delete_leaves_fully_covered_cost_paid() {
        // The cost stays paid when allocations from other payments still
        // cover its full amount
        let (_temp_dir, storage) = create_test_storage();
        let service = CascadeService::new(&storage);

        let mut cost = pending_cost(&storage, 2000);
        let payment_a = payment(&storage, 2000);
        let payment_b = payment(&storage, 2000);

        storage
            .allocations
            .upsert(Allocation::new(payment_a.id, cost.id, Money::from_cents(2000)))
            .unwrap();
        storage
            .allocations
            .upsert(Allocation::new(payment_b.id, cost.id, Money::from_cents(2000)))
            .unwrap();
        cost.set_status(CostStatus::Paid);
        storage.costs.upsert(cost.clone()).unwrap();

        let outcome = service.delete_payment(payment_a.id).unwrap();

        assert!(outcome.reopened_costs.is_empty());
        assert_eq!(
            storage.costs.get(cost.id).unwrap().unwrap().status,
            CostStatus::Paid
        );
    }

    #[test]
    fn test_delete_reverts_linked_transaction() {
        let (_temp_dir, storage) = create_test_storage();
        let service = CascadeService::new(&storage);

        let parent_id = ParentId::new();
        let mut txn = BankTransaction {
            id: TransactionId::new(),
            statement_id: StatementId::new(),
            booking_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            value_date: None,
            amount: Money::from_cents(4500),
            currency: "EUR".into(),
            payer_name: "NOVAK".into(),
            payer_iban: None,
            description: String::new(),
            bank_reference: Some("REF-1".into()),
            reference: None,
            bank_fee: Money::zero(),
            matched_parent_id: Some(parent_id),
            match_confidence: MatchConfidence::High,
            status: TransactionStatus::Confirmed,
            payment_id: None,
        };

        let mut pay = Payment::from_bank_transaction(
            parent_id,
            Money::from_cents(4500),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            txn.id,
        );
        pay.set_status(PaymentStatus::Confirmed);
        txn.payment_id = Some(pay.id);

        storage.transactions.upsert(txn.clone()).unwrap();
        storage.payments.upsert(pay.clone()).unwrap();

        let outcome = service.delete_payment(pay.id).unwrap();

        assert_eq!(outcome.reverted_transaction, Some(txn.id));
        let reverted = storage.transactions.get(txn.id).unwrap().unwrap();
        assert_eq!(reverted.status, TransactionStatus::Matched);
        assert!(reverted.payment_id.is_none());
    }

    #[test]
    fn test_delete_unknown_payment_is_not_found() {
        let (_temp_dir, storage) = create_test_storage();
        let service = CascadeService::new(&storage);

        let err = service.delete_payment(PaymentId::new()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_set_payment_amount_drops_allocations() {
        let (_temp_dir, storage) = create_test_storage();
        let service = CascadeService::new(&storage);

        let mut cost = pending_cost(&storage, 3000);
        let mut pay = payment(&storage, 3000);

        storage
            .allocations
            .upsert(Allocation::new(pay.id, cost.id, Money::from_cents(3000)))
            .unwrap();
        cost.set_status(CostStatus::Paid);
        storage.costs.upsert(cost.clone()).unwrap();
        pay.set_status(PaymentStatus::Confirmed);
        storage.payments.upsert(pay.clone()).unwrap();

        let outcome = service
            .set_payment_amount(pay.id, Money::from_cents(2500))
            .unwrap();

        assert_eq!(outcome.reopened_costs, vec![cost.id]);
        assert!(storage.allocations.get_by_payment(pay.id).unwrap().is_empty());

        let updated = storage.payments.get(pay.id).unwrap().unwrap();
        assert_eq!(updated.amount.cents(), 2500);
        assert_eq!(updated.status, PaymentStatus::Pending);
    }

    #[test]
    fn test_set_same_amount_is_noop() {
        let (_temp_dir, storage) = create_test_storage();
        let service = CascadeService::new(&storage);

        let cost = pending_cost(&storage, 3000);
        let pay = payment(&storage, 3000);
        storage
            .allocations
            .upsert(Allocation::new(pay.id, cost.id, Money::from_cents(3000)))
            .unwrap();

        service
            .set_payment_amount(pay.id, Money::from_cents(3000))
            .unwrap();

        assert_eq!(storage.allocations.get_by_payment(pay.id).unwrap().len(), 1);
    }

    #[test]
    fn test_rederive_does_not_resurrect_cancelled_cost() {
        let (_temp_dir, storage) = create_test_storage();
        let service = CascadeService::new(&storage);

        let mut cost = pending_cost(&storage, 3000);
        cost.set_status(CostStatus::Cancelled);
        storage.costs.upsert(cost.clone()).unwrap();

        assert_eq!(service.rederive_cost_status(cost.id).unwrap(), None);
        assert_eq!(
            storage.costs.get(cost.id).unwrap().unwrap().status,
            CostStatus::Cancelled
        );
    }
}
