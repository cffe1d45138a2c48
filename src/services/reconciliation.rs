//! Reconciliation coordinator
//!
//! Orchestrates the import flow: parse a statement, de-duplicate against
//! already-imported transactions, run the payer matcher, and persist
//! transaction records. Confirming a transaction creates a payment and
//! opens an allocation session; manual payments join the same session flow
//! without a transaction link.
//!
//! An [`AllocationSession`] carries a rollback flag fixed synchronously at
//! creation: cancelling a session over a payment this flow just created
//! deletes the uncommitted payment and reverts the linked transaction to
//! its pre-confirmation status. Committing consumes the session, so a
//! commit and a late cancel can never both fire for one payment.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::audit::AuditAction;
use crate::error::{DuesError, DuesResult};
use crate::models::{
    Allocation, BankStatement, BankTransaction, Cost, CostId, MatchConfidence, Money, ParentId,
    Payment, PaymentId, PaymentMethod, PaymentStatus, StatementId, StatementStatus, TransactionId,
    TransactionStatus,
};
use crate::storage::Storage;

use super::allocation::{self, AllocationEntry};
use super::cascade::{CascadeOutcome, CascadeService};
use super::matcher::{match_payer, MatchInput};
use super::parser::parse_statement;

/// Result of a statement import
#[derive(Debug, Clone)]
pub struct ImportSummary {
    /// The created statement record
    pub statement_id: StatementId,
    /// Newly imported transactions
    pub total: usize,
    /// Newly imported transactions matched to a parent
    pub matched: usize,
    /// Newly imported transactions left unmatched
    pub unmatched: usize,
    /// Entries skipped because their bank reference was already imported
    pub skipped: usize,
}

/// Input for recording a manual payment
#[derive(Debug, Clone)]
pub struct NewPayment {
    /// The paying parent, when known
    pub parent_id: Option<ParentId>,
    /// Free-text payer name for unmatched payments
    pub payer_name: Option<String>,
    /// Payment amount
    pub amount: Money,
    /// Date the payment was made
    pub payment_date: NaiveDate,
    /// Payment method
    pub method: PaymentMethod,
    /// Optional reference
    pub reference: Option<String>,
    /// Optional notes
    pub notes: Option<String>,
}

/// Service orchestrating statement import and payment confirmation
pub struct ReconciliationService<'a> {
    storage: &'a Storage,
}

impl<'a> ReconciliationService<'a> {
    /// Create a new reconciliation service
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Import a bank statement file.
    ///
    /// Creates the statement record, parses the document, skips entries
    /// whose bank reference was already imported, matches the rest and
    /// persists them. A parse failure marks the statement failed and
    /// leaves previously imported data untouched.
    pub fn import_statement(&self, file_name: &str, xml: &str) -> DuesResult<ImportSummary> {
        let mut statement = BankStatement::new(file_name);
        let statement_id = statement.id;
        self.storage.statements.upsert(statement.clone())?;

        let parsed = match parse_statement(xml) {
            Ok(parsed) => parsed,
            Err(e) => {
                statement.status = StatementStatus::Failed;
                self.storage.statements.upsert(statement)?;
                return Err(e);
            }
        };

        let parents = self.storage.parents.get_all()?;
        let members = self.storage.members.get_all()?;

        let mut matched = 0;
        let mut unmatched = 0;
        let mut skipped = 0;

        for txn in &parsed.transactions {
            // Idempotent re-import: an already-known bank reference is the
            // same physical transaction
            if self
                .storage
                .transactions
                .find_by_bank_reference(&txn.reference_id)?
                .is_some()
            {
                skipped += 1;
                continue;
            }

            if txn.reference_generated {
                log::warn!(
                    "Statement entry of {} on {} carries no bank reference; a re-import would duplicate it",
                    txn.amount,
                    txn.booking_date
                );
            }

            let result = match_payer(MatchInput::from(txn), &parents, &members);
            let status = if result.is_match() {
                matched += 1;
                TransactionStatus::Matched
            } else {
                unmatched += 1;
                TransactionStatus::Unmatched
            };

            self.storage.transactions.upsert(BankTransaction {
                id: TransactionId::new(),
                statement_id,
                booking_date: txn.booking_date,
                value_date: txn.value_date,
                amount: txn.amount,
                currency: txn.currency.clone(),
                payer_name: txn.payer_name.clone(),
                payer_iban: txn.payer_iban.clone(),
                description: txn.description.clone(),
                bank_reference: Some(txn.reference_id.clone()),
                reference: txn.creditor_reference.clone(),
                bank_fee: txn.bank_fee,
                matched_parent_id: result.parent_id,
                match_confidence: result.confidence,
                status,
                payment_id: None,
            })?;
        }

        statement.status = StatementStatus::Completed;
        statement.total_transactions = matched + unmatched;
        statement.matched_transactions = matched;
        statement.unmatched_transactions = unmatched;
        self.storage.statements.upsert(statement)?;

        log::info!(
            "Imported {}: {} new ({} matched, {} unmatched), {} skipped",
            file_name,
            matched + unmatched,
            matched,
            unmatched,
            skipped
        );
        self.storage.log_action(
            AuditAction::StatementImported,
            format!("{}: {} transactions imported", file_name, matched + unmatched),
        );

        Ok(ImportSummary {
            statement_id,
            total: matched + unmatched,
            matched,
            unmatched,
            skipped,
        })
    }

    /// Operator override of a transaction's payer match. A manually picked
    /// payer counts as low confidence; clearing the payer clears the match.
    pub fn set_transaction_match(
        &self,
        transaction_id: TransactionId,
        parent_id: Option<ParentId>,
    ) -> DuesResult<()> {
        let mut txn = self
            .storage
            .transactions
            .get(transaction_id)?
            .ok_or_else(|| DuesError::transaction_not_found(transaction_id.to_string()))?;

        if txn.status == TransactionStatus::Confirmed {
            return Err(DuesError::Validation(
                "Cannot change the match of a confirmed transaction".into(),
            ));
        }

        if let Some(parent_id) = parent_id {
            self.storage
                .parents
                .get(parent_id)?
                .ok_or_else(|| DuesError::parent_not_found(parent_id.to_string()))?;
        }

        txn.matched_parent_id = parent_id;
        txn.match_confidence = if parent_id.is_some() {
            MatchConfidence::Low
        } else {
            MatchConfidence::None
        };
        txn.status = if parent_id.is_some() {
            TransactionStatus::Matched
        } else {
            TransactionStatus::Unmatched
        };

        let statement_id = txn.statement_id;
        self.storage.transactions.upsert(txn)?;
        self.refresh_statement_counters(statement_id)
    }

    /// Confirm a matched transaction: create the linked pending payment and
    /// open an allocation session with rollback armed.
    pub fn confirm_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> DuesResult<AllocationSession<'a>> {
        let mut txn = self
            .storage
            .transactions
            .get(transaction_id)?
            .ok_or_else(|| DuesError::transaction_not_found(transaction_id.to_string()))?;

        if txn.status == TransactionStatus::Confirmed {
            return Err(DuesError::Validation("Transaction is already confirmed".into()));
        }
        let parent_id = txn.matched_parent_id.ok_or_else(|| {
            DuesError::Validation("Transaction has no matched payer to confirm".into())
        })?;

        let mut payment =
            Payment::from_bank_transaction(parent_id, txn.amount, txn.booking_date, txn.id);
        payment.reference = txn.reference.clone();
        payment.payer_name = txn.payer_name.clone();
        if !txn.description.is_empty() {
            payment.notes = format!("Bank statement payment: {}", txn.description);
        }

        txn.status = TransactionStatus::Confirmed;
        txn.payment_id = Some(payment.id);

        self.storage.payments.upsert(payment.clone())?;
        self.storage.transactions.upsert(txn)?;
        self.storage.log_action(
            AuditAction::ImportConfirmed,
            format!("Transaction confirmed into payment of {}", payment.amount),
        );

        Ok(AllocationSession {
            storage: self.storage,
            payment_id: payment.id,
            fresh: true,
        })
    }

    /// Record a manual payment. When the payment has a resolved payer an
    /// allocation session is opened immediately (with rollback armed, the
    /// same as the import flow); an unmatched payment stays pending until
    /// an operator opens allocation for it later.
    pub fn record_manual_payment(
        &self,
        input: NewPayment,
    ) -> DuesResult<(Payment, Option<AllocationSession<'a>>)> {
        if !input.amount.is_positive() {
            return Err(DuesError::Validation("Payment amount must be positive".into()));
        }
        if let Some(parent_id) = input.parent_id {
            self.storage
                .parents
                .get(parent_id)?
                .ok_or_else(|| DuesError::parent_not_found(parent_id.to_string()))?;
        }

        let mut payment = Payment::new(input.parent_id, input.amount, input.payment_date);
        payment.method = input.method;
        payment.reference = input.reference;
        if let Some(payer_name) = input.payer_name {
            payment.payer_name = payer_name;
        }
        if let Some(notes) = input.notes {
            payment.notes = notes;
        }

        self.storage.payments.upsert(payment.clone())?;
        self.storage.log_action(
            AuditAction::PaymentCreated,
            format!("Manual payment of {} recorded", payment.amount),
        );

        let session = payment.parent_id.map(|_| AllocationSession {
            storage: self.storage,
            payment_id: payment.id,
            fresh: true,
        });

        Ok((payment, session))
    }

    /// Open an allocation session over an existing payment. Rollback stays
    /// disarmed: cancelling this session leaves the payment in place.
    pub fn open_allocation(&self, payment_id: PaymentId) -> DuesResult<AllocationSession<'a>> {
        self.storage
            .payments
            .get(payment_id)?
            .ok_or_else(|| DuesError::payment_not_found(payment_id.to_string()))?;

        Ok(AllocationSession {
            storage: self.storage,
            payment_id,
            fresh: false,
        })
    }

    /// Delete a statement and the transactions imported from it. Payments
    /// already confirmed from those transactions survive with their
    /// transaction link cleared.
    pub fn delete_statement(&self, statement_id: StatementId) -> DuesResult<usize> {
        self.storage
            .statements
            .get(statement_id)?
            .ok_or_else(|| DuesError::statement_not_found(statement_id.to_string()))?;

        let transactions = self.storage.transactions.get_by_statement(statement_id)?;
        let count = transactions.len();

        for txn in transactions {
            if let Some(payment_id) = txn.payment_id {
                if let Some(mut payment) = self.storage.payments.get(payment_id)? {
                    payment.bank_transaction_id = None;
                    self.storage.payments.upsert(payment)?;
                }
            }
            self.storage.transactions.delete(txn.id)?;
        }

        self.storage.statements.delete(statement_id)?;
        Ok(count)
    }

    /// Recompute a statement's matched/unmatched counters from its
    /// transactions
    fn refresh_statement_counters(&self, statement_id: StatementId) -> DuesResult<()> {
        let Some(mut statement) = self.storage.statements.get(statement_id)? else {
            return Ok(());
        };

        let transactions = self.storage.transactions.get_by_statement(statement_id)?;
        let matched = transactions
            .iter()
            .filter(|t| t.matched_parent_id.is_some())
            .count();
        statement.matched_transactions = matched;
        statement.unmatched_transactions = transactions.len() - matched;
        self.storage.statements.upsert(statement)
    }
}

/// An open allocation dialog over one payment.
///
/// The `fresh` flag is the synchronous rollback decision of the
/// confirm/cancel race: it is fixed when the session is created and
/// consulted only by `cancel`, and both `commit` and `cancel` consume the
/// session.
pub struct AllocationSession<'a> {
    storage: &'a Storage,
    payment_id: PaymentId,
    fresh: bool,
}

impl<'a> std::fmt::Debug for AllocationSession<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocationSession")
            .field("payment_id", &self.payment_id)
            .field("fresh", &self.fresh)
            .finish_non_exhaustive()
    }
}

impl<'a> AllocationSession<'a> {
    /// The payment under allocation
    pub fn payment_id(&self) -> PaymentId {
        self.payment_id
    }

    /// Whether cancelling this session rolls the payment back
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Load the payment under allocation
    pub fn payment(&self) -> DuesResult<Payment> {
        self.storage
            .payments
            .get(self.payment_id)?
            .ok_or_else(|| DuesError::payment_not_found(self.payment_id.to_string()))
    }

    /// Candidate costs for this payment, optionally narrowed by a payer the
    /// operator picked for an unmatched payment
    pub fn candidates(&self, link_parent: Option<ParentId>) -> DuesResult<Vec<Cost>> {
        let payment = self.payment()?;
        allocation::candidate_costs(self.storage, &payment, link_parent)
    }

    /// Greedy auto-selection over the candidate costs
    pub fn auto_select(&self, link_parent: Option<ParentId>) -> DuesResult<Vec<AllocationEntry>> {
        let payment = self.payment()?;
        let candidates = allocation::candidate_costs(self.storage, &payment, link_parent)?;
        Ok(allocation::auto_select(payment.amount, &candidates))
    }

    /// Commit the allocation set: validate the exact sum, replace the
    /// payment's allocations, re-derive every touched cost's paid state and
    /// confirm the payment. An unmatched payment must be linked to a payer
    /// through `link_parent`.
    pub fn commit(
        self,
        entries: &[AllocationEntry],
        link_parent: Option<ParentId>,
    ) -> DuesResult<Payment> {
        let mut payment = self.payment()?;

        let payer = payment.parent_id.or(link_parent).ok_or_else(|| {
            DuesError::Validation("Payment must be linked to a payer before allocation".into())
        })?;
        if payment.parent_id.is_none() {
            self.storage
                .parents
                .get(payer)?
                .ok_or_else(|| DuesError::parent_not_found(payer.to_string()))?;
        }

        allocation::validate(payment.amount, entries)?;

        // Validate everything before touching state, so a rejected commit
        // leaves the previous allocation set intact
        let own: HashMap<CostId, Money> = self
            .storage
            .allocations
            .get_by_payment(payment.id)?
            .into_iter()
            .fold(HashMap::new(), |mut map, a| {
                *map.entry(a.cost_id).or_insert_with(Money::zero) += a.amount;
                map
            });

        let mut planned: HashMap<CostId, Money> =
            HashMap::new();
        for entry in entries {
            if !entry.amount.is_positive() {
                return Err(DuesError::Validation("Allocated amounts must be positive".into()));
            }
            *planned.entry(entry.cost_id).or_insert_with(Money::zero) += entry.amount;
        }

        for (&cost_id, &amount) in &planned {
            let cost = self
                .storage
                .costs
                .get(cost_id)?
                .ok_or_else(|| DuesError::cost_not_found(cost_id.to_string()))?;

            // The allocations covering a cost never exceed its amount; this
            // payment's previous allocations are about to be replaced, so
            // only other payments' coverage counts
            let others = self.storage.allocations.total_for_cost(cost_id)?
                - own.get(&cost_id).copied().unwrap_or_else(Money::zero);
            if others + amount > cost.amount {
                return Err(DuesError::Validation(format!(
                    "Allocation of {} exceeds the open amount of '{}'",
                    amount, cost.title
                )));
            }
        }

        // Replace any allocation set committed earlier for this payment
        let removed = self.storage.allocations.delete_by_payment(payment.id)?;
        let mut touched: Vec<CostId> = removed.iter().map(|a| a.cost_id).collect();

        for entry in entries {
            self.storage
                .allocations
                .upsert(Allocation::new(payment.id, entry.cost_id, entry.amount))?;
            touched.push(entry.cost_id);
        }

        touched.sort();
        touched.dedup();
        let cascade = CascadeService::new(self.storage);
        for cost_id in touched {
            cascade.rederive_cost_status(cost_id)?;
        }

        payment.parent_id = Some(payer);
        payment.set_status(PaymentStatus::Confirmed);
        self.storage.payments.upsert(payment.clone())?;

        Ok(payment)
    }

    /// Close the session without committing. For a freshly created payment
    /// this rolls back: the payment is deleted through the cascade path,
    /// which also reverts the linked transaction to matched/unmatched.
    /// Cancelling a session over a pre-existing payment is a no-op.
    pub fn cancel(self) -> DuesResult<Option<CascadeOutcome>> {
        if !self.fresh {
            return Ok(None);
        }

        let cascade = CascadeService::new(self.storage);
        Ok(Some(cascade.delete_payment(self.payment_id)?))
    }
}
