//! Obligation allocation
//!
//! Selects and validates the set of costs a payment covers. Auto-selection
//! is a deterministic greedy bin-fill over the candidate list in due-date
//! order, not an optimal subset-sum solver: it may leave a partial amount
//! on the last cost it touches. Validation accepts only an exact sum.

use std::cmp::Ordering;

use crate::error::{DuesError, DuesResult};
use crate::models::{Cost, CostId, Money, ParentId, Payment};
use crate::storage::Storage;

/// One proposed assignment of part of a payment to a cost
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationEntry {
    /// The cost to cover
    pub cost_id: CostId,
    /// Amount to allocate, never above the cost's amount
    pub amount: Money,
}

impl AllocationEntry {
    /// Create a new allocation entry
    pub fn new(cost_id: CostId, amount: Money) -> Self {
        Self { cost_id, amount }
    }
}

/// Due-date ascending with undated costs last; ties keep creation order
fn due_date_order(a: &Cost, b: &Cost) -> Ordering {
    match (a.due_date, b.due_date) {
        (None, None) => a.created_at.cmp(&b.created_at),
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(da), Some(db)) => da.cmp(&db).then(a.created_at.cmp(&b.created_at)),
    }
}

/// The costs a payment may be allocated against: pending costs of members
/// linked to the resolved payer, or every pending cost while no payer is
/// resolved (the operator links a payer before committing, which narrows
/// the pool). Sorted by due date ascending, undated last.
pub fn candidate_costs(
    storage: &Storage,
    payment: &Payment,
    link_parent: Option<ParentId>,
) -> DuesResult<Vec<Cost>> {
    let payer = payment.parent_id.or(link_parent);

    let mut candidates: Vec<Cost> = match payer {
        Some(parent_id) => {
            let members = storage.members.get_by_parent(parent_id)?;
            let mut costs = Vec::new();
            for member in &members {
                costs.extend(
                    storage
                        .costs
                        .get_by_member(member.id)?
                        .into_iter()
                        .filter(|c| c.is_pending()),
                );
            }
            costs
        }
        None => storage
            .costs
            .get_all()?
            .into_iter()
            .filter(|c| c.is_pending())
            .collect(),
    };

    candidates.sort_by(due_date_order);
    Ok(candidates)
}

/// Greedily select costs, in the given order, until the payment amount is
/// used up. The final selected cost may receive a partial amount.
pub fn auto_select(payment_amount: Money, candidates: &[Cost]) -> Vec<AllocationEntry> {
    let mut entries = Vec::new();
    let mut remaining = payment_amount;

    for cost in candidates {
        if !remaining.is_positive() {
            break;
        }
        let amount = cost.amount.min(remaining);
        entries.push(AllocationEntry::new(cost.id, amount));
        remaining -= amount;
    }

    entries
}

/// Accept a proposed allocation set only when it sums exactly to the
/// payment amount. Over- and under-allocation both fail with `Mismatch`;
/// the error carries both sums so the caller can word the message.
pub fn validate(payment_amount: Money, entries: &[AllocationEntry]) -> DuesResult<()> {
    let allocated: Money = entries.iter().map(|e| e.amount).sum();

    if allocated == payment_amount {
        Ok(())
    } else {
        Err(DuesError::Mismatch {
            payment: payment_amount,
            allocated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MemberId, Money};
    use chrono::NaiveDate;

    fn cost(amount_cents: i64, due: Option<(i32, u32, u32)>) -> Cost {
        let mut cost = Cost::new(
            MemberId::new(),
            "Fee",
            Money::from_cents(amount_cents),
            "training",
        );
        cost.due_date = due.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap());
        cost
    }

    #[test]
    fn test_auto_select_due_date_order() {
        // 30.00 due 2024-01-10, 20.00 due 2024-01-20, 50.00 undated;
        // a 50.00 payment covers the two dated costs and leaves the
        // undated one untouched
        let mut candidates = vec![
            cost(3000, Some((2024, 1, 10))),
            cost(2000, Some((2024, 1, 20))),
            cost(5000, None),
        ];
        candidates.sort_by(due_date_order);

        let entries = auto_select(Money::from_cents(5000), &candidates);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].cost_id, candidates[0].id);
        assert_eq!(entries[0].amount.cents(), 3000);
        assert_eq!(entries[1].cost_id, candidates[1].id);
        assert_eq!(entries[1].amount.cents(), 2000);
    }

    #[test]
    fn test_auto_select_partial_on_last_cost() {
        let candidates = vec![cost(3000, Some((2024, 1, 10))), cost(4000, Some((2024, 1, 20)))];

        let entries = auto_select(Money::from_cents(5000), &candidates);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].amount.cents(), 2000);
    }

    #[test]
    fn test_auto_select_stops_at_exact_zero() {
        let candidates = vec![cost(5000, Some((2024, 1, 10))), cost(2000, Some((2024, 1, 20)))];

        let entries = auto_select(Money::from_cents(5000), &candidates);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount.cents(), 5000);
    }

    #[test]
    fn test_undated_costs_sort_last() {
        let mut candidates = vec![
            cost(1000, None),
            cost(2000, Some((2024, 2, 1))),
            cost(3000, Some((2024, 1, 1))),
        ];
        candidates.sort_by(due_date_order);

        assert_eq!(candidates[0].amount.cents(), 3000);
        assert_eq!(candidates[1].amount.cents(), 2000);
        assert_eq!(candidates[2].amount.cents(), 1000);
    }

    #[test]
    fn test_validate_exact_sum() {
        let entries = vec![
            AllocationEntry::new(CostId::new(), Money::from_cents(3000)),
            AllocationEntry::new(CostId::new(), Money::from_cents(2000)),
        ];
        assert!(validate(Money::from_cents(5000), &entries).is_ok());
    }

    #[test]
    fn test_validate_under_allocation() {
        let entries = vec![AllocationEntry::new(CostId::new(), Money::from_cents(3000))];
        let err = validate(Money::from_cents(5000), &entries).unwrap_err();

        assert!(matches!(err, DuesError::Mismatch { .. }));
        assert!(!err.is_over_allocated());
    }

    #[test]
    fn test_validate_over_allocation() {
        let entries = vec![AllocationEntry::new(CostId::new(), Money::from_cents(6000))];
        let err = validate(Money::from_cents(5000), &entries).unwrap_err();

        assert!(matches!(err, DuesError::Mismatch { .. }));
        assert!(err.is_over_allocated());
    }

    #[test]
    fn test_validate_empty_set_fails_for_positive_payment() {
        let err = validate(Money::from_cents(5000), &[]).unwrap_err();
        assert!(matches!(err, DuesError::Mismatch { .. }));
    }
}
