//! Cost (obligation) model
//!
//! A cost is an amount owed by a member. Recurring costs come in two shapes:
//! templates carry a `recurrence` definition, and generated instances carry
//! the originating `recurring_template_id` instead.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{CostId, MemberId};
use super::money::Money;

/// Status of a cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CostStatus {
    /// Open, awaiting payment
    #[default]
    Pending,
    /// Fully covered by allocations
    Paid,
    /// Cancelled by an operator; excluded from allocation and dunning
    Cancelled,
}

impl fmt::Display for CostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Paid => write!(f, "Paid"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// How often a recurring cost template generates instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrencePeriod {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl RecurrencePeriod {
    /// Number of months one step advances, for month-based periods
    pub fn months(&self) -> Option<u32> {
        match self {
            Self::Monthly => Some(1),
            Self::Quarterly => Some(3),
            Self::Yearly => Some(12),
            Self::Weekly => None,
        }
    }
}

impl fmt::Display for RecurrencePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weekly => write!(f, "Weekly"),
            Self::Monthly => write!(f, "Monthly"),
            Self::Quarterly => write!(f, "Quarterly"),
            Self::Yearly => write!(f, "Yearly"),
        }
    }
}

/// Recurrence definition carried by cost templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recurrence {
    /// Generation period
    pub period: RecurrencePeriod,

    /// First date instances may be generated for
    pub start_date: NaiveDate,

    /// Last date instances may be generated for (None = unbounded)
    pub end_date: Option<NaiveDate>,

    /// Anchor day-of-month for monthly/quarterly templates; clamped to the
    /// target month's length when the month is shorter
    pub day_of_month: Option<u32>,
}

/// An amount owed by a member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cost {
    /// Unique identifier
    pub id: CostId,

    /// The member who owes this cost
    pub member_id: MemberId,

    /// Short title, e.g. "Training fee - March 2024"
    pub title: String,

    /// Longer description
    #[serde(default)]
    pub description: String,

    /// Amount owed; immutable once created (changes are modeled as edits
    /// creating replacement costs, never as mutation of paid costs)
    pub amount: Money,

    /// Cost category name (training fee, equipment, membership, ...)
    pub cost_type: String,

    /// Optional due date
    pub due_date: Option<NaiveDate>,

    /// Current status
    #[serde(default)]
    pub status: CostStatus,

    /// Recurrence definition; present only on templates
    pub recurrence: Option<Recurrence>,

    /// The template this cost was generated from; present only on
    /// generated instances
    pub recurring_template_id: Option<CostId>,

    /// When the cost was created
    pub created_at: DateTime<Utc>,

    /// When the cost was last modified
    pub updated_at: DateTime<Utc>,
}

impl Cost {
    /// Create a new one-off cost
    pub fn new(
        member_id: MemberId,
        title: impl Into<String>,
        amount: Money,
        cost_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: CostId::new(),
            member_id,
            title: title.into(),
            description: String::new(),
            amount,
            cost_type: cost_type.into(),
            due_date: None,
            status: CostStatus::Pending,
            recurrence: None,
            recurring_template_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a recurring cost template
    pub fn template(
        member_id: MemberId,
        title: impl Into<String>,
        amount: Money,
        cost_type: impl Into<String>,
        recurrence: Recurrence,
    ) -> Self {
        let mut cost = Self::new(member_id, title, amount, cost_type);
        cost.recurrence = Some(recurrence);
        cost
    }

    /// Set the due date (builder style)
    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Whether this cost is a recurring template (and not itself a
    /// generated instance)
    pub fn is_template(&self) -> bool {
        self.recurrence.is_some() && self.recurring_template_id.is_none()
    }

    /// Whether this cost was generated from a template
    pub fn is_generated(&self) -> bool {
        self.recurring_template_id.is_some()
    }

    /// Whether this cost is open for allocation
    pub fn is_pending(&self) -> bool {
        self.status == CostStatus::Pending
    }

    /// Whether this cost is overdue as of the given date
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_pending() && self.due_date.is_some_and(|due| due < today)
    }

    /// Set the status
    pub fn set_status(&mut self, status: CostStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Validate the cost
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Cost title cannot be empty".into());
        }
        if !self.amount.is_positive() {
            return Err("Cost amount must be positive".into());
        }
        if self.cost_type.trim().is_empty() {
            return Err("Cost type cannot be empty".into());
        }
        if let Some(recurrence) = &self.recurrence {
            if let Some(day) = recurrence.day_of_month {
                if !(1..=31).contains(&day) {
                    return Err(format!("Invalid recurrence day of month: {}", day));
                }
            }
            if let Some(end) = recurrence.end_date {
                if end < recurrence.start_date {
                    return Err("Recurrence end date is before its start date".into());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monthly(day: u32) -> Recurrence {
        Recurrence {
            period: RecurrencePeriod::Monthly,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: None,
            day_of_month: Some(day),
        }
    }

    #[test]
    fn test_template_detection() {
        let member = MemberId::new();
        let template = Cost::template(
            member,
            "Training fee",
            Money::from_cents(4500),
            "training",
            monthly(1),
        );
        assert!(template.is_template());
        assert!(!template.is_generated());

        let mut instance = Cost::new(member, "Training fee", Money::from_cents(4500), "training");
        instance.recurring_template_id = Some(template.id);
        assert!(!instance.is_template());
        assert!(instance.is_generated());
    }

    #[test]
    fn test_overdue() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let cost = Cost::new(
            MemberId::new(),
            "Equipment",
            Money::from_cents(12000),
            "equipment",
        )
        .with_due_date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());

        assert!(cost.is_overdue(today));

        let mut paid = cost.clone();
        paid.set_status(CostStatus::Paid);
        assert!(!paid.is_overdue(today));

        let no_due = Cost::new(
            MemberId::new(),
            "Equipment",
            Money::from_cents(12000),
            "equipment",
        );
        assert!(!no_due.is_overdue(today));
    }

    #[test]
    fn test_validate() {
        let ok = Cost::new(MemberId::new(), "Camp", Money::from_cents(100), "camp");
        assert!(ok.validate().is_ok());

        let mut bad_amount = ok.clone();
        bad_amount.amount = Money::zero();
        assert!(bad_amount.validate().is_err());

        let mut bad_day = ok.clone();
        bad_day.recurrence = Some(monthly(32));
        assert!(bad_day.validate().is_err());
    }

    #[test]
    fn test_period_months() {
        assert_eq!(RecurrencePeriod::Monthly.months(), Some(1));
        assert_eq!(RecurrencePeriod::Quarterly.months(), Some(3));
        assert_eq!(RecurrencePeriod::Yearly.months(), Some(12));
        assert_eq!(RecurrencePeriod::Weekly.months(), None);
    }
}
