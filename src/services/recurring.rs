//! Recurring cost generation
//!
//! Materializes cost instances from recurring templates on a rolling
//! schedule. Generation is idempotent: the dedup key (member, cost type,
//! due date, template linkage) prevents double-generation, so a run is safe
//! to repeat at any time. Look-ahead is bounded so far-future instances are
//! not pre-created, and a per-template bound keeps a large backlog from
//! turning one run into a runaway loop.

use std::sync::OnceLock;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use regex::Regex;

use crate::audit::AuditAction;
use crate::config::settings::Settings;
use crate::error::DuesResult;
use crate::models::{Cost, CostId, CostStatus, Recurrence, RecurrencePeriod};
use crate::storage::Storage;

/// Service generating cost instances from recurring templates
pub struct RecurringService<'a> {
    storage: &'a Storage,
    /// Instances are only generated up to this many days ahead
    lookahead_days: i64,
    /// Safety bound on generations per template per run
    max_per_run: u32,
}

impl<'a> RecurringService<'a> {
    /// Create a scheduler with the default 30-day look-ahead and 12
    /// generations per template per run
    pub fn new(storage: &'a Storage) -> Self {
        Self {
            storage,
            lookahead_days: 30,
            max_per_run: 12,
        }
    }

    /// Create a scheduler with bounds taken from settings
    pub fn with_settings(storage: &'a Storage, settings: &Settings) -> Self {
        Self {
            storage,
            lookahead_days: settings.lookahead_days,
            max_per_run: settings.max_generations_per_run,
        }
    }

    /// Generate all currently due instances, evaluated against today's date
    pub fn run(&self) -> DuesResult<Vec<CostId>> {
        self.generate_due(Utc::now().date_naive())
    }

    /// Generate all instances due as of the given date.
    ///
    /// Per template: skip while outside the start/end window, walk forward
    /// from the last generated due date (or the template's own due date,
    /// or its start date), and create an instance per period step until the
    /// step leaves the look-ahead window or the per-run bound is reached.
    pub fn generate_due(&self, today: NaiveDate) -> DuesResult<Vec<CostId>> {
        let templates = self.storage.costs.get_templates()?;
        let mut generated = Vec::new();

        for template in templates {
            let Some(recurrence) = template.recurrence.clone() else {
                continue;
            };

            if today < recurrence.start_date {
                continue;
            }
            if recurrence.end_date.is_some_and(|end| today > end) {
                continue;
            }

            let instances = self.storage.costs.get_instances_of(template.id)?;
            let mut last_due = instances
                .iter()
                .filter_map(|c| c.due_date)
                .max()
                .or(template.due_date)
                .unwrap_or(recurrence.start_date);

            for _ in 0..self.max_per_run {
                let next_due = next_due_date(&recurrence, last_due);

                if recurrence.end_date.is_some_and(|end| next_due > end) {
                    break;
                }
                if next_due - today > Duration::days(self.lookahead_days) {
                    break;
                }

                if self.instance_exists(&template, next_due)? {
                    last_due = next_due;
                    continue;
                }

                let instance = build_instance(&template, next_due);
                let instance_id = instance.id;
                self.storage.costs.upsert(instance)?;
                self.storage.log_action(
                    AuditAction::CostGenerated,
                    format!("'{}' generated, due {}", template.title, next_due),
                );

                generated.push(instance_id);
                last_due = next_due;
            }
        }

        if !generated.is_empty() {
            log::info!("Recurring run generated {} cost(s)", generated.len());
        }
        Ok(generated)
    }

    /// Dedup check: an instance already exists for this owner, cost type
    /// and due date, linked to the template (the template itself counts
    /// when its own due date lands on the step)
    fn instance_exists(&self, template: &Cost, due_date: NaiveDate) -> DuesResult<bool> {
        let costs = self.storage.costs.get_by_member(template.member_id)?;
        Ok(costs.iter().any(|c| {
            c.cost_type == template.cost_type
                && c.due_date == Some(due_date)
                && (c.recurring_template_id == Some(template.id) || c.id == template.id)
        }))
    }
}

/// Build the generated instance: copies the template's amount, category,
/// owner and description; the title gets the new period's month/year; the
/// instance is itself never recurring
fn build_instance(template: &Cost, due_date: NaiveDate) -> Cost {
    let mut instance = Cost::new(
        template.member_id,
        title_for_period(&template.title, due_date),
        template.amount,
        template.cost_type.clone(),
    );
    instance.description = template.description.clone();
    instance.due_date = Some(due_date);
    instance.status = CostStatus::Pending;
    instance.recurring_template_id = Some(template.id);
    instance
}

/// The due date one period after the given date.
///
/// Month-based periods use clamped month arithmetic: the day-of-month is
/// the anchor day or the target month's last day, whichever is smaller
/// (the anchor applies to monthly/quarterly only). Weekly adds seven days.
fn next_due_date(recurrence: &Recurrence, last: NaiveDate) -> NaiveDate {
    match recurrence.period {
        RecurrencePeriod::Weekly => last + Duration::days(7),
        RecurrencePeriod::Monthly | RecurrencePeriod::Quarterly => {
            let months = recurrence.period.months().unwrap_or(1);
            let stepped = add_months(last, months);
            match recurrence.day_of_month {
                Some(anchor) => with_clamped_day(stepped, anchor),
                None => stepped,
            }
        }
        RecurrencePeriod::Yearly => add_months(last, 12),
    }
}

/// Add months, clamping the day to the target month's length
/// (Jan 31 + 1 month = Feb 29 in a leap year, Feb 28 otherwise)
fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    let total = date.year() * 12 + date.month0() as i32 + months as i32;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    let day = date.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Re-anchor a date's day-of-month, clamped to the month's length
fn with_clamped_day(date: NaiveDate, anchor: u32) -> NaiveDate {
    let day = anchor.min(days_in_month(date.year(), date.month()));
    NaiveDate::from_ymd_opt(date.year(), date.month(), day).unwrap()
}

/// Number of days in a month
fn days_in_month(year: i32, month: u32) -> u32 {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    first_of_next.unwrap().pred_opt().unwrap().day()
}

/// English month names for period titles
const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

fn month_year_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{4}",
        )
        .unwrap()
    })
}

/// Rewrite a template title for the new period: an existing "Month Year"
/// token is replaced, otherwise the period is appended
fn title_for_period(base_title: &str, due_date: NaiveDate) -> String {
    let period = format!(
        "{} {}",
        MONTH_NAMES[due_date.month0() as usize],
        due_date.year()
    );

    let re = month_year_token();
    if re.is_match(base_title) {
        re.replace(base_title, period.as_str()).into_owned()
    } else {
        format!("{} - {}", base_title, period)
    }
}
