//! Per-payer overdue statements
//!
//! Renders a plain-text notice per parent listing their members' overdue
//! pending costs with a grand total, ready to paste into an email. Parents
//! without an email address or without overdue costs are skipped.

use chrono::NaiveDate;

use crate::error::DuesResult;
use crate::models::{Cost, Member, Money, Parent};
use crate::storage::Storage;

/// Render one parent's overdue notice. Returns None when the parent has no
/// members or none of their pending costs are overdue.
pub fn overdue_statement(
    parent: &Parent,
    members: &[Member],
    costs: &[Cost],
    today: NaiveDate,
    club_name: &str,
) -> Option<String> {
    let linked_members: Vec<&Member> =
        members.iter().filter(|m| m.is_linked_to(parent.id)).collect();
    if linked_members.is_empty() {
        return None;
    }

    let mut total = Money::zero();
    let mut member_sections = Vec::new();

    for member in &linked_members {
        let overdue: Vec<&Cost> = costs
            .iter()
            .filter(|c| c.member_id == member.id && c.is_overdue(today))
            .collect();
        if overdue.is_empty() {
            continue;
        }

        let mut section = format!("{}:\n", member.full_name());
        for cost in overdue {
            section.push_str(&format!(
                "  - {}: {} (due: {} - OVERDUE)\n",
                cost.title,
                cost.amount,
                cost.due_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "no due date".into())
            ));
            total += cost.amount;
        }
        member_sections.push(section);
    }

    if member_sections.is_empty() {
        return None;
    }

    let mut notice = format!("Dear {},\n\n", parent.full_name());
    notice.push_str("this is a reminder of the open obligations for your members:\n\n");
    for section in member_sections {
        notice.push_str(&section);
        notice.push('\n');
    }
    notice.push_str(&format!("Total open amount: {}\n\n", total));
    notice.push_str("Please settle the open obligations at your earliest convenience.\n\n");
    notice.push_str(&format!("Kind regards,\n{}\n\n", club_name));
    notice.push_str(&format!("---\nEmail: {}\n\n\n", parent.email));

    Some(notice)
}

/// Render notices for every parent that has an email address and at least
/// one overdue cost, concatenated into one export file
pub fn overdue_statements(
    storage: &Storage,
    today: NaiveDate,
    club_name: &str,
) -> DuesResult<String> {
    let parents = storage.parents.get_all()?;
    let members = storage.members.get_all()?;
    let costs = storage.costs.get_all()?;

    let mut output = String::new();
    for parent in parents.iter().filter(|p| !p.email.trim().is_empty()) {
        if let Some(notice) = overdue_statement(parent, &members, &costs, today, club_name) {
            output.push_str(&notice);
        }
    }

    if output.is_empty() {
        output.push_str("No parents with overdue costs and an email address.\n");
    }

    Ok(output)
}
