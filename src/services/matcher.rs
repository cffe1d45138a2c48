//! Payer matching heuristics
//!
//! Matches a bank transaction to a probable payer through a fixed, ordered
//! list of rules; the first rule that hits wins. Exact and structured
//! signals (account identifier, full name in the payer field) rank above
//! free-text substring heuristics, and last-name rules only fire for names
//! of three or more characters to keep false positives down. The ordering
//! and threshold are load-bearing; changing them changes which payer wins
//! on ambiguous transactions.
//!
//! Each rule is a pure function over the transaction fields and the roster,
//! so every rule is independently testable.

use crate::models::{BankTransaction, MatchConfidence, Member, MemberId, Parent, ParentId};

use super::parser::ParsedTransaction;

/// The transaction fields the matcher looks at
#[derive(Debug, Clone, Copy)]
pub struct MatchInput<'a> {
    /// Payer name as printed by the bank
    pub payer_name: &'a str,
    /// Payer account identifier, when present
    pub payer_iban: Option<&'a str>,
    /// Free-text remittance description
    pub description: &'a str,
}

impl<'a> From<&'a ParsedTransaction> for MatchInput<'a> {
    fn from(txn: &'a ParsedTransaction) -> Self {
        Self {
            payer_name: &txn.payer_name,
            payer_iban: txn.payer_iban.as_deref(),
            description: &txn.description,
        }
    }
}

impl<'a> From<&'a BankTransaction> for MatchInput<'a> {
    fn from(txn: &'a BankTransaction) -> Self {
        Self {
            payer_name: &txn.payer_name,
            payer_iban: txn.payer_iban.as_deref(),
            description: &txn.description,
        }
    }
}

/// Result of a payer match attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayerMatch {
    /// The matched parent, when any rule hit
    pub parent_id: Option<ParentId>,
    /// A member resolving the match: the matched member for description
    /// rules, otherwise the first member linked to the parent
    pub member_id: Option<MemberId>,
    /// Heuristic certainty
    pub confidence: MatchConfidence,
    /// Which signal matched, for operator review
    pub reason: Option<String>,
}

impl PayerMatch {
    /// The no-match result
    pub fn none() -> Self {
        Self {
            parent_id: None,
            member_id: None,
            confidence: MatchConfidence::None,
            reason: None,
        }
    }

    /// Whether any rule hit
    pub fn is_match(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// One matching rule: a pure function over the transaction and the roster
type MatchRule = fn(&NormalizedInput, &[Parent], &[Member]) -> Option<PayerMatch>;

/// The ranked rule chain, evaluated in order; first hit wins
const RULES: &[MatchRule] = &[
    match_by_iban,
    match_by_payer_full_name,
    match_by_payer_last_name,
    match_by_member_name_in_description,
    match_by_last_name_in_description,
];

/// Last names shorter than this never match as substrings
const MIN_LAST_NAME_LEN: usize = 3;

/// Match a transaction to a probable payer. Never fails; when no rule hits
/// the result carries no ids and confidence `None`.
pub fn match_payer(input: MatchInput, parents: &[Parent], members: &[Member]) -> PayerMatch {
    let normalized = NormalizedInput::from(input);

    for rule in RULES {
        if let Some(result) = rule(&normalized, parents, members) {
            return result;
        }
    }

    PayerMatch::none()
}

/// Uppercased, trimmed transaction fields shared by all rules
struct NormalizedInput {
    payer_name: String,
    payer_iban: Option<String>,
    description: String,
}

impl From<MatchInput<'_>> for NormalizedInput {
    fn from(input: MatchInput) -> Self {
        Self {
            payer_name: input.payer_name.trim().to_uppercase(),
            payer_iban: input.payer_iban.map(normalize_iban),
            description: input.description.trim().to_uppercase(),
        }
    }
}

/// IBANs compare with all whitespace stripped
fn normalize_iban(iban: &str) -> String {
    iban.chars().filter(|c| !c.is_whitespace()).collect()
}

/// First member linked to the parent, used to resolve a parent-level match
/// down to a member
fn first_linked_member(parent_id: ParentId, members: &[Member]) -> Option<MemberId> {
    members
        .iter()
        .find(|m| m.is_linked_to(parent_id))
        .map(|m| m.id)
}

/// Rule 1: exact account-identifier match (high)
fn match_by_iban(
    input: &NormalizedInput,
    parents: &[Parent],
    members: &[Member],
) -> Option<PayerMatch> {
    let txn_iban = input.payer_iban.as_deref()?;

    for parent in parents {
        let Some(parent_iban) = parent.iban.as_deref() else {
            continue;
        };
        if normalize_iban(parent_iban).eq_ignore_ascii_case(txn_iban) {
            return Some(PayerMatch {
                parent_id: Some(parent.id),
                member_id: first_linked_member(parent.id, members),
                confidence: MatchConfidence::High,
                reason: Some(format!("Account match: {}", parent_iban)),
            });
        }
    }
    None
}

/// Rule 2: parent full name, forward or reversed, in the payer field (high)
fn match_by_payer_full_name(
    input: &NormalizedInput,
    parents: &[Parent],
    members: &[Member],
) -> Option<PayerMatch> {
    for parent in parents {
        let forward = format!("{} {}", parent.first_name, parent.last_name).to_uppercase();
        let reversed = format!("{} {}", parent.last_name, parent.first_name).to_uppercase();

        if input.payer_name.contains(&forward) || input.payer_name.contains(&reversed) {
            return Some(PayerMatch {
                parent_id: Some(parent.id),
                member_id: first_linked_member(parent.id, members),
                confidence: MatchConfidence::High,
                reason: Some(format!("Payer name: {}", parent.full_name())),
            });
        }
    }
    None
}

/// Rule 3: parent last name (3+ chars) in the payer field (medium)
fn match_by_payer_last_name(
    input: &NormalizedInput,
    parents: &[Parent],
    members: &[Member],
) -> Option<PayerMatch> {
    for parent in parents {
        let last_name = parent.last_name.trim().to_uppercase();
        if last_name.chars().count() >= MIN_LAST_NAME_LEN && input.payer_name.contains(&last_name) {
            return Some(PayerMatch {
                parent_id: Some(parent.id),
                member_id: first_linked_member(parent.id, members),
                confidence: MatchConfidence::Medium,
                reason: Some(format!("Last name in payer field: {}", parent.last_name)),
            });
        }
    }
    None
}

/// Rule 4: member full name, forward or reversed, in the description
/// (medium); resolves to the member's first linked payer
fn match_by_member_name_in_description(
    input: &NormalizedInput,
    _parents: &[Parent],
    members: &[Member],
) -> Option<PayerMatch> {
    for member in members {
        let forward = format!("{} {}", member.first_name, member.last_name).to_uppercase();
        let reversed = format!("{} {}", member.last_name, member.first_name).to_uppercase();

        if input.description.contains(&forward) || input.description.contains(&reversed) {
            return Some(PayerMatch {
                parent_id: member.payer_ids().first().copied(),
                member_id: Some(member.id),
                confidence: MatchConfidence::Medium,
                reason: Some(format!("Member name in description: {}", member.full_name())),
            });
        }
    }
    None
}

/// Rule 5: parent last name (3+ chars) in the description (low)
fn match_by_last_name_in_description(
    input: &NormalizedInput,
    parents: &[Parent],
    members: &[Member],
) -> Option<PayerMatch> {
    for parent in parents {
        let last_name = parent.last_name.trim().to_uppercase();
        if last_name.chars().count() >= MIN_LAST_NAME_LEN && input.description.contains(&last_name) {
            return Some(PayerMatch {
                parent_id: Some(parent.id),
                member_id: first_linked_member(parent.id, members),
                confidence: MatchConfidence::Low,
                reason: Some(format!("Last name in description: {}", parent.last_name)),
            });
        }
    }
    None
}
