//! Deadline derivation from recurrence anchors.
//!
//! # Invariants
//! - Recurring instances are computed from the anchor, never cumulatively,
//!   so `anchor + 2 months` is not `(anchor + 1 month) + 1 month`.
//! - Month addition clamps to the last valid day of the target month
//!   (Jan 31 + 1 month = Feb 28/29).
//! - Occurrence indexes start at 1 and are strictly increasing.

use crate::model::obligation::{CompletionKey, SubjectKind};
use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default cap on derived recurring occurrences per subject and rule.
pub const DEFAULT_MAX_OCCURRENCES: u32 = 5;

/// Shape of a recurrence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecurrenceRule {
    /// Single instance `anchor + days`.
    OneTime { days: u32 },
    /// Instances `anchor + months * n` for `n = 1..=cap`.
    Recurring { months: u32 },
}

/// Catalogue entry binding an obligation type to a subject kind and rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObligationRule {
    /// Stable type code used in completion records and subject keys.
    pub obligation_type: String,
    /// Human-readable name used in reminder messages.
    pub name: String,
    pub subject: SubjectKind,
    pub rule: RecurrenceRule,
}

/// One concrete derived due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DueInstance {
    pub due_date: NaiveDate,
    pub occurrence_index: u32,
}

/// Derives the ordered due-date instances for one anchor and rule.
///
/// Instances whose date would overflow the calendar range are dropped along
/// with every later instance.
pub fn derive_due_dates(
    anchor: NaiveDate,
    rule: RecurrenceRule,
    max_occurrences: u32,
) -> Vec<DueInstance> {
    match rule {
        RecurrenceRule::OneTime { days } => anchor
            .checked_add_days(Days::new(u64::from(days)))
            .map(|due_date| DueInstance {
                due_date,
                occurrence_index: 1,
            })
            .into_iter()
            .collect(),
        RecurrenceRule::Recurring { months } => (1..=max_occurrences)
            .map_while(|occurrence_index| {
                let offset = months.checked_mul(occurrence_index)?;
                add_months_clamped(anchor, offset).map(|due_date| DueInstance {
                    due_date,
                    occurrence_index,
                })
            })
            .collect(),
    }
}

/// Adds calendar months, clamping the day to the end of the target month.
pub fn add_months_clamped(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(months))
}

/// Drops instances that already have a completion record for `obligation_type`.
pub fn filter_completed(
    instances: Vec<DueInstance>,
    obligation_type: &str,
    completed: &BTreeSet<CompletionKey>,
) -> Vec<DueInstance> {
    instances
        .into_iter()
        .filter(|instance| {
            !completed.contains(&CompletionKey::new(
                obligation_type,
                instance.occurrence_index,
            ))
        })
        .collect()
}

/// Signed whole days from `today` to `due_date`; negative when overdue.
pub fn days_until(due_date: NaiveDate, today: NaiveDate) -> i64 {
    (due_date - today).num_days()
}
