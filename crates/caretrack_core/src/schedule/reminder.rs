//! Reminder tiering and message templates.
//!
//! Tiers are mutually exclusive day ranges, evaluated most specific first:
//!
//! | days until due | recurring tier   | item tier  |
//! |----------------|------------------|------------|
//! | `< 0`          | `Overdue`        | `Overdue`  |
//! | `0..=7`        | `Urgent`         | `Upcoming` |
//! | `8..=14`       | `TwoWeek`        | none       |
//! | `15..=30`      | `ThirtyDay`      | none       |
//! | `31..=45`      | `FortyFiveDay`   | none       |
//! | `> 45`         | none             | none       |

use chrono::NaiveDate;
use std::fmt::{Display, Formatter};

/// Last day offset covered by the item `Upcoming` tier and recurring `Urgent` tier.
pub const UPCOMING_WINDOW_DAYS: i64 = 7;
/// Last day offset that still produces a recurring reminder.
pub const RECURRING_HORIZON_DAYS: i64 = 45;

/// Reminder tier for anchor-derived recurring obligations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReminderTier {
    Overdue,
    Urgent,
    TwoWeek,
    ThirtyDay,
    FortyFiveDay,
}

impl ReminderTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overdue => "overdue",
            Self::Urgent => "urgent",
            Self::TwoWeek => "two_week",
            Self::ThirtyDay => "thirty_day",
            Self::FortyFiveDay => "forty_five_day",
        }
    }
}

impl Display for ReminderTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reminder tier for standalone compliance items and tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemTier {
    Overdue,
    Upcoming,
}

/// Maps signed days-until-due to the five-tier recurring schedule.
pub fn classify_recurring(days_until_due: i64) -> Option<ReminderTier> {
    match days_until_due {
        d if d < 0 => Some(ReminderTier::Overdue),
        0..=UPCOMING_WINDOW_DAYS => Some(ReminderTier::Urgent),
        8..=14 => Some(ReminderTier::TwoWeek),
        15..=30 => Some(ReminderTier::ThirtyDay),
        31..=RECURRING_HORIZON_DAYS => Some(ReminderTier::FortyFiveDay),
        _ => None,
    }
}

/// Maps signed days-until-due to the two-tier item schedule.
pub fn classify_item(days_until_due: i64) -> Option<ItemTier> {
    match days_until_due {
        d if d < 0 => Some(ItemTier::Overdue),
        0..=UPCOMING_WINDOW_DAYS => Some(ItemTier::Upcoming),
        _ => None,
    }
}

/// Values substituted into a reminder template.
#[derive(Debug, Clone, Copy)]
pub struct ReminderContext<'a> {
    pub obligation_name: &'a str,
    pub subject_name: Option<&'a str>,
    pub due_date: NaiveDate,
    pub days_until_due: i64,
}

impl ReminderContext<'_> {
    fn headline(&self) -> String {
        match self.subject_name {
            Some(subject) if !subject.trim().is_empty() => {
                format!("{} for {}", self.obligation_name, subject.trim())
            }
            _ => self.obligation_name.to_string(),
        }
    }
}

/// Renders the message for a recurring reminder tier.
pub fn recurring_message(tier: ReminderTier, ctx: &ReminderContext<'_>) -> String {
    let headline = ctx.headline();
    let due = format_due_date(ctx.due_date);
    match tier {
        ReminderTier::Overdue => overdue_message(&headline, ctx),
        ReminderTier::Urgent => upcoming_message(&headline, ctx),
        ReminderTier::TwoWeek => format!("{headline} is due within two weeks, on {due}"),
        ReminderTier::ThirtyDay => format!("{headline} is due within 30 days, on {due}"),
        ReminderTier::FortyFiveDay => format!("{headline} is due within 45 days, on {due}"),
    }
}

/// Renders the message for an item/task tier.
pub fn item_message(tier: ItemTier, ctx: &ReminderContext<'_>) -> String {
    let headline = ctx.headline();
    match tier {
        ItemTier::Overdue => overdue_message(&headline, ctx),
        ItemTier::Upcoming => upcoming_message(&headline, ctx),
    }
}

/// Formats a due date for display, e.g. `Jul 15, 2024`.
pub fn format_due_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

fn overdue_message(headline: &str, ctx: &ReminderContext<'_>) -> String {
    let overdue_days = ctx.days_until_due.unsigned_abs();
    format!(
        "{headline} is overdue by {overdue_days} {} (was due {})",
        plural_days(overdue_days),
        format_due_date(ctx.due_date)
    )
}

fn upcoming_message(headline: &str, ctx: &ReminderContext<'_>) -> String {
    let due = format_due_date(ctx.due_date);
    match ctx.days_until_due {
        0 => format!("{headline} is due today ({due})"),
        days => {
            let days = days.unsigned_abs();
            format!("{headline} is due in {days} {}, on {due}", plural_days(days))
        }
    }
}

fn plural_days(count: u64) -> &'static str {
    if count == 1 {
        "day"
    } else {
        "days"
    }
}
