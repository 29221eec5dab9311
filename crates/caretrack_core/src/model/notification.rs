//! Notification records and their structured identity key.
//!
//! # Invariants
//! - Notifications are insert-only.
//! - `(recipient, kind, subject_key, day_bucket)` is unique.

use crate::model::directory::UserId;
use crate::model::obligation::ObligationId;
use crate::model::obligation::SubjectRef;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for an emitted notification.
pub type NotificationId = Uuid;

/// Notification category shown by the UI and used for dedup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Compliance item due within the upcoming window.
    ComplianceDue,
    /// Compliance item past its due date.
    ComplianceOverdue,
    /// Anchor-derived review meeting reminder (every tier).
    MeetingReminder,
    /// Task due within the upcoming window.
    TaskDue,
    /// Task past its due date.
    TaskOverdue,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ComplianceDue => "compliance_due",
            Self::ComplianceOverdue => "compliance_overdue",
            Self::MeetingReminder => "meeting_reminder",
            Self::TaskDue => "task_due",
            Self::TaskOverdue => "task_overdue",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "compliance_due" => Some(Self::ComplianceDue),
            "compliance_overdue" => Some(Self::ComplianceOverdue),
            "meeting_reminder" => Some(Self::MeetingReminder),
            "task_due" => Some(Self::TaskDue),
            "task_overdue" => Some(Self::TaskOverdue),
            _ => None,
        }
    }
}

impl Display for NotificationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured dedup identity: `{subjectType}:{subjectId}:{obligationType}:{occurrenceIndex}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectKey(String);

impl SubjectKey {
    pub fn new(
        subject_type: &str,
        subject_id: Uuid,
        obligation_type: &str,
        occurrence_index: u32,
    ) -> Self {
        Self(format!(
            "{subject_type}:{subject_id}:{obligation_type}:{occurrence_index}"
        ))
    }

    /// Key for one derived occurrence of a recurring obligation.
    pub fn for_occurrence(subject: SubjectRef, obligation_type: &str, occurrence_index: u32) -> Self {
        Self::new(
            subject.kind.as_str(),
            subject.uuid,
            obligation_type,
            occurrence_index,
        )
    }

    /// Key for a standalone compliance item.
    pub fn for_compliance_item(item_uuid: ObligationId, item_type: &str) -> Self {
        Self::new("compliance_item", item_uuid, item_type, 1)
    }

    /// Key for a task.
    pub fn for_task(task_uuid: ObligationId) -> Self {
        Self::new("task", task_uuid, "task", 1)
    }

    /// Wraps an already-formatted key read from storage.
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SubjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Candidate notification computed by a domain before the dedup check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub recipient: UserId,
    pub kind: NotificationKind,
    pub subject_key: SubjectKey,
    /// UI path the notification points to.
    pub link: String,
    pub message: String,
}

/// Persisted notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub uuid: NotificationId,
    pub recipient: UserId,
    pub kind: NotificationKind,
    pub subject_key: SubjectKey,
    pub link: String,
    pub message: String,
    /// Calendar day of the run that emitted this notification.
    pub day_bucket: NaiveDate,
    /// Epoch milliseconds.
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::SubjectKey;
    use crate::model::obligation::SubjectRef;
    use uuid::Uuid;

    #[test]
    fn occurrence_key_has_four_segments() {
        let id = Uuid::nil();
        let key = SubjectKey::for_occurrence(SubjectRef::client(id), "ANNUAL", 2);
        assert_eq!(
            key.as_str(),
            "client:00000000-0000-0000-0000-000000000000:ANNUAL:2"
        );
    }

    #[test]
    fn task_and_item_keys_do_not_collide() {
        let id = Uuid::new_v4();
        assert_ne!(
            SubjectKey::for_task(id),
            SubjectKey::for_compliance_item(id, "task")
        );
    }
}
