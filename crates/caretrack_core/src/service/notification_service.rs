//! Dedup Guard and Notification Emission.
//!
//! # Invariants
//! - Dedup identity is the exact `(recipient, kind, subject_key, day_bucket)`
//!   tuple; message text never participates in matching.
//! - Emission is insert-or-ignore, so a check-then-insert race between two
//!   overlapping runs still yields one row.

use crate::model::directory::UserId;
use crate::model::notification::{
    Notification, NotificationDraft, NotificationId, NotificationKind, SubjectKey,
};
use crate::repo::notification_repo::NotificationRepository;
use crate::repo::RepoResult;
use crate::service::run_context::RunContext;
use chrono::NaiveDate;

/// Result of one `notify_once` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    Created(NotificationId),
    /// An equivalent notification already exists for the run's day.
    Duplicate,
}

/// Notification service facade over repository implementations.
pub struct NotificationService<N: NotificationRepository> {
    repo: N,
}

impl<N: NotificationRepository> NotificationService<N> {
    pub fn new(repo: N) -> Self {
        Self { repo }
    }

    /// Returns whether `recipient` already got this notification on `today`.
    pub fn already_notified_today(
        &self,
        recipient: UserId,
        kind: NotificationKind,
        subject_key: &SubjectKey,
        today: NaiveDate,
    ) -> RepoResult<bool> {
        self.repo.exists_for_day(recipient, kind, subject_key, today)
    }

    /// Inserts one notification record; `None` when the daily identity was taken.
    pub fn emit(
        &self,
        draft: &NotificationDraft,
        ctx: &RunContext,
    ) -> RepoResult<Option<NotificationId>> {
        self.repo
            .insert_if_absent(draft, ctx.today, ctx.started_at_ms)
    }

    /// Runs the dedup check and emits when no same-day duplicate exists.
    pub fn notify_once(
        &self,
        draft: &NotificationDraft,
        ctx: &RunContext,
    ) -> RepoResult<EmitOutcome> {
        if self.already_notified_today(draft.recipient, draft.kind, &draft.subject_key, ctx.today)? {
            return Ok(EmitOutcome::Duplicate);
        }
        Ok(match self.emit(draft, ctx)? {
            Some(id) => EmitOutcome::Created(id),
            None => EmitOutcome::Duplicate,
        })
    }

    /// Lists notifications for display, newest first.
    pub fn list_for_user(
        &self,
        recipient: UserId,
        limit: Option<u32>,
    ) -> RepoResult<Vec<Notification>> {
        self.repo.list_for_user(recipient, limit)
    }
}
