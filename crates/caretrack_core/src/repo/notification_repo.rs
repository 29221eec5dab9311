//! Notification store: insert-only emission, dedup lookup and display reads.
//!
//! # Invariants
//! - Rows are never updated or deleted here.
//! - At most one row per `(recipient, kind, subject_key, day_bucket)`; a
//!   second insert for the same identity is ignored by the unique index, so
//!   concurrent invocations cannot produce duplicates.

use crate::model::directory::UserId;
use crate::model::notification::{
    Notification, NotificationDraft, NotificationId, NotificationKind, SubjectKey,
};
use crate::repo::{
    date_to_db, ensure_schema_ready, keep_valid, parse_date, parse_uuid, RepoError, RepoResult,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const NOTIFICATIONS_DEFAULT_LIMIT: u32 = 20;
const NOTIFICATIONS_LIMIT_MAX: u32 = 100;

/// Repository interface for notification persistence.
pub trait NotificationRepository {
    /// Inserts one notification unless its daily identity already exists.
    ///
    /// Returns `Some(id)` when a row was written and `None` when ignored.
    fn insert_if_absent(
        &self,
        draft: &NotificationDraft,
        day_bucket: NaiveDate,
        created_at: i64,
    ) -> RepoResult<Option<NotificationId>>;
    /// Returns whether the daily identity already has a row.
    fn exists_for_day(
        &self,
        recipient: UserId,
        kind: NotificationKind,
        subject_key: &SubjectKey,
        day_bucket: NaiveDate,
    ) -> RepoResult<bool>;
    /// Lists a user's notifications, newest first. Defaults to 20, clamps to 100.
    fn list_for_user(&self, recipient: UserId, limit: Option<u32>) -> RepoResult<Vec<Notification>>;
    /// Counts rows emitted for one day bucket.
    fn count_for_day(&self, day_bucket: NaiveDate) -> RepoResult<u64>;
}

/// SQLite-backed notification repository.
pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn insert_if_absent(
        &self,
        draft: &NotificationDraft,
        day_bucket: NaiveDate,
        created_at: i64,
    ) -> RepoResult<Option<NotificationId>> {
        let uuid = Uuid::new_v4();
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO notifications (
                uuid,
                recipient_uuid,
                kind,
                subject_key,
                link,
                message,
                day_bucket,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                uuid.to_string(),
                draft.recipient.to_string(),
                draft.kind.as_str(),
                draft.subject_key.as_str(),
                draft.link.as_str(),
                draft.message.as_str(),
                date_to_db(day_bucket),
                created_at,
            ],
        )?;

        Ok((changed == 1).then_some(uuid))
    }

    fn exists_for_day(
        &self,
        recipient: UserId,
        kind: NotificationKind,
        subject_key: &SubjectKey,
        day_bucket: NaiveDate,
    ) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM notifications
                WHERE recipient_uuid = ?1
                  AND kind = ?2
                  AND subject_key = ?3
                  AND day_bucket = ?4
            );",
            params![
                recipient.to_string(),
                kind.as_str(),
                subject_key.as_str(),
                date_to_db(day_bucket),
            ],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn list_for_user(&self, recipient: UserId, limit: Option<u32>) -> RepoResult<Vec<Notification>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                uuid,
                recipient_uuid,
                kind,
                subject_key,
                link,
                message,
                day_bucket,
                created_at
             FROM notifications
             WHERE recipient_uuid = ?1
             ORDER BY created_at DESC, uuid ASC
             LIMIT ?2;",
        )?;
        let mut rows = stmt.query(params![
            recipient.to_string(),
            i64::from(normalize_notification_limit(limit)),
        ])?;
        let mut notifications = Vec::new();
        while let Some(row) = rows.next()? {
            keep_valid(parse_notification_row(row), &mut notifications, "notification")?;
        }
        Ok(notifications)
    }

    fn count_for_day(&self, day_bucket: NaiveDate) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE day_bucket = ?1;",
            [date_to_db(day_bucket)],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

/// Applies default and upper bound to display list limits.
pub fn normalize_notification_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => NOTIFICATIONS_DEFAULT_LIMIT,
        Some(value) => value.min(NOTIFICATIONS_LIMIT_MAX),
    }
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    let uuid_text: String = row.get("uuid")?;
    let recipient_text: String = row.get("recipient_uuid")?;
    let kind_text: String = row.get("kind")?;
    let day_text: String = row.get("day_bucket")?;
    let kind = NotificationKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid kind `{kind_text}` in notifications.kind"))
    })?;

    Ok(Notification {
        uuid: parse_uuid(&uuid_text, "notifications.uuid")?,
        recipient: parse_uuid(&recipient_text, "notifications.recipient_uuid")?,
        kind,
        subject_key: SubjectKey::from_stored(row.get("subject_key")?),
        link: row.get("link")?,
        message: row.get("message")?,
        day_bucket: parse_date(&day_text, "notifications.day_bucket")?,
        created_at: row.get("created_at")?,
    })
}
