//! Obligation repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Read compliance items, tasks, recurrence anchors and completion records
//!   filtered by house scope and due-date horizon.
//! - Own the bulk `pending -> overdue` status transition.
//!
//! # Invariants
//! - `promote_overdue` only touches `pending` rows with `due_date < today`.
//! - Every date comparison goes through `date(trim(...))`, the SQL mirror of
//!   `parse_date`; rows whose text is not a date never match.
//! - Completed rows are never returned by open-obligation reads.
//! - A compliance item's house is its direct house, else its subject's house.

use crate::model::directory::HouseId;
use crate::model::obligation::{
    AnchoredSubject, Client, CompletionKey, CompletionRecord, ComplianceItem, Employee,
    ObligationId, ObligationStatus, RoleAssignment, ScopedComplianceItem, SubjectKind,
    SubjectRef, Task,
};
use crate::repo::{
    bool_to_int, date_to_db, ensure_schema_ready, keep_valid, parse_date, parse_optional_uuid,
    parse_uuid, placeholders, RepoError, RepoResult,
};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::BTreeSet;

const COMPLIANCE_ITEM_SELECT_SQL: &str = "SELECT
    ci.uuid,
    ci.title,
    ci.item_type,
    ci.subject_kind,
    ci.subject_uuid,
    ci.house_uuid,
    ci.due_date,
    ci.status,
    COALESCE(ci.house_uuid, c.house_uuid, e.house_uuid) AS resolved_house_uuid,
    COALESCE(c.display_name, e.display_name) AS subject_name
FROM compliance_items ci
LEFT JOIN clients c
    ON ci.subject_kind = 'client' AND c.uuid = ci.subject_uuid
LEFT JOIN employees e
    ON ci.subject_kind = 'employee' AND e.uuid = ci.subject_uuid";

const TASK_SELECT_SQL: &str = "SELECT
    uuid,
    title,
    house_uuid,
    assigned_roles,
    due_date,
    status
FROM tasks";

/// Rows changed by one Status Transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromotionCount {
    pub compliance_items: usize,
    pub tasks: usize,
}

impl PromotionCount {
    pub fn total(&self) -> usize {
        self.compliance_items + self.tasks
    }
}

/// Repository interface for obligation reads and the overdue transition.
pub trait ObligationRepository {
    fn create_client(&self, client: &Client) -> RepoResult<ObligationId>;
    fn create_employee(&self, employee: &Employee) -> RepoResult<ObligationId>;
    fn create_compliance_item(&self, item: &ComplianceItem) -> RepoResult<ObligationId>;
    fn create_task(&self, task: &Task) -> RepoResult<ObligationId>;
    /// Inserts a completion record. Recording the same occurrence twice is a no-op.
    fn record_completion(&self, record: &CompletionRecord) -> RepoResult<()>;

    fn get_compliance_item(&self, id: ObligationId) -> RepoResult<Option<ComplianceItem>>;
    fn get_task(&self, id: ObligationId) -> RepoResult<Option<Task>>;
    fn set_compliance_item_status(
        &self,
        id: ObligationId,
        status: ObligationStatus,
    ) -> RepoResult<()>;
    fn set_task_status(&self, id: ObligationId, status: ObligationStatus) -> RepoResult<()>;

    /// Lists pending/overdue compliance items whose resolved house is in
    /// `scope` and whose due date is on or before `due_on_or_before`.
    fn list_open_compliance_items(
        &self,
        scope: &BTreeSet<HouseId>,
        due_on_or_before: NaiveDate,
    ) -> RepoResult<Vec<ScopedComplianceItem>>;
    /// Lists pending/overdue tasks in `scope` plus organization-wide tasks.
    fn list_open_tasks(
        &self,
        scope: &BTreeSet<HouseId>,
        due_on_or_before: NaiveDate,
    ) -> RepoResult<Vec<Task>>;
    /// Lists active subjects of `kind` in `scope` that have an anchor date.
    fn list_anchored_subjects(
        &self,
        kind: SubjectKind,
        scope: &BTreeSet<HouseId>,
    ) -> RepoResult<Vec<AnchoredSubject>>;
    fn list_completion_keys(&self, subject: SubjectRef) -> RepoResult<BTreeSet<CompletionKey>>;

    /// Bulk-flips every pending obligation due strictly before `today` to overdue.
    fn promote_overdue(&self, today: NaiveDate) -> RepoResult<PromotionCount>;
}

/// SQLite-backed obligation repository.
pub struct SqliteObligationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteObligationRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ObligationRepository for SqliteObligationRepository<'_> {
    fn create_client(&self, client: &Client) -> RepoResult<ObligationId> {
        self.conn.execute(
            "INSERT INTO clients (uuid, display_name, house_uuid, admission_date, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                client.uuid.to_string(),
                client.display_name.as_str(),
                client.house_uuid.map(|id| id.to_string()),
                client.admission_date.map(date_to_db),
                bool_to_int(client.is_active),
            ],
        )?;
        Ok(client.uuid)
    }

    fn create_employee(&self, employee: &Employee) -> RepoResult<ObligationId> {
        self.conn.execute(
            "INSERT INTO employees (uuid, display_name, house_uuid, hire_date, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                employee.uuid.to_string(),
                employee.display_name.as_str(),
                employee.house_uuid.map(|id| id.to_string()),
                employee.hire_date.map(date_to_db),
                bool_to_int(employee.is_active),
            ],
        )?;
        Ok(employee.uuid)
    }

    fn create_compliance_item(&self, item: &ComplianceItem) -> RepoResult<ObligationId> {
        self.conn.execute(
            "INSERT INTO compliance_items (
                uuid,
                title,
                item_type,
                subject_kind,
                subject_uuid,
                house_uuid,
                due_date,
                status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                item.uuid.to_string(),
                item.title.as_str(),
                item.item_type.as_str(),
                item.subject.map(|subject| subject.kind.as_str()),
                item.subject.map(|subject| subject.uuid.to_string()),
                item.house_uuid.map(|id| id.to_string()),
                date_to_db(item.due_date),
                item.status.as_str(),
            ],
        )?;
        Ok(item.uuid)
    }

    fn create_task(&self, task: &Task) -> RepoResult<ObligationId> {
        self.conn.execute(
            "INSERT INTO tasks (uuid, title, house_uuid, assigned_roles, due_date, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                task.uuid.to_string(),
                task.title.as_str(),
                task.house_uuid.map(|id| id.to_string()),
                task.assigned_roles.to_db(),
                date_to_db(task.due_date),
                task.status.as_str(),
            ],
        )?;
        Ok(task.uuid)
    }

    fn record_completion(&self, record: &CompletionRecord) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO completion_records (
                subject_kind,
                subject_uuid,
                obligation_type,
                occurrence_index,
                completed_on
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                record.subject.kind.as_str(),
                record.subject.uuid.to_string(),
                record.key.obligation_type.as_str(),
                record.key.occurrence_index,
                date_to_db(record.completed_on),
            ],
        )?;
        Ok(())
    }

    fn get_compliance_item(&self, id: ObligationId) -> RepoResult<Option<ComplianceItem>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{COMPLIANCE_ITEM_SELECT_SQL} WHERE ci.uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_compliance_item(row)?)),
            None => Ok(None),
        }
    }

    fn get_task(&self, id: ObligationId) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_task_row(row)?)),
            None => Ok(None),
        }
    }

    fn set_compliance_item_status(
        &self,
        id: ObligationId,
        status: ObligationStatus,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE compliance_items
             SET status = ?1, updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?2;",
            params![status.as_str(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn set_task_status(&self, id: ObligationId, status: ObligationStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET status = ?1, updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?2;",
            params![status.as_str(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn list_open_compliance_items(
        &self,
        scope: &BTreeSet<HouseId>,
        due_on_or_before: NaiveDate,
    ) -> RepoResult<Vec<ScopedComplianceItem>> {
        if scope.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "{COMPLIANCE_ITEM_SELECT_SQL}
             WHERE ci.status IN ('pending', 'overdue')
               AND date(trim(ci.due_date)) <= date(?)
               AND COALESCE(ci.house_uuid, c.house_uuid, e.house_uuid) IN ({})
             ORDER BY ci.due_date ASC, ci.uuid ASC;",
            placeholders(scope.len())
        );
        let mut bind_values = vec![Value::Text(date_to_db(due_on_or_before))];
        bind_values.extend(scope_values(scope));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            keep_valid(parse_compliance_item_row(row), &mut items, "obligation")?;
        }
        Ok(items)
    }

    fn list_open_tasks(
        &self,
        scope: &BTreeSet<HouseId>,
        due_on_or_before: NaiveDate,
    ) -> RepoResult<Vec<Task>> {
        let mut sql = format!(
            "{TASK_SELECT_SQL}
             WHERE status IN ('pending', 'overdue')
               AND date(trim(due_date)) <= date(?)"
        );
        if scope.is_empty() {
            sql.push_str(" AND house_uuid IS NULL");
        } else {
            sql.push_str(&format!(
                " AND (house_uuid IS NULL OR house_uuid IN ({}))",
                placeholders(scope.len())
            ));
        }
        sql.push_str(" ORDER BY due_date ASC, uuid ASC;");

        let mut bind_values = vec![Value::Text(date_to_db(due_on_or_before))];
        bind_values.extend(scope_values(scope));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            keep_valid(parse_task_row(row), &mut tasks, "obligation")?;
        }
        Ok(tasks)
    }

    fn list_anchored_subjects(
        &self,
        kind: SubjectKind,
        scope: &BTreeSet<HouseId>,
    ) -> RepoResult<Vec<AnchoredSubject>> {
        if scope.is_empty() {
            return Ok(Vec::new());
        }

        let (table, anchor_column) = match kind {
            SubjectKind::Client => ("clients", "admission_date"),
            SubjectKind::Employee => ("employees", "hire_date"),
        };
        let sql = format!(
            "SELECT uuid, display_name, house_uuid, {anchor_column} AS anchor_date
             FROM {table}
             WHERE is_active = 1
               AND {anchor_column} IS NOT NULL
               AND house_uuid IN ({})
             ORDER BY display_name ASC, uuid ASC;",
            placeholders(scope.len())
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(scope_values(scope)))?;
        let mut subjects = Vec::new();
        while let Some(row) = rows.next()? {
            keep_valid(
                parse_anchored_subject_row(row, kind),
                &mut subjects,
                "obligation",
            )?;
        }
        Ok(subjects)
    }

    fn list_completion_keys(&self, subject: SubjectRef) -> RepoResult<BTreeSet<CompletionKey>> {
        let mut stmt = self.conn.prepare(
            "SELECT obligation_type, occurrence_index
             FROM completion_records
             WHERE subject_kind = ?1 AND subject_uuid = ?2;",
        )?;
        let mut rows = stmt.query(params![subject.kind.as_str(), subject.uuid.to_string()])?;
        let mut keys = BTreeSet::new();
        while let Some(row) = rows.next()? {
            keys.insert(CompletionKey::new(
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
            ));
        }
        Ok(keys)
    }

    fn promote_overdue(&self, today: NaiveDate) -> RepoResult<PromotionCount> {
        let today_text = date_to_db(today);
        let tx = self.conn.unchecked_transaction()?;
        let compliance_items = tx.execute(
            "UPDATE compliance_items
             SET status = 'overdue', updated_at = (strftime('%s', 'now') * 1000)
             WHERE status = 'pending' AND date(trim(due_date)) < date(?1);",
            [today_text.as_str()],
        )?;
        let tasks = tx.execute(
            "UPDATE tasks
             SET status = 'overdue', updated_at = (strftime('%s', 'now') * 1000)
             WHERE status = 'pending' AND date(trim(due_date)) < date(?1);",
            [today_text.as_str()],
        )?;
        tx.commit()?;

        Ok(PromotionCount {
            compliance_items,
            tasks,
        })
    }
}

fn scope_values(scope: &BTreeSet<HouseId>) -> impl Iterator<Item = Value> + '_ {
    scope.iter().map(|id| Value::Text(id.to_string()))
}

fn parse_status(value: &str, column: &'static str) -> RepoResult<ObligationStatus> {
    ObligationStatus::parse(value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid status `{value}` in {column}")))
}

fn parse_compliance_item(row: &Row<'_>) -> RepoResult<ComplianceItem> {
    let uuid_text: String = row.get("uuid")?;
    let subject_kind = row.get::<_, Option<String>>("subject_kind")?;
    let subject_uuid =
        parse_optional_uuid(row.get("subject_uuid")?, "compliance_items.subject_uuid")?;
    let subject = match (subject_kind, subject_uuid) {
        (Some(kind_text), Some(subject_uuid)) => {
            let kind = SubjectKind::parse(&kind_text).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid subject kind `{kind_text}` in compliance_items.subject_kind"
                ))
            })?;
            Some(SubjectRef {
                kind,
                uuid: subject_uuid,
            })
        }
        _ => None,
    };
    let due_text: String = row.get("due_date")?;
    let status_text: String = row.get("status")?;

    Ok(ComplianceItem {
        uuid: parse_uuid(&uuid_text, "compliance_items.uuid")?,
        title: row.get("title")?,
        item_type: row.get("item_type")?,
        subject,
        house_uuid: parse_optional_uuid(row.get("house_uuid")?, "compliance_items.house_uuid")?,
        due_date: parse_date(&due_text, "compliance_items.due_date")?,
        status: parse_status(&status_text, "compliance_items.status")?,
    })
}

fn parse_compliance_item_row(row: &Row<'_>) -> RepoResult<ScopedComplianceItem> {
    let item = parse_compliance_item(row)?;
    let house_uuid = parse_optional_uuid(
        row.get("resolved_house_uuid")?,
        "compliance_items.resolved_house_uuid",
    )?
    .ok_or_else(|| {
        RepoError::InvalidData(format!(
            "compliance item {} has no resolvable house",
            item.uuid
        ))
    })?;

    Ok(ScopedComplianceItem {
        item,
        subject_name: row.get("subject_name")?,
        house_uuid,
    })
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let uuid_text: String = row.get("uuid")?;
    let due_text: String = row.get("due_date")?;
    let status_text: String = row.get("status")?;
    let roles_text: Option<String> = row.get("assigned_roles")?;

    Ok(Task {
        uuid: parse_uuid(&uuid_text, "tasks.uuid")?,
        title: row.get("title")?,
        house_uuid: parse_optional_uuid(row.get("house_uuid")?, "tasks.house_uuid")?,
        assigned_roles: RoleAssignment::parse(roles_text.as_deref()),
        due_date: parse_date(&due_text, "tasks.due_date")?,
        status: parse_status(&status_text, "tasks.status")?,
    })
}

fn parse_anchored_subject_row(row: &Row<'_>, kind: SubjectKind) -> RepoResult<AnchoredSubject> {
    let uuid_text: String = row.get("uuid")?;
    let house_text: String = row.get("house_uuid")?;
    let anchor_text: String = row.get("anchor_date")?;

    Ok(AnchoredSubject {
        subject: SubjectRef {
            kind,
            uuid: parse_uuid(&uuid_text, "subject.uuid")?,
        },
        display_name: row.get("display_name")?,
        house_uuid: parse_uuid(&house_text, "subject.house_uuid")?,
        anchor_date: parse_date(&anchor_text, "subject.anchor_date")?,
    })
}
