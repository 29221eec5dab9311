use caretrack_core::db::open_db_in_memory;
use caretrack_core::{
    ComplianceItem, ObligationRepository, ObligationStatus, RepoError, SqliteObligationRepository,
    Task,
};
use chrono::NaiveDate;
use rusqlite::params;
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn pending_obligations_past_due_become_overdue() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteObligationRepository::try_new(&conn).unwrap();
    let today = date(2025, 3, 10);

    let late_item = ComplianceItem::new("Fire drill", "FIRE_DRILL", None, date(2025, 3, 9));
    let due_today = ComplianceItem::new("CPR cert", "CPR_CERT", None, date(2025, 3, 10));
    let late_task = Task::new("Submit roster", date(2025, 2, 1));
    repo.create_compliance_item(&late_item).unwrap();
    repo.create_compliance_item(&due_today).unwrap();
    repo.create_task(&late_task).unwrap();

    let promoted = repo.promote_overdue(today).unwrap();
    assert_eq!(promoted.compliance_items, 1);
    assert_eq!(promoted.tasks, 1);
    assert_eq!(promoted.total(), 2);

    let status_of = |id| repo.get_compliance_item(id).unwrap().unwrap().status;
    assert_eq!(status_of(late_item.uuid), ObligationStatus::Overdue);
    assert_eq!(status_of(due_today.uuid), ObligationStatus::Pending);
    assert_eq!(
        repo.get_task(late_task.uuid).unwrap().unwrap().status,
        ObligationStatus::Overdue
    );
}

#[test]
fn completed_obligations_are_untouched() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteObligationRepository::try_new(&conn).unwrap();

    let mut item = ComplianceItem::new("Inspection", "INSPECTION", None, date(2024, 12, 1));
    item.status = ObligationStatus::Completed;
    let mut task = Task::new("Archive files", date(2024, 12, 1));
    task.status = ObligationStatus::Completed;
    repo.create_compliance_item(&item).unwrap();
    repo.create_task(&task).unwrap();

    let promoted = repo.promote_overdue(date(2025, 1, 1)).unwrap();
    assert_eq!(promoted.total(), 0);
    assert_eq!(
        repo.get_compliance_item(item.uuid).unwrap().unwrap().status,
        ObligationStatus::Completed
    );
    assert_eq!(
        repo.get_task(task.uuid).unwrap().unwrap().status,
        ObligationStatus::Completed
    );
}

#[test]
fn transition_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteObligationRepository::try_new(&conn).unwrap();
    let item = ComplianceItem::new("Fire drill", "FIRE_DRILL", None, date(2025, 1, 1));
    repo.create_compliance_item(&item).unwrap();

    let today = date(2025, 1, 5);
    assert_eq!(repo.promote_overdue(today).unwrap().total(), 1);
    assert_eq!(repo.promote_overdue(today).unwrap().total(), 0);
    assert_eq!(
        repo.get_compliance_item(item.uuid).unwrap().unwrap().status,
        ObligationStatus::Overdue
    );
}

#[test]
fn closing_an_obligation_updates_status() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteObligationRepository::try_new(&conn).unwrap();
    let task = Task::new("Submit roster", date(2025, 1, 1));
    repo.create_task(&task).unwrap();

    repo.set_task_status(task.uuid, ObligationStatus::Completed)
        .unwrap();
    assert_eq!(repo.promote_overdue(date(2025, 6, 1)).unwrap().tasks, 0);

    let missing = Uuid::new_v4();
    assert!(matches!(
        repo.set_compliance_item_status(missing, ObligationStatus::Completed),
        Err(RepoError::NotFound(id)) if id == missing
    ));
}

#[test]
fn stored_date_text_is_compared_as_a_date() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteObligationRepository::try_new(&conn).unwrap();
    let far_future = Uuid::new_v4();
    let garbage = Uuid::new_v4();
    let padded_past = Uuid::new_v4();
    let mut insert = conn
        .prepare("INSERT INTO tasks (uuid, title, due_date) VALUES (?1, ?2, ?3);")
        .unwrap();
    insert
        .execute(params![far_future.to_string(), "Renew lease", " 2099-01-01"])
        .unwrap();
    insert
        .execute(params![garbage.to_string(), "Imported row", "next tuesday"])
        .unwrap();
    insert
        .execute(params![padded_past.to_string(), "Quarterly audit", "2025-01-01 "])
        .unwrap();
    drop(insert);

    let promoted = repo.promote_overdue(date(2025, 1, 20)).unwrap();
    assert_eq!(promoted.tasks, 1);

    let future = repo.get_task(far_future).unwrap().unwrap();
    assert_eq!(future.due_date, date(2099, 1, 1));
    assert_eq!(future.status, ObligationStatus::Pending);
    assert_eq!(
        repo.get_task(padded_past).unwrap().unwrap().status,
        ObligationStatus::Overdue
    );
    let garbage_status: String = conn
        .query_row(
            "SELECT status FROM tasks WHERE uuid = ?1;",
            [garbage.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(garbage_status, "pending");
}
