use caretrack_core::db::open_db_in_memory;
use caretrack_core::{
    DirectoryRepository, EmitOutcome, NotificationDraft, NotificationKind, NotificationRepository,
    NotificationService, RunContext, SqliteDirectoryRepository, SqliteNotificationRepository,
    SubjectKey, SubjectRef, User, UserRole,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn seeded_user(conn: &Connection) -> User {
    let directory = SqliteDirectoryRepository::try_new(conn).unwrap();
    let user = User::new("Morgan Manager", UserRole::HouseManager);
    directory.create_user(&user).unwrap();
    user
}

fn draft(recipient: Uuid, subject: SubjectRef, message: &str) -> NotificationDraft {
    NotificationDraft {
        recipient,
        kind: NotificationKind::MeetingReminder,
        subject_key: SubjectKey::for_occurrence(subject, "ANNUAL", 2),
        link: format!("/clients/{}", subject.uuid),
        message: message.to_string(),
    }
}

#[test]
fn same_identity_on_same_day_is_stored_once() {
    let conn = open_db_in_memory().unwrap();
    let user = seeded_user(&conn);
    let repo = SqliteNotificationRepository::try_new(&conn).unwrap();
    let subject = SubjectRef::client(Uuid::new_v4());
    let day = date(2025, 1, 20);

    let first = repo
        .insert_if_absent(&draft(user.uuid, subject, "first text"), day, 1_000)
        .unwrap();
    let second = repo
        .insert_if_absent(&draft(user.uuid, subject, "reworded text"), day, 2_000)
        .unwrap();

    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(repo.count_for_day(day).unwrap(), 1);

    let stored = repo.list_for_user(user.uuid, None).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].message, "first text");
    assert_eq!(stored[0].day_bucket, day);
}

#[test]
fn next_day_is_a_new_identity() {
    let conn = open_db_in_memory().unwrap();
    let user = seeded_user(&conn);
    let service = NotificationService::new(SqliteNotificationRepository::try_new(&conn).unwrap());
    let subject = SubjectRef::client(Uuid::new_v4());
    let reminder = draft(user.uuid, subject, "Annual review is due in 5 days");

    let monday = RunContext::at(date(2025, 1, 20), 1_000);
    let tuesday = RunContext::at(date(2025, 1, 21), 2_000);

    assert!(matches!(
        service.notify_once(&reminder, &monday).unwrap(),
        EmitOutcome::Created(_)
    ));
    assert_eq!(
        service.notify_once(&reminder, &monday).unwrap(),
        EmitOutcome::Duplicate
    );
    assert!(matches!(
        service.notify_once(&reminder, &tuesday).unwrap(),
        EmitOutcome::Created(_)
    ));

    let listed = service.list_for_user(user.uuid, None).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].day_bucket, date(2025, 1, 21));
    assert_eq!(listed[0].created_at, 2_000);
}

#[test]
fn distinct_occurrences_and_kinds_do_not_collide() {
    let conn = open_db_in_memory().unwrap();
    let user = seeded_user(&conn);
    let service = NotificationService::new(SqliteNotificationRepository::try_new(&conn).unwrap());
    let ctx = RunContext::at(date(2025, 1, 20), 1_000);
    let subject = SubjectRef::client(Uuid::new_v4());

    let second_occurrence = draft(user.uuid, subject, "occurrence two");
    let mut first_occurrence = second_occurrence.clone();
    first_occurrence.subject_key = SubjectKey::for_occurrence(subject, "ANNUAL", 1);
    let mut other_kind = second_occurrence.clone();
    other_kind.kind = NotificationKind::ComplianceDue;

    for candidate in [&second_occurrence, &first_occurrence, &other_kind] {
        assert!(matches!(
            service.notify_once(candidate, &ctx).unwrap(),
            EmitOutcome::Created(_)
        ));
    }
    assert!(service
        .already_notified_today(
            user.uuid,
            NotificationKind::MeetingReminder,
            &first_occurrence.subject_key,
            ctx.today
        )
        .unwrap());
    assert_eq!(service.list_for_user(user.uuid, Some(2)).unwrap().len(), 2);
}
