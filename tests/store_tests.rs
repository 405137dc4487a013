use chrono::{Duration, NaiveDate};
use tempfile::TempDir;

use danci_srs::db::{ReviewStateStore, SqliteStore, StoreError};
use danci_srs::scheduler::{Outcome, ScheduleMode, Track};
use danci_srs::workers::due_reminder::scan_due_reminders;

mod common;

use common::{create_service, start_time};

async fn open_sqlite(dir: &TempDir) -> ReviewStateStore {
    let path = dir.path().join("data").join("srs.db");
    ReviewStateStore::Sqlite(SqliteStore::open(&path).await.unwrap())
}

async fn stores(dir: &TempDir) -> Vec<ReviewStateStore> {
    vec![ReviewStateStore::memory(), open_sqlite(dir).await]
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let (service, _clock) = create_service(open_sqlite(&dir).await);
        service.enroll("u1", "apple").await.unwrap();
        service
            .advance_on_outcome("u1", "apple", Outcome::Good)
            .await
            .unwrap();
        service
            .switch_mode("u1", "apple", ScheduleMode::Milestone)
            .await
            .unwrap();
        service
            .toggle_milestone("u1", "apple", Track::Long, 4)
            .await
            .unwrap();
    }

    let (service, _clock) = create_service(open_sqlite(&dir).await);
    let state = service.get("u1", "apple").await.unwrap();
    assert_eq!(state.mode, ScheduleMode::Milestone);
    assert_eq!(state.stage, 2);
    assert_eq!(state.review_count, 2);
    assert_eq!(state.correct_count, 2);
    assert_eq!(state.long_slots, [false, false, false, false, true, false]);
    assert_eq!(state.short_slots, [false, false, false]);
    assert_eq!(state.last_review_at, Some(start_time()));
    assert_eq!(state.milestone_completed_at, Some(start_time()));
    assert_eq!(state.next_review_at, start_time() + Duration::hours(1));
    assert!((state.memory_strength - 0.1).abs() < 1e-9);
}

#[tokio::test]
async fn test_backends_agree_on_basic_operations() {
    let dir = TempDir::new().unwrap();
    for store in stores(&dir).await {
        let backend = store.backend_name();
        let (service, clock) = create_service(store);

        service.enroll("u1", "b").await.unwrap();
        service.enroll("u1", "a").await.unwrap();
        service.enroll("u2", "a").await.unwrap();

        let err = service.enroll("u1", "a").await.unwrap_err();
        assert!(
            matches!(err, danci_srs::services::ScheduleError::AlreadyExists(_)),
            "{backend}"
        );

        let listed = service.store().list_for_user("u1").await.unwrap();
        let words: Vec<_> = listed.iter().map(|s| s.word_id.as_str()).collect();
        assert_eq!(words, ["a", "b"], "{backend}");

        clock.advance(Duration::minutes(10));
        let users = service.store().users_with_due(service.now()).await.unwrap();
        assert_eq!(users, ["u1", "u2"], "{backend}");

        service.remove("u1", "b").await.unwrap();
        assert!(service.store().get("u1", "b").await.unwrap().is_none(), "{backend}");
        assert!(!service.store().delete("u1", "b").await.unwrap(), "{backend}");

        let mut ghost = service.get("u2", "a").await.unwrap();
        ghost.user_id = "nobody".to_string();
        assert!(
            matches!(service.store().save(&ghost).await, Err(StoreError::Missing)),
            "{backend}"
        );
    }
}

#[tokio::test]
async fn test_reminder_ledger_is_idempotent_per_day() {
    let dir = TempDir::new().unwrap();
    let day = NaiveDate::from_ymd_opt(2024, 9, 2).unwrap();
    for store in stores(&dir).await {
        let backend = store.backend_name();
        assert!(!store.reminder_exists("u1", "a", day).await.unwrap(), "{backend}");
        assert!(store.record_reminder("u1", "a", day, start_time()).await.unwrap(), "{backend}");
        assert!(!store.record_reminder("u1", "a", day, start_time()).await.unwrap(), "{backend}");
        assert!(store.reminder_exists("u1", "a", day).await.unwrap(), "{backend}");

        let next_day = day.succ_opt().unwrap();
        assert!(!store.reminder_exists("u1", "a", next_day).await.unwrap(), "{backend}");
    }
}

#[tokio::test]
async fn test_reminder_scan_records_once_per_day() {
    let dir = TempDir::new().unwrap();
    for store in stores(&dir).await {
        let backend = store.backend_name();
        let (service, clock) = create_service(store);
        service.enroll("u1", "a").await.unwrap();
        service.enroll("u1", "b").await.unwrap();
        service.enroll("u2", "c").await.unwrap();
        service.advance_on_outcome("u1", "b", Outcome::Easy).await.unwrap();

        clock.advance(Duration::minutes(15));

        let first = scan_due_reminders(std::sync::Arc::clone(&service)).await.unwrap();
        assert_eq!(first.users_scanned, 2, "{backend}");
        assert_eq!(first.items_due, 2, "{backend}");
        assert_eq!(first.reminders_recorded, 2, "{backend}");

        let second = scan_due_reminders(std::sync::Arc::clone(&service)).await.unwrap();
        assert_eq!(second.reminders_recorded, 0, "{backend}");
        assert_eq!(second.already_reminded, 2, "{backend}");

        // 01:15 UTC is 09:15 at +08:00; the next local day starts 15h45m later.
        clock.advance(Duration::hours(16));
        let next_day = scan_due_reminders(std::sync::Arc::clone(&service)).await.unwrap();
        assert_eq!(next_day.items_due, 3, "{backend}");
        assert_eq!(next_day.reminders_recorded, 3, "{backend}");
    }
}

#[tokio::test]
async fn test_returned_due_time_matches_stored_value() {
    let dir = TempDir::new().unwrap();
    for store in stores(&dir).await {
        let backend = store.backend_name();
        let (service, clock) = create_service(store);
        clock.set(start_time() + Duration::nanoseconds(842_357_461));

        let enrolled = service.enroll("u1", "apple").await.unwrap();
        let stored = service.get("u1", "apple").await.unwrap();
        assert_eq!(stored, enrolled, "{backend}");

        let result = service
            .advance_on_outcome("u1", "apple", Outcome::Good)
            .await
            .unwrap();
        let stored = service.get("u1", "apple").await.unwrap();
        assert_eq!(stored.next_review_at, result.next_review_at, "{backend}");
        assert_eq!(
            stored.last_review_at,
            Some(start_time() + Duration::milliseconds(842)),
            "{backend}"
        );
    }
}

#[tokio::test]
async fn test_first_milestone_after_continuous_reviews() {
    let dir = TempDir::new().unwrap();
    for store in stores(&dir).await {
        let backend = store.backend_name();
        let (service, clock) = create_service(store);
        service.enroll("u1", "apple").await.unwrap();
        service
            .advance_on_outcome("u1", "apple", Outcome::Good)
            .await
            .unwrap();
        service
            .switch_mode("u1", "apple", ScheduleMode::Milestone)
            .await
            .unwrap();

        clock.advance(Duration::minutes(1));
        let toggled = service
            .toggle_milestone("u1", "apple", Track::Short, 0)
            .await
            .unwrap();
        assert!(toggled.is_new_completion, "{backend}");
        assert_eq!(
            toggled.next_review_at,
            start_time() + Duration::minutes(1) + Duration::hours(1),
            "{backend}"
        );

        let reset = service.reset("u1", "apple").await.unwrap();
        assert_eq!(reset.state.milestone_completed_at, None, "{backend}");
    }
}

#[tokio::test]
async fn test_reminder_scan_survives_ledger_failures() {
    let dir = TempDir::new().unwrap();
    let store = open_sqlite(&dir).await;
    let (service, clock) = create_service(store.clone());
    service.enroll("u1", "a").await.unwrap();
    service.enroll("u2", "b").await.unwrap();
    clock.advance(Duration::minutes(15));

    let ReviewStateStore::Sqlite(sqlite) = &store else {
        unreachable!("opened as sqlite");
    };
    sqlx::query(r#"DROP TABLE "due_reminders""#)
        .execute(sqlite.pool())
        .await
        .unwrap();

    let stats = scan_due_reminders(std::sync::Arc::clone(&service)).await.unwrap();
    assert_eq!(stats.users_scanned, 2);
    assert_eq!(stats.failed_users, 2);
    assert_eq!(stats.reminders_recorded, 0);
}
