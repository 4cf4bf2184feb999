use chrono::Duration;
use reskill_core::model::{CourseKey, ProgressStatus, ProgressTable, UserId};
use reskill_core::time::fixed_now;
use storage::repository::{LocalSlot, RemoteProgressRow, RemoteProgressStore, Storage};
use storage::sqlite::SqliteRepository;

fn row(owner: &str, key: &str, status: ProgressStatus) -> RemoteProgressRow {
    let mut table = ProgressTable::new();
    let now = fixed_now();
    table.apply(CourseKey::new(key).unwrap(), ProgressStatus::InProgress, now);
    let progress = table.apply(
        CourseKey::new(key).unwrap(),
        status,
        now + Duration::hours(1),
    );
    RemoteProgressRow::from_progress(&UserId::new(owner).unwrap(), &progress)
}

#[tokio::test]
async fn sqlite_slot_round_trips_and_deletes() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_slot?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    assert_eq!(repo.read("learningProgress").await.unwrap(), None);
    repo.write("learningProgress", "{\"a\":1}").await.unwrap();
    repo.write("learningProgress", "{}").await.unwrap();
    assert_eq!(
        repo.read("learningProgress").await.unwrap().as_deref(),
        Some("{}")
    );

    repo.delete("learningProgress").await.unwrap();
    assert_eq!(repo.read("learningProgress").await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_progress_upsert_is_keyed_by_user_and_course() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_progress?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    // migrations are idempotent
    repo.migrate().await.expect("migrate twice");

    repo.upsert(&row("u1", "rust", ProgressStatus::InProgress))
        .await
        .unwrap();
    repo.upsert(&row("u1", "rust", ProgressStatus::Completed))
        .await
        .unwrap();
    repo.upsert(&row("u1", "rust-m1", ProgressStatus::InProgress))
        .await
        .unwrap();
    repo.upsert(&row("u2", "rust", ProgressStatus::InProgress))
        .await
        .unwrap();

    let u1 = UserId::new("u1").unwrap();
    let rows = repo.select_all(&u1).await.unwrap();
    assert_eq!(rows.len(), 2);
    let course = rows
        .iter()
        .find(|r| r.course_key.as_str() == "rust")
        .expect("course row");
    assert_eq!(course.status, ProgressStatus::Completed);
    assert_eq!(course.started_at, Some(fixed_now()));
    assert_eq!(course.completed_at, Some(fixed_now() + Duration::hours(1)));

    assert_eq!(repo.list_all().await.unwrap().len(), 3);

    repo.delete_all(&u1).await.unwrap();
    assert!(repo.select_all(&u1).await.unwrap().is_empty());
    assert_eq!(repo.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn sqlite_skips_rows_with_unknown_status() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_malformed?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    repo.upsert(&row("u1", "rust", ProgressStatus::InProgress))
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO learning_progress (user_id, course_id, status, created_at) VALUES ('u1', 'go', 'paused', '2024-01-01T00:00:00Z')",
    )
    .execute(repo.pool())
    .await
    .unwrap();

    let rows = repo.select_all(&UserId::new("u1").unwrap()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].course_key.as_str(), "rust");
}

#[tokio::test]
async fn storage_sqlite_wires_both_collaborators() {
    let storage = Storage::sqlite("sqlite:file:memdb_storage?mode=memory&cache=shared")
        .await
        .expect("storage");
    storage.slot.write("k", "v").await.unwrap();
    storage
        .remote
        .upsert(&row("u1", "rust", ProgressStatus::Completed))
        .await
        .unwrap();
    assert_eq!(storage.slot.read("k").await.unwrap().as_deref(), Some("v"));
    assert_eq!(storage.remote.list_all().await.unwrap().len(), 1);
}
