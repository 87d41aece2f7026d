//! Wanted-item store behaviour against an in-memory SQLite database

use chrono::{Duration, Utc};
use sublarr::config::DatabaseConfig;
use sublarr::database::Database;
use sublarr::database::repositories::WantedRepository;
use sublarr::database::repositories::wanted::WantedListFilter;
use sublarr::models::{MediaKind, NewWantedItem, SubtitleKind, WantedStatus};

async fn repo() -> WantedRepository {
    let database = Database::new(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: None,
    })
    .await
    .unwrap();
    database.migrate().await.unwrap();
    WantedRepository::new(database.connection())
}

fn item(path: &str, language: &str, kind: SubtitleKind) -> NewWantedItem {
    NewWantedItem {
        kind: MediaKind::Episode,
        media_file_path: path.to_string(),
        target_language: language.to_string(),
        subtitle_kind: kind,
        upgrade_candidate: false,
        current_score: 0,
        series_id: Some(12),
        episode_id: Some(34),
        movie_id: None,
        title: Some("Show Name".to_string()),
    }
}

#[tokio::test]
async fn upsert_is_idempotent_on_the_triple() {
    let repo = repo().await;

    let (first_id, created) = repo
        .upsert(&item("/m/Show/S01E01.mkv", "de", SubtitleKind::Full))
        .await
        .unwrap();
    assert!(created);

    let (second_id, created) = repo
        .upsert(&item("/m/Show/S01E01.mkv", "de", SubtitleKind::Full))
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(first_id, second_id);

    // Different language or kind makes a distinct row
    let (other_language, created) = repo
        .upsert(&item("/m/Show/S01E01.mkv", "en", SubtitleKind::Full))
        .await
        .unwrap();
    assert!(created);
    assert_ne!(first_id, other_language);

    let (other_kind, created) = repo
        .upsert(&item("/m/Show/S01E01.mkv", "de", SubtitleKind::Forced))
        .await
        .unwrap();
    assert!(created);
    assert_ne!(first_id, other_kind);

    let stats = repo.stats().await.unwrap();
    assert_eq!(stats.wanted, 3);
    assert_eq!(stats.total(), 3);
}

#[tokio::test]
async fn concurrent_upserts_converge_on_one_row() {
    let repo = repo().await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            repo.upsert(&item("/m/Show/S01E01.mkv", "de", SubtitleKind::Full))
                .await
                .unwrap()
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        let (id, _) = handle.await.unwrap();
        ids.push(id);
    }

    // Every caller got the same id and exactly one row exists
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(repo.stats().await.unwrap().total(), 1);
}

#[tokio::test]
async fn list_due_orders_by_retry_after_then_id() {
    let repo = repo().await;
    let now = Utc::now();

    let (fresh, _) = repo
        .upsert(&item("/m/a.mkv", "de", SubtitleKind::Full))
        .await
        .unwrap();
    let (failed_soon, _) = repo
        .upsert(&item("/m/b.mkv", "de", SubtitleKind::Full))
        .await
        .unwrap();
    let (failed_later, _) = repo
        .upsert(&item("/m/c.mkv", "de", SubtitleKind::Full))
        .await
        .unwrap();
    let (not_due, _) = repo
        .upsert(&item("/m/d.mkv", "de", SubtitleKind::Full))
        .await
        .unwrap();

    repo.mark_failed(failed_soon, now, now - Duration::minutes(30))
        .await
        .unwrap();
    repo.mark_failed(failed_later, now, now - Duration::minutes(5))
        .await
        .unwrap();
    repo.mark_failed(not_due, now, now + Duration::hours(2))
        .await
        .unwrap();

    let due = repo.list_due(now, 10).await.unwrap();
    let ids: Vec<i64> = due.iter().map(|w| w.id).collect();

    // NULL retry_after (never searched) first, then oldest retry deadline;
    // the future retry is not due at all
    assert_eq!(ids, vec![fresh, failed_soon, failed_later]);
}

#[tokio::test]
async fn claim_is_exclusive_until_released() {
    let repo = repo().await;
    let now = Utc::now();
    let deadline = now + Duration::minutes(5);
    let (id, _) = repo
        .upsert(&item("/m/a.mkv", "de", SubtitleKind::Full))
        .await
        .unwrap();

    assert!(repo.claim(id, now, deadline).await.unwrap());
    // Second claim while searching must fail
    assert!(!repo.claim(id, now, deadline).await.unwrap());

    let claimed = repo.get(id).await.unwrap().unwrap();
    assert_eq!(claimed.status, WantedStatus::Searching);
    // A searching row carries its watchdog deadline; only wanted and done
    // rows have a NULL retry_after
    assert_eq!(claimed.retry_after, Some(deadline));

    // Failure releases the claim back into the due queue
    repo.mark_failed(id, now, now - Duration::minutes(1))
        .await
        .unwrap();
    assert!(repo.claim(id, now, deadline).await.unwrap());
}

#[tokio::test]
async fn mark_done_clears_retry_and_records_score() {
    let repo = repo().await;
    let now = Utc::now();
    let (id, _) = repo
        .upsert(&item("/m/a.mkv", "de", SubtitleKind::Full))
        .await
        .unwrap();

    repo.claim(id, now, now + Duration::minutes(5)).await.unwrap();
    repo.mark_done(id, now, 250).await.unwrap();

    let done = repo.get(id).await.unwrap().unwrap();
    assert_eq!(done.status, WantedStatus::Done);
    assert_eq!(done.current_score, 250);
    assert!(done.retry_after.is_none());
    assert_eq!(done.search_count, 1);

    // Done items are no longer due
    assert!(repo.list_due(now, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn backoff_failures_accumulate_search_count() {
    let repo = repo().await;
    let now = Utc::now();
    let (id, _) = repo
        .upsert(&item("/m/a.mkv", "de", SubtitleKind::Full))
        .await
        .unwrap();

    for attempt in 1..=3 {
        repo.claim(id, now, now + Duration::minutes(5)).await.unwrap();
        repo.mark_failed(id, now, now - Duration::seconds(1))
            .await
            .unwrap();
        let failed = repo.get(id).await.unwrap().unwrap();
        assert_eq!(failed.status, WantedStatus::Failed);
        assert_eq!(failed.search_count, attempt);
    }
}

#[tokio::test]
async fn watchdog_reverts_searches_past_their_deadline() {
    let repo = repo().await;
    let now = Utc::now();
    let (stuck, _) = repo
        .upsert(&item("/m/a.mkv", "de", SubtitleKind::Full))
        .await
        .unwrap();
    let (active, _) = repo
        .upsert(&item("/m/b.mkv", "de", SubtitleKind::Full))
        .await
        .unwrap();

    // One claim whose deadline already passed, one still inside it
    repo.claim(stuck, now - Duration::minutes(30), now - Duration::minutes(25))
        .await
        .unwrap();
    repo.claim(active, now, now + Duration::minutes(5))
        .await
        .unwrap();

    let reverted = repo.revert_stuck_searches(now).await.unwrap();
    assert_eq!(reverted, 1);

    let reclaimed = repo.get(stuck).await.unwrap().unwrap();
    assert_eq!(reclaimed.status, WantedStatus::Wanted);
    assert!(reclaimed.retry_after.is_none());
    assert_eq!(
        repo.get(active).await.unwrap().unwrap().status,
        WantedStatus::Searching
    );
}

#[tokio::test]
async fn blacklisted_items_leave_the_retry_queue_for_good() {
    let repo = repo().await;
    let now = Utc::now();
    let (id, _) = repo
        .upsert(&item("/m/a.mkv", "de", SubtitleKind::Full))
        .await
        .unwrap();

    repo.mark_blacklisted(id).await.unwrap();

    let blacklisted = repo.get(id).await.unwrap().unwrap();
    assert_eq!(blacklisted.status, WantedStatus::Blacklisted);
    // Terminal but still scheduled-looking fields stay consistent: only
    // wanted and done rows carry NULL retry_after
    assert!(blacklisted.retry_after.is_some());

    // Never due, never claimable again
    assert!(repo.list_due(now, 10).await.unwrap().is_empty());
    assert!(!repo.claim(id, now, now + Duration::minutes(5)).await.unwrap());
    assert_eq!(repo.stats().await.unwrap().blacklisted, 1);
}

#[tokio::test]
async fn delete_by_path_removes_all_languages() {
    let repo = repo().await;
    repo.upsert(&item("/m/Movie.mkv", "de", SubtitleKind::Full))
        .await
        .unwrap();
    repo.upsert(&item("/m/Movie.mkv", "en", SubtitleKind::Full))
        .await
        .unwrap();
    repo.upsert(&item("/m/Other.mkv", "de", SubtitleKind::Full))
        .await
        .unwrap();

    let removed = repo.delete_by_path("/m/Movie.mkv").await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(repo.stats().await.unwrap().total(), 1);
}

#[tokio::test]
async fn listing_filters_by_status_and_path() {
    let repo = repo().await;
    let now = Utc::now();
    let (a, _) = repo
        .upsert(&item("/m/Show/S01E01.mkv", "de", SubtitleKind::Full))
        .await
        .unwrap();
    repo.upsert(&item("/m/Movie.mkv", "de", SubtitleKind::Full))
        .await
        .unwrap();

    repo.claim(a, now, now + Duration::minutes(5)).await.unwrap();
    repo.mark_done(a, now, 100).await.unwrap();

    let (done_items, total) = repo
        .list(
            &WantedListFilter {
                status: Some(WantedStatus::Done),
                ..Default::default()
            },
            1,
            50,
        )
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(done_items[0].id, a);

    let (by_path, total) = repo
        .list(
            &WantedListFilter {
                path: Some("Show".to_string()),
                ..Default::default()
            },
            1,
            50,
        )
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(by_path[0].media_file_path, "/m/Show/S01E01.mkv");
}
