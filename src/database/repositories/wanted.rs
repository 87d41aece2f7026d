//! SeaORM-based wanted-item repository
//!
//! Implements the durable state machine behind the scheduler: idempotent
//! upserts guarded by the `(path, language, kind)` unique index, atomic
//! claims, due-item listing and the stuck-search watchdog.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
    sea_query::{NullOrdering, Order},
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::entities::{prelude::WantedItems, wanted_items};
use crate::models::{
    MediaKind, NewWantedItem, SubtitleKind, WantedItem, WantedStats, WantedStatus,
};

/// Filters accepted by the paginated listing endpoint
#[derive(Debug, Clone, Default)]
pub struct WantedListFilter {
    pub status: Option<WantedStatus>,
    pub kind: Option<MediaKind>,
    pub series_id: Option<i64>,
    pub path: Option<String>,
}

#[derive(Clone)]
pub struct WantedRepository {
    connection: Arc<DatabaseConnection>,
}

impl WantedRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Idempotent upsert keyed on `(path, language, kind)`.
    ///
    /// Returns `(id, created)`. A concurrent insert race is resolved by the
    /// unique index: the losing insert re-reads and returns the surviving
    /// row, so both callers observe the same id and no error escapes.
    pub async fn upsert(&self, request: &NewWantedItem) -> Result<(i64, bool)> {
        if let Some(existing) = self.find_by_triple(request).await? {
            self.refresh_linked_fields(&existing, request).await?;
            return Ok((existing.id, false));
        }

        let now = Utc::now();
        let active = wanted_items::ActiveModel {
            kind: Set(request.kind.to_string()),
            media_file_path: Set(request.media_file_path.clone()),
            target_language: Set(request.target_language.clone()),
            subtitle_kind: Set(request.subtitle_kind.to_string()),
            status: Set(WantedStatus::Wanted.to_string()),
            search_count: Set(0),
            last_search_at: Set(None),
            retry_after: Set(None),
            current_score: Set(request.current_score),
            upgrade_candidate: Set(request.upgrade_candidate),
            series_id: Set(request.series_id),
            episode_id: Set(request.episode_id),
            movie_id: Set(request.movie_id),
            title: Set(request.title.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        match active.insert(&*self.connection).await {
            Ok(model) => Ok((model.id, true)),
            Err(e) => {
                // Unique-index violation: another writer won the race
                let existing = self.find_by_triple(request).await?;
                match existing {
                    Some(model) => {
                        debug!(
                            path = %request.media_file_path,
                            "wanted upsert race resolved to existing id {}",
                            model.id
                        );
                        Ok((model.id, false))
                    }
                    None => Err(e).context("wanted item insert failed"),
                }
            }
        }
    }

    async fn find_by_triple(
        &self,
        request: &NewWantedItem,
    ) -> Result<Option<wanted_items::Model>> {
        Ok(WantedItems::find()
            .filter(wanted_items::Column::MediaFilePath.eq(&request.media_file_path))
            .filter(wanted_items::Column::TargetLanguage.eq(&request.target_language))
            .filter(wanted_items::Column::SubtitleKind.eq(request.subtitle_kind.to_string()))
            .one(&*self.connection)
            .await?)
    }

    /// Keep linked ids, title and upgrade flags current on re-upsert
    async fn refresh_linked_fields(
        &self,
        existing: &wanted_items::Model,
        request: &NewWantedItem,
    ) -> Result<()> {
        let needs_update = existing.series_id != request.series_id
            || existing.episode_id != request.episode_id
            || existing.movie_id != request.movie_id
            || existing.title != request.title
            || existing.upgrade_candidate != request.upgrade_candidate;
        if !needs_update {
            return Ok(());
        }

        let mut active: wanted_items::ActiveModel = existing.clone().into();
        active.series_id = Set(request.series_id);
        active.episode_id = Set(request.episode_id);
        active.movie_id = Set(request.movie_id);
        active.title = Set(request.title.clone());
        active.upgrade_candidate = Set(request.upgrade_candidate);
        active.updated_at = Set(Utc::now());
        active.update(&*self.connection).await?;
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Option<WantedItem>> {
        let model = WantedItems::find_by_id(id).one(&*self.connection).await?;
        model.map(model_to_domain).transpose()
    }

    pub async fn find_by_path(&self, path: &str) -> Result<Vec<WantedItem>> {
        let models = WantedItems::find()
            .filter(wanted_items::Column::MediaFilePath.eq(path))
            .order_by_asc(wanted_items::Column::Id)
            .all(&*self.connection)
            .await?;
        models.into_iter().map(model_to_domain).collect()
    }

    /// Items ready for processing: status wanted/failed with an elapsed (or
    /// absent) retry_after, oldest retries first
    pub async fn list_due(&self, now: DateTime<Utc>, limit: u64) -> Result<Vec<WantedItem>> {
        let models = WantedItems::find()
            .filter(
                wanted_items::Column::Status.is_in([
                    WantedStatus::Wanted.to_string(),
                    WantedStatus::Failed.to_string(),
                ]),
            )
            .filter(
                wanted_items::Column::RetryAfter
                    .is_null()
                    .or(wanted_items::Column::RetryAfter.lte(now)),
            )
            .order_by_with_nulls(
                wanted_items::Column::RetryAfter,
                Order::Asc,
                NullOrdering::First,
            )
            .order_by_asc(wanted_items::Column::Id)
            .limit(limit)
            .all(&*self.connection)
            .await?;
        models.into_iter().map(model_to_domain).collect()
    }

    /// Atomically claim an item for processing.
    ///
    /// Only one worker can move a row into `searching`; the guard on the
    /// current status makes double-claims impossible. `done` rows stay
    /// claimable so a forced re-process can re-evaluate upgrades;
    /// blacklisted rows are not.
    ///
    /// The claim stamps `watchdog_deadline` into `retry_after`, so a
    /// `searching` row always carries the instant after which the watchdog
    /// may take it back.
    pub async fn claim(
        &self,
        id: i64,
        now: DateTime<Utc>,
        watchdog_deadline: DateTime<Utc>,
    ) -> Result<bool> {
        let result = WantedItems::update_many()
            .col_expr(
                wanted_items::Column::Status,
                Expr::value(WantedStatus::Searching.to_string()),
            )
            .col_expr(wanted_items::Column::LastSearchAt, Expr::value(now))
            .col_expr(
                wanted_items::Column::RetryAfter,
                Expr::value(watchdog_deadline),
            )
            .col_expr(wanted_items::Column::UpdatedAt, Expr::value(now))
            .filter(wanted_items::Column::Id.eq(id))
            .filter(
                wanted_items::Column::Status.is_in([
                    WantedStatus::Wanted.to_string(),
                    WantedStatus::Failed.to_string(),
                    WantedStatus::Done.to_string(),
                ]),
            )
            .exec(&*self.connection)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Failed search: bump the attempt counter and schedule the retry
    pub async fn mark_failed(
        &self,
        id: i64,
        now: DateTime<Utc>,
        retry_after: DateTime<Utc>,
    ) -> Result<()> {
        WantedItems::update_many()
            .col_expr(
                wanted_items::Column::Status,
                Expr::value(WantedStatus::Failed.to_string()),
            )
            .col_expr(
                wanted_items::Column::SearchCount,
                Expr::col(wanted_items::Column::SearchCount).add(1),
            )
            .col_expr(wanted_items::Column::RetryAfter, Expr::value(retry_after))
            .col_expr(wanted_items::Column::LastSearchAt, Expr::value(now))
            .col_expr(wanted_items::Column::UpdatedAt, Expr::value(now))
            .filter(wanted_items::Column::Id.eq(id))
            .exec(&*self.connection)
            .await?;
        Ok(())
    }

    /// Successful install: record the score and clear retry scheduling
    pub async fn mark_done(&self, id: i64, now: DateTime<Utc>, score: i32) -> Result<()> {
        WantedItems::update_many()
            .col_expr(
                wanted_items::Column::Status,
                Expr::value(WantedStatus::Done.to_string()),
            )
            .col_expr(
                wanted_items::Column::SearchCount,
                Expr::col(wanted_items::Column::SearchCount).add(1),
            )
            .col_expr(wanted_items::Column::CurrentScore, Expr::value(score))
            .col_expr(
                wanted_items::Column::RetryAfter,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(
                wanted_items::Column::UpgradeCandidate,
                Expr::value(false),
            )
            .col_expr(wanted_items::Column::LastSearchAt, Expr::value(now))
            .col_expr(wanted_items::Column::UpdatedAt, Expr::value(now))
            .filter(wanted_items::Column::Id.eq(id))
            .exec(&*self.connection)
            .await?;
        Ok(())
    }

    /// Terminal opt-out: the item is never retried again. `retry_after`
    /// keeps a non-null value (the moment retries stopped) so only
    /// `wanted` and `done` rows ever carry NULL there.
    pub async fn mark_blacklisted(&self, id: i64) -> Result<()> {
        let now = Utc::now();
        WantedItems::update_many()
            .col_expr(
                wanted_items::Column::Status,
                Expr::value(WantedStatus::Blacklisted.to_string()),
            )
            .col_expr(wanted_items::Column::RetryAfter, Expr::value(now))
            .col_expr(wanted_items::Column::UpdatedAt, Expr::value(now))
            .filter(wanted_items::Column::Id.eq(id))
            .exec(&*self.connection)
            .await?;
        Ok(())
    }

    /// Watchdog: revert searches that never reported back to `wanted`.
    ///
    /// A claim stamps its deadline into `retry_after`; any `searching` row
    /// whose deadline has passed (or is anomalously missing) lost its
    /// worker and goes back into the queue.
    pub async fn revert_stuck_searches(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = WantedItems::update_many()
            .col_expr(
                wanted_items::Column::Status,
                Expr::value(WantedStatus::Wanted.to_string()),
            )
            .col_expr(
                wanted_items::Column::RetryAfter,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(wanted_items::Column::UpdatedAt, Expr::value(now))
            .filter(wanted_items::Column::Status.eq(WantedStatus::Searching.to_string()))
            .filter(
                wanted_items::Column::RetryAfter
                    .lt(now)
                    .or(wanted_items::Column::RetryAfter.is_null()),
            )
            .exec(&*self.connection)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn delete_by_path(&self, path: &str) -> Result<u64> {
        let result = WantedItems::delete_many()
            .filter(wanted_items::Column::MediaFilePath.eq(path))
            .exec(&*self.connection)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn delete_by_paths(&self, paths: &[String]) -> Result<u64> {
        if paths.is_empty() {
            return Ok(0);
        }
        let result = WantedItems::delete_many()
            .filter(wanted_items::Column::MediaFilePath.is_in(paths.iter().cloned()))
            .exec(&*self.connection)
            .await?;
        Ok(result.rows_affected)
    }

    /// Every distinct media file currently tracked, for scan-time cleanup
    pub async fn list_tracked_paths(&self) -> Result<Vec<String>> {
        let paths: Vec<String> = WantedItems::find()
            .select_only()
            .column(wanted_items::Column::MediaFilePath)
            .distinct()
            .into_tuple()
            .all(&*self.connection)
            .await?;
        Ok(paths)
    }

    /// Paginated listing with the filters exposed by `GET /wanted`
    pub async fn list(
        &self,
        filter: &WantedListFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<WantedItem>, u64)> {
        let mut query = WantedItems::find();
        if let Some(status) = filter.status {
            query = query.filter(wanted_items::Column::Status.eq(status.to_string()));
        }
        if let Some(kind) = filter.kind {
            query = query.filter(wanted_items::Column::Kind.eq(kind.to_string()));
        }
        if let Some(series_id) = filter.series_id {
            query = query.filter(wanted_items::Column::SeriesId.eq(series_id));
        }
        if let Some(path) = &filter.path {
            query = query.filter(wanted_items::Column::MediaFilePath.contains(path));
        }

        let paginator = query
            .order_by_desc(wanted_items::Column::UpdatedAt)
            .order_by_asc(wanted_items::Column::Id)
            .paginate(&*self.connection, per_page.max(1));
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page.saturating_sub(1)).await?;
        let items = models
            .into_iter()
            .map(model_to_domain)
            .collect::<Result<Vec<_>>>()?;
        Ok((items, total))
    }

    /// Counts per status for the stats endpoint and scan summaries
    pub async fn stats(&self) -> Result<WantedStats> {
        let mut stats = WantedStats::default();
        for status in [
            WantedStatus::Wanted,
            WantedStatus::Searching,
            WantedStatus::Failed,
            WantedStatus::Done,
            WantedStatus::Blacklisted,
        ] {
            let count = WantedItems::find()
                .filter(wanted_items::Column::Status.eq(status.to_string()))
                .count(&*self.connection)
                .await?;
            match status {
                WantedStatus::Wanted => stats.wanted = count,
                WantedStatus::Searching => stats.searching = count,
                WantedStatus::Failed => stats.failed = count,
                WantedStatus::Done => stats.done = count,
                WantedStatus::Blacklisted => stats.blacklisted = count,
            }
        }
        Ok(stats)
    }
}

fn model_to_domain(model: wanted_items::Model) -> Result<WantedItem> {
    Ok(WantedItem {
        id: model.id,
        kind: MediaKind::from_str(&model.kind)
            .map_err(|_| anyhow!("invalid media kind '{}' in wanted item {}", model.kind, model.id))?,
        media_file_path: model.media_file_path,
        target_language: model.target_language,
        subtitle_kind: SubtitleKind::from_str(&model.subtitle_kind).map_err(|_| {
            anyhow!(
                "invalid subtitle kind '{}' in wanted item {}",
                model.subtitle_kind,
                model.id
            )
        })?,
        status: WantedStatus::from_str(&model.status)
            .map_err(|_| anyhow!("invalid status '{}' in wanted item {}", model.status, model.id))?,
        search_count: model.search_count,
        last_search_at: model.last_search_at,
        retry_after: model.retry_after,
        current_score: model.current_score,
        upgrade_candidate: model.upgrade_candidate,
        series_id: model.series_id,
        episode_id: model.episode_id,
        movie_id: model.movie_id,
        title: model.title,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}
