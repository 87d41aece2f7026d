//! `wanted_items`: the durable wanted-item state machine
//!
//! `(media_file_path, target_language, subtitle_kind)` is unique; the
//! composite `(status, kind)` and `retry_after` indexes back the due-item
//! query in the scheduler.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "wanted_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub kind: String,
    pub media_file_path: String,
    pub target_language: String,
    pub subtitle_kind: String,
    pub status: String,
    pub search_count: i32,
    pub last_search_at: Option<DateTimeUtc>,
    pub retry_after: Option<DateTimeUtc>,
    pub current_score: i32,
    pub upgrade_candidate: bool,
    pub series_id: Option<i64>,
    pub episode_id: Option<i64>,
    pub movie_id: Option<i64>,
    pub title: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
