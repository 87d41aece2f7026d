//! `subtitle_downloads`: one row per successful install

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "subtitle_downloads")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub provider_name: String,
    pub external_id: String,
    pub language: String,
    pub format: String,
    pub installed_path: String,
    pub score: i32,
    pub subtitle_kind: String,
    pub source: String,
    pub downloaded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
