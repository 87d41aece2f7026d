//! `blacklist`: releases that must never be downloaded again
//!
//! Unique on `(provider_name, external_id)`.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "blacklist")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub provider_name: String,
    pub external_id: String,
    pub language: String,
    pub media_file_path: String,
    pub title: Option<String>,
    pub reason: Option<String>,
    pub added_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
