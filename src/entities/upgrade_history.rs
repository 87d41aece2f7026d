//! `upgrade_history`: append-only record of subtitle replacements

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "upgrade_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub media_file_path: String,
    pub old_format: String,
    pub old_score: i32,
    pub new_format: String,
    pub new_score: i32,
    pub provider_name: String,
    pub reason: String,
    pub upgraded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
