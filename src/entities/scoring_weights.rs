//! `scoring_weights`: per-kind overrides of the built-in scoring weights
//!
//! Unique on `(score_type, weight_key)`.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "scoring_weights")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub score_type: String,
    pub weight_key: String,
    pub weight_value: i32,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
