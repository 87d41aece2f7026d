//! `provider_stats`: per-provider reliability counters, one row per provider

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "provider_stats")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub provider_name: String,
    pub total_searches: i64,
    pub successes: i64,
    pub failures: i64,
    pub avg_score: f64,
    pub last_success_at: Option<DateTimeUtc>,
    pub last_failure_at: Option<DateTimeUtc>,
    pub consecutive_failures: i32,
    pub avg_response_time_ms: f64,
    pub auto_disabled: bool,
    pub disabled_until: Option<DateTimeUtc>,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
