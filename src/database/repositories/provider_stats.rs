//! SeaORM-based provider statistics repository
//!
//! One row per registered provider, updated after every search/download.
//! Rolling averages use a light exponential blend so a single slow call
//! does not dominate the history.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};
use std::sync::Arc;

use crate::entities::{prelude::ProviderStats, provider_stats};
use crate::models::ProviderStatistics;

/// Weight of the newest observation in the rolling averages
const ROLLING_BLEND: f64 = 0.2;

#[derive(Clone)]
pub struct ProviderStatsRepository {
    connection: Arc<DatabaseConnection>,
}

impl ProviderStatsRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn get(&self, provider_name: &str) -> Result<Option<ProviderStatistics>> {
        let model = ProviderStats::find_by_id(provider_name.to_string())
            .one(&*self.connection)
            .await?;
        Ok(model.map(model_to_domain))
    }

    pub async fn list(&self) -> Result<Vec<ProviderStatistics>> {
        let models = ProviderStats::find()
            .order_by_asc(provider_stats::Column::ProviderName)
            .all(&*self.connection)
            .await?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    /// Record a successful search/download with its best score and latency
    pub async fn record_success(
        &self,
        provider_name: &str,
        score: Option<i32>,
        response_time_ms: u64,
    ) -> Result<()> {
        let now = Utc::now();
        let existing = ProviderStats::find_by_id(provider_name.to_string())
            .one(&*self.connection)
            .await?;

        match existing {
            Some(model) => {
                let avg_score = match score {
                    Some(s) if model.avg_score > 0.0 => {
                        model.avg_score * (1.0 - ROLLING_BLEND) + f64::from(s) * ROLLING_BLEND
                    }
                    Some(s) => f64::from(s),
                    None => model.avg_score,
                };
                let avg_response = blend_response_time(model.avg_response_time_ms, response_time_ms);
                let total_searches = model.total_searches + 1;
                let successes = model.successes + 1;

                let mut active: provider_stats::ActiveModel = model.into();
                active.total_searches = Set(total_searches);
                active.successes = Set(successes);
                active.consecutive_failures = Set(0);
                active.avg_score = Set(avg_score);
                active.avg_response_time_ms = Set(avg_response);
                active.last_success_at = Set(Some(now));
                active.auto_disabled = Set(false);
                active.disabled_until = Set(None);
                active.updated_at = Set(now);
                active.update(&*self.connection).await?;
            }
            None => {
                let active = provider_stats::ActiveModel {
                    provider_name: Set(provider_name.to_string()),
                    total_searches: Set(1),
                    successes: Set(1),
                    failures: Set(0),
                    avg_score: Set(score.map(f64::from).unwrap_or(0.0)),
                    last_success_at: Set(Some(now)),
                    last_failure_at: Set(None),
                    consecutive_failures: Set(0),
                    avg_response_time_ms: Set(response_time_ms as f64),
                    auto_disabled: Set(false),
                    disabled_until: Set(None),
                    updated_at: Set(now),
                };
                active.insert(&*self.connection).await?;
            }
        }
        Ok(())
    }

    /// Record a failed search/download, optionally auto-disabling the
    /// provider until a cooldown deadline (rate-limit handling)
    pub async fn record_failure(
        &self,
        provider_name: &str,
        response_time_ms: u64,
        disabled_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let now = Utc::now();
        let existing = ProviderStats::find_by_id(provider_name.to_string())
            .one(&*self.connection)
            .await?;

        match existing {
            Some(model) => {
                let avg_response = blend_response_time(model.avg_response_time_ms, response_time_ms);
                let total_searches = model.total_searches + 1;
                let failures = model.failures + 1;
                let consecutive_failures = model.consecutive_failures + 1;

                let mut active: provider_stats::ActiveModel = model.into();
                active.total_searches = Set(total_searches);
                active.failures = Set(failures);
                active.consecutive_failures = Set(consecutive_failures);
                active.avg_response_time_ms = Set(avg_response);
                active.last_failure_at = Set(Some(now));
                if disabled_until.is_some() {
                    active.auto_disabled = Set(true);
                    active.disabled_until = Set(disabled_until);
                }
                active.updated_at = Set(now);
                active.update(&*self.connection).await?;
            }
            None => {
                let active = provider_stats::ActiveModel {
                    provider_name: Set(provider_name.to_string()),
                    total_searches: Set(1),
                    successes: Set(0),
                    failures: Set(1),
                    avg_score: Set(0.0),
                    last_success_at: Set(None),
                    last_failure_at: Set(Some(now)),
                    consecutive_failures: Set(1),
                    avg_response_time_ms: Set(response_time_ms as f64),
                    auto_disabled: Set(disabled_until.is_some()),
                    disabled_until: Set(disabled_until),
                    updated_at: Set(now),
                };
                active.insert(&*self.connection).await?;
            }
        }
        Ok(())
    }

    /// Whether a provider is currently sitting out a rate-limit cooldown
    pub async fn is_disabled(&self, provider_name: &str, now: DateTime<Utc>) -> Result<bool> {
        let stats = self.get(provider_name).await?;
        Ok(match stats {
            Some(s) if s.auto_disabled => s.disabled_until.map(|until| until > now).unwrap_or(true),
            _ => false,
        })
    }
}

fn blend_response_time(current: f64, sample_ms: u64) -> f64 {
    if current > 0.0 {
        current * (1.0 - ROLLING_BLEND) + (sample_ms as f64) * ROLLING_BLEND
    } else {
        sample_ms as f64
    }
}

fn model_to_domain(model: provider_stats::Model) -> ProviderStatistics {
    ProviderStatistics {
        provider_name: model.provider_name,
        total_searches: model.total_searches,
        successes: model.successes,
        failures: model.failures,
        avg_score: model.avg_score,
        last_success_at: model.last_success_at,
        last_failure_at: model.last_failure_at,
        consecutive_failures: model.consecutive_failures,
        avg_response_time_ms: model.avg_response_time_ms,
        auto_disabled: model.auto_disabled,
        disabled_until: model.disabled_until,
    }
}
