//! Scoring weight overrides and provider score modifiers
//!
//! Defaults live in `crate::providers::scoring`; this repository stores only
//! the user overrides and the per-provider score bias.

use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::entities::{
    prelude::{ProviderScoreModifiers, ScoringWeights},
    provider_score_modifiers, scoring_weights,
};

#[derive(Clone)]
pub struct ScoringRepository {
    connection: Arc<DatabaseConnection>,
}

impl ScoringRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Weight overrides for a score type (`episode` or `movie`), unmerged
    pub async fn weight_overrides(&self, score_type: &str) -> Result<BTreeMap<String, i32>> {
        let entries = ScoringWeights::find()
            .filter(scoring_weights::Column::ScoreType.eq(score_type))
            .all(&*self.connection)
            .await?;
        Ok(entries
            .into_iter()
            .map(|e| (e.weight_key, e.weight_value))
            .collect())
    }

    /// Upsert weight overrides for a score type
    pub async fn set_weights(
        &self,
        score_type: &str,
        weights: &BTreeMap<String, i32>,
    ) -> Result<()> {
        let now = Utc::now();
        for (key, value) in weights {
            let existing = ScoringWeights::find()
                .filter(scoring_weights::Column::ScoreType.eq(score_type))
                .filter(scoring_weights::Column::WeightKey.eq(key))
                .one(&*self.connection)
                .await?;

            match existing {
                Some(model) => {
                    let mut active: scoring_weights::ActiveModel = model.into();
                    active.weight_value = Set(*value);
                    active.updated_at = Set(now);
                    active.update(&*self.connection).await?;
                }
                None => {
                    let active = scoring_weights::ActiveModel {
                        score_type: Set(score_type.to_string()),
                        weight_key: Set(key.clone()),
                        weight_value: Set(*value),
                        updated_at: Set(now),
                        ..Default::default()
                    };
                    active.insert(&*self.connection).await?;
                }
            }
        }
        Ok(())
    }

    /// Delete weight overrides for one type, or all when `None`
    pub async fn reset_weights(&self, score_type: Option<&str>) -> Result<u64> {
        let mut delete = ScoringWeights::delete_many();
        if let Some(score_type) = score_type {
            delete = delete.filter(scoring_weights::Column::ScoreType.eq(score_type));
        }
        let result = delete.exec(&*self.connection).await?;
        Ok(result.rows_affected)
    }

    /// The score modifier for a provider; 0 when not configured
    pub async fn provider_modifier(&self, provider_name: &str) -> Result<i32> {
        let entry = ProviderScoreModifiers::find_by_id(provider_name.to_string())
            .one(&*self.connection)
            .await?;
        Ok(entry.map(|e| e.modifier).unwrap_or(0))
    }

    pub async fn all_provider_modifiers(&self) -> Result<BTreeMap<String, i32>> {
        let entries = ProviderScoreModifiers::find()
            .order_by_asc(provider_score_modifiers::Column::ProviderName)
            .all(&*self.connection)
            .await?;
        Ok(entries
            .into_iter()
            .map(|e| (e.provider_name, e.modifier))
            .collect())
    }

    pub async fn set_provider_modifier(&self, provider_name: &str, modifier: i32) -> Result<()> {
        let now = Utc::now();
        let existing = ProviderScoreModifiers::find_by_id(provider_name.to_string())
            .one(&*self.connection)
            .await?;

        match existing {
            Some(model) => {
                let mut active: provider_score_modifiers::ActiveModel = model.into();
                active.modifier = Set(modifier);
                active.updated_at = Set(now);
                active.update(&*self.connection).await?;
            }
            None => {
                let active = provider_score_modifiers::ActiveModel {
                    provider_name: Set(provider_name.to_string()),
                    modifier: Set(modifier),
                    updated_at: Set(now),
                };
                active.insert(&*self.connection).await?;
            }
        }
        Ok(())
    }

    pub async fn delete_provider_modifier(&self, provider_name: &str) -> Result<bool> {
        let result = ProviderScoreModifiers::delete_by_id(provider_name.to_string())
            .exec(&*self.connection)
            .await?;
        Ok(result.rows_affected == 1)
    }
}
