//! Config entry repository: persisted settings overrides
//!
//! Entries are dotted setting paths (`webhook.delay_minutes`) whose string
//! values are applied over file/env settings at load time.

use anyhow::Result;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::entities::{config_entries, prelude::ConfigEntries};

#[derive(Clone)]
pub struct ConfigEntryRepository {
    connection: Arc<DatabaseConnection>,
}

impl ConfigEntryRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let entry = ConfigEntries::find_by_id(key.to_string())
            .one(&*self.connection)
            .await?;
        Ok(entry.map(|e| e.value))
    }

    pub async fn all(&self) -> Result<BTreeMap<String, String>> {
        let entries = ConfigEntries::find().all(&*self.connection).await?;
        Ok(entries.into_iter().map(|e| (e.key, e.value)).collect())
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now();
        let existing = ConfigEntries::find_by_id(key.to_string())
            .one(&*self.connection)
            .await?;

        match existing {
            Some(model) => {
                let mut active: config_entries::ActiveModel = model.into();
                active.value = Set(value.to_string());
                active.updated_at = Set(now);
                active.update(&*self.connection).await?;
            }
            None => {
                let active = config_entries::ActiveModel {
                    key: Set(key.to_string()),
                    value: Set(value.to_string()),
                    updated_at: Set(now),
                };
                active.insert(&*self.connection).await?;
            }
        }
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        let result = ConfigEntries::delete_by_id(key.to_string())
            .exec(&*self.connection)
            .await?;
        Ok(result.rows_affected == 1)
    }
}
