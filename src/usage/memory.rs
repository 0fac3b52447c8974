use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::types::usage::UsageRecord;

use super::store::{IncrementOutcome, UsageStore};

/// Process-local usage store, used when no database is configured.
///
/// Each operation runs under a single lock acquisition, which gives the same
/// atomicity as the conditional SQL statements of the Postgres store.
#[derive(Debug, Default)]
pub struct InMemoryUsageStore {
    records: Mutex<HashMap<(String, i32), UsageRecord>>,
}

impl InMemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn new_record(user_id: &str, year: i32, count: u32, limit: u32) -> UsageRecord {
    UsageRecord {
        user_id: user_id.to_string(),
        year,
        count,
        limit,
    }
}

#[async_trait]
impl UsageStore for InMemoryUsageStore {
    async fn try_increment(
        &self,
        user_id: &str,
        year: i32,
        default_limit: u32,
    ) -> Result<IncrementOutcome> {
        let mut records = self.records.lock().await;
        let record = records
            .entry((user_id.to_string(), year))
            .or_insert_with(|| new_record(user_id, year, 0, default_limit));

        if record.count >= record.limit {
            return Ok(IncrementOutcome::LimitReached(record.clone()));
        }

        record.count += 1;
        Ok(IncrementOutcome::Incremented(record.clone()))
    }

    async fn decrement(&self, user_id: &str, year: i32) -> Result<()> {
        let mut records = self.records.lock().await;
        if let Some(record) = records.get_mut(&(user_id.to_string(), year)) {
            record.count = record.count.saturating_sub(1);
        }
        Ok(())
    }

    async fn fetch(&self, user_id: &str, year: i32) -> Result<Option<UsageRecord>> {
        let records = self.records.lock().await;
        Ok(records.get(&(user_id.to_string(), year)).cloned())
    }

    async fn get_or_create(
        &self,
        user_id: &str,
        year: i32,
        default_limit: u32,
    ) -> Result<UsageRecord> {
        let mut records = self.records.lock().await;
        let record = records
            .entry((user_id.to_string(), year))
            .or_insert_with(|| new_record(user_id, year, 0, default_limit));
        Ok(record.clone())
    }

    async fn set_limit(&self, user_id: &str, year: i32, limit: u32) -> Result<UsageRecord> {
        let mut records = self.records.lock().await;
        let record = records
            .entry((user_id.to_string(), year))
            .or_insert_with(|| new_record(user_id, year, 0, limit));
        record.limit = limit;
        Ok(record.clone())
    }

    async fn reset(&self, user_id: &str, year: i32, limit: u32) -> Result<UsageRecord> {
        let mut records = self.records.lock().await;
        let record = new_record(user_id, year, 0, limit);
        records.insert((user_id.to_string(), year), record.clone());
        Ok(record)
    }
}
