use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::usage::UsageRecord;

/// Result of the atomic increment primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncrementOutcome {
    /// The count was bumped; the record reflects the new count.
    Incremented(UsageRecord),
    /// The stored limit was already reached; nothing changed.
    LimitReached(UsageRecord),
}

/// Persistent home of [`UsageRecord`]s.
///
/// Every method is a single atomic operation against the backing store.
/// Implementations must never read a count into memory, modify it, and
/// write it back.
#[async_trait]
pub trait UsageStore: Send + Sync + Debug {
    /// Increment the count for `(user_id, year)` when it is below the
    /// record's stored limit. An absent record is created with count 1 and
    /// `default_limit`.
    async fn try_increment(
        &self,
        user_id: &str,
        year: i32,
        default_limit: u32,
    ) -> Result<IncrementOutcome>;

    /// Decrement the count, never below zero. Missing records are left alone.
    async fn decrement(&self, user_id: &str, year: i32) -> Result<()>;

    async fn fetch(&self, user_id: &str, year: i32) -> Result<Option<UsageRecord>>;

    /// Fetch the record, creating it with count 0 when absent.
    async fn get_or_create(&self, user_id: &str, year: i32, default_limit: u32)
        -> Result<UsageRecord>;

    /// Overwrite the limit without touching the count. An absent record is
    /// created with count 0.
    async fn set_limit(&self, user_id: &str, year: i32, limit: u32) -> Result<UsageRecord>;

    /// Set the count to 0 and the limit to `limit`.
    async fn reset(&self, user_id: &str, year: i32, limit: u32) -> Result<UsageRecord>;
}
