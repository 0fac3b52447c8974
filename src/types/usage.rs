use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::request::Tier;

/// Per-user, per-year generation counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub user_id: String,
    pub year: i32,
    pub count: u32,
    pub limit: u32,
}

impl UsageRecord {
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.count)
    }
}

/// Outcome of a check-and-deduct call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub limit: u32,
    /// Year the unit was charged to; a refund goes back to the same year.
    pub year: i32,
}

impl UsageDecision {
    pub fn allowed(record: &UsageRecord) -> Self {
        Self {
            allowed: true,
            remaining: record.remaining(),
            limit: record.limit,
            year: record.year,
        }
    }

    pub fn denied(record: &UsageRecord) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            limit: record.limit,
            year: record.year,
        }
    }
}

/// Read-only view of a user's allowance for the current year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub year: i32,
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    pub subscription_type: Tier,
    pub reset_date: DateTime<Utc>,
}

impl UsageSummary {
    pub fn from_record(record: &UsageRecord, tier: Tier) -> Self {
        let reset_date = Utc
            .with_ymd_and_hms(record.year + 1, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);

        Self {
            year: record.year,
            used: record.count,
            limit: record.limit,
            remaining: record.remaining(),
            subscription_type: tier,
            reset_date,
        }
    }
}
