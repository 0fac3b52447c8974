use std::sync::Arc;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PlannerError, Result};
use crate::types::request::Tier;
use crate::types::usage::{UsageDecision, UsageRecord, UsageSummary};

use super::store::{IncrementOutcome, UsageStore};

pub const DEFAULT_FREE_LIMIT: u32 = 3;
pub const DEFAULT_VIP_LIMIT: u32 = 1000;

/// Yearly generation allowance per tier, applied when a record is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLimits {
    pub free: u32,
    pub vip: u32,
}

impl UsageLimits {
    pub fn for_tier(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Free => self.free,
            Tier::Vip => self.vip,
        }
    }
}

impl Default for UsageLimits {
    fn default() -> Self {
        Self {
            free: DEFAULT_FREE_LIMIT,
            vip: DEFAULT_VIP_LIMIT,
        }
    }
}

pub fn current_year() -> i32 {
    Utc::now().year()
}

/// Enforces per-user yearly quotas on top of a [`UsageStore`].
#[derive(Debug, Clone)]
pub struct UsageAccountant {
    store: Arc<dyn UsageStore>,
    limits: UsageLimits,
}

impl UsageAccountant {
    pub fn new(store: Arc<dyn UsageStore>, limits: UsageLimits) -> Self {
        Self { store, limits }
    }

    pub fn limits(&self) -> UsageLimits {
        self.limits
    }

    /// Consume one generation from the user's allowance for this year.
    ///
    /// A denial is a normal outcome (`allowed == false`); an `Err` means the
    /// store itself failed.
    pub async fn check_and_deduct(&self, user_id: &str, tier: Tier) -> Result<UsageDecision> {
        let year = current_year();
        let outcome = self
            .store
            .try_increment(user_id, year, self.limits.for_tier(tier))
            .await?;

        match outcome {
            IncrementOutcome::Incremented(record) => {
                info!(
                    target: "trip_planner::usage",
                    user_id,
                    year,
                    count = record.count,
                    limit = record.limit,
                    "usage deducted"
                );
                Ok(UsageDecision::allowed(&record))
            }
            IncrementOutcome::LimitReached(record) => {
                info!(
                    target: "trip_planner::usage",
                    user_id,
                    year,
                    limit = record.limit,
                    "yearly limit reached"
                );
                Ok(UsageDecision::denied(&record))
            }
        }
    }

    /// Give back one generation charged to `year` after a failed attempt.
    ///
    /// Never fails: store errors are logged and dropped so the caller's
    /// original error stays the one reported.
    pub async fn refund(&self, user_id: &str, year: i32) {
        match self.store.decrement(user_id, year).await {
            Ok(()) => info!(target: "trip_planner::usage", user_id, year, "usage refunded"),
            Err(err) => warn!(
                target: "trip_planner::usage",
                user_id,
                year,
                error = %err,
                "usage refund failed"
            ),
        }
    }

    /// Administrative override of a record's limit, e.g. after an upgrade.
    pub async fn update_limit(
        &self,
        user_id: &str,
        new_limit: u32,
        year: Option<i32>,
    ) -> Result<UsageRecord> {
        if new_limit == 0 {
            return Err(PlannerError::InvalidRequest(
                "usage limit must be positive".to_string(),
            ));
        }

        let year = year.unwrap_or_else(current_year);
        let record = self.store.set_limit(user_id, year, new_limit).await?;
        info!(
            target: "trip_planner::usage",
            user_id,
            year,
            limit = new_limit,
            "usage limit updated"
        );
        Ok(record)
    }

    pub async fn usage_summary(&self, user_id: &str, tier: Tier) -> Result<UsageSummary> {
        let record = self
            .store
            .get_or_create(user_id, current_year(), self.limits.for_tier(tier))
            .await?;
        Ok(UsageSummary::from_record(&record, tier))
    }

    /// Zero the count and reapply the tier limit (free when not given).
    pub async fn reset_usage(
        &self,
        user_id: &str,
        year: Option<i32>,
        tier: Option<Tier>,
    ) -> Result<UsageRecord> {
        let year = year.unwrap_or_else(current_year);
        let limit = self.limits.for_tier(tier.unwrap_or_default());
        let record = self.store.reset(user_id, year, limit).await?;
        info!(target: "trip_planner::usage", user_id, year, limit, "usage reset");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::memory::InMemoryUsageStore;

    fn accountant(free: u32) -> UsageAccountant {
        UsageAccountant::new(
            Arc::new(InMemoryUsageStore::new()),
            UsageLimits { free, vip: 1000 },
        )
    }

    #[tokio::test]
    async fn test_sequential_deductions_count_down_then_deny() {
        let accountant = accountant(3);

        for expected_remaining in [2, 1, 0] {
            let decision = accountant.check_and_deduct("u1", Tier::Free).await.unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
            assert_eq!(decision.limit, 3);
        }

        for _ in 0..2 {
            let decision = accountant.check_and_deduct("u1", Tier::Free).await.unwrap();
            assert!(!decision.allowed);
            assert_eq!(decision.remaining, 0);
            assert_eq!(decision.limit, 3);
        }
    }

    #[tokio::test]
    async fn test_refund_restores_remaining() {
        let accountant = accountant(3);
        accountant.check_and_deduct("u1", Tier::Free).await.unwrap();
        let before = accountant.usage_summary("u1", Tier::Free).await.unwrap();

        let decision = accountant.check_and_deduct("u1", Tier::Free).await.unwrap();
        assert_eq!(decision.year, current_year());
        accountant.refund("u1", decision.year).await;

        let after = accountant.usage_summary("u1", Tier::Free).await.unwrap();
        assert_eq!(after.remaining, before.remaining);
    }

    #[tokio::test]
    async fn test_refund_at_zero_stays_at_zero() {
        let accountant = accountant(3);
        accountant.usage_summary("u1", Tier::Free).await.unwrap();
        accountant.refund("u1", current_year()).await;
        accountant.refund("u1", current_year()).await;

        let summary = accountant.usage_summary("u1", Tier::Free).await.unwrap();
        assert_eq!(summary.used, 0);
        assert_eq!(summary.remaining, 3);
    }

    #[tokio::test]
    async fn test_refund_goes_to_the_charged_year() {
        let store = Arc::new(InMemoryUsageStore::new());
        let accountant = UsageAccountant::new(store.clone(), UsageLimits::default());
        let last_year = current_year() - 1;
        store.try_increment("u1", last_year, 3).await.unwrap();

        accountant.refund("u1", last_year).await;

        assert_eq!(store.fetch("u1", last_year).await.unwrap().unwrap().count, 0);
        assert!(store.fetch("u1", current_year()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upgrade_keeps_count_and_raises_limit() {
        let accountant = accountant(1);
        accountant.check_and_deduct("u1", Tier::Free).await.unwrap();
        assert!(!accountant.check_and_deduct("u1", Tier::Free).await.unwrap().allowed);

        let record = accountant.update_limit("u1", 1000, None).await.unwrap();
        assert_eq!(record.count, 1);
        assert_eq!(record.limit, 1000);

        let decision = accountant.check_and_deduct("u1", Tier::Vip).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 998);
    }

    #[tokio::test]
    async fn test_zero_limit_rejected() {
        let err = accountant(3).update_limit("u1", 0, None).await.unwrap_err();
        assert!(matches!(err, PlannerError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_summary_and_reset() {
        let accountant = accountant(3);
        accountant.check_and_deduct("u1", Tier::Free).await.unwrap();
        accountant.check_and_deduct("u1", Tier::Free).await.unwrap();

        let summary = accountant.usage_summary("u1", Tier::Free).await.unwrap();
        assert_eq!(summary.year, current_year());
        assert_eq!(summary.used, 2);
        assert_eq!(summary.remaining, 1);
        assert_eq!(summary.reset_date.year(), current_year() + 1);

        let record = accountant.reset_usage("u1", None, Some(Tier::Vip)).await.unwrap();
        assert_eq!(record.count, 0);
        assert_eq!(record.limit, 1000);
    }
}
