use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio_test::{assert_err, assert_ok};
use trip_planner_rs::{
    types::UsageRecord,
    usage::{IncrementOutcome, UsageStore},
    BudgetLevel, InMemoryUsageStore, Language, PlanGenerator, PlannerConfig, PlannerError,
    PlanningRequest, ProviderAdapter, RetryPolicy, Tier, TripPlanner, UsageAccountant,
    UsageLimits,
};

const PLAN_JSON: &str = r#"{
  "tagline": "Temples, tea and quiet gardens",
  "tags": ["history", "food", "gardens"],
  "detailedDescription": "Kyoto was the imperial capital for over a millennium.",
  "country": "Japan",
  "itineraries": [
    {
      "dayNumber": 1,
      "date": "2025-04-01",
      "title": "Arrival",
      "activities": [
        {"title": "Check in", "startTime": "15:00", "endTime": "16:00",
         "location": "Gion", "description": "Drop bags", "estimatedCost": 0}
      ]
    },
    {
      "dayNumber": 2,
      "date": "2025-04-02",
      "title": "Fushimi Inari",
      "activities": [
        {"title": "Torii hike", "startTime": "08:00", "endTime": "11:00",
         "location": "Fushimi", "description": "Early start", "estimatedCost": 0}
      ]
    }
  ],
  "packingItems": [
    {"name": "Walking shoes", "category": "clothing", "quantity": 1, "isEssential": true}
  ],
  "todoChecklist": [
    {"title": "Book ryokan", "priority": "high"}
  ]
}"#;

#[derive(Debug)]
struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, PlannerError>>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(replies: Vec<Result<String, PlannerError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn always_ok() -> Arc<Self> {
        Self::new(Vec::new())
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, PlannerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(PLAN_JSON.to_string()))
    }
}

/// Store whose every primitive fails, as if the database were down.
#[derive(Debug, Default)]
struct BrokenStore;

#[async_trait]
impl UsageStore for BrokenStore {
    async fn try_increment(
        &self,
        _user_id: &str,
        _year: i32,
        _limit: u32,
    ) -> Result<IncrementOutcome, PlannerError> {
        Err(PlannerError::Accounting("connection refused".into()))
    }

    async fn decrement(&self, _user_id: &str, _year: i32) -> Result<(), PlannerError> {
        Err(PlannerError::Accounting("connection refused".into()))
    }

    async fn fetch(&self, _user_id: &str, _year: i32) -> Result<Option<UsageRecord>, PlannerError> {
        Err(PlannerError::Accounting("connection refused".into()))
    }

    async fn get_or_create(&self, _user_id: &str, _year: i32, _limit: u32) -> Result<UsageRecord, PlannerError> {
        Err(PlannerError::Accounting("connection refused".into()))
    }

    async fn set_limit(&self, _user_id: &str, _year: i32, _limit: u32) -> Result<UsageRecord, PlannerError> {
        Err(PlannerError::Accounting("connection refused".into()))
    }

    async fn reset(&self, _user_id: &str, _year: i32, _limit: u32) -> Result<UsageRecord, PlannerError> {
        Err(PlannerError::Accounting("connection refused".into()))
    }
}

/// Store that works except for refunds.
#[derive(Debug, Default)]
struct RefundFailsStore {
    inner: InMemoryUsageStore,
}

#[async_trait]
impl UsageStore for RefundFailsStore {
    async fn try_increment(
        &self,
        user_id: &str,
        year: i32,
        limit: u32,
    ) -> Result<IncrementOutcome, PlannerError> {
        self.inner.try_increment(user_id, year, limit).await
    }

    async fn decrement(&self, _user_id: &str, _year: i32) -> Result<(), PlannerError> {
        Err(PlannerError::Accounting("deadlock detected".into()))
    }

    async fn fetch(&self, user_id: &str, year: i32) -> Result<Option<UsageRecord>, PlannerError> {
        self.inner.fetch(user_id, year).await
    }

    async fn get_or_create(
        &self,
        user_id: &str,
        year: i32,
        limit: u32,
    ) -> Result<UsageRecord, PlannerError> {
        self.inner.get_or_create(user_id, year, limit).await
    }

    async fn set_limit(&self, user_id: &str, year: i32, limit: u32) -> Result<UsageRecord, PlannerError> {
        self.inner.set_limit(user_id, year, limit).await
    }

    async fn reset(&self, user_id: &str, year: i32, limit: u32) -> Result<UsageRecord, PlannerError> {
        self.inner.reset(user_id, year, limit).await
    }
}

fn request() -> PlanningRequest {
    PlanningRequest::new(
        "Kyoto",
        BudgetLevel::Medium,
        NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
    )
    .with_country("Japan")
    .with_language(Language::En)
}

fn planner_with(store: Arc<dyn UsageStore>, provider: Arc<ScriptedProvider>, free: u32) -> TripPlanner {
    let generator = PlanGenerator::new(provider).with_retry_policy(RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::ZERO,
        request_timeout: Duration::from_secs(5),
    });
    TripPlanner::new(
        UsageAccountant::new(store, UsageLimits { free, vip: 1000 }),
        generator,
    )
}

#[tokio::test]
async fn test_plan_trip_end_to_end() {
    let provider = ScriptedProvider::always_ok();
    let planner = planner_with(Arc::new(InMemoryUsageStore::new()), provider.clone(), 3);

    let outcome = assert_ok!(planner.plan_trip("user-1", Tier::Free, &request()).await);

    assert_eq!(outcome.plan.tagline, "Temples, tea and quiet gardens");
    assert_eq!(outcome.plan.itineraries.len(), 2);
    assert!(outcome.usage.allowed);
    assert_eq!(outcome.usage.remaining, 2);
    assert_eq!(outcome.usage.limit, 3);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_quota_exhaustion_skips_provider() {
    let provider = ScriptedProvider::always_ok();
    let planner = planner_with(Arc::new(InMemoryUsageStore::new()), provider.clone(), 2);

    for expected_remaining in [1, 0] {
        let outcome = assert_ok!(planner.plan_trip("user-1", Tier::Free, &request()).await);
        assert_eq!(outcome.usage.remaining, expected_remaining);
    }

    let err = assert_err!(planner.plan_trip("user-1", Tier::Free, &request()).await);
    assert!(matches!(err, PlannerError::QuotaExceeded { limit: 2 }));
    assert_eq!(err.error_code(), "QUOTA_EXCEEDED");
    assert_eq!(err.to_error_payload()["error"]["details"]["remaining"], 0);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_failed_generation_refunds_usage() {
    let provider = ScriptedProvider::new(vec![Err(PlannerError::ProviderAuth("bad key".into()))]);
    let planner = planner_with(Arc::new(InMemoryUsageStore::new()), provider.clone(), 3);

    let err = assert_err!(planner.plan_trip("user-1", Tier::Free, &request()).await);
    assert!(matches!(err, PlannerError::ProviderAuth(_)));
    assert_eq!(provider.calls(), 1);

    let summary = assert_ok!(planner.accountant().usage_summary("user-1", Tier::Free).await);
    assert_eq!(summary.used, 0);
    assert_eq!(summary.remaining, 3);
}

#[tokio::test]
async fn test_refund_failure_does_not_mask_generation_error() {
    let provider = ScriptedProvider::new(vec![
        Ok("Sorry, I can't do that.".to_string()),
        Ok("Still no JSON here.".to_string()),
    ]);
    let planner = planner_with(Arc::new(RefundFailsStore::default()), provider.clone(), 3);

    let err = assert_err!(planner.plan_trip("user-1", Tier::Free, &request()).await);
    assert!(matches!(err, PlannerError::RecoveryFailure(_)));
    assert_eq!(err.error_code(), "AI_GENERATION_FAILED");
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_store_outage_is_not_reported_as_quota() {
    let provider = ScriptedProvider::always_ok();
    let planner = planner_with(Arc::new(BrokenStore), provider.clone(), 3);

    let err = assert_err!(planner.plan_trip("user-1", Tier::Free, &request()).await);
    assert!(matches!(err, PlannerError::Accounting(_)));
    assert_eq!(err.error_code(), "DATABASE_ERROR");
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_truncated_response_is_recovered() {
    let cut = PLAN_JSON.find(r#"{"title": "Book ryokan""#).unwrap();
    let truncated = format!("```json\n{}", &PLAN_JSON[..cut]);
    let provider = ScriptedProvider::new(vec![Ok(truncated)]);
    let planner = planner_with(Arc::new(InMemoryUsageStore::new()), provider.clone(), 3);

    let outcome = assert_ok!(planner.plan_trip("user-1", Tier::Free, &request()).await);
    assert_eq!(outcome.plan.itineraries.len(), 2);
    assert!(outcome.plan.todo_checklist.is_empty());
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_users_are_metered_independently() {
    let planner = planner_with(
        Arc::new(InMemoryUsageStore::new()),
        ScriptedProvider::always_ok(),
        1,
    );

    assert_ok!(planner.plan_trip("alice", Tier::Free, &request()).await);
    assert_err!(planner.plan_trip("alice", Tier::Free, &request()).await);
    assert_ok!(planner.plan_trip("bob", Tier::Free, &request()).await);
}

#[tokio::test]
async fn test_from_default_config_uses_memory_store_and_laozhang() {
    let planner = assert_ok!(TripPlanner::from_config(&PlannerConfig::default()).await);
    assert_eq!(planner.generator().provider_name(), "laozhang");

    let summary = assert_ok!(planner.accountant().usage_summary("user-1", Tier::Vip).await);
    assert_eq!(summary.limit, 1000);
    assert_eq!(summary.used, 0);
}

#[test]
fn test_error_payload_shape() {
    let error = PlannerError::ProviderTransient("503".to_string());
    let payload = error.to_error_payload();
    assert_eq!(payload["error"]["code"], "PROVIDER_UNAVAILABLE");
    assert_eq!(payload["error"]["retryable"], true);
}
