use std::{sync::Arc, time::Duration};

use tracing::{debug, info, warn};

use crate::{
    error::{PlannerError, Result},
    providers::ProviderAdapter,
    recovery::PlanParser,
    services::prompt::build_prompt,
    types::{plan::GeneratedPlan, request::PlanningRequest},
};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(2000);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// How often and how patiently a generation is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Attempt `n` failing waits `base_delay * n` before attempt `n + 1`.
    pub base_delay: Duration,
    /// Upper bound on a single provider call.
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Turns a [`PlanningRequest`] into a [`GeneratedPlan`] using one provider.
#[derive(Debug, Clone)]
pub struct PlanGenerator {
    provider: Arc<dyn ProviderAdapter>,
    parser: PlanParser,
    retry: RetryPolicy,
}

impl PlanGenerator {
    pub fn new(provider: Arc<dyn ProviderAdapter>) -> Self {
        Self {
            provider,
            parser: PlanParser::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_parser(mut self, parser: PlanParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// One attempt: prompt, provider call, recovery, sanitation.
    pub async fn generate(&self, request: &PlanningRequest) -> Result<GeneratedPlan> {
        let prompt = build_prompt(request);
        debug!(
            target: "trip_planner::generator",
            provider = self.provider.name(),
            prompt_len = prompt.len(),
            "generating plan"
        );

        let raw = tokio::time::timeout(self.retry.request_timeout, self.provider.complete(&prompt))
            .await
            .map_err(|_| {
                PlannerError::ProviderTransient(format!(
                    "{} did not respond within {}s",
                    self.provider.name(),
                    self.retry.request_timeout.as_secs()
                ))
            })??;

        let plan = self.parser.sanitize(self.parser.parse(&raw)?);
        Ok(backfill_country(plan, request))
    }

    /// Attempt generation up to `max_attempts` times in total.
    ///
    /// Permanent failures (auth, provider quota) are returned immediately.
    /// When every attempt fails the last error is returned.
    pub async fn generate_with_retry(
        &self,
        request: &PlanningRequest,
        max_attempts: u32,
    ) -> Result<GeneratedPlan> {
        let max_attempts = max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.generate(request).await {
                Ok(plan) => {
                    info!(
                        target: "trip_planner::generator",
                        provider = self.provider.name(),
                        attempt,
                        destination = %request.destination_name,
                        "plan generated"
                    );
                    return Ok(plan);
                }
                Err(err) if !err.is_retryable() => {
                    warn!(
                        target: "trip_planner::generator",
                        provider = self.provider.name(),
                        attempt,
                        error = %err,
                        "permanent generation failure"
                    );
                    return Err(err);
                }
                Err(err) => {
                    warn!(
                        target: "trip_planner::generator",
                        provider = self.provider.name(),
                        attempt,
                        max_attempts,
                        error = %err,
                        "generation attempt failed"
                    );
                    last_error = Some(err);

                    if attempt < max_attempts {
                        tokio::time::sleep(self.retry.base_delay * attempt).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            PlannerError::RecoveryFailure("no generation attempt was made".to_string())
        }))
    }

    /// [`Self::generate_with_retry`] with the configured attempt count.
    pub async fn generate_plan(&self, request: &PlanningRequest) -> Result<GeneratedPlan> {
        self.generate_with_retry(request, self.retry.max_attempts)
            .await
    }
}

fn backfill_country(mut plan: GeneratedPlan, request: &PlanningRequest) -> GeneratedPlan {
    if plan.country.trim().is_empty() {
        if let Some(country) = request
            .country
            .as_deref()
            .map(str::trim)
            .filter(|country| !country.is_empty())
        {
            plan.country = country.to_string();
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::types::request::BudgetLevel;

    const PLAN: &str = r#"{
        "tagline": "Temples and tea",
        "tags": ["culture", "food", "history"],
        "detailedDescription": "Old capital.",
        "country": "",
        "itineraries": [
            {"dayNumber": 1, "date": "2025-04-01", "title": "Arrival",
             "activities": [{"title": "Gion walk", "startTime": "18:00", "endTime": "20:00",
                             "location": "Gion", "description": "Evening stroll"}]}
        ],
        "packingItems": [],
        "todoChecklist": []
    }"#;

    #[derive(Debug)]
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
            })
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

        async fn complete(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(PlannerError::ProviderTransient("script exhausted".into())))
        }
    }

    fn generator(provider: Arc<ScriptedProvider>) -> PlanGenerator {
        PlanGenerator::new(provider).with_retry_policy(RetryPolicy {
            base_delay: Duration::ZERO,
            ..RetryPolicy::default()
        })
    }

    fn request() -> PlanningRequest {
        PlanningRequest::new(
            "Kyoto",
            BudgetLevel::Medium,
            NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 4, 5).unwrap(),
        )
        .with_country("Japan")
    }

    fn transient() -> Result<String> {
        Err(PlannerError::ProviderTransient("connection reset".into()))
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let provider = ScriptedProvider::new(vec![
            Err(PlannerError::ProviderAuth("bad key".into())),
            Ok(PLAN.to_string()),
        ]);
        let err = generator(provider.clone())
            .generate_with_retry(&request(), 2)
            .await
            .unwrap_err();

        assert!(matches!(err, PlannerError::ProviderAuth(_)));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_provider_quota_is_not_retried() {
        let provider = ScriptedProvider::new(vec![Err(PlannerError::ProviderQuota("429".into()))]);
        let err = generator(provider.clone())
            .generate_with_retry(&request(), 3)
            .await
            .unwrap_err();

        assert!(matches!(err, PlannerError::ProviderQuota(_)));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_max_attempts_counts_total_calls() {
        let provider =
            ScriptedProvider::new(vec![transient(), transient(), Ok(PLAN.to_string())]);
        let err = generator(provider.clone())
            .generate_with_retry(&request(), 2)
            .await
            .unwrap_err();

        assert!(matches!(err, PlannerError::ProviderTransient(_)));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let provider = ScriptedProvider::new(vec![transient(), Ok(PLAN.to_string())]);
        let plan = generator(provider.clone())
            .generate_with_retry(&request(), 2)
            .await
            .unwrap();

        assert_eq!(plan.tagline, "Temples and tea");
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_unrecoverable_output_is_retried() {
        let provider =
            ScriptedProvider::new(vec![Ok("I cannot help".to_string()), Ok(PLAN.to_string())]);
        let plan = generator(provider.clone())
            .generate_with_retry(&request(), 2)
            .await
            .unwrap();

        assert_eq!(plan.itineraries.len(), 1);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_backoff_grows_linearly_without_trailing_sleep() {
        let provider = ScriptedProvider::new(vec![transient(), transient(), transient()]);
        let generator = PlanGenerator::new(provider.clone()).with_retry_policy(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(20),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        });

        let started = std::time::Instant::now();
        let err = generator.generate_plan(&request()).await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, PlannerError::ProviderTransient(_)));
        assert_eq!(provider.calls(), 3);
        // 20ms after the first attempt, 40ms after the second, none after the last.
        assert!(elapsed >= Duration::from_millis(60), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(120), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn test_permanent_failure_returns_without_waiting() {
        let provider =
            ScriptedProvider::new(vec![Err(PlannerError::ProviderAuth("bad key".into()))]);
        let generator = PlanGenerator::new(provider.clone()).with_retry_policy(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        });

        let started = std::time::Instant::now();
        generator.generate_plan(&request()).await.unwrap_err();

        assert_eq!(provider.calls(), 1);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_calls_once() {
        let provider = ScriptedProvider::new(vec![Ok(PLAN.to_string())]);
        generator(provider.clone())
            .generate_with_retry(&request(), 0)
            .await
            .unwrap();
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_blank_country_backfilled_from_request() {
        let provider = ScriptedProvider::new(vec![Ok(PLAN.to_string())]);
        let plan = generator(provider).generate(&request()).await.unwrap();
        assert_eq!(plan.country, "Japan");
    }

    #[tokio::test]
    async fn test_slow_provider_times_out_as_transient() {
        #[derive(Debug)]
        struct SlowProvider;

        #[async_trait]
        impl ProviderAdapter for SlowProvider {
            fn name(&self) -> &'static str {
                "slow"
            }

            async fn complete(&self, _prompt: &str) -> Result<String> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(PLAN.to_string())
            }
        }

        let generator = PlanGenerator::new(Arc::new(SlowProvider)).with_retry_policy(RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            request_timeout: Duration::from_millis(20),
        });
        let err = generator.generate_plan(&request()).await.unwrap_err();
        assert!(matches!(err, PlannerError::ProviderTransient(_)));
    }
}
