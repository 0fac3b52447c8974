use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    config::PlannerConfig,
    error::{PlannerError, Result},
    providers::ProviderFactory,
    types::{
        plan::GeneratedPlan,
        request::{PlanningRequest, Tier},
        usage::UsageDecision,
    },
    usage::{InMemoryUsageStore, PgUsageStore, UsageAccountant, UsageStore},
};

use super::generator::PlanGenerator;

/// A generated plan together with the quota left after producing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOutcome {
    pub plan: GeneratedPlan,
    pub usage: UsageDecision,
}

/// Quota-gated plan generation: deduct, generate, refund on failure.
#[derive(Debug, Clone)]
pub struct TripPlanner {
    accountant: UsageAccountant,
    generator: PlanGenerator,
}

impl TripPlanner {
    pub fn new(accountant: UsageAccountant, generator: PlanGenerator) -> Self {
        Self {
            accountant,
            generator,
        }
    }

    /// Wire the configured provider and usage store together.
    ///
    /// With `DATABASE_URL` set this connects to Postgres and applies the
    /// embedded migrations; otherwise usage lives in process memory.
    pub async fn from_config(config: &PlannerConfig) -> Result<Self> {
        let store: Arc<dyn UsageStore> = match config.database_url.as_deref() {
            Some(database_url) => {
                let store = PgUsageStore::connect(database_url).await?;
                store.run_migrations().await?;
                info!(target: "trip_planner::usage", "using postgres usage store");
                Arc::new(store)
            }
            None => {
                info!(target: "trip_planner::usage", "DATABASE_URL not set, using in-memory usage store");
                Arc::new(InMemoryUsageStore::new())
            }
        };

        let provider = ProviderFactory::new(config.providers.clone()).create(config.provider_kind());
        let generator = PlanGenerator::new(provider).with_retry_policy(config.retry);

        Ok(Self::new(UsageAccountant::new(store, config.limits), generator))
    }

    pub fn accountant(&self) -> &UsageAccountant {
        &self.accountant
    }

    pub fn generator(&self) -> &PlanGenerator {
        &self.generator
    }

    /// Generate a plan on behalf of `user_id`.
    ///
    /// An exhausted allowance returns [`PlannerError::QuotaExceeded`] without
    /// contacting the provider. A failed generation gives the deducted unit
    /// back before the generation error is returned.
    pub async fn plan_trip(
        &self,
        user_id: &str,
        tier: Tier,
        request: &PlanningRequest,
    ) -> Result<PlanOutcome> {
        let usage = self.accountant.check_and_deduct(user_id, tier).await?;
        if !usage.allowed {
            return Err(PlannerError::QuotaExceeded { limit: usage.limit });
        }

        match self.generator.generate_plan(request).await {
            Ok(plan) => Ok(PlanOutcome { plan, usage }),
            Err(err) => {
                warn!(
                    target: "trip_planner::generator",
                    user_id,
                    error = %err,
                    "plan generation failed, refunding usage"
                );
                self.accountant.refund(user_id, usage.year).await;
                Err(err)
            }
        }
    }
}
