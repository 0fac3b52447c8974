//! trip-planner-rs: quota-gated AI travel itinerary generation
//!
//! Turns a destination, date range and budget into a day-by-day travel plan
//! using an LLM provider. Each generation consumes one unit of the user's
//! yearly allowance, which is refunded if generation fails. Model output is
//! run through layered recovery (direct parse, embedded JSON, truncation
//! repair) and validated before it is returned.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use trip_planner_rs::{BudgetLevel, PlannerConfig, PlanningRequest, Tier, TripPlanner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PlannerConfig::from_env()?;
//!     let planner = TripPlanner::from_config(&config).await?;
//!
//!     let request = PlanningRequest::new(
//!         "Kyoto",
//!         BudgetLevel::Medium,
//!         "2025-04-01".parse()?,
//!         "2025-04-05".parse()?,
//!     );
//!     let outcome = planner.plan_trip("user-1", Tier::Free, &request).await?;
//!     println!("{} ({} left)", outcome.plan.tagline, outcome.usage.remaining);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod providers;
pub mod recovery;
pub mod schemas;
pub mod services;
pub mod types;
pub mod usage;

pub use config::PlannerConfig;
pub use crate::core::{
    build_prompt, estimate_tokens, PlanGenerator, PlanOutcome, RetryPolicy, TokenEstimate,
    TripPlanner,
};
pub use error::{PlannerError, Result};
pub use providers::{ProviderAdapter, ProviderFactory, ProviderKind};
pub use recovery::{PlanParser, RecoveryLayer};
pub use schemas::{plan_schema, SchemaHandle};
pub use types::{
    BudgetLevel, GeneratedPlan, Language, PlanningRequest, Tier, UsageDecision, UsageSummary,
};
pub use usage::{InMemoryUsageStore, PgUsageStore, UsageAccountant, UsageLimits, UsageStore};

#[cfg(feature = "cli")]
pub mod cli;
