pub mod generator;
pub mod planner;

pub use crate::services::prompt::{build_prompt, estimate_tokens, TokenEstimate};
pub use generator::{PlanGenerator, RetryPolicy};
pub use planner::{PlanOutcome, TripPlanner};
