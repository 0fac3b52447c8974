pub mod plan;
pub mod request;
pub mod usage;

pub use plan::{Activity, DayPlan, GeneratedPlan, PackingCategory, PackingItem, Priority, TodoItem};
pub use request::{BudgetLevel, Language, PlanningRequest, Tier};
pub use usage::{UsageDecision, UsageRecord, UsageSummary};
