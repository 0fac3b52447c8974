//! Per-user yearly generation quotas.

pub mod accountant;
pub mod memory;
pub mod postgres;
pub mod store;

pub use accountant::{current_year, UsageAccountant, UsageLimits};
pub use memory::InMemoryUsageStore;
pub use postgres::PgUsageStore;
pub use store::{IncrementOutcome, UsageStore};
