pub mod schema;
pub mod validation;

pub use schema::{plan_schema, SchemaHandle};
pub use validation::{plan_rules, plan_validator, REQUIRED_TAGS};
