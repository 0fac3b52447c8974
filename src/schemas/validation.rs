use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Value};
use std::sync::OnceLock;

use crate::error::{PlannerError, Result};

/// Number of tags a plan must carry.
pub const REQUIRED_TAGS: usize = 3;

/// Acceptance rules for a plan candidate.
///
/// Stricter than the derived [`plan_schema`](super::plan_schema) in the places
/// a model tends to cut corners: blank text, tag count, empty days.
pub fn plan_rules() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "required": [
            "tagline",
            "tags",
            "detailedDescription",
            "itineraries",
            "packingItems",
            "todoChecklist"
        ],
        "properties": {
            "tagline": { "type": "string", "pattern": "\\S" },
            "tags": {
                "type": "array",
                "minItems": REQUIRED_TAGS,
                "maxItems": REQUIRED_TAGS
            },
            "detailedDescription": { "type": "string", "pattern": "\\S" },
            "country": { "type": "string" },
            "itineraries": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "required": ["dayNumber", "date", "title", "activities"],
                    "properties": {
                        "dayNumber": { "type": "number", "exclusiveMinimum": 0 },
                        "date": { "type": "string", "minLength": 1 },
                        "title": { "type": "string", "minLength": 1 },
                        "activities": { "type": "array", "minItems": 1 }
                    }
                }
            },
            "packingItems": { "type": "array" },
            "todoChecklist": { "type": "array" }
        }
    })
}

/// [`plan_rules`] compiled once per process.
pub fn plan_validator() -> Result<&'static JSONSchema> {
    static VALIDATOR: OnceLock<std::result::Result<JSONSchema, String>> = OnceLock::new();

    VALIDATOR
        .get_or_init(|| {
            JSONSchema::options()
                .with_draft(Draft::Draft7)
                .compile(&plan_rules())
                .map_err(|err| err.to_string())
        })
        .as_ref()
        .map_err(|err| {
            PlannerError::Config(format!("Failed to prepare plan validation rules: {}", err))
        })
}
