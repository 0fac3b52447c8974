use jsonschema::{error::ValidationErrorKind, ValidationError};
use serde_json::Value;

use crate::schemas::{plan_validator, REQUIRED_TAGS};

// Report order, matching the order fields appear in a plan.
const FIELD_ORDER: [&str; 7] = [
    "tagline",
    "tags",
    "detailedDescription",
    "country",
    "itineraries",
    "packingItems",
    "todoChecklist",
];

/// Check a parsed candidate against the plan acceptance rules.
///
/// Every violation is collected so a rejected candidate can be diagnosed from
/// one log line instead of one field at a time.
pub fn validate_plan(candidate: &Value) -> Result<(), Vec<String>> {
    let validator = plan_validator().map_err(|err| vec![err.to_string()])?;
    let Err(errors) = validator.validate(candidate) else {
        return Ok(());
    };

    let mut violations: Vec<(usize, usize, String)> = errors.map(|err| describe(&err)).collect();
    violations.sort();
    violations.dedup();

    Err(violations
        .into_iter()
        .map(|(_, _, message)| message)
        .collect())
}

/// Sort key and message for one schema violation.
fn describe(error: &ValidationError<'_>) -> (usize, usize, String) {
    let pointer = error.instance_path.to_string();
    let mut segments: Vec<&str> = pointer.split('/').filter(|s| !s.is_empty()).collect();
    if let ValidationErrorKind::Required { property } = &error.kind {
        if let Some(name) = property.as_str() {
            segments.push(name);
        }
    }

    match segments.as_slice() {
        [] => (0, 0, "plan must be a JSON object".to_string()),
        ["itineraries", index, rest @ ..] => {
            let day = index.parse::<usize>().map_or(0, |index| index + 1);
            let message = if rest.first() == Some(&"activities") {
                format!("itinerary day {day} has no activities")
            } else {
                format!("itinerary day {day} is missing dayNumber, date or title")
            };
            (rank("itineraries"), day, message)
        }
        [field, ..] => {
            let message = match *field {
                "tagline" | "detailedDescription" => {
                    format!("{field} is missing or not a non-empty string")
                }
                "tags" => format!("tags must be an array of exactly {REQUIRED_TAGS} entries"),
                "country" => "country must be a string".to_string(),
                "itineraries" => "itineraries must be a non-empty array".to_string(),
                "packingItems" | "todoChecklist" => format!("{field} must be an array"),
                other => format!("{other}: {error}"),
            };
            (rank(field), 0, message)
        }
    }
}

fn rank(field: &str) -> usize {
    FIELD_ORDER
        .iter()
        .position(|known| *known == field)
        .map_or(FIELD_ORDER.len(), |position| position + 1)
}
