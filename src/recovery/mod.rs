//! Response recovery: from raw provider text to a validated, normalized plan.

pub mod strategies;
pub mod validation;

use serde_json::Value;
use tracing::{debug, info};

use crate::{
    error::{PlannerError, Result},
    schemas::REQUIRED_TAGS,
    types::plan::{Activity, DayPlan, GeneratedPlan, PackingItem, Priority, TodoItem},
};

pub use validation::validate_plan;

/// One step in the ordered recovery sequence.
#[derive(Clone, Copy, Debug)]
pub struct RecoveryLayer {
    name: &'static str,
    recover: fn(&str) -> Option<Value>,
}

impl RecoveryLayer {
    pub const fn new(name: &'static str, recover: fn(&str) -> Option<Value>) -> Self {
        Self { name, recover }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn recover(&self, text: &str) -> Option<Value> {
        (self.recover)(text)
    }
}

pub const DEFAULT_LAYERS: [RecoveryLayer; 3] = [
    RecoveryLayer::new("direct", strategies::direct_parse),
    RecoveryLayer::new("embedded", strategies::extract_embedded),
    RecoveryLayer::new("truncation_repair", strategies::repair_truncated),
];

/// Parses model output into a [`GeneratedPlan`], trying each recovery layer
/// in order until one yields a candidate that passes validation.
#[derive(Clone, Debug)]
pub struct PlanParser {
    layers: Vec<RecoveryLayer>,
}

impl PlanParser {
    pub fn new() -> Self {
        Self {
            layers: DEFAULT_LAYERS.to_vec(),
        }
    }

    /// Append a recovery layer that runs after the existing ones.
    pub fn with_layer(mut self, layer: RecoveryLayer) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn layer_names(&self) -> Vec<&'static str> {
        self.layers.iter().map(RecoveryLayer::name).collect()
    }

    pub fn parse(&self, raw: &str) -> Result<GeneratedPlan> {
        let mut rejections = Vec::with_capacity(self.layers.len());

        for (position, layer) in self.layers.iter().enumerate() {
            let Some(candidate) = layer.recover(raw) else {
                debug!(
                    target: "trip_planner::recovery",
                    layer = layer.name(),
                    "layer produced no JSON candidate"
                );
                rejections.push(format!("{}: no JSON candidate", layer.name()));
                continue;
            };

            match accept_candidate(candidate) {
                Ok(plan) => {
                    if position > 0 {
                        info!(
                            target: "trip_planner::recovery",
                            layer = layer.name(),
                            "recovered plan from malformed response"
                        );
                    }
                    return Ok(plan);
                }
                Err(reason) => {
                    debug!(
                        target: "trip_planner::recovery",
                        layer = layer.name(),
                        error = %reason,
                        "candidate rejected"
                    );
                    rejections.push(format!("{}: {}", layer.name(), reason));
                }
            }
        }

        debug!(
            target: "trip_planner::recovery",
            raw_len = raw.len(),
            raw = %raw,
            "no recovery layer produced a valid plan"
        );

        Err(PlannerError::RecoveryFailure(rejections.join(" | ")))
    }

    pub fn sanitize(&self, plan: GeneratedPlan) -> GeneratedPlan {
        sanitize(plan)
    }
}

impl Default for PlanParser {
    fn default() -> Self {
        Self::new()
    }
}

fn accept_candidate(candidate: Value) -> std::result::Result<GeneratedPlan, String> {
    validate_plan(&candidate).map_err(|errors| errors.join("; "))?;

    serde_path_to_error::deserialize(candidate).map_err(|err| {
        let path = err.path().to_string();
        let location = if path.is_empty() || path == "." {
            "<root>".to_string()
        } else {
            path
        };
        format!("plan does not deserialize at {}: {}", location, err.inner())
    })
}

/// Normalize a validated plan: trim text, cap tags, fill defaults.
///
/// Applying it twice gives the same result as applying it once.
pub fn sanitize(plan: GeneratedPlan) -> GeneratedPlan {
    GeneratedPlan {
        tagline: trimmed(plan.tagline),
        tags: plan.tags.into_iter().map(trimmed).take(REQUIRED_TAGS).collect(),
        detailed_description: trimmed(plan.detailed_description),
        country: trimmed(plan.country),
        itineraries: plan.itineraries.into_iter().map(sanitize_day).collect(),
        packing_items: plan.packing_items.into_iter().map(sanitize_packing).collect(),
        todo_checklist: plan.todo_checklist.into_iter().map(sanitize_todo).collect(),
    }
}

fn sanitize_day(day: DayPlan) -> DayPlan {
    DayPlan {
        title: trimmed(day.title),
        activities: day
            .activities
            .into_iter()
            .map(|activity| Activity {
                title: trimmed(activity.title),
                start_time: trimmed(activity.start_time),
                end_time: trimmed(activity.end_time),
                location: trimmed(activity.location),
                description: trimmed(activity.description),
                estimated_cost: activity.estimated_cost.map(|cost| cost.max(0.0)),
            })
            .collect(),
        ..day
    }
}

fn sanitize_packing(item: PackingItem) -> PackingItem {
    PackingItem {
        name: trimmed(item.name),
        category: item.category,
        quantity: Some(item.quantity.filter(|quantity| *quantity > 0).unwrap_or(1)),
        is_essential: Some(item.is_essential.unwrap_or(false)),
    }
}

fn sanitize_todo(item: TodoItem) -> TodoItem {
    TodoItem {
        title: trimmed(item.title),
        description: item.description.map(trimmed),
        priority: Some(item.priority.unwrap_or(Priority::Medium)),
    }
}

fn trimmed(text: String) -> String {
    let trimmed = text.trim();
    if trimmed.len() == text.len() {
        text
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::plan::PackingCategory;
    use serde_json::json;

    const PLAN_JSON: &str = r#"{
  "tagline": "  Temples, tea and quiet gardens ",
  "tags": [" history", "food ", "gardens"],
  "detailedDescription": "Kyoto was the imperial capital for a thousand years.",
  "country": "Japan",
  "itineraries": [
    {
      "dayNumber": 1,
      "date": "2025-04-01",
      "title": " Arrival ",
      "activities": [
        {
          "title": "Fushimi Inari",
          "startTime": "09:00",
          "endTime": "11:00",
          "location": " Fushimi ",
          "description": "Walk the torii gates",
          "estimatedCost": 0
        }
      ]
    },
    {
      "dayNumber": 2,
      "date": "2025-04-02",
      "title": "Arashiyama",
      "activities": [
        {
          "title": "Bamboo grove",
          "startTime": "08:00",
          "endTime": "10:00",
          "location": "Arashiyama",
          "description": "Early visit before the crowds"
        }
      ]
    }
  ],
  "packingItems": [
    {"name": "Walking shoes", "category": "clothing", "quantity": 1, "isEssential": true},
    {"name": " Adapter ", "category": "electronics"}
  ],
  "todoChecklist": [
    {"title": "Book ryokan", "priority": "high"},
    {"title": "Get IC card", "description": " ICOCA "}
  ]
}"#;

    fn plan_value() -> Value {
        serde_json::from_str(PLAN_JSON).unwrap()
    }

    fn plan_text() -> String {
        PLAN_JSON.to_string()
    }

    #[test]
    fn test_direct_document_matches_plain_deserialization() {
        let parser = PlanParser::new();
        let parsed = parser.parse(&plan_text()).unwrap();
        let expected: GeneratedPlan = serde_json::from_value(plan_value()).unwrap();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_fenced_document_matches_unwrapped() {
        let parser = PlanParser::new();
        let wrapped = format!(
            "Here is your itinerary!\n\n```json\n{}\n```\n\nHave a great trip.",
            plan_text()
        );
        assert_eq!(
            parser.parse(&wrapped).unwrap(),
            parser.parse(&plan_text()).unwrap()
        );
    }

    #[test]
    fn test_truncated_document_is_repaired() {
        let text = plan_text();
        let cut = text.find("{\"title\": \"Get IC card\"").unwrap();
        let parser = PlanParser::new();
        let plan = parser.parse(&text[..cut]).unwrap();
        assert_eq!(plan.itineraries.len(), 2);
        assert_eq!(plan.todo_checklist.len(), 1);
        assert_eq!(plan.todo_checklist[0].title, "Book ryokan");
    }

    #[test]
    fn test_cut_inside_last_todo_drops_that_todo() {
        let text = plan_text();
        let cut = text.find("Get IC card").unwrap() + "Get IC".len();
        let plan = PlanParser::new().parse(&text[..cut]).unwrap();
        assert_eq!(plan.todo_checklist.len(), 1);
        assert_eq!(plan.todo_checklist[0].title, "Book ryokan");
        assert_eq!(plan.packing_items.len(), 2);
    }

    #[test]
    fn test_document_followed_by_prose_with_braces() {
        let text = format!("{}\n\nNote: costs are per person {{CNY}}.", plan_text());
        let plan = PlanParser::new().parse(&text).unwrap();
        assert_eq!(plan, PlanParser::new().parse(&plan_text()).unwrap());
    }

    #[test]
    fn test_truncation_before_required_fields_fails() {
        let text = plan_text();
        let cut = text.find("\"itineraries\"").unwrap() + 20;
        let err = PlanParser::new().parse(&text[..cut]).unwrap_err();
        assert!(matches!(err, PlannerError::RecoveryFailure(_)));
        assert!(err.to_string().contains("packingItems must be an array"));
    }

    #[test]
    fn test_truncation_at_any_offset_never_yields_incomplete_plan() {
        let text = plan_text();
        let after_tagline = text.find("\"tags\"").unwrap();
        let parser = PlanParser::new();

        for cut in after_tagline..text.len() {
            if !text.is_char_boundary(cut) {
                continue;
            }
            match parser.parse(&text[..cut]) {
                Ok(plan) => {
                    assert_eq!(plan.tags.len(), 3);
                    assert!(!plan.itineraries.is_empty());
                    assert!(plan
                        .itineraries
                        .iter()
                        .all(|day| !day.activities.is_empty()));
                }
                Err(err) => assert!(matches!(err, PlannerError::RecoveryFailure(_))),
            }
        }
    }

    #[test]
    fn test_zero_itineraries_fails_validation() {
        let mut value = plan_value();
        value["itineraries"] = json!([]);
        let err = PlanParser::new()
            .parse(&value.to_string())
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_fewer_days_than_trip_length_is_accepted() {
        let mut value = plan_value();
        value["itineraries"].as_array_mut().unwrap().truncate(1);
        let plan = PlanParser::new().parse(&value.to_string()).unwrap();
        assert_eq!(plan.itineraries.len(), 1);
    }

    #[test]
    fn test_garbage_reports_every_layer() {
        let err = PlanParser::new().parse("I cannot help with that.").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("direct"));
        assert!(message.contains("embedded"));
        assert!(message.contains("truncation_repair"));
    }

    #[test]
    fn test_wrong_field_type_is_rejected() {
        let mut value = plan_value();
        value["itineraries"][0]["date"] = json!("first of April");
        let err = PlanParser::new().parse(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("date"));
    }

    #[test]
    fn test_sanitize_trims_and_fills_defaults() {
        let parser = PlanParser::new();
        let plan = parser.sanitize(parser.parse(&plan_text()).unwrap());

        assert_eq!(plan.tagline, "Temples, tea and quiet gardens");
        assert_eq!(plan.tags, vec!["history", "food", "gardens"]);
        assert_eq!(plan.itineraries[0].title, "Arrival");
        assert_eq!(plan.itineraries[0].activities[0].location, "Fushimi");

        let adapter = &plan.packing_items[1];
        assert_eq!(adapter.name, "Adapter");
        assert_eq!(adapter.category, PackingCategory::Electronics);
        assert_eq!(adapter.quantity, Some(1));
        assert_eq!(adapter.is_essential, Some(false));

        assert_eq!(plan.todo_checklist[0].priority, Some(Priority::High));
        assert_eq!(plan.todo_checklist[1].priority, Some(Priority::Medium));
        assert_eq!(plan.todo_checklist[1].description.as_deref(), Some("ICOCA"));
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let parser = PlanParser::new();
        let once = parser.sanitize(parser.parse(&plan_text()).unwrap());
        let twice = parser.sanitize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_sanitize_caps_tags_and_zero_quantity() {
        let mut plan: GeneratedPlan = serde_json::from_value(plan_value()).unwrap();
        plan.tags.push("extra".to_string());
        plan.packing_items[0].quantity = Some(0);

        let plan = sanitize(plan);
        assert_eq!(plan.tags.len(), 3);
        assert_eq!(plan.packing_items[0].quantity, Some(1));
    }

    #[test]
    fn test_custom_layer_runs_last() {
        fn single_quotes(text: &str) -> Option<Value> {
            serde_json::from_str(&text.replace('\'', "\"")).ok()
        }

        let parser = PlanParser::new().with_layer(RecoveryLayer::new("single_quotes", single_quotes));
        assert_eq!(
            parser.layer_names(),
            vec!["direct", "embedded", "truncation_repair", "single_quotes"]
        );

        let text = plan_text().replace('"', "'");
        assert!(parser.parse(&text).is_ok());
    }
}
