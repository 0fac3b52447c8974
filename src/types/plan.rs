use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Structured travel plan synthesized by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPlan {
    /// One-sentence pitch for the destination
    pub tagline: String,
    /// Exactly three short tags describing the destination
    pub tags: Vec<String>,
    /// Long-form description of history, culture, food and atmosphere
    pub detailed_description: String,
    /// Country the destination belongs to
    #[serde(default)]
    pub country: String,
    /// Day-by-day itinerary, in travel order
    pub itineraries: Vec<DayPlan>,
    /// Suggested packing list
    pub packing_items: Vec<PackingItem>,
    /// Tasks to finish before departure
    pub todo_checklist: Vec<TodoItem>,
}

/// One day of the itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DayPlan {
    /// 1-based day counter
    pub day_number: u32,
    /// Calendar date (YYYY-MM-DD)
    pub date: NaiveDate,
    /// Theme of the day
    pub title: String,
    /// Activities in chronological order
    pub activities: Vec<Activity>,
}

/// A single scheduled activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub title: String,
    /// Local start time (HH:MM)
    pub start_time: String,
    /// Local end time (HH:MM)
    pub end_time: String,
    pub location: String,
    pub description: String,
    /// Estimated spend in CNY
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PackingItem {
    pub name: String,
    pub category: PackingCategory,
    /// Number of units to pack, defaults to 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    /// Whether the trip is impractical without this item, defaults to false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_essential: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Defaults to medium
    #[serde(
        default,
        deserialize_with = "lenient_priority",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<Priority>")]
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority `{other}`")),
        }
    }
}

/// Models occasionally invent priorities ("urgent", "必做"); those fall back
/// to unset so sanitize can apply the default instead of rejecting the plan.
fn lenient_priority<'de, D>(deserializer: D) -> Result<Option<Priority>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(|value| value.as_str())
        .and_then(|value| value.parse().ok()))
}

/// Packing list category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PackingCategory {
    Clothing,
    Electronics,
    Cosmetics,
    Health,
    Accessories,
    Books,
    Entertainment,
    Other,
}

impl PackingCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackingCategory::Clothing => "clothing",
            PackingCategory::Electronics => "electronics",
            PackingCategory::Cosmetics => "cosmetics",
            PackingCategory::Health => "health",
            PackingCategory::Accessories => "accessories",
            PackingCategory::Books => "books",
            PackingCategory::Entertainment => "entertainment",
            PackingCategory::Other => "other",
        }
    }
}

impl fmt::Display for PackingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for PackingCategory {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "clothing" => PackingCategory::Clothing,
            "electronics" => PackingCategory::Electronics,
            "cosmetics" => PackingCategory::Cosmetics,
            "health" => PackingCategory::Health,
            "accessories" => PackingCategory::Accessories,
            "books" => PackingCategory::Books,
            "entertainment" => PackingCategory::Entertainment,
            _ => PackingCategory::Other,
        }
    }
}

impl<'de> Deserialize<'de> for PackingCategory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(PackingCategory::from(raw.as_str()))
    }
}
