use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, Result};

const MAX_NAME_CHARS: usize = 100;

/// Budget tier requested for the trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetLevel {
    High,
    Medium,
    Low,
}

impl BudgetLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetLevel::High => "high",
            BudgetLevel::Medium => "medium",
            BudgetLevel::Low => "low",
        }
    }
}

impl FromStr for BudgetLevel {
    type Err = PlannerError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(BudgetLevel::High),
            "medium" => Ok(BudgetLevel::Medium),
            "low" => Ok(BudgetLevel::Low),
            other => Err(PlannerError::InvalidRequest(format!(
                "budget level must be high, medium or low (got `{other}`)"
            ))),
        }
    }
}

/// Output language of the generated plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Zh,
    En,
}

impl FromStr for Language {
    type Err = PlannerError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "zh" => Ok(Language::Zh),
            "en" => Ok(Language::En),
            other => Err(PlannerError::InvalidRequest(format!(
                "language must be zh or en (got `{other}`)"
            ))),
        }
    }
}

/// Subscription class that determines the yearly generation allowance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Vip,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Vip => "vip",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = PlannerError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "vip" | "paid" => Ok(Tier::Vip),
            other => Err(PlannerError::InvalidRequest(format!(
                "tier must be free or vip (got `{other}`)"
            ))),
        }
    }
}

/// A user's request for an itinerary.
///
/// The HTTP layer validates requests before they reach the pipeline;
/// [`PlanningRequest::validate`] is provided for other entry points such as the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningRequest {
    pub destination_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub budget_level: BudgetLevel,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub language: Language,
}

impl PlanningRequest {
    pub fn new(
        destination_name: impl Into<String>,
        budget_level: BudgetLevel,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            destination_name: destination_name.into(),
            country: None,
            budget_level,
            start_date,
            end_date,
            language: Language::default(),
        }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Trip length in whole days, counting both the first and the last day.
    pub fn trip_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days().abs() + 1
    }

    /// Destination as shown to the model, e.g. `Kyoto, Japan`.
    pub fn destination_label(&self) -> String {
        match self.country.as_deref() {
            Some(country) if !country.trim().is_empty() => {
                format!("{}, {}", self.destination_name, country)
            }
            _ => self.destination_name.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let name_chars = self.destination_name.trim().chars().count();
        if name_chars == 0 {
            return Err(PlannerError::InvalidRequest(
                "destination name must not be empty".to_string(),
            ));
        }
        if self.destination_name.chars().count() > MAX_NAME_CHARS {
            return Err(PlannerError::InvalidRequest(format!(
                "destination name must not exceed {MAX_NAME_CHARS} characters"
            )));
        }

        if let Some(country) = &self.country {
            let country_chars = country.chars().count();
            if country.trim().is_empty() || country_chars > MAX_NAME_CHARS {
                return Err(PlannerError::InvalidRequest(format!(
                    "country must be between 1 and {MAX_NAME_CHARS} characters"
                )));
            }
        }

        if self.end_date <= self.start_date {
            return Err(PlannerError::InvalidRequest(
                "end date must be later than start date".to_string(),
            ));
        }

        Ok(())
    }
}
