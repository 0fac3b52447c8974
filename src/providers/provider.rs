use std::fmt::Debug;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PlannerError, Result};

const MAX_ERROR_DETAIL_CHARS: usize = 300;

/// A backend that turns a prompt into raw model text.
///
/// Adapters only speak the wire protocol of their provider and classify
/// failures; parsing the text into a plan happens elsewhere.
#[async_trait]
pub trait ProviderAdapter: Send + Sync + Debug {
    /// Provider identifier, as used in `AI_PROVIDER`.
    fn name(&self) -> &'static str;

    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Sampling parameters sent with every generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    /// Only honored by providers that support it (Gemini).
    pub top_k: Option<u32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 8192,
            top_p: 0.95,
            top_k: Some(40),
        }
    }
}

/// API key, endpoint, and model for one provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl ProviderCredentials {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: None,
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// The configured key, if it is non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }

    pub(crate) fn require_api_key(&self, provider: &str) -> Result<&str> {
        self.api_key().ok_or_else(|| {
            PlannerError::ProviderAuth(format!("{provider} API key is not configured"))
        })
    }
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::new()
}

/// Map a non-success HTTP response onto the error taxonomy.
pub(crate) fn classify_status(provider: &str, status: StatusCode, body: &str) -> PlannerError {
    let detail = api_error_message(body).unwrap_or_else(|| truncate(body.trim()));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlannerError::ProviderAuth(format!(
            "{provider} rejected the API key ({status}): {detail}"
        )),
        StatusCode::TOO_MANY_REQUESTS => {
            PlannerError::ProviderQuota(format!("{provider} quota exhausted ({status}): {detail}"))
        }
        // Gemini reports a bad key as 400 INVALID_ARGUMENT.
        StatusCode::BAD_REQUEST if detail.contains("API key") => PlannerError::ProviderAuth(
            format!("{provider} rejected the API key ({status}): {detail}"),
        ),
        _ => PlannerError::ProviderTransient(format!(
            "{provider} request failed ({status}): {detail}"
        )),
    }
}

/// `error.message` from a JSON error body, when there is one.
pub(crate) fn api_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| error.as_str().map(str::to_string))
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_ERROR_DETAIL_CHARS {
        return text.to_string();
    }
    let mut shortened: String = text.chars().take(MAX_ERROR_DETAIL_CHARS).collect();
    shortened.push_str("...");
    shortened
}
