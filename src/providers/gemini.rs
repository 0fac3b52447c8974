use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{PlannerError, Result};

use super::provider::{
    classify_status, http_client, GenerationConfig, ProviderAdapter, ProviderCredentials,
};

/// Adapter for the Gemini `generateContent` REST endpoint.
#[derive(Clone, Debug)]
pub struct GeminiAdapter {
    client: reqwest::Client,
    credentials: ProviderCredentials,
    generation: GenerationConfig,
}

impl GeminiAdapter {
    pub fn new(credentials: ProviderCredentials, generation: GenerationConfig) -> Self {
        Self {
            client: http_client(),
            credentials,
            generation,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.credentials.base_url.trim_end_matches('/'),
            self.credentials.model
        )
    }

    fn request_body(&self, prompt: &str) -> Value {
        let mut generation_config = json!({
            "temperature": self.generation.temperature,
            "topP": self.generation.top_p,
            "maxOutputTokens": self.generation.max_output_tokens,
            "responseMimeType": "application/json",
        });
        if let Some(top_k) = self.generation.top_k {
            generation_config["topK"] = json!(top_k);
        }

        json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [{ "text": prompt }]
                }
            ],
            "generationConfig": generation_config,
        })
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let api_key = self.credentials.require_api_key(self.name())?;

        debug!(
            target: "trip_planner::provider",
            provider = self.name(),
            model = %self.credentials.model,
            prompt_len = prompt.len(),
            "sending generateContent request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&self.request_body(prompt))
            .send()
            .await?;
        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(classify_status(self.name(), status, &response_text));
        }

        let payload: Value = serde_json::from_str(&response_text).map_err(|err| {
            PlannerError::ProviderTransient(format!("google returned invalid JSON: {err}"))
        })?;

        if let Some(reason) = payload
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
        {
            warn!(
                target: "trip_planner::provider",
                provider = self.name(),
                block_reason = reason,
                "prompt was blocked"
            );
        }

        candidate_text(&payload)
            .ok_or_else(|| PlannerError::ProviderTransient("google returned an empty response".into()))
    }
}

/// Concatenated text parts of the first candidate.
fn candidate_text(payload: &Value) -> Option<String> {
    let parts = payload.pointer("/candidates/0/content/parts")?.as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    let text = text.trim();

    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
