use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{PlannerError, Result};
use crate::schemas::plan_schema;
use crate::services::prompt::SYSTEM_PROMPT;

use super::provider::{
    classify_status, http_client, GenerationConfig, ProviderAdapter, ProviderCredentials,
};

/// How the adapter asks for JSON output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Leave the choice to the model.
    Omit,
    /// `{"type": "json_object"}`
    JsonObject,
    /// `{"type": "json_schema", ...}` built from the plan schema.
    JsonSchema,
}

impl ResponseFormat {
    fn to_value(self) -> Option<Value> {
        match self {
            ResponseFormat::Omit => None,
            ResponseFormat::JsonObject => Some(json!({ "type": "json_object" })),
            ResponseFormat::JsonSchema => Some(plan_schema().response_format()),
        }
    }
}

/// Adapter for `/chat/completions` style APIs (laozhang, OpenRouter).
#[derive(Clone, Debug)]
pub struct OpenAiCompatAdapter {
    name: &'static str,
    client: reqwest::Client,
    credentials: ProviderCredentials,
    generation: GenerationConfig,
    response_format: ResponseFormat,
    extra_headers: Vec<(&'static str, String)>,
}

impl OpenAiCompatAdapter {
    pub fn new(
        name: &'static str,
        credentials: ProviderCredentials,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            name,
            client: http_client(),
            credentials,
            generation,
            response_format: ResponseFormat::Omit,
            extra_headers: Vec::new(),
        }
    }

    pub fn laozhang(credentials: ProviderCredentials, generation: GenerationConfig) -> Self {
        Self::new("laozhang", credentials, generation)
            .with_response_format(ResponseFormat::JsonObject)
    }

    /// OpenRouter uses `HTTP-Referer` and `X-Title` for app attribution.
    pub fn openrouter(
        credentials: ProviderCredentials,
        generation: GenerationConfig,
        site_url: Option<String>,
        site_name: Option<String>,
    ) -> Self {
        let mut adapter = Self::new("openrouter", credentials, generation);
        if let Some(site_url) = site_url.filter(|value| !value.trim().is_empty()) {
            adapter = adapter.with_header("HTTP-Referer", site_url);
        }
        if let Some(site_name) = site_name.filter(|value| !value.trim().is_empty()) {
            adapter = adapter.with_header("X-Title", site_name);
        }
        adapter
    }

    pub fn with_response_format(mut self, response_format: ResponseFormat) -> Self {
        self.response_format = response_format;
        self
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.extra_headers.push((name, value.into()));
        self
    }

    pub fn response_format(&self) -> ResponseFormat {
        self.response_format
    }

    fn request_body(&self, prompt: &str) -> Value {
        let messages = vec![
            json!({ "role": "system", "content": SYSTEM_PROMPT }),
            json!({ "role": "user", "content": prompt }),
        ];

        let mut request = ChatCompletionRequest::new(&self.credentials.model, messages)
            .with_sampling(&self.generation);
        if let Some(response_format) = self.response_format.to_value() {
            request = request.with_response_format(response_format);
        }
        request.into_value()
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let api_key = self.credentials.require_api_key(self.name)?;
        let request_url = build_chat_url(&self.credentials.base_url);

        debug!(
            target: "trip_planner::provider",
            provider = self.name,
            model = %self.credentials.model,
            prompt_len = prompt.len(),
            "sending chat completion request"
        );

        let mut request = self
            .client
            .post(&request_url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json");
        for (name, value) in &self.extra_headers {
            request = request.header(*name, value);
        }

        let response = request.json(&self.request_body(prompt)).send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(classify_status(self.name, status, &response_text));
        }

        let completion = parse_envelope(&response_text).ok_or_else(|| {
            PlannerError::ProviderTransient(format!(
                "{} returned an unreadable response body",
                self.name
            ))
        })?;

        if let Some(error) = completion.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(PlannerError::ProviderTransient(format!(
                "{} API error: {message}",
                self.name
            )));
        }

        let content = completion
            .pointer("/choices/0/message/content")
            .and_then(normalize_content)
            .ok_or_else(|| {
                PlannerError::ProviderTransient(format!("{} returned an empty response", self.name))
            })?;

        debug!(
            target: "trip_planner::provider",
            provider = self.name,
            response_len = content.len(),
            "chat completion received"
        );

        Ok(content)
    }
}

fn build_chat_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with("/chat/completions") {
        trimmed.to_string()
    } else {
        format!("{}/chat/completions", trimmed)
    }
}

/// The completion envelope, either as a plain JSON body or as the last
/// parseable `data:` line of an SSE stream.
fn parse_envelope(body: &str) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }
    serde_json::from_str(body)
        .ok()
        .or_else(|| extract_sse_json(body))
}

fn extract_sse_json(body: &str) -> Option<Value> {
    body.lines()
        .rev()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|data| !data.is_empty() && *data != "[DONE]")
        .find_map(|data| serde_json::from_str(data).ok())
}

/// Flatten message content into text. Content is either a string or an
/// array of parts shaped like `{"text": ...}` or `{"content": [{"text": ...}]}`.
fn normalize_content(content: &Value) -> Option<String> {
    let text = match content {
        Value::String(text) => text.trim().to_string(),
        Value::Array(parts) => parts
            .iter()
            .map(part_text)
            .filter(|segment| !segment.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string(),
        _ => return None,
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn part_text(part: &Value) -> String {
    match part {
        Value::String(text) => text.clone(),
        Value::Object(fields) => {
            if let Some(text) = fields.get("text").and_then(Value::as_str) {
                text.to_string()
            } else if let Some(Value::Array(nested)) = fields.get("content") {
                nested
                    .iter()
                    .map(|item| item.get("text").and_then(Value::as_str).unwrap_or(""))
                    .collect::<Vec<_>>()
                    .join("\n")
            } else {
                String::new()
            }
        }
        _ => String::new(),
    }
}

#[derive(Clone, Debug)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Value>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    top_p: Option<f32>,
    response_format: Option<Value>,
}

impl ChatCompletionRequest {
    fn new(model: impl Into<String>, messages: Vec<Value>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            top_p: None,
            response_format: None,
        }
    }

    fn with_sampling(mut self, generation: &GenerationConfig) -> Self {
        self.temperature = Some(generation.temperature);
        self.max_tokens = Some(generation.max_output_tokens);
        self.top_p = Some(generation.top_p);
        self
    }

    fn with_response_format(mut self, response_format: Value) -> Self {
        self.response_format = Some(response_format);
        self
    }

    fn into_value(self) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": self.messages,
        });

        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        if let Some(top_p) = self.top_p {
            body["top_p"] = json!(top_p);
        }

        if let Some(response_format) = self.response_format {
            body["response_format"] = response_format;
        }

        body
    }
}
