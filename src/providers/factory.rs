use std::{fmt, str::FromStr, sync::Arc};

use tracing::{info, warn};

use crate::error::{PlannerError, Result};

use super::{
    gemini::GeminiAdapter,
    openai_compat::{OpenAiCompatAdapter, ResponseFormat},
    provider::{GenerationConfig, ProviderAdapter, ProviderCredentials},
};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_LAOZHANG_BASE_URL: &str = "https://api.laozhang.ai/v1";
pub const DEFAULT_LAOZHANG_MODEL: &str = "gpt-4";
pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_OPENROUTER_MODEL: &str = "z-ai/glm-4.5-air:free";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Google,
    #[default]
    Laozhang,
    OpenRouter,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Google,
        ProviderKind::Laozhang,
        ProviderKind::OpenRouter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::Laozhang => "laozhang",
            ProviderKind::OpenRouter => "openrouter",
        }
    }

    /// Resolve a configured identifier, falling back to the default provider
    /// (with a warning) when it is not recognized.
    pub fn resolve(identifier: &str) -> Self {
        identifier.parse().unwrap_or_else(|_| {
            warn!(
                target: "trip_planner::provider",
                provider = identifier,
                fallback = ProviderKind::default().as_str(),
                "unknown AI provider, falling back to default"
            );
            ProviderKind::default()
        })
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = PlannerError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "google" | "gemini" => Ok(ProviderKind::Google),
            "laozhang" => Ok(ProviderKind::Laozhang),
            "openrouter" => Ok(ProviderKind::OpenRouter),
            other => Err(PlannerError::Config(format!("unknown AI provider: {other}"))),
        }
    }
}

/// Everything needed to construct any provider adapter.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderSettings {
    pub gemini: ProviderCredentials,
    pub laozhang: ProviderCredentials,
    pub openrouter: ProviderCredentials,
    pub openrouter_site_url: Option<String>,
    pub openrouter_site_name: Option<String>,
    pub generation: GenerationConfig,
    /// Ask OpenAI-compatible providers for schema-constrained output.
    pub schema_output: bool,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            gemini: ProviderCredentials::new(DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL),
            laozhang: ProviderCredentials::new(DEFAULT_LAOZHANG_BASE_URL, DEFAULT_LAOZHANG_MODEL),
            openrouter: ProviderCredentials::new(
                DEFAULT_OPENROUTER_BASE_URL,
                DEFAULT_OPENROUTER_MODEL,
            ),
            openrouter_site_url: None,
            openrouter_site_name: None,
            generation: GenerationConfig::default(),
            schema_output: false,
        }
    }
}

/// Builds provider adapters from [`ProviderSettings`].
///
/// Selection never fails on a missing API key; the adapter reports
/// [`PlannerError::ProviderAuth`] when it is first called.
#[derive(Clone, Debug, Default)]
pub struct ProviderFactory {
    settings: ProviderSettings,
}

impl ProviderFactory {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    pub fn create(&self, kind: ProviderKind) -> Arc<dyn ProviderAdapter> {
        info!(target: "trip_planner::provider", provider = kind.as_str(), "using AI provider");

        let settings = &self.settings;
        let schema_format = if settings.schema_output {
            Some(ResponseFormat::JsonSchema)
        } else {
            None
        };

        let adapter: Arc<dyn ProviderAdapter> = match kind {
            ProviderKind::Google => Arc::new(GeminiAdapter::new(
                settings.gemini.clone(),
                settings.generation.clone(),
            )),
            ProviderKind::Laozhang => {
                let mut adapter = OpenAiCompatAdapter::laozhang(
                    settings.laozhang.clone(),
                    settings.generation.clone(),
                );
                if let Some(format) = schema_format {
                    adapter = adapter.with_response_format(format);
                }
                Arc::new(adapter)
            }
            ProviderKind::OpenRouter => {
                let mut adapter = OpenAiCompatAdapter::openrouter(
                    settings.openrouter.clone(),
                    settings.generation.clone(),
                    settings.openrouter_site_url.clone(),
                    settings.openrouter_site_name.clone(),
                );
                if let Some(format) = schema_format {
                    adapter = adapter.with_response_format(format);
                }
                Arc::new(adapter)
            }
        };

        adapter
    }

    /// Create the adapter named by a configuration string such as `AI_PROVIDER`.
    pub fn create_named(&self, identifier: &str) -> Arc<dyn ProviderAdapter> {
        self.create(ProviderKind::resolve(identifier))
    }

    /// Whether the provider has an API key configured.
    pub fn is_available(&self, kind: ProviderKind) -> bool {
        self.credentials(kind).is_configured()
    }

    pub fn available_providers(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.is_available(*kind))
            .collect()
    }

    fn credentials(&self, kind: ProviderKind) -> &ProviderCredentials {
        match kind {
            ProviderKind::Google => &self.settings.gemini,
            ProviderKind::Laozhang => &self.settings.laozhang,
            ProviderKind::OpenRouter => &self.settings.openrouter,
        }
    }
}
