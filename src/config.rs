//! Environment-driven configuration.

use std::{env, str::FromStr, time::Duration};

use crate::{
    core::generator::{RetryPolicy, DEFAULT_MAX_ATTEMPTS},
    error::{PlannerError, Result},
    providers::{
        factory::{
            DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, DEFAULT_LAOZHANG_BASE_URL,
            DEFAULT_LAOZHANG_MODEL, DEFAULT_OPENROUTER_BASE_URL, DEFAULT_OPENROUTER_MODEL,
        },
        GenerationConfig, ProviderCredentials, ProviderKind, ProviderSettings,
    },
    usage::{
        accountant::{DEFAULT_FREE_LIMIT, DEFAULT_VIP_LIMIT},
        UsageLimits,
    },
};

const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 2000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// Raw `AI_PROVIDER` value; unknown names fall back to laozhang.
    pub provider: String,
    pub providers: ProviderSettings,
    pub limits: UsageLimits,
    pub retry: RetryPolicy,
    /// Postgres URL; the in-memory store is used when unset.
    pub database_url: Option<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default().as_str().to_string(),
            providers: ProviderSettings::default(),
            limits: UsageLimits::default(),
            retry: RetryPolicy::default(),
            database_url: None,
        }
    }
}

impl PlannerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let credentials = |prefix: &str, base_url: &str, model: &str| ProviderCredentials {
            api_key: var(&format!("{prefix}_API_KEY")),
            base_url: var(&format!("{prefix}_BASE_URL")).unwrap_or_else(|| base_url.to_string()),
            model: var(&format!("{prefix}_MODEL")).unwrap_or_else(|| model.to_string()),
        };

        let providers = ProviderSettings {
            gemini: credentials("GEMINI", DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL),
            laozhang: credentials("LAOZHANG", DEFAULT_LAOZHANG_BASE_URL, DEFAULT_LAOZHANG_MODEL),
            openrouter: credentials(
                "OPENROUTER",
                DEFAULT_OPENROUTER_BASE_URL,
                DEFAULT_OPENROUTER_MODEL,
            ),
            openrouter_site_url: var("OPENROUTER_SITE_URL"),
            openrouter_site_name: var("OPENROUTER_SITE_NAME"),
            generation: GenerationConfig::default(),
            schema_output: parse_var(&var, "AI_SCHEMA_OUTPUT", false)?,
        };

        let limits = UsageLimits {
            free: positive(parse_var(&var, "FREE_USER_LIMIT", DEFAULT_FREE_LIMIT)?, "FREE_USER_LIMIT")?,
            vip: positive(parse_var(&var, "VIP_USER_LIMIT", DEFAULT_VIP_LIMIT)?, "VIP_USER_LIMIT")?,
        };

        let retry = RetryPolicy {
            max_attempts: positive(
                parse_var(&var, "AI_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
                "AI_MAX_ATTEMPTS",
            )?,
            base_delay: Duration::from_millis(parse_var(
                &var,
                "AI_RETRY_BASE_DELAY_MS",
                DEFAULT_RETRY_BASE_DELAY_MS,
            )?),
            request_timeout: Duration::from_secs(parse_var(
                &var,
                "AI_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
        };

        Ok(Self {
            provider: var("AI_PROVIDER").unwrap_or_else(|| ProviderKind::default().as_str().to_string()),
            providers,
            limits,
            retry,
            database_url: var("DATABASE_URL"),
        })
    }

    pub fn provider_kind(&self) -> ProviderKind {
        ProviderKind::resolve(&self.provider)
    }
}

fn parse_var<T, V>(var: &V, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|err| PlannerError::Config(format!("{key}=`{raw}` is invalid: {err}"))),
        None => Ok(default),
    }
}

fn positive(value: u32, key: &str) -> Result<u32> {
    if value == 0 {
        Err(PlannerError::Config(format!("{key} must be greater than zero")))
    } else {
        Ok(value)
    }
}
