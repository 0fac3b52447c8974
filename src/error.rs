use thiserror::Error;

/// Main error type for the planning pipeline
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid planning request: {0}")]
    InvalidRequest(String),

    #[error("Yearly generation quota exhausted (limit {limit})")]
    QuotaExceeded { limit: u32 },

    #[error("Provider rejected credentials: {0}")]
    ProviderAuth(String),

    #[error("Provider quota exhausted: {0}")]
    ProviderQuota(String),

    #[error("Provider temporarily unavailable: {0}")]
    ProviderTransient(String),

    #[error("Could not recover a valid plan from the provider response: {0}")]
    RecoveryFailure(String),

    #[error("Usage accounting failed: {0}")]
    Accounting(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PlannerError>;

impl PlannerError {
    /// Check if another generation attempt could succeed.
    ///
    /// Provider auth and quota failures are guaranteed to repeat, so only
    /// transport-level hiccups and unrecoverable model output are retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlannerError::ProviderTransient(_) | PlannerError::RecoveryFailure(_)
        )
    }

    /// Get the error code for structured responses
    pub fn error_code(&self) -> &'static str {
        match self {
            PlannerError::Config(_) => "CONFIG_ERROR",
            PlannerError::InvalidRequest(_) => "INVALID_INPUT",
            PlannerError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            PlannerError::ProviderAuth(_) => "PROVIDER_AUTH_ERROR",
            PlannerError::ProviderQuota(_) => "PROVIDER_QUOTA_ERROR",
            PlannerError::ProviderTransient(_) => "PROVIDER_UNAVAILABLE",
            PlannerError::RecoveryFailure(_) => "AI_GENERATION_FAILED",
            PlannerError::Accounting(_) => "DATABASE_ERROR",
        }
    }

    /// Convert to a structured error payload
    pub fn to_error_payload(&self) -> serde_json::Value {
        let mut payload = serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
                "retryable": self.is_retryable()
            }
        });

        if let PlannerError::QuotaExceeded { limit } = self {
            payload["error"]["details"] = serde_json::json!({
                "remaining": 0,
                "limit": limit
            });
        }

        payload
    }
}

impl From<reqwest::Error> for PlannerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PlannerError::ProviderTransient(format!("request timed out: {err}"))
        } else if err.is_connect() {
            PlannerError::ProviderTransient(format!("connection failed: {err}"))
        } else {
            PlannerError::ProviderTransient(format!("HTTP request failed: {err}"))
        }
    }
}

impl From<sqlx::Error> for PlannerError {
    fn from(err: sqlx::Error) -> Self {
        PlannerError::Accounting(err.to_string())
    }
}
