use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Source Adapter Errors
    #[error("Provider {provider} unavailable: {reason}")]
    ProviderUnavailable {
        provider: String,
        reason: String,
    },

    #[error("Malformed response from {provider}: {reason}")]
    MalformedResponse {
        provider: String,
        reason: String,
    },

    // Aggregator Errors
    #[error("All sources unavailable for {symbol}: {}", .failures.join("; "))]
    AllSourcesUnavailable {
        symbol: String,
        failures: Vec<String>,
    },

    #[error("Subscription closed")]
    SubscriptionClosed,

    // Settings Errors
    #[error("Settings import failed: {0}")]
    SettingsImportError(String),

    // Dashboard Errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid alert: {0}")]
    InvalidAlert(String),

    #[error("Task failed: {0}")]
    TaskFailed(String),

    // System Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    // IO Errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    pub fn unavailable(provider: impl Into<String>, reason: impl ToString) -> Self {
        Error::ProviderUnavailable {
            provider: provider.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(provider: impl Into<String>, reason: impl ToString) -> Self {
        Error::MalformedResponse {
            provider: provider.into(),
            reason: reason.to_string(),
        }
    }

    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ProviderUnavailable { .. } => "provider_unavailable",
            Error::MalformedResponse { .. } => "malformed_response",
            Error::AllSourcesUnavailable { .. } => "all_sources_unavailable",
            Error::SubscriptionClosed => "subscription_closed",
            Error::SettingsImportError(_) => "settings_import",
            Error::NotFound(_) => "not_found",
            Error::InvalidAlert(_) => "invalid_alert",
            Error::TaskFailed(_) => "task_failed",
            Error::ConfigError(_) => "config",
            Error::SerializationError(_) => "serialization",
            Error::IoError(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
