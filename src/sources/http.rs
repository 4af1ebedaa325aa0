use std::time::Duration;
use reqwest::Client;
use serde::de::DeserializeOwned;
use crate::error::{Error, Result};

/// HTTP client bound to one provider's base URL
///
/// Transport failures and non-2xx statuses become `ProviderUnavailable`,
/// bodies that don't match the expected schema become `MalformedResponse`.
#[derive(Clone, Debug)]
pub struct ProviderClient {
    provider: &'static str,
    base_url: String,
    client: Client,
}

impl ProviderClient {
    pub fn new(provider: &'static str, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("whale-pulse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::ConfigError(format!("{} HTTP client: {}", provider, e)))?;

        Ok(ProviderClient {
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let response = self.client.get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::unavailable(self.provider, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::unavailable(
                self.provider,
                format!("HTTP {} from {}", status, path),
            ));
        }

        let body = response.text()
            .await
            .map_err(|e| Error::unavailable(self.provider, e))?;

        serde_json::from_str(&body)
            .map_err(|e| Error::malformed(self.provider, format!("{}: {}", path, e)))
    }
}

/// Parses a string-encoded number from a provider payload
pub fn parse_number(provider: &str, field: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::malformed(provider, format!("field {} is not a number: {:?}", field, raw)))
}
