use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};

/// Point-in-time read of market state from one source
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: String,
    pub volume: f64,
    pub observed_at: DateTime<Utc>,
    pub source: String,
}

impl MarketSnapshot {
    /// Validates price > 0 and volume >= 0, blaming `source` otherwise
    pub fn try_new(
        symbol: &str,
        price: f64,
        change: f64,
        change_percent: String,
        volume: f64,
        source: &str,
    ) -> Result<Self> {
        if !price.is_finite() || price <= 0.0 {
            return Err(Error::malformed(source, format!("non-positive price {}", price)));
        }
        if !volume.is_finite() || volume < 0.0 {
            return Err(Error::malformed(source, format!("negative volume {}", volume)));
        }
        if !change.is_finite() {
            return Err(Error::malformed(source, "non-finite change"));
        }

        Ok(MarketSnapshot {
            symbol: symbol.to_string(),
            price,
            change,
            change_percent,
            volume,
            observed_at: Utc::now(),
            source: source.to_string(),
        })
    }
}

/// `"0.54%"` from a percentage value
pub fn format_change_percent(percent: f64) -> String {
    format!("{:.2}%", percent)
}

/// Normalizes provider percent strings (`"0.54"`, `"0.54%"`) to `"0.54%"`
pub fn normalize_change_percent(raw: &str) -> String {
    format!("{}%", raw.trim().trim_end_matches('%'))
}
