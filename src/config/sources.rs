use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Provider settings, in fallback priority order: Yahoo, Alpha Vantage, Binance
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub yahoo: YahooConfig,
    pub alpha_vantage: AlphaVantageConfig,
    pub binance: BinanceConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct YahooConfig {
    pub enabled: bool,
    pub base_url: String,
    pub poll_interval_ms: Option<u64>,
    pub timeout_ms: u64,
}

impl Default for YahooConfig {
    fn default() -> Self {
        YahooConfig {
            enabled: true,
            base_url: "https://query1.finance.yahoo.com".to_string(),
            poll_interval_ms: Some(5_000),
            timeout_ms: 10_000,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct AlphaVantageConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: String,
    // Free keys allow a handful of calls per minute, so no polling by default
    pub poll_interval_ms: Option<u64>,
    pub timeout_ms: u64,
}

impl Default for AlphaVantageConfig {
    fn default() -> Self {
        AlphaVantageConfig {
            enabled: true,
            base_url: "https://www.alphavantage.co".to_string(),
            api_key: "demo".to_string(),
            poll_interval_ms: None,
            timeout_ms: 10_000,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct BinanceConfig {
    pub enabled: bool,
    pub base_url: String,
    pub stream_url: String,
    pub poll_interval_ms: Option<u64>,
    pub timeout_ms: u64,
    pub trade_limit: u32,
    pub whale_volume_fraction: f64,
    pub default_whale_threshold: f64,
    pub max_whale_transactions: usize,
    pub reconnect_delay_ms: u64,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        BinanceConfig {
            enabled: true,
            base_url: "https://api.binance.com".to_string(),
            stream_url: "wss://stream.binance.com:9443".to_string(),
            poll_interval_ms: Some(3_000),
            timeout_ms: 10_000,
            trade_limit: 100,
            whale_volume_fraction: 0.001,   // 0.1% of average hourly volume
            default_whale_threshold: 1000.0,
            max_whale_transactions: 10,
            reconnect_delay_ms: 5_000,
        }
    }
}

pub(crate) fn millis(value: u64) -> Duration {
    Duration::from_millis(value)
}

impl YahooConfig {
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_ms.map(millis)
    }

    pub fn timeout(&self) -> Duration {
        millis(self.timeout_ms)
    }
}

impl AlphaVantageConfig {
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_ms.map(millis)
    }

    pub fn timeout(&self) -> Duration {
        millis(self.timeout_ms)
    }
}

impl BinanceConfig {
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_ms.map(millis)
    }

    pub fn timeout(&self) -> Duration {
        millis(self.timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        millis(self.reconnect_delay_ms)
    }
}
