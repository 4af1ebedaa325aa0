use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Sideways,
}

/// Indicator values as read from a provider, before derivation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIndicators {
    pub ema50: f64,
    pub ema100: f64,
    pub ema200: f64,
    pub rsi: f64,
    pub current_price: f64,
    pub support_level: Option<f64>,
    pub resistance_level: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalSnapshot {
    pub ema50: f64,
    pub ema100: f64,
    pub ema200: f64,
    pub rsi: f64,  // [0, 100]
    pub support_level: f64,
    pub resistance_level: f64,
    pub current_price: f64,
    pub trend: Trend,
    pub pullback_signal: bool,
}
