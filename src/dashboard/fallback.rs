//! Static datasets shown when the initial load cannot reach any provider.
//! Clearly labeled through `FALLBACK_SOURCE` and replaced by the first live update.

use chrono::Utc;
use crate::types::market::MarketSnapshot;
use crate::types::technical::{TechnicalSnapshot, Trend};

pub const FALLBACK_SOURCE: &str = "Mock Data (API unavailable)";

pub fn fallback_market(symbol: &str) -> MarketSnapshot {
    MarketSnapshot {
        symbol: symbol.to_string(),
        price: 23580.50,
        change: 125.75,
        change_percent: "0.54%".to_string(),
        volume: 125_000_000.0,
        observed_at: Utc::now(),
        source: FALLBACK_SOURCE.to_string(),
    }
}

pub fn fallback_technical() -> TechnicalSnapshot {
    TechnicalSnapshot {
        ema50: 23512.34,
        ema100: 23445.67,
        ema200: 23123.89,
        rsi: 67.8,
        support_level: 23450.0,
        resistance_level: 23650.0,
        current_price: 23580.50,
        trend: Trend::Bullish,
        pullback_signal: false,
    }
}
