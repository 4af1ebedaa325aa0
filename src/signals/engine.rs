use chrono::Utc;
use crate::types::ids::SignalId;
use crate::types::market::MarketSnapshot;
use crate::types::signal::{Signal, SignalFeatures, SignalType};
use crate::types::technical::{RawIndicators, TechnicalSnapshot, Trend};
use crate::types::whale::{Confidence, TradeSide, WhaleTransaction};

pub const DISCLAIMER: &str =
    "This information is for informational purposes only and does not constitute investment advice.";

const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_OVERSOLD: f64 = 30.0;
const RSI_NEUTRAL: f64 = 50.0;
const SUPPORT_FACTOR: f64 = 0.98;
const RESISTANCE_FACTOR: f64 = 1.02;

pub fn classify_trend(ema50: f64, ema200: f64, rsi: f64) -> Trend {
    if ema50 > ema200 && rsi > RSI_NEUTRAL {
        Trend::Bullish
    } else if ema50 < ema200 && rsi < RSI_NEUTRAL {
        Trend::Bearish
    } else {
        Trend::Sideways
    }
}

pub fn is_pullback(rsi: f64) -> bool {
    rsi < RSI_OVERSOLD || rsi > RSI_OVERBOUGHT
}

pub fn derive_technical(raw: &RawIndicators) -> TechnicalSnapshot {
    let rsi = if raw.rsi.is_nan() { RSI_NEUTRAL } else { raw.rsi.clamp(0.0, 100.0) };

    TechnicalSnapshot {
        ema50: raw.ema50,
        ema100: raw.ema100,
        ema200: raw.ema200,
        rsi,
        support_level: raw.support_level.unwrap_or(raw.current_price * SUPPORT_FACTOR),
        resistance_level: raw.resistance_level.unwrap_or(raw.current_price * RESISTANCE_FACTOR),
        current_price: raw.current_price,
        trend: classify_trend(raw.ema50, raw.ema200, rsi),
        pullback_signal: is_pullback(rsi),
    }
}

/// Builds signals for one symbol
#[derive(Clone, Debug)]
pub struct SignalEngine {
    symbol: String,
}

impl SignalEngine {
    pub fn new(symbol: impl Into<String>) -> Self {
        SignalEngine { symbol: symbol.into() }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn generate_signals(&self, technical: &TechnicalSnapshot, market_volume: f64) -> Vec<Signal> {
        let features = SignalFeatures {
            price: technical.current_price,
            volume: market_volume,
            rsi: Some(technical.rsi),
            whale_activity: None,
        };
        let mut signals = Vec::new();

        if technical.rsi > RSI_OVERBOUGHT {
            signals.push(self.signal(
                "Overbought warning",
                Confidence::High,
                SignalType::TechnicalBreakout,
                format!(
                    "RSI at {:.1} is above {}. Momentum is stretched and a pullback is likely.",
                    technical.rsi, RSI_OVERBOUGHT
                ),
                features.clone(),
            ));
        }

        if technical.rsi < RSI_OVERSOLD {
            signals.push(self.signal(
                "Oversold opportunity",
                Confidence::High,
                SignalType::TechnicalBreakout,
                format!(
                    "RSI at {:.1} is below {}. Selling pressure looks exhausted and a rebound is possible.",
                    technical.rsi, RSI_OVERSOLD
                ),
                features.clone(),
            ));
        }

        if technical.ema50 > technical.ema200 {
            signals.push(self.signal(
                "Uptrend confirmation",
                Confidence::Medium,
                SignalType::EmaCross,
                format!(
                    "EMA50 ({:.2}) is above EMA200 ({:.2}), confirming the long-term uptrend.",
                    technical.ema50, technical.ema200
                ),
                features,
            ));
        }

        signals
    }

    /// One `whale_activity` signal when the batch holds a high-confidence trade
    pub fn generate_whale_signals(
        &self,
        whales: &[WhaleTransaction],
        market: Option<&MarketSnapshot>,
    ) -> Vec<Signal> {
        let high: Vec<&WhaleTransaction> = whales.iter()
            .filter(|w| w.confidence == Confidence::High)
            .collect();

        let Some(largest) = high.iter().max_by(|a, b| a.amount_usd.total_cmp(&b.amount_usd)) else {
            return Vec::new();
        };

        let bought: f64 = high.iter().filter(|w| w.side == TradeSide::Buy).map(|w| w.amount_usd).sum();
        let sold: f64 = high.iter().filter(|w| w.side == TradeSide::Sell).map(|w| w.amount_usd).sum();
        let bias = if bought >= sold { "buying" } else { "selling" };

        let features = SignalFeatures {
            price: market.map(|m| m.price).unwrap_or(largest.price),
            volume: market.map(|m| m.volume).unwrap_or(bought + sold),
            rsi: None,
            whale_activity: Some(true),
        };

        vec![self.signal(
            "Whale activity",
            Confidence::High,
            SignalType::WhaleActivity,
            format!(
                "{} high-confidence whale trade(s) detected on {}, net {} (largest ${:.0}).",
                high.len(), largest.source, bias, largest.amount_usd
            ),
            features,
        )]
    }

    fn signal(
        &self,
        label: &str,
        confidence: Confidence,
        kind: SignalType,
        description: String,
        features: SignalFeatures,
    ) -> Signal {
        Signal {
            id: SignalId::new(),
            title: format!("SIG | {} | {}", self.symbol, label),
            timestamp: Utc::now(),
            symbol: self.symbol.clone(),
            confidence,
            kind,
            description,
            features,
            disclaimer: DISCLAIMER.to_string(),
        }
    }
}
