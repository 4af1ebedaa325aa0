//! Whale detection over a recent-trades list
//!
//! A trade is a whale when its size exceeds a threshold derived from the
//! average hourly volume. Confidence comes from the size-to-threshold ratio.

use chrono::{DateTime, Utc};
use crate::types::whale::{Confidence, TradeSide, WhaleTransaction};

/// A normalized recent trade, before whale filtering
#[derive(Clone, Debug, PartialEq)]
pub struct RecentTrade {
    pub trade_id: String,
    pub price: f64,
    pub quantity: f64,
    pub timestamp: DateTime<Utc>,
    pub buyer_is_maker: bool,
}

/// Average hourly volume over 24h scaled by `fraction`
pub fn whale_threshold(volume_24h: f64, fraction: f64) -> f64 {
    (volume_24h / 24.0) * fraction
}

/// `min(round(amount / threshold * 10), 100)`
pub fn confidence_pct(amount: f64, threshold: f64) -> u32 {
    let ratio = amount / threshold;
    (ratio * 10.0).round().clamp(0.0, 100.0) as u32
}

pub fn confidence_level(pct: u32) -> Confidence {
    if pct >= 75 {
        Confidence::High
    } else if pct >= 50 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Trades strictly above `threshold`, newest first, at most `limit`
pub fn detect_whales(
    trades: &[RecentTrade],
    threshold: f64,
    source: &str,
    limit: usize,
) -> Vec<WhaleTransaction> {
    let mut whales: Vec<WhaleTransaction> = trades.iter()
        .filter(|trade| trade.quantity > threshold)
        .map(|trade| WhaleTransaction {
            id: format!("{}-{}", source.to_lowercase(), trade.trade_id),
            timestamp: trade.timestamp,
            // Buyer as maker means the aggressor sold
            side: if trade.buyer_is_maker { TradeSide::Sell } else { TradeSide::Buy },
            amount: trade.quantity,
            amount_usd: trade.quantity * trade.price,
            price: trade.price,
            confidence: confidence_level(confidence_pct(trade.quantity, threshold)),
            source: source.to_string(),
        })
        .collect();

    whales.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    whales.truncate(limit);
    whales
}
