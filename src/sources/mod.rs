pub mod http;
pub mod symbols;
pub mod whales;
pub mod yahoo;
pub mod alpha_vantage;
pub mod binance;
pub mod binance_stream;

use async_trait::async_trait;
use crate::error::Result;
use crate::types::market::MarketSnapshot;
use crate::types::technical::RawIndicators;
use crate::types::whale::WhaleTransaction;

pub use alpha_vantage::{AlphaVantageAdapter, ALPHA_VANTAGE};
pub use binance::{BinanceAdapter, BINANCE};
pub use binance_stream::BinanceTickerStream;
pub use yahoo::{YahooFinanceAdapter, YAHOO_FINANCE};

/// One upstream quote provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch_snapshot(&self, symbol: &str) -> Result<MarketSnapshot>;
}

/// Provider of EMA/RSI readings
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TechnicalSource: Send + Sync {
    fn provider(&self) -> &'static str;
    async fn fetch_indicators(&self, symbol: &str) -> Result<RawIndicators>;
}

/// Provider of large-trade detections
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WhaleSource: Send + Sync {
    fn provider(&self) -> &'static str;
    async fn fetch_whale_transactions(&self, symbol: &str) -> Result<Vec<WhaleTransaction>>;
}
