use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use crate::config::sources::BinanceConfig;
use crate::error::{Error, Result};
use crate::sources::http::{parse_number, ProviderClient};
use crate::sources::symbols::BINANCE_SYMBOLS;
use crate::sources::whales::{detect_whales, whale_threshold, RecentTrade};
use crate::sources::{SourceAdapter, WhaleSource};
use crate::types::market::{normalize_change_percent, MarketSnapshot};
use crate::types::whale::WhaleTransaction;

pub const BINANCE: &str = "Binance";

pub struct BinanceAdapter {
    client: ProviderClient,
    trade_limit: u32,
    whale_volume_fraction: f64,
    default_whale_threshold: f64,
    max_whale_transactions: usize,
}

impl BinanceAdapter {
    pub fn new(config: &BinanceConfig) -> Result<Self> {
        Ok(BinanceAdapter {
            client: ProviderClient::new(BINANCE, &config.base_url, config.timeout())?,
            trade_limit: config.trade_limit,
            whale_volume_fraction: config.whale_volume_fraction,
            default_whale_threshold: config.default_whale_threshold,
            max_whale_transactions: config.max_whale_transactions,
        })
    }

    async fn ticker_24h(&self, ticker: &str) -> Result<Ticker24h> {
        self.client
            .get_json("/api/v3/ticker/24hr", &[("symbol", ticker)])
            .await
    }

    async fn last_price(&self, ticker: &str) -> Result<f64> {
        let response: TickerPrice = self.client
            .get_json("/api/v3/ticker/price", &[("symbol", ticker)])
            .await?;
        parse_number(BINANCE, "price", &response.price)
    }

    async fn recent_trades(&self, ticker: &str) -> Result<Vec<RecentTrade>> {
        let limit = self.trade_limit.to_string();
        let trades: Vec<AggTrade> = self.client
            .get_json("/api/v3/aggTrades", &[("symbol", ticker), ("limit", limit.as_str())])
            .await?;

        trades.into_iter()
            .map(|trade| {
                let timestamp = Utc.timestamp_millis_opt(trade.time)
                    .single()
                    .ok_or_else(|| Error::malformed(BINANCE, format!("bad trade time {}", trade.time)))?;

                Ok(RecentTrade {
                    trade_id: trade.id.to_string(),
                    price: parse_number(BINANCE, "p", &trade.price)?,
                    quantity: parse_number(BINANCE, "q", &trade.quantity)?,
                    timestamp,
                    buyer_is_maker: trade.buyer_is_maker,
                })
            })
            .collect()
    }

    /// Threshold from 24h volume, or the configured default when it can't be read
    async fn current_threshold(&self, ticker: &str) -> f64 {
        let volume = match self.ticker_24h(ticker).await {
            Ok(stats) => parse_number(BINANCE, "volume", &stats.volume),
            Err(e) => Err(e),
        };

        match volume.map(|v| whale_threshold(v, self.whale_volume_fraction)) {
            Ok(threshold) if threshold > 0.0 => threshold,
            Ok(threshold) => {
                tracing::warn!(ticker, threshold, "Non-positive whale threshold, using default");
                self.default_whale_threshold
            }
            Err(e) => {
                tracing::warn!(ticker, error = %e, "Whale threshold unavailable, using default");
                self.default_whale_threshold
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for BinanceAdapter {
    fn name(&self) -> &'static str {
        BINANCE
    }

    async fn fetch_snapshot(&self, symbol: &str) -> Result<MarketSnapshot> {
        let ticker = BINANCE_SYMBOLS.translate(symbol);

        let (stats, price) = tokio::try_join!(
            self.ticker_24h(&ticker),
            self.last_price(&ticker),
        )?;

        MarketSnapshot::try_new(
            symbol,
            price,
            parse_number(BINANCE, "priceChange", &stats.price_change)?,
            normalize_change_percent(&stats.price_change_percent),
            parse_number(BINANCE, "quoteVolume", &stats.quote_volume)?,
            BINANCE,
        )
    }
}

#[async_trait]
impl WhaleSource for BinanceAdapter {
    fn provider(&self) -> &'static str {
        BINANCE
    }

    async fn fetch_whale_transactions(&self, symbol: &str) -> Result<Vec<WhaleTransaction>> {
        let ticker = BINANCE_SYMBOLS.translate(symbol);

        let (threshold, trades) = tokio::join!(
            self.current_threshold(&ticker),
            self.recent_trades(&ticker),
        );
        let trades = trades?;

        let whales = detect_whales(&trades, threshold, BINANCE, self.max_whale_transactions);
        tracing::debug!(
            ticker = %ticker,
            threshold,
            trades = trades.len(),
            whales = whales.len(),
            "Scanned recent trades"
        );

        Ok(whales)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    price_change: String,
    price_change_percent: String,
    volume: String,
    quote_volume: String,
}

#[derive(Deserialize)]
struct TickerPrice {
    price: String,
}

#[derive(Deserialize)]
struct AggTrade {
    #[serde(rename = "a")]
    id: u64,
    #[serde(rename = "p")]
    price: String,
    #[serde(rename = "q")]
    quantity: String,
    #[serde(rename = "T")]
    time: i64,
    #[serde(rename = "m")]
    buyer_is_maker: bool,
}
