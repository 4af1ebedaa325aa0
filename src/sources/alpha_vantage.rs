use std::collections::{BTreeMap, HashMap};
use async_trait::async_trait;
use serde::Deserialize;
use crate::config::sources::AlphaVantageConfig;
use crate::error::{Error, Result};
use crate::sources::http::{parse_number, ProviderClient};
use crate::sources::symbols::ALPHA_VANTAGE_SYMBOLS;
use crate::sources::{SourceAdapter, TechnicalSource};
use crate::types::market::{normalize_change_percent, MarketSnapshot};
use crate::types::technical::RawIndicators;

pub const ALPHA_VANTAGE: &str = "Alpha Vantage";

const EMA_PERIODS: [u32; 3] = [50, 100, 200];
const RSI_PERIOD: u32 = 14;
const INDICATOR_INTERVAL: &str = "1min";

pub struct AlphaVantageAdapter {
    client: ProviderClient,
    api_key: String,
}

impl AlphaVantageAdapter {
    pub fn new(config: &AlphaVantageConfig) -> Result<Self> {
        Ok(AlphaVantageAdapter {
            client: ProviderClient::new(ALPHA_VANTAGE, &config.base_url, config.timeout())?,
            api_key: config.api_key.clone(),
        })
    }

    async fn global_quote(&self, ticker: &str) -> Result<Quote> {
        let response: GlobalQuoteResponse = self.client
            .get_json("/query", &[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", ticker),
                ("apikey", self.api_key.as_str()),
            ])
            .await?;

        let quote = response.quote;
        Ok(Quote {
            price: parse_number(ALPHA_VANTAGE, "05. price", &quote.price)?,
            change: parse_number(ALPHA_VANTAGE, "09. change", &quote.change)?,
            change_percent: normalize_change_percent(&quote.change_percent),
            volume: parse_number(ALPHA_VANTAGE, "06. volume", &quote.volume)?,
        })
    }

    /// Latest value of an indicator series (EMA, RSI)
    async fn latest_indicator(&self, ticker: &str, function: &str, period: u32) -> Result<f64> {
        let period = period.to_string();
        let response: HashMap<String, serde_json::Value> = self.client
            .get_json("/query", &[
                ("function", function),
                ("symbol", ticker),
                ("interval", INDICATOR_INTERVAL),
                ("time_period", period.as_str()),
                ("series_type", "close"),
                ("apikey", self.api_key.as_str()),
            ])
            .await?;

        let key = format!("Technical Analysis: {}", function);
        let series = response.get(&key)
            .cloned()
            .ok_or_else(|| Error::malformed(ALPHA_VANTAGE, format!("missing {:?}", key)))?;

        // Keys are "YYYY-MM-DD HH:MM" so the greatest key is the latest point
        let series: BTreeMap<String, HashMap<String, String>> = serde_json::from_value(series)
            .map_err(|e| Error::malformed(ALPHA_VANTAGE, format!("{}: {}", key, e)))?;

        let (_, point) = series.iter()
            .next_back()
            .ok_or_else(|| Error::malformed(ALPHA_VANTAGE, format!("{} series is empty", function)))?;

        let raw = point.get(function)
            .ok_or_else(|| Error::malformed(ALPHA_VANTAGE, format!("point without {} value", function)))?;

        parse_number(ALPHA_VANTAGE, function, raw)
    }
}

#[async_trait]
impl SourceAdapter for AlphaVantageAdapter {
    fn name(&self) -> &'static str {
        ALPHA_VANTAGE
    }

    async fn fetch_snapshot(&self, symbol: &str) -> Result<MarketSnapshot> {
        let ticker = ALPHA_VANTAGE_SYMBOLS.translate(symbol);
        let quote = self.global_quote(&ticker).await?;

        MarketSnapshot::try_new(
            symbol,
            quote.price,
            quote.change,
            quote.change_percent,
            quote.volume,
            ALPHA_VANTAGE,
        )
    }
}

#[async_trait]
impl TechnicalSource for AlphaVantageAdapter {
    fn provider(&self) -> &'static str {
        ALPHA_VANTAGE
    }

    async fn fetch_indicators(&self, symbol: &str) -> Result<RawIndicators> {
        let ticker = ALPHA_VANTAGE_SYMBOLS.translate(symbol);

        let (ema50, ema100, ema200, rsi, quote) = tokio::try_join!(
            self.latest_indicator(&ticker, "EMA", EMA_PERIODS[0]),
            self.latest_indicator(&ticker, "EMA", EMA_PERIODS[1]),
            self.latest_indicator(&ticker, "EMA", EMA_PERIODS[2]),
            self.latest_indicator(&ticker, "RSI", RSI_PERIOD),
            self.global_quote(&ticker),
        )?;

        if !(0.0..=100.0).contains(&rsi) {
            return Err(Error::malformed(ALPHA_VANTAGE, format!("RSI {} outside [0, 100]", rsi)));
        }
        if quote.price <= 0.0 {
            return Err(Error::malformed(ALPHA_VANTAGE, format!("non-positive price {}", quote.price)));
        }

        Ok(RawIndicators {
            ema50,
            ema100,
            ema200,
            rsi,
            current_price: quote.price,
            support_level: None,
            resistance_level: None,
        })
    }
}

struct Quote {
    price: f64,
    change: f64,
    change_percent: String,
    volume: f64,
}

#[derive(Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    quote: GlobalQuote,
}

#[derive(Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: String,
    #[serde(rename = "06. volume")]
    volume: String,
    #[serde(rename = "09. change")]
    change: String,
    #[serde(rename = "10. change percent")]
    change_percent: String,
}
