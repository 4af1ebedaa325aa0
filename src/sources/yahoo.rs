use async_trait::async_trait;
use serde::Deserialize;
use crate::config::sources::YahooConfig;
use crate::error::{Error, Result};
use crate::sources::http::ProviderClient;
use crate::sources::symbols::YAHOO_SYMBOLS;
use crate::sources::SourceAdapter;
use crate::types::market::{format_change_percent, MarketSnapshot};

pub const YAHOO_FINANCE: &str = "Yahoo Finance";

pub struct YahooFinanceAdapter {
    client: ProviderClient,
}

impl YahooFinanceAdapter {
    pub fn new(config: &YahooConfig) -> Result<Self> {
        Ok(YahooFinanceAdapter {
            client: ProviderClient::new(YAHOO_FINANCE, &config.base_url, config.timeout())?,
        })
    }

    fn chart_path(symbol: &str) -> String {
        let ticker = YAHOO_SYMBOLS.translate(symbol);
        format!("/v8/finance/chart/{}", ticker.replace('^', "%5E"))
    }
}

#[async_trait]
impl SourceAdapter for YahooFinanceAdapter {
    fn name(&self) -> &'static str {
        YAHOO_FINANCE
    }

    async fn fetch_snapshot(&self, symbol: &str) -> Result<MarketSnapshot> {
        let response: ChartResponse = self.client
            .get_json(&Self::chart_path(symbol), &[])
            .await?;

        let meta = response.chart.result
            .and_then(|results| results.into_iter().next())
            .map(|result| result.meta)
            .ok_or_else(|| Error::malformed(YAHOO_FINANCE, "no chart result"))?;

        if meta.previous_close <= 0.0 {
            return Err(Error::malformed(
                YAHOO_FINANCE,
                format!("previous close {} is not positive", meta.previous_close),
            ));
        }

        let change = meta.regular_market_price - meta.previous_close;
        let change_percent = format_change_percent(change / meta.previous_close * 100.0);

        MarketSnapshot::try_new(
            symbol,
            meta.regular_market_price,
            change,
            change_percent,
            meta.regular_market_volume,
            YAHOO_FINANCE,
        )
    }
}

#[derive(Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
}

#[derive(Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: f64,
    previous_close: f64,
    regular_market_volume: f64,
}
