use std::time::Duration;
use chrono::{TimeZone, Utc};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use crate::config::sources::BinanceConfig;
use crate::error::{Error, Result};
use crate::sources::binance::BINANCE;
use crate::sources::http::parse_number;
use crate::sources::symbols::BINANCE_SYMBOLS;
use crate::types::market::{normalize_change_percent, MarketSnapshot};

/// Push feed of 24h ticker updates for one symbol
pub struct BinanceTickerStream {
    symbol: String,
    ws_url: String,
    reconnect_delay: Duration,
    stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

impl BinanceTickerStream {
    pub fn new(symbol: &str, config: &BinanceConfig) -> Self {
        let ticker = BINANCE_SYMBOLS.translate(symbol);
        BinanceTickerStream {
            symbol: symbol.to_string(),
            ws_url: format!(
                "{}/ws/{}@ticker",
                config.stream_url.trim_end_matches('/'),
                ticker.to_lowercase()
            ),
            reconnect_delay: config.reconnect_delay(),
            stream: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.ws_url
    }

    pub async fn connect(&mut self) -> Result<()> {
        let (ws_stream, _) = connect_async(&self.ws_url)
            .await
            .map_err(|e| Error::unavailable(BINANCE, format!("WebSocket connection failed: {}", e)))?;
        self.stream = Some(ws_stream);
        tracing::info!(symbol = %self.symbol, url = %self.ws_url, "Connected to Binance ticker stream");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Next ticker snapshot; control frames are skipped
    pub async fn next_snapshot(&mut self) -> Result<MarketSnapshot> {
        let stream = self.stream.as_mut()
            .ok_or_else(|| Error::unavailable(BINANCE, "ticker stream not connected"))?;

        loop {
            let Some(msg) = stream.next().await else {
                self.stream = None;
                return Err(Error::unavailable(BINANCE, "ticker stream closed"));
            };

            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    self.stream = None;
                    return Err(Error::unavailable(BINANCE, e));
                }
            };

            match msg {
                Message::Text(text) => {
                    if let Some(snapshot) = parse_ticker_message(&self.symbol, &text)? {
                        return Ok(snapshot);
                    }
                }
                Message::Close(frame) => {
                    self.stream = None;
                    return Err(Error::unavailable(BINANCE, format!("ticker stream closed: {:?}", frame)));
                }
                _ => {}
            }
        }
    }

    /// Connects, forwards snapshots, and reconnects after `reconnect_delay` on failure.
    /// Runs until the task is aborted.
    pub async fn run<F>(mut self, on_snapshot: F)
    where
        F: Fn(MarketSnapshot) + Send + Sync,
    {
        loop {
            if !self.is_connected() {
                if let Err(e) = self.connect().await {
                    tracing::warn!(error = %e, "Ticker stream connect failed");
                    tokio::time::sleep(self.reconnect_delay).await;
                    continue;
                }
            }

            match self.next_snapshot().await {
                Ok(snapshot) => on_snapshot(snapshot),
                Err(e @ Error::MalformedResponse { .. }) => {
                    tracing::debug!(error = %e, "Skipping ticker message");
                }
                Err(e) => {
                    tracing::warn!(error = %e, delay_ms = self.reconnect_delay.as_millis() as u64, "Ticker stream dropped, reconnecting");
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }
}

/// Parses one `@ticker` payload. Non-ticker events yield `None`.
pub fn parse_ticker_message(symbol: &str, text: &str) -> Result<Option<MarketSnapshot>> {
    let event: TickerEvent = serde_json::from_str(text)
        .map_err(|e| Error::malformed(BINANCE, e))?;

    if event.event_type != "24hrTicker" {
        return Ok(None);
    }

    let mut snapshot = MarketSnapshot::try_new(
        symbol,
        parse_number(BINANCE, "c", &event.last_price)?,
        parse_number(BINANCE, "p", &event.price_change)?,
        normalize_change_percent(&event.price_change_percent),
        parse_number(BINANCE, "q", &event.quote_volume)?,
        BINANCE,
    )?;

    if let Some(observed_at) = Utc.timestamp_millis_opt(event.event_time).single() {
        snapshot.observed_at = observed_at;
    }

    Ok(Some(snapshot))
}

#[derive(Deserialize)]
struct TickerEvent {
    #[serde(rename = "e")]
    event_type: String,
    #[serde(rename = "E")]
    event_time: i64,
    #[serde(rename = "c")]
    last_price: String,
    #[serde(rename = "p")]
    price_change: String,
    #[serde(rename = "P")]
    price_change_percent: String,
    #[serde(rename = "q")]
    quote_volume: String,
}
