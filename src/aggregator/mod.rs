pub mod subscription;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use dashmap::DashMap;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::Instrument;
use crate::config::loader::AppConfig;
use crate::error::{Error, Result};
use crate::observability::metrics::{
    AGGREGATE_FAILURES, FETCH_LATENCY, SOURCE_FETCH_FAILURES, SOURCE_FETCH_SUCCESS,
};
use crate::observability::tracing::trace_fetch;
use crate::sources::{
    AlphaVantageAdapter, BinanceAdapter, SourceAdapter, TechnicalSource, WhaleSource,
    YahooFinanceAdapter,
};
use crate::types::market::MarketSnapshot;
use crate::types::technical::RawIndicators;
use crate::types::whale::WhaleTransaction;

pub use subscription::Subscription;

/// An adapter together with its polling cadence (`None` = never polled)
#[derive(Clone)]
pub struct RegisteredSource {
    pub adapter: Arc<dyn SourceAdapter>,
    pub poll_interval: Option<Duration>,
}

impl RegisteredSource {
    pub fn new(adapter: Arc<dyn SourceAdapter>, poll_interval: Option<Duration>) -> Self {
        RegisteredSource { adapter, poll_interval }
    }
}

/// Multi-source market data aggregator
///
/// Snapshot requests walk the sources in registration order and return the
/// first success. Every success replaces the last-known snapshot of its source.
pub struct MarketAggregator {
    sources: Vec<RegisteredSource>,
    technical: Option<Arc<dyn TechnicalSource>>,
    whales: Option<Arc<dyn WhaleSource>>,
    last_known: Arc<DashMap<String, MarketSnapshot>>,
}

impl MarketAggregator {
    pub fn new(sources: Vec<RegisteredSource>) -> Self {
        MarketAggregator {
            sources,
            technical: None,
            whales: None,
            last_known: Arc::new(DashMap::new()),
        }
    }

    pub fn with_technical_source(mut self, source: Arc<dyn TechnicalSource>) -> Self {
        self.technical = Some(source);
        self
    }

    pub fn with_whale_source(mut self, source: Arc<dyn WhaleSource>) -> Self {
        self.whales = Some(source);
        self
    }

    /// Yahoo, then Alpha Vantage, then Binance, skipping disabled providers
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let sources_config = &config.sources;
        let mut sources = Vec::new();
        let mut technical: Option<Arc<dyn TechnicalSource>> = None;
        let mut whales: Option<Arc<dyn WhaleSource>> = None;

        if sources_config.yahoo.enabled {
            let yahoo = Arc::new(YahooFinanceAdapter::new(&sources_config.yahoo)?);
            sources.push(RegisteredSource::new(yahoo, sources_config.yahoo.poll_interval()));
        }

        if sources_config.alpha_vantage.enabled {
            let alpha_vantage = Arc::new(AlphaVantageAdapter::new(&sources_config.alpha_vantage)?);
            technical = Some(alpha_vantage.clone());
            sources.push(RegisteredSource::new(alpha_vantage, sources_config.alpha_vantage.poll_interval()));
        }

        if sources_config.binance.enabled {
            let binance = Arc::new(BinanceAdapter::new(&sources_config.binance)?);
            whales = Some(binance.clone());
            sources.push(RegisteredSource::new(binance, sources_config.binance.poll_interval()));
        }

        tracing::info!(
            sources = ?sources.iter().map(|s| s.adapter.name()).collect::<Vec<_>>(),
            technical = technical.is_some(),
            whales = whales.is_some(),
            "Market aggregator configured"
        );

        Ok(MarketAggregator {
            sources,
            technical,
            whales,
            last_known: Arc::new(DashMap::new()),
        })
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.adapter.name()).collect()
    }

    /// First successful snapshot in priority order
    pub async fn get_snapshot(&self, symbol: &str) -> Result<MarketSnapshot> {
        let mut failures = Vec::new();

        for source in &self.sources {
            let name = source.adapter.name();
            match fetch_from(source.adapter.as_ref(), symbol, &self.last_known).await {
                Ok(snapshot) => {
                    if !failures.is_empty() {
                        tracing::info!(symbol, source = name, skipped = failures.len(), "Served snapshot from fallback source");
                    }
                    return Ok(snapshot);
                }
                Err(e) => {
                    tracing::warn!(symbol, source = name, error = %e, "Source failed, trying next");
                    failures.push(format!("{}: {}", name, e));
                }
            }
        }

        AGGREGATE_FAILURES.inc();
        tracing::error!(symbol, failures = failures.len(), "All market data sources failed");

        Err(Error::AllSourcesUnavailable {
            symbol: symbol.to_string(),
            failures,
        })
    }

    pub fn last_known(&self, source: &str) -> Option<MarketSnapshot> {
        self.last_known.get(source).map(|entry| entry.value().clone())
    }

    /// Most recent last-known snapshot across all sources
    pub fn latest(&self) -> Option<MarketSnapshot> {
        self.last_known.iter()
            .max_by_key(|entry| entry.value().observed_at)
            .map(|entry| entry.value().clone())
    }

    pub async fn get_indicators(&self, symbol: &str) -> Result<RawIndicators> {
        let Some(technical) = &self.technical else {
            return Err(Error::AllSourcesUnavailable {
                symbol: symbol.to_string(),
                failures: vec!["no technical source configured".to_string()],
            });
        };

        let provider = technical.provider();
        let timer = FETCH_LATENCY.with_label_values(&[provider]).start_timer();
        let result = technical.fetch_indicators(symbol)
            .instrument(trace_fetch(provider, symbol))
            .await;
        timer.observe_duration();

        match &result {
            Ok(_) => SOURCE_FETCH_SUCCESS.with_label_values(&[provider]).inc(),
            Err(e) => {
                SOURCE_FETCH_FAILURES.with_label_values(&[provider, e.kind()]).inc();
                tracing::warn!(symbol, source = provider, error = %e, "Indicator fetch failed");
            }
        }
        result
    }

    /// Recent whale trades; failures are logged and yield an empty list
    pub async fn get_whale_transactions(&self, symbol: &str) -> Vec<WhaleTransaction> {
        let Some(whales) = &self.whales else {
            return Vec::new();
        };

        let provider = whales.provider();
        let result = whales.fetch_whale_transactions(symbol)
            .instrument(trace_fetch(provider, symbol))
            .await;

        match result {
            Ok(transactions) => {
                SOURCE_FETCH_SUCCESS.with_label_values(&[provider]).inc();
                transactions
            }
            Err(e) => {
                SOURCE_FETCH_FAILURES.with_label_values(&[provider, e.kind()]).inc();
                tracing::warn!(symbol, source = provider, error = %e, "Whale fetch failed");
                Vec::new()
            }
        }
    }

    /// Starts one polling task per source with a poll interval.
    /// The first poll fires one interval after subscribing.
    pub fn subscribe<F>(&self, symbol: &str, on_update: F) -> Subscription
    where
        F: Fn(MarketSnapshot) + Send + Sync + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        let on_update = Arc::new(on_update);
        let mut handles = Vec::new();

        for source in &self.sources {
            let Some(period) = source.poll_interval else {
                continue;
            };
            if period.is_zero() {
                tracing::warn!(source = source.adapter.name(), "Zero poll interval, source not polled");
                continue;
            }

            let adapter = source.adapter.clone();
            let last_known = self.last_known.clone();
            let active = active.clone();
            let on_update = on_update.clone();
            let symbol = symbol.to_string();

            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

                loop {
                    ticker.tick().await;
                    if !active.load(Ordering::SeqCst) {
                        break;
                    }

                    match fetch_from(adapter.as_ref(), &symbol, &last_known).await {
                        Ok(snapshot) => {
                            if active.load(Ordering::SeqCst) {
                                on_update(snapshot);
                            }
                        }
                        Err(e) => {
                            tracing::warn!(symbol = %symbol, source = adapter.name(), error = %e, "Poll failed");
                        }
                    }
                }
            }));
        }

        tracing::info!(symbol, tasks = handles.len(), "Subscribed to market updates");
        Subscription::new(active, handles)
    }
}

async fn fetch_from(
    adapter: &dyn SourceAdapter,
    symbol: &str,
    last_known: &DashMap<String, MarketSnapshot>,
) -> Result<MarketSnapshot> {
    let name = adapter.name();
    let timer = FETCH_LATENCY.with_label_values(&[name]).start_timer();
    let result = adapter.fetch_snapshot(symbol)
        .instrument(trace_fetch(name, symbol))
        .await;
    timer.observe_duration();

    match &result {
        Ok(snapshot) => {
            SOURCE_FETCH_SUCCESS.with_label_values(&[name]).inc();
            last_known.insert(name.to_string(), snapshot.clone());
        }
        Err(e) => {
            SOURCE_FETCH_FAILURES.with_label_values(&[name, e.kind()]).inc();
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use async_trait::async_trait;
    use tokio::sync::Notify;
    use crate::sources::{MockSourceAdapter, MockTechnicalSource, MockWhaleSource};

    fn snapshot(source: &str, price: f64) -> MarketSnapshot {
        MarketSnapshot::try_new("NAS100", price, 1.0, "0.01%".to_string(), 100.0, source).unwrap()
    }

    fn failing(name: &'static str) -> MockSourceAdapter {
        let mut adapter = MockSourceAdapter::new();
        adapter.expect_name().return_const(name);
        adapter.expect_fetch_snapshot()
            .times(1)
            .returning(move |_| Err(Error::unavailable(name, "HTTP 503")));
        adapter
    }

    fn registered(adapter: impl SourceAdapter + 'static) -> RegisteredSource {
        RegisteredSource::new(Arc::new(adapter), None)
    }

    /// Counts fetches and returns a fixed snapshot
    struct CountingSource {
        name: &'static str,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SourceAdapter for CountingSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch_snapshot(&self, _symbol: &str) -> Result<MarketSnapshot> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(snapshot(self.name, 100.0 + n as f64))
        }
    }

    /// Blocks inside fetch until the gate opens
    struct GatedSource {
        started: Arc<Notify>,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl SourceAdapter for GatedSource {
        fn name(&self) -> &'static str {
            "Gated"
        }

        async fn fetch_snapshot(&self, _symbol: &str) -> Result<MarketSnapshot> {
            self.started.notify_one();
            self.gate.notified().await;
            Ok(snapshot("Gated", 42.0))
        }
    }

    #[tokio::test]
    async fn falls_back_to_next_source_and_stops() {
        let a = failing("A");

        let mut b = MockSourceAdapter::new();
        b.expect_name().return_const("B");
        b.expect_fetch_snapshot()
            .withf(|symbol| symbol == "NAS100")
            .times(1)
            .returning(|_| Ok(snapshot("B", 200.0)));

        let mut c = MockSourceAdapter::new();
        c.expect_name().return_const("C");
        c.expect_fetch_snapshot().never();

        let aggregator = MarketAggregator::new(vec![registered(a), registered(b), registered(c)]);
        let result = aggregator.get_snapshot("NAS100").await.unwrap();

        assert_eq!(result.source, "B");
        assert_eq!(result.price, 200.0);
        assert_eq!(aggregator.last_known("B").map(|s| s.price), Some(200.0));
        assert!(aggregator.last_known("A").is_none());
        assert_eq!(aggregator.latest().map(|s| s.source), Some("B".to_string()));
    }

    #[tokio::test]
    async fn total_failure_lists_every_source() {
        let aggregator = MarketAggregator::new(vec![registered(failing("A")), registered(failing("B"))]);

        match aggregator.get_snapshot("NAS100").await {
            Err(Error::AllSourcesUnavailable { symbol, failures }) => {
                assert_eq!(symbol, "NAS100");
                assert_eq!(failures.len(), 2);
                assert!(failures[0].starts_with("A:"));
                assert!(failures[1].starts_with("B:"));
            }
            other => panic!("expected AllSourcesUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn no_sources_is_total_failure() {
        let aggregator = MarketAggregator::new(Vec::new());
        assert!(matches!(
            aggregator.get_snapshot("NAS100").await,
            Err(Error::AllSourcesUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn indicators_without_source_fail() {
        let aggregator = MarketAggregator::new(Vec::new());
        assert!(aggregator.get_indicators("NAS100").await.is_err());
    }

    #[tokio::test]
    async fn indicators_surface_provider_error() {
        let mut technical = MockTechnicalSource::new();
        technical.expect_provider().return_const("Alpha Vantage");
        technical.expect_fetch_indicators()
            .returning(|_| Err(Error::malformed("Alpha Vantage", "missing series")));

        let aggregator = MarketAggregator::new(Vec::new())
            .with_technical_source(Arc::new(technical));

        assert!(matches!(
            aggregator.get_indicators("NAS100").await,
            Err(Error::MalformedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn whale_failures_yield_empty_list() {
        let mut whales = MockWhaleSource::new();
        whales.expect_provider().return_const("Binance");
        whales.expect_fetch_whale_transactions()
            .returning(|_| Err(Error::unavailable("Binance", "timeout")));

        let aggregator = MarketAggregator::new(Vec::new())
            .with_whale_source(Arc::new(whales));

        assert!(aggregator.get_whale_transactions("NAS100").await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn subscribe_polls_each_source_on_its_interval() {
        let fast_calls = Arc::new(AtomicUsize::new(0));
        let slow_calls = Arc::new(AtomicUsize::new(0));
        let idle_calls = Arc::new(AtomicUsize::new(0));

        let aggregator = MarketAggregator::new(vec![
            RegisteredSource::new(
                Arc::new(CountingSource { name: "Fast", calls: fast_calls.clone() }),
                Some(Duration::from_secs(3)),
            ),
            RegisteredSource::new(
                Arc::new(CountingSource { name: "Slow", calls: slow_calls.clone() }),
                Some(Duration::from_secs(5)),
            ),
            RegisteredSource::new(
                Arc::new(CountingSource { name: "Idle", calls: idle_calls.clone() }),
                None,
            ),
        ]);

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let subscription = aggregator.subscribe("NAS100", move |snapshot| {
            sink.lock().unwrap().push(snapshot.source);
        });
        assert_eq!(subscription.task_count(), 2);

        // Nothing before the first interval elapses
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(received.lock().unwrap().is_empty());

        // Fast at 3, 6, 9; Slow at 5, 10
        tokio::time::sleep(Duration::from_millis(8_500)).await;
        assert_eq!(fast_calls.load(Ordering::SeqCst), 3);
        assert_eq!(slow_calls.load(Ordering::SeqCst), 2);
        assert_eq!(idle_calls.load(Ordering::SeqCst), 0);
        assert_eq!(received.lock().unwrap().len(), 5);
        assert!(aggregator.last_known("Fast").is_some());

        subscription.unsubscribe().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(received.lock().unwrap().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn no_callback_after_unsubscribe_with_request_in_flight() {
        let started = Arc::new(Notify::new());
        let gate = Arc::new(Notify::new());

        let aggregator = MarketAggregator::new(vec![RegisteredSource::new(
            Arc::new(GatedSource { started: started.clone(), gate: gate.clone() }),
            Some(Duration::from_secs(5)),
        )]);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let subscription = aggregator.subscribe("NAS100", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        started.notified().await;
        subscription.unsubscribe().await;

        // The request "resolves" after cancellation
        gate.notify_waiters();
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_subscription_stops_polling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let aggregator = MarketAggregator::new(vec![RegisteredSource::new(
            Arc::new(CountingSource { name: "Fast", calls: calls.clone() }),
            Some(Duration::from_secs(1)),
        )]);

        let subscription = aggregator.subscribe("NAS100", |_| {});
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        drop(subscription);

        let seen = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), seen);
    }
}
