use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::Instrument;
use crate::aggregator::{MarketAggregator, Subscription};
use crate::alerts::{Alert, AlertKind, NewAlert};
use crate::config::dashboard::DashboardConfig;
use crate::config::loader::AppConfig;
use crate::dashboard::fallback::{fallback_market, fallback_technical};
use crate::dashboard::{DashboardEvent, DashboardState, DashboardView, Update};
use crate::error::{Error, Result};
use crate::notifications::{Notifier, Permission, WHALE_ALERT_TAG};
use crate::observability::metrics::{SIGNALS_GENERATED, WHALE_TRANSACTIONS_DETECTED};
use crate::observability::tracing::trace_refresh;
use crate::settings::SettingsStore;
use crate::signals::{derive_technical, SignalEngine};
use crate::sources::BinanceTickerStream;
use crate::types::ids::AlertId;
use crate::types::market::MarketSnapshot;
use crate::types::signal::Signal;
use crate::types::technical::TechnicalSnapshot;
use crate::types::whale::WhaleTransaction;
use crate::utils::helper::format_usd;
use crate::utils::TaskSupervisor;

/// Shared view of the dashboard, cloned into the API
#[derive(Clone)]
pub struct DashboardHandle {
    state: Arc<RwLock<DashboardState>>,
    events: broadcast::Sender<DashboardEvent>,
    settings: Arc<SettingsStore>,
}

impl DashboardHandle {
    pub fn new(symbol: &str, config: &DashboardConfig, settings: Arc<SettingsStore>) -> Result<Self> {
        if config.event_buffer == 0 {
            return Err(Error::ConfigError("dashboard.event_buffer must be positive".to_string()));
        }
        let (events, _) = broadcast::channel(config.event_buffer);

        Ok(DashboardHandle {
            state: Arc::new(RwLock::new(DashboardState::new(symbol, config))),
            events,
            settings,
        })
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    pub async fn view(&self) -> DashboardView {
        self.state.read().await.view()
    }

    pub async fn symbol(&self) -> String {
        self.state.read().await.symbol.clone()
    }

    pub async fn market(&self) -> Option<MarketSnapshot> {
        self.state.read().await.market.clone()
    }

    pub async fn technical(&self) -> Option<TechnicalSnapshot> {
        self.state.read().await.technical.clone()
    }

    pub async fn whales(&self) -> Vec<WhaleTransaction> {
        self.state.read().await.whales.to_vec()
    }

    pub async fn signals(&self) -> Vec<Signal> {
        self.state.read().await.signals.to_vec()
    }

    pub async fn clear_signals(&self) {
        self.state.write().await.signals.clear();
        tracing::info!("Signals cleared");
        self.broadcast(DashboardEvent::SignalsCleared);
    }

    pub async fn list_alerts(&self) -> Vec<Alert> {
        self.state.read().await.alerts.list()
    }

    pub async fn create_alert(&self, request: NewAlert) -> Result<Alert> {
        self.state.write().await.alerts.create(request)
    }

    pub async fn toggle_alert(&self, id: AlertId) -> Result<Alert> {
        self.state.write().await.alerts.toggle(id)
    }

    pub async fn delete_alert(&self, id: AlertId) -> Result<()> {
        self.state.write().await.alerts.delete(id)
    }

    fn broadcast(&self, event: DashboardEvent) {
        // No listeners is fine
        let _ = self.events.send(event);
    }
}

/// Applies updates to the dashboard state. Owned by the consumer task.
pub struct DashboardWorker {
    handle: DashboardHandle,
    engine: SignalEngine,
    notifier: Arc<dyn Notifier>,
    permission: OnceLock<Permission>,
}

impl DashboardWorker {
    pub fn new(handle: DashboardHandle, symbol: &str, notifier: Arc<dyn Notifier>) -> Self {
        DashboardWorker {
            handle,
            engine: SignalEngine::new(symbol),
            notifier,
            permission: OnceLock::new(),
        }
    }

    /// Asks the notifier once; later calls return the first answer
    pub fn request_permission(&self) -> Permission {
        *self.permission.get_or_init(|| {
            let permission = self.notifier.request_permission();
            tracing::info!(?permission, "Notification permission");
            permission
        })
    }

    fn notify(&self, title: &str, body: &str, tag: Option<&'static str>) {
        if self.request_permission() != Permission::Granted {
            tracing::debug!(title, "Notification suppressed, permission not granted");
            return;
        }
        self.notifier.show(title, body, tag);
    }

    pub async fn handle(&self, update: Update) {
        match update {
            Update::Market(snapshot) => self.apply_market(snapshot).await,
            Update::Indicators(raw) => {
                let technical = derive_technical(&raw);
                self.apply_technical(technical).await
            }
            Update::Whales(batch) => self.apply_whales(batch).await,
        }
    }

    /// Last write wins per source; the headline is the newest update
    async fn apply_market(&self, snapshot: MarketSnapshot) {
        let fired = {
            let mut state = self.handle.state.write().await;
            state.per_source.insert(snapshot.source.clone(), snapshot.clone());
            state.market = Some(snapshot.clone());
            state.market_fallback = false;
            state.last_updated = Some(Utc::now());
            state.alerts.evaluate_price(&snapshot)
        };

        self.handle.broadcast(DashboardEvent::Market(snapshot));
        self.notify_alerts(fired);
    }

    async fn apply_technical(&self, technical: TechnicalSnapshot) {
        let (signals, fired) = {
            let mut state = self.handle.state.write().await;
            let volume = state.market.as_ref().map(|m| m.volume).unwrap_or(0.0);
            let signals = self.engine.generate_signals(&technical, volume);

            // Only conditions that were not already holding produce a signal
            let previous = std::mem::replace(
                &mut state.active_technical,
                signals.iter().map(|s| s.title.clone()).collect(),
            );
            let signals: Vec<Signal> = signals.into_iter()
                .filter(|s| !previous.contains(&s.title))
                .collect();

            state.technical = Some(technical.clone());
            state.technical_fallback = false;
            state.last_updated = Some(Utc::now());
            state.signals.extend_front(signals.iter().cloned());
            let fired = state.alerts.evaluate_technical(self.engine.symbol(), &technical);
            (signals, fired)
        };

        tracing::debug!(rsi = technical.rsi, trend = ?technical.trend, signals = signals.len(), "Indicators applied");
        self.handle.broadcast(DashboardEvent::Technical(technical));
        self.publish_signals(signals);
        self.notify_alerts(fired);
    }

    /// Drops ids already shown, prepends the rest, truncates
    async fn apply_whales(&self, batch: Vec<WhaleTransaction>) {
        let (fresh, signals, fired) = {
            let mut state = self.handle.state.write().await;
            let mut seen: HashSet<String> = state.whales.iter().map(|w| w.id.clone()).collect();
            let fresh: Vec<WhaleTransaction> = batch.into_iter()
                .filter(|w| seen.insert(w.id.clone()))
                .collect();

            if fresh.is_empty() {
                return;
            }

            state.whales.extend_front(fresh.iter().cloned());
            let signals = self.engine.generate_whale_signals(&fresh, state.market.as_ref());
            state.signals.extend_front(signals.iter().cloned());
            state.last_updated = Some(Utc::now());
            let fired = state.alerts.evaluate_whales(self.engine.symbol(), &fresh);
            (fresh, signals, fired)
        };

        WHALE_TRANSACTIONS_DETECTED.inc_by(fresh.len() as u64);
        tracing::info!(count = fresh.len(), "New whale transactions");

        self.notify_whales(&fresh);
        self.handle.broadcast(DashboardEvent::Whales(fresh));
        self.publish_signals(signals);
        self.notify_alerts(fired);
    }

    fn publish_signals(&self, signals: Vec<Signal>) {
        if signals.is_empty() {
            return;
        }

        for signal in &signals {
            SIGNALS_GENERATED.with_label_values(&[signal.kind.as_str()]).inc();
        }

        let settings = self.handle.settings.get();
        if settings.notifications.enabled && settings.notifications.signal_alerts {
            for signal in &signals {
                self.notify(&signal.title, &signal.description, None);
            }
        }

        self.handle.broadcast(DashboardEvent::Signals(signals));
    }

    fn notify_whales(&self, whales: &[WhaleTransaction]) {
        let settings = self.handle.settings.get();
        if !settings.notifications.enabled || !settings.notifications.whale_alerts {
            return;
        }

        let min_usd = settings.analysis.whale_min_amount_usd();
        for whale in whales.iter().filter(|w| w.amount_usd >= min_usd) {
            let title = format!("Whale {} detected", whale.side.as_str());
            let body = format!(
                "{} {:.4} at {:.2} ({}) on {}",
                whale.side.as_str(),
                whale.amount,
                whale.price,
                format_usd(whale.amount_usd),
                whale.source
            );
            self.notify(&title, &body, Some(WHALE_ALERT_TAG));
        }
    }

    fn notify_alerts(&self, fired: Vec<Alert>) {
        if fired.is_empty() {
            return;
        }

        let settings = self.handle.settings.get();
        let notifications = &settings.notifications;

        for alert in fired {
            let allowed = notifications.enabled && match alert.kind {
                AlertKind::Price => notifications.price_alerts,
                AlertKind::Technical => notifications.signal_alerts,
                AlertKind::Whale => notifications.whale_alerts,
            };
            if allowed {
                let tag = (alert.kind == AlertKind::Whale).then_some(WHALE_ALERT_TAG);
                self.notify(&format!("Alert: {}", alert.symbol), &alert.message, tag);
            }
            self.handle.broadcast(DashboardEvent::AlertTriggered(alert));
        }
    }
}

/// Entry point that wires the aggregator, workers and timers together
pub struct Dashboard;

impl Dashboard {
    /// Initial load with fallback data, then the steady-state producers
    pub async fn start(
        config: &AppConfig,
        aggregator: Arc<MarketAggregator>,
        settings: Arc<SettingsStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<DashboardRuntime> {
        let symbol = config.symbol.clone();
        let handle = DashboardHandle::new(&symbol, &config.dashboard, settings.clone())?;
        let worker = Arc::new(DashboardWorker::new(handle.clone(), &symbol, notifier));

        // Otherwise asked on the first notification the settings allow
        if settings.get().notifications.enabled {
            worker.request_permission();
        }

        initial_load(&symbol, &aggregator, &handle, &worker)
            .instrument(trace_refresh("initial_load", &symbol))
            .await;

        let (tx, mut rx) = mpsc::channel::<Update>(config.dashboard.event_buffer);
        let mut supervisor = TaskSupervisor::new();

        let consumer = worker.clone();
        supervisor.spawn("dashboard_consumer", async move {
            while let Some(update) = rx.recv().await {
                consumer.handle(update).await;
            }
            tracing::info!("Dashboard consumer stopped");
        });

        let market_tx = tx.clone();
        let subscription = aggregator.subscribe(&symbol, move |snapshot| {
            if let Err(e) = market_tx.try_send(Update::Market(snapshot)) {
                tracing::warn!(error = %e, "Dropped market update");
            }
        });

        let technical_tx = tx.clone();
        let technical_aggregator = aggregator.clone();
        let technical_symbol = symbol.clone();
        supervisor.spawn("technical_refresh", refresh_loop(
            config.dashboard.technical_refresh(),
            move || {
                let aggregator = technical_aggregator.clone();
                let symbol = technical_symbol.clone();
                let tx = technical_tx.clone();
                async move {
                    match aggregator.get_indicators(&symbol).await {
                        Ok(raw) => {
                            forward(&tx, Update::Indicators(raw)).await;
                        }
                        Err(e) => tracing::warn!(error = %e, "Keeping previous indicators"),
                    }
                }
                .instrument(trace_refresh("technical", &technical_symbol))
            },
        ));

        let whale_tx = tx.clone();
        let whale_aggregator = aggregator.clone();
        let whale_symbol = symbol.clone();
        supervisor.spawn("whale_refresh", refresh_loop(
            config.dashboard.whale_refresh(),
            move || {
                let aggregator = whale_aggregator.clone();
                let symbol = whale_symbol.clone();
                let tx = whale_tx.clone();
                async move {
                    let whales = aggregator.get_whale_transactions(&symbol).await;
                    if !whales.is_empty() {
                        forward(&tx, Update::Whales(whales)).await;
                    }
                }
                .instrument(trace_refresh("whales", &whale_symbol))
            },
        ));

        if config.dashboard.enable_ticker_stream && config.sources.binance.enabled {
            let stream = BinanceTickerStream::new(&symbol, &config.sources.binance);
            let stream_tx = tx.clone();
            supervisor.spawn("binance_ticker_stream", stream.run(move |snapshot| {
                if let Err(e) = stream_tx.try_send(Update::Market(snapshot)) {
                    tracing::warn!(error = %e, "Dropped ticker update");
                }
            }));
        }

        tracing::info!(
            symbol = %symbol,
            tasks = supervisor.active_task_count(),
            polling = subscription.task_count(),
            "Dashboard started"
        );

        Ok(DashboardRuntime {
            handle,
            supervisor,
            subscription: Some(subscription),
        })
    }
}

/// Snapshot, indicators and whales concurrently; failed pieces fall back
async fn initial_load(
    symbol: &str,
    aggregator: &MarketAggregator,
    handle: &DashboardHandle,
    worker: &DashboardWorker,
) {
    let (snapshot, indicators, whales) = tokio::join!(
        aggregator.get_snapshot(symbol),
        aggregator.get_indicators(symbol),
        aggregator.get_whale_transactions(symbol),
    );

    match snapshot {
        Ok(snapshot) => worker.handle(Update::Market(snapshot)).await,
        Err(e) => {
            tracing::warn!(error = %e, "Initial market load failed, using fallback data");
            let mut state = handle.state.write().await;
            state.market = Some(fallback_market(symbol));
            state.market_fallback = true;
        }
    }

    match indicators {
        Ok(raw) => worker.handle(Update::Indicators(raw)).await,
        Err(e) => {
            tracing::warn!(error = %e, "Initial indicator load failed, using fallback data");
            let mut state = handle.state.write().await;
            state.technical = Some(fallback_technical());
            state.technical_fallback = true;
        }
    }

    if !whales.is_empty() {
        worker.handle(Update::Whales(whales)).await;
    }
}

/// Waits for queue space. Returns false once the consumer is gone.
async fn forward(tx: &mpsc::Sender<Update>, update: Update) -> bool {
    match tx.send(update).await {
        Ok(()) => true,
        Err(mpsc::error::SendError(update)) => {
            let kind = match update {
                Update::Market(_) => "market",
                Update::Indicators(_) => "indicators",
                Update::Whales(_) => "whales",
            };
            tracing::debug!(kind, "Dashboard consumer gone, update dropped");
            false
        }
    }
}

/// Runs `tick` every `period`, first one period from now
async fn refresh_loop<F, Fut>(period: Duration, tick: F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    if period.is_zero() {
        tracing::warn!("Zero refresh period, refresh disabled");
        return std::future::pending().await;
    }

    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        tick().await;
    }
}

/// Running dashboard: the handle plus everything that must be stopped
pub struct DashboardRuntime {
    handle: DashboardHandle,
    supervisor: TaskSupervisor,
    subscription: Option<Subscription>,
}

impl DashboardRuntime {
    pub fn handle(&self) -> DashboardHandle {
        self.handle.clone()
    }

    pub fn check_health(&mut self) -> Result<()> {
        self.supervisor.check_health()
    }

    pub async fn shutdown(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe().await;
        }
        self.supervisor.shutdown_all().await;
        tracing::info!("Dashboard stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::RegisteredSource;
    use crate::dashboard::fallback::FALLBACK_SOURCE;
    use crate::dashboard::DataMode;
    use crate::notifications::MockNotifier;
    use crate::settings::SettingsPatch;
    use crate::sources::{MockSourceAdapter, MockTechnicalSource, MockWhaleSource};
    use crate::types::technical::RawIndicators;
    use crate::types::whale::{Confidence, TradeSide};
    use crate::alerts::AlertCondition;

    fn handle() -> DashboardHandle {
        DashboardHandle::new("NAS100", &DashboardConfig::default(), Arc::new(SettingsStore::in_memory())).unwrap()
    }

    fn quiet_notifier() -> Arc<dyn Notifier> {
        let mut notifier = MockNotifier::new();
        notifier.expect_request_permission().return_const(crate::notifications::Permission::Granted);
        notifier.expect_show().return_const(());
        Arc::new(notifier)
    }

    fn snapshot(source: &str, price: f64) -> MarketSnapshot {
        MarketSnapshot::try_new("NAS100", price, 1.0, "0.10%".to_string(), 5_000.0, source).unwrap()
    }

    fn whale(id: &str, amount_usd: f64, confidence: Confidence) -> WhaleTransaction {
        WhaleTransaction {
            id: id.to_string(),
            timestamp: Utc::now(),
            side: TradeSide::Buy,
            amount: amount_usd / 40_000.0,
            amount_usd,
            price: 40_000.0,
            confidence,
            source: "Binance".to_string(),
        }
    }

    fn raw(rsi: f64) -> RawIndicators {
        RawIndicators {
            ema50: 110.0,
            ema100: 105.0,
            ema200: 100.0,
            rsi,
            current_price: 108.0,
            support_level: None,
            resistance_level: None,
        }
    }

    #[tokio::test]
    async fn market_updates_are_last_write_wins_per_source() {
        let handle = handle();
        let worker = DashboardWorker::new(handle.clone(), "NAS100", quiet_notifier());
        let mut events = handle.subscribe_events();

        worker.handle(Update::Market(snapshot("Yahoo Finance", 100.0))).await;
        worker.handle(Update::Market(snapshot("Binance", 101.0))).await;
        worker.handle(Update::Market(snapshot("Yahoo Finance", 102.0))).await;

        let view = handle.view().await;
        assert_eq!(view.mode, DataMode::Live);
        assert_eq!(view.market.map(|m| m.price), Some(102.0));
        assert_eq!(view.sources.len(), 2);
        assert_eq!(view.sources[1].price, 102.0);

        assert!(matches!(events.recv().await.unwrap(), DashboardEvent::Market(_)));
    }

    #[tokio::test]
    async fn indicators_generate_signals() {
        let handle = handle();
        let worker = DashboardWorker::new(handle.clone(), "NAS100", quiet_notifier());

        worker.handle(Update::Indicators(raw(75.0))).await;

        let signals = handle.signals().await;
        assert_eq!(signals.len(), 2);
        assert_eq!(handle.technical().await.map(|t| t.pullback_signal), Some(true));

        handle.clear_signals().await;
        assert!(handle.signals().await.is_empty());
    }

    #[tokio::test]
    async fn whale_batches_skip_known_ids_and_stay_bounded() {
        let handle = handle();
        let worker = DashboardWorker::new(handle.clone(), "NAS100", quiet_notifier());

        worker.handle(Update::Whales(vec![whale("binance-2", 10.0, Confidence::Low), whale("binance-1", 10.0, Confidence::Low)])).await;
        worker.handle(Update::Whales(vec![whale("binance-3", 10.0, Confidence::Low), whale("binance-2", 10.0, Confidence::Low)])).await;

        let ids: Vec<String> = handle.whales().await.into_iter().map(|w| w.id).collect();
        assert_eq!(ids, vec!["binance-3", "binance-2", "binance-1"]);

        let batch: Vec<_> = (10..25).map(|i| whale(&format!("binance-{}", i), 10.0, Confidence::Low)).collect();
        worker.handle(Update::Whales(batch)).await;
        assert_eq!(handle.whales().await.len(), 10);
        assert!(handle.signals().await.is_empty());
    }

    #[tokio::test]
    async fn whale_notifications_respect_min_amount() {
        let handle = handle();
        let mut notifier = MockNotifier::new();
        notifier.expect_request_permission().times(1).return_const(Permission::Granted);
        notifier.expect_show()
            .withf(|_, _, tag| *tag == Some(WHALE_ALERT_TAG))
            .times(1)
            .return_const(());
        // whale_activity signal from the high-confidence trade
        notifier.expect_show()
            .withf(|_, _, tag| tag.is_none())
            .times(1)
            .return_const(());
        let worker = DashboardWorker::new(handle.clone(), "NAS100", Arc::new(notifier));

        worker.handle(Update::Whales(vec![
            whale("binance-1", 2_500_000.0, Confidence::High),
            whale("binance-2", 400_000.0, Confidence::Low),
        ])).await;

        assert_eq!(handle.signals().await.len(), 1);
    }

    #[tokio::test]
    async fn disabled_notifications_stay_silent() {
        let handle = handle();
        handle.settings().set(SettingsPatch {
            notifications: Some(crate::settings::NotificationSettings {
                enabled: false,
                ..Default::default()
            }),
            ..Default::default()
        });

        let mut notifier = MockNotifier::new();
        notifier.expect_show().never();
        let worker = DashboardWorker::new(handle.clone(), "NAS100", Arc::new(notifier));

        worker.handle(Update::Whales(vec![whale("binance-1", 5_000_000.0, Confidence::High)])).await;
        worker.handle(Update::Indicators(raw(80.0))).await;
    }

    #[tokio::test]
    async fn unchanged_indicators_do_not_repeat_signals() {
        let handle = handle();
        let mut notifier = MockNotifier::new();
        notifier.expect_request_permission().times(1).return_const(Permission::Granted);
        notifier.expect_show()
            .withf(|title, _, _| title == "Uptrend confirmation")
            .times(2)
            .return_const(());
        let worker = DashboardWorker::new(handle.clone(), "NAS100", Arc::new(notifier));

        worker.handle(Update::Whales(vec![whale("binance-1", 10.0, Confidence::Low)])).await;
        for _ in 0..25 {
            worker.handle(Update::Indicators(raw(60.0))).await;
        }
        assert_eq!(handle.signals().await.len(), 1);

        // EMA50 drops below EMA200, then recovers
        let mut crossed = raw(60.0);
        crossed.ema50 = 95.0;
        worker.handle(Update::Indicators(crossed)).await;
        worker.handle(Update::Indicators(raw(60.0))).await;

        let titles: Vec<String> = handle.signals().await.into_iter().map(|s| s.title).collect();
        assert_eq!(titles, vec!["Uptrend confirmation", "Uptrend confirmation"]);
    }

    #[tokio::test]
    async fn repeated_signals_leave_whale_signals_in_window() {
        let handle = handle();
        let worker = DashboardWorker::new(handle.clone(), "NAS100", quiet_notifier());

        worker.handle(Update::Whales(vec![whale("binance-1", 2_500_000.0, Confidence::High)])).await;
        for _ in 0..20 {
            worker.handle(Update::Indicators(raw(60.0))).await;
        }

        let signals = handle.signals().await;
        assert_eq!(signals.len(), 2);
        assert!(signals.iter().any(|s| s.kind == crate::types::signal::SignalType::WhaleActivity));
    }

    #[tokio::test]
    async fn start_defers_permission_while_notifications_are_off() {
        let settings = Arc::new(SettingsStore::in_memory());
        settings.set(SettingsPatch {
            notifications: Some(crate::settings::NotificationSettings {
                enabled: false,
                ..Default::default()
            }),
            ..Default::default()
        });

        let mut notifier = MockNotifier::new();
        notifier.expect_request_permission().never();
        notifier.expect_show().never();

        let runtime = Dashboard::start(
            &AppConfig::default(),
            Arc::new(MarketAggregator::new(Vec::new())),
            settings,
            Arc::new(notifier),
        ).await.unwrap();

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn enabling_notifications_later_delivers_them() {
        let handle = handle();
        let disabled = crate::settings::NotificationSettings {
            enabled: false,
            ..Default::default()
        };
        handle.settings().set(SettingsPatch { notifications: Some(disabled), ..Default::default() });

        let mut notifier = MockNotifier::new();
        notifier.expect_request_permission().times(1).return_const(Permission::Granted);
        // whale notification and whale_activity signal, for each of the two later batches
        notifier.expect_show().times(4).return_const(());
        let worker = DashboardWorker::new(handle.clone(), "NAS100", Arc::new(notifier));

        worker.handle(Update::Whales(vec![whale("binance-1", 2_500_000.0, Confidence::High)])).await;

        handle.settings().set(SettingsPatch {
            notifications: Some(crate::settings::NotificationSettings::default()),
            ..Default::default()
        });
        worker.handle(Update::Whales(vec![whale("binance-2", 2_500_000.0, Confidence::High)])).await;
        worker.handle(Update::Whales(vec![whale("binance-3", 2_500_000.0, Confidence::High)])).await;
    }

    #[tokio::test]
    async fn denied_permission_suppresses_notifications() {
        let handle = handle();
        let mut notifier = MockNotifier::new();
        notifier.expect_request_permission().times(1).return_const(Permission::Denied);
        notifier.expect_show().never();
        let worker = DashboardWorker::new(handle.clone(), "NAS100", Arc::new(notifier));

        worker.handle(Update::Whales(vec![whale("binance-1", 2_500_000.0, Confidence::High)])).await;
        worker.handle(Update::Indicators(raw(80.0))).await;

        assert_eq!(handle.signals().await.len(), 3);
    }

    #[tokio::test]
    async fn forward_reports_closed_consumer() {
        let (tx, mut rx) = mpsc::channel(1);
        assert!(forward(&tx, Update::Indicators(raw(50.0))).await);
        assert!(matches!(rx.recv().await, Some(Update::Indicators(_))));

        drop(rx);
        assert!(!forward(&tx, Update::Whales(Vec::new())).await);
    }

    #[tokio::test]
    async fn price_alert_triggers_once() {
        let handle = handle();
        let worker = DashboardWorker::new(handle.clone(), "NAS100", quiet_notifier());
        let alert = handle.create_alert(NewAlert {
            symbol: "NAS100".to_string(),
            kind: AlertKind::Price,
            condition: AlertCondition::Above,
            value: 100.0,
            message: None,
        }).await.unwrap();
        let mut events = handle.subscribe_events();

        worker.handle(Update::Market(snapshot("Binance", 101.0))).await;

        assert!(matches!(events.recv().await.unwrap(), DashboardEvent::Market(_)));
        match events.recv().await.unwrap() {
            DashboardEvent::AlertTriggered(fired) => assert_eq!(fired.id, alert.id),
            other => panic!("expected AlertTriggered, got {:?}", other),
        }
        assert!(handle.list_alerts().await[0].triggered);
    }

    #[tokio::test]
    async fn start_falls_back_when_providers_fail() {
        let mut source = MockSourceAdapter::new();
        source.expect_name().return_const("Yahoo Finance");
        source.expect_fetch_snapshot()
            .returning(|_| Err(Error::unavailable("Yahoo Finance", "HTTP 503")));

        let mut technical = MockTechnicalSource::new();
        technical.expect_provider().return_const("Alpha Vantage");
        technical.expect_fetch_indicators()
            .returning(|_| Err(Error::unavailable("Alpha Vantage", "timeout")));

        let aggregator = MarketAggregator::new(vec![RegisteredSource::new(Arc::new(source), None)])
            .with_technical_source(Arc::new(technical));

        let runtime = Dashboard::start(
            &AppConfig::default(),
            Arc::new(aggregator),
            Arc::new(SettingsStore::in_memory()),
            quiet_notifier(),
        ).await.unwrap();

        let view = runtime.handle().view().await;
        assert_eq!(view.mode, DataMode::Fallback);
        assert!(view.warning.is_some());
        assert_eq!(view.market.map(|m| m.source), Some(FALLBACK_SOURCE.to_string()));
        assert_eq!(view.technical.map(|t| t.rsi), Some(67.8));
        assert!(view.signals.is_empty());

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn start_uses_live_data() {
        let mut source = MockSourceAdapter::new();
        source.expect_name().return_const("Binance");
        source.expect_fetch_snapshot()
            .returning(|_| Ok(snapshot("Binance", 37_000.0)));

        let mut technical = MockTechnicalSource::new();
        technical.expect_provider().return_const("Alpha Vantage");
        technical.expect_fetch_indicators().returning(|_| Ok(raw(25.0)));

        let mut whales = MockWhaleSource::new();
        whales.expect_provider().return_const("Binance");
        whales.expect_fetch_whale_transactions()
            .returning(|_| Ok(vec![whale("binance-7", 3_000_000.0, Confidence::Medium)]));

        let aggregator = MarketAggregator::new(vec![RegisteredSource::new(Arc::new(source), None)])
            .with_technical_source(Arc::new(technical))
            .with_whale_source(Arc::new(whales));

        let mut runtime = Dashboard::start(
            &AppConfig::default(),
            Arc::new(aggregator),
            Arc::new(SettingsStore::in_memory()),
            quiet_notifier(),
        ).await.unwrap();

        let view = runtime.handle().view().await;
        assert_eq!(view.mode, DataMode::Live);
        assert!(view.warning.is_none());
        assert_eq!(view.market.map(|m| m.price), Some(37_000.0));
        assert_eq!(view.whales.len(), 1);
        // oversold + uptrend
        assert_eq!(view.signals.len(), 2);
        assert!(runtime.check_health().is_ok());

        runtime.shutdown().await;
    }
}
