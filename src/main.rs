use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Context;
use whale_pulse::aggregator::MarketAggregator;
use whale_pulse::api::{create_router, ApiState};
use whale_pulse::config::loader::AppConfig;
use whale_pulse::dashboard::Dashboard;
use whale_pulse::notifications::{LogNotifier, Notifier};
use whale_pulse::observability;
use whale_pulse::settings::SettingsStore;
use whale_pulse::utils::helper::shutdown_signal;

const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("WHALEPULSE_ENV").unwrap_or_else(|_| "development".to_string());
    let config = AppConfig::load(&env).context("loading configuration")?;

    observability::tracing::init(&config.logging);
    observability::metrics::register_metrics().context("registering metrics")?;

    tracing::info!(env = %env, symbol = %config.symbol, "Starting WhalePulse");

    let settings = Arc::new(match &config.settings_path {
        Some(path) => SettingsStore::open(path).context("opening settings store")?,
        None => SettingsStore::in_memory(),
    });
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier::new());
    let aggregator = Arc::new(MarketAggregator::from_config(&config).context("building source adapters")?);

    let mut runtime = Dashboard::start(&config, aggregator, settings, notifier)
        .await
        .context("starting dashboard")?;

    let app = create_router(Arc::new(ApiState { dashboard: runtime.handle() }));
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.server.bind_addr))?;
    tracing::info!("HTTP API listening on http://{}", config.server.bind_addr);

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();
    tokio::pin!(server);

    let mut health = tokio::time::interval(HEALTH_CHECK_INTERVAL);
    health.tick().await;

    loop {
        tokio::select! {
            result = &mut server => {
                result.context("HTTP server")?;
                break;
            }
            _ = health.tick() => {
                if let Err(e) = runtime.check_health() {
                    tracing::error!(error = %e, "Dashboard task failure");
                }
            }
        }
    }

    runtime.shutdown().await;
    tracing::info!("WhalePulse stopped");
    Ok(())
}
