use tracing::Span;
use tracing_subscriber::{fmt, EnvFilter};
use crate::config::LoggingConfig;

/// Installs the global subscriber. `RUST_LOG` wins over `config.level`.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {}", e);
    }
}

pub fn trace_fetch(source: &str, symbol: &str) -> Span {
    tracing::info_span!(
        "source_fetch",
        source = %source,
        symbol = %symbol,
    )
}

pub fn trace_refresh(kind: &'static str, symbol: &str) -> Span {
    tracing::info_span!(
        "dashboard_refresh",
        kind,
        symbol = %symbol,
    )
}
