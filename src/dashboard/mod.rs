pub mod fallback;
pub mod runtime;

use std::collections::{HashMap, HashSet};
use chrono::{DateTime, Utc};
use serde::Serialize;
use crate::alerts::{Alert, AlertBook};
use crate::config::dashboard::DashboardConfig;
use crate::state::RecentWindow;
use crate::types::market::MarketSnapshot;
use crate::types::signal::Signal;
use crate::types::technical::{RawIndicators, TechnicalSnapshot};
use crate::types::whale::WhaleTransaction;

pub use runtime::{Dashboard, DashboardHandle, DashboardRuntime, DashboardWorker};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    Loading,
    Live,
    Fallback,
}

/// Producer -> consumer messages
#[derive(Clone, Debug)]
pub enum Update {
    Market(MarketSnapshot),
    Indicators(RawIndicators),
    Whales(Vec<WhaleTransaction>),
}

/// Applied changes, re-broadcast to WebSocket listeners
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DashboardEvent {
    Market(MarketSnapshot),
    Technical(TechnicalSnapshot),
    Whales(Vec<WhaleTransaction>),
    Signals(Vec<Signal>),
    SignalsCleared,
    AlertTriggered(Alert),
}

/// Everything the dashboard shows for one symbol
pub struct DashboardState {
    pub symbol: String,
    pub market: Option<MarketSnapshot>,
    pub per_source: HashMap<String, MarketSnapshot>,
    pub technical: Option<TechnicalSnapshot>,
    pub whales: RecentWindow<WhaleTransaction>,
    pub signals: RecentWindow<Signal>,
    pub alerts: AlertBook,
    /// Titles of technical signals whose condition held on the last refresh
    pub active_technical: HashSet<String>,
    pub market_fallback: bool,
    pub technical_fallback: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

impl DashboardState {
    pub fn new(symbol: &str, config: &DashboardConfig) -> Self {
        DashboardState {
            symbol: symbol.to_string(),
            market: None,
            per_source: HashMap::new(),
            technical: None,
            whales: RecentWindow::new(config.whale_window),
            signals: RecentWindow::new(config.signal_window),
            alerts: AlertBook::new(),
            active_technical: HashSet::new(),
            market_fallback: false,
            technical_fallback: false,
            last_updated: None,
        }
    }

    pub fn mode(&self) -> DataMode {
        if self.market.is_none() && self.technical.is_none() {
            DataMode::Loading
        } else if self.market_fallback || self.technical_fallback {
            DataMode::Fallback
        } else {
            DataMode::Live
        }
    }

    pub fn warning(&self) -> Option<String> {
        let message = match (self.market_fallback, self.technical_fallback) {
            (true, true) => "Live market data and indicators are unavailable, showing sample data",
            (true, false) => "Live market data is unavailable, showing sample data",
            (false, true) => "Live indicators are unavailable, showing sample data",
            (false, false) => return None,
        };
        Some(message.to_string())
    }

    pub fn view(&self) -> DashboardView {
        let mut sources: Vec<MarketSnapshot> = self.per_source.values().cloned().collect();
        sources.sort_by(|a, b| a.source.cmp(&b.source));

        DashboardView {
            symbol: self.symbol.clone(),
            mode: self.mode(),
            warning: self.warning(),
            market: self.market.clone(),
            sources,
            technical: self.technical.clone(),
            whales: self.whales.to_vec(),
            signals: self.signals.to_vec(),
            alerts: self.alerts.list(),
            last_updated: self.last_updated,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub symbol: String,
    pub mode: DataMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub market: Option<MarketSnapshot>,
    pub sources: Vec<MarketSnapshot>,
    pub technical: Option<TechnicalSnapshot>,
    pub whales: Vec<WhaleTransaction>,
    pub signals: Vec<Signal>,
    pub alerts: Vec<Alert>,
    pub last_updated: Option<DateTime<Utc>>,
}
