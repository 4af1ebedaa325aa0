use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::config::sources::millis;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub whale_window: usize,
    pub signal_window: usize,
    pub technical_refresh_ms: u64,
    pub whale_refresh_ms: u64,
    pub event_buffer: usize,
    pub enable_ticker_stream: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            whale_window: 10,
            signal_window: 20,
            technical_refresh_ms: 15_000,
            whale_refresh_ms: 30_000,
            event_buffer: 256,
            enable_ticker_stream: false,
        }
    }
}

impl DashboardConfig {
    pub fn technical_refresh(&self) -> Duration {
        millis(self.technical_refresh_ms)
    }

    pub fn whale_refresh(&self) -> Duration {
        millis(self.whale_refresh_ms)
    }
}
