pub mod error;
pub mod config;
pub mod types;
pub mod sources;
pub mod aggregator;
pub mod signals;
pub mod state;
pub mod alerts;
pub mod settings;
pub mod notifications;
pub mod dashboard;
pub mod observability;
pub mod utils;
pub mod api;

pub use error::{Error, Result};

// Instrument shown when nothing is configured
pub const DEFAULT_SYMBOL: &str = "NAS100";
