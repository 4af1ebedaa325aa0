pub mod ids;
pub mod market;
pub mod technical;
pub mod whale;
pub mod signal;

pub use ids::{AlertId, SignalId};
pub use market::MarketSnapshot;
pub use technical::{RawIndicators, TechnicalSnapshot, Trend};
pub use whale::{Confidence, TradeSide, WhaleTransaction};
pub use signal::{Signal, SignalFeatures, SignalType};
