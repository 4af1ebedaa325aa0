//! Indicator derivation and rule-based signal generation
//!
//! Everything here is a pure function of its inputs. The dashboard runtime
//! decides when to call it and where the results go.

pub mod engine;

pub use engine::{classify_trend, derive_technical, is_pullback, SignalEngine, DISCLAIMER};
