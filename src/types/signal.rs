use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::types::ids::SignalId;
use crate::types::whale::Confidence;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    VolumeSpike,
    WhaleActivity,
    TechnicalBreakout,
    EmaCross,
    SupportBreak,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::VolumeSpike => "volume_spike",
            SignalType::WhaleActivity => "whale_activity",
            SignalType::TechnicalBreakout => "technical_breakout",
            SignalType::EmaCross => "ema_cross",
            SignalType::SupportBreak => "support_break",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalFeatures {
    pub price: f64,
    pub volume: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whale_activity: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub id: SignalId,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub confidence: Confidence,
    #[serde(rename = "type")]
    pub kind: SignalType,
    pub description: String,
    pub features: SignalFeatures,
    pub disclaimer: String,
}
