use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::types::ids::AlertId;
use crate::types::market::MarketSnapshot;
use crate::types::technical::TechnicalSnapshot;
use crate::types::whale::{TradeSide, WhaleTransaction};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Price,
    Technical,
    Whale,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCondition {
    Above,          // price > value
    Below,          // price < value
    RsiOverbought,  // rsi >= value
    RsiOversold,    // rsi <= value
    LargeBuy,       // buy with amountUsd >= value
    LargeSell,      // sell with amountUsd >= value
}

impl AlertCondition {
    pub fn kind(&self) -> AlertKind {
        match self {
            AlertCondition::Above | AlertCondition::Below => AlertKind::Price,
            AlertCondition::RsiOverbought | AlertCondition::RsiOversold => AlertKind::Technical,
            AlertCondition::LargeBuy | AlertCondition::LargeSell => AlertKind::Whale,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: AlertId,
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub condition: AlertCondition,
    pub value: f64,
    pub active: bool,
    pub triggered: bool,
    pub created_at: DateTime<Utc>,
    pub message: String,
}

/// Request body for a new alert
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAlert {
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub condition: AlertCondition,
    pub value: f64,
    #[serde(default)]
    pub message: Option<String>,
}

/// User alerts in creation order
#[derive(Clone, Debug, Default)]
pub struct AlertBook {
    alerts: Vec<Alert>,
}

impl AlertBook {
    pub fn new() -> Self {
        AlertBook { alerts: Vec::new() }
    }

    pub fn create(&mut self, request: NewAlert) -> Result<Alert> {
        if request.symbol.trim().is_empty() {
            return Err(Error::InvalidAlert("symbol is empty".to_string()));
        }
        if request.condition.kind() != request.kind {
            return Err(Error::InvalidAlert(format!(
                "condition {:?} does not apply to {:?} alerts",
                request.condition, request.kind
            )));
        }
        if !request.value.is_finite() || request.value <= 0.0 {
            return Err(Error::InvalidAlert(format!("value {} must be positive", request.value)));
        }
        if request.kind == AlertKind::Technical && request.value > 100.0 {
            return Err(Error::InvalidAlert(format!("RSI level {} outside [0, 100]", request.value)));
        }

        let symbol = request.symbol.trim().to_uppercase();
        let message = request.message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_message(&symbol, request.condition, request.value));

        let alert = Alert {
            id: AlertId::new(),
            symbol,
            kind: request.kind,
            condition: request.condition,
            value: request.value,
            active: true,
            triggered: false,
            created_at: Utc::now(),
            message,
        };

        tracing::info!(alert_id = %alert.id, symbol = %alert.symbol, condition = ?alert.condition, value = alert.value, "Alert created");
        self.alerts.push(alert.clone());
        Ok(alert)
    }

    /// Flips `active`; switching an alert on re-arms it
    pub fn toggle(&mut self, id: AlertId) -> Result<Alert> {
        let alert = self.alerts.iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::NotFound(format!("alert {}", id)))?;

        alert.active = !alert.active;
        if alert.active {
            alert.triggered = false;
        }
        Ok(alert.clone())
    }

    pub fn delete(&mut self, id: AlertId) -> Result<()> {
        let before = self.alerts.len();
        self.alerts.retain(|a| a.id != id);

        if self.alerts.len() == before {
            return Err(Error::NotFound(format!("alert {}", id)));
        }
        Ok(())
    }

    pub fn get(&self, id: AlertId) -> Option<&Alert> {
        self.alerts.iter().find(|a| a.id == id)
    }

    pub fn list(&self) -> Vec<Alert> {
        self.alerts.clone()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn evaluate_price(&mut self, snapshot: &MarketSnapshot) -> Vec<Alert> {
        self.trigger_matching(&snapshot.symbol, AlertKind::Price, |condition, value| match condition {
            AlertCondition::Above => snapshot.price > value,
            AlertCondition::Below => snapshot.price < value,
            _ => false,
        })
    }

    pub fn evaluate_technical(&mut self, symbol: &str, technical: &TechnicalSnapshot) -> Vec<Alert> {
        self.trigger_matching(symbol, AlertKind::Technical, |condition, value| match condition {
            AlertCondition::RsiOverbought => technical.rsi >= value,
            AlertCondition::RsiOversold => technical.rsi <= value,
            _ => false,
        })
    }

    pub fn evaluate_whales(&mut self, symbol: &str, whales: &[WhaleTransaction]) -> Vec<Alert> {
        self.trigger_matching(symbol, AlertKind::Whale, |condition, value| {
            let side = match condition {
                AlertCondition::LargeBuy => TradeSide::Buy,
                AlertCondition::LargeSell => TradeSide::Sell,
                _ => return false,
            };
            whales.iter().any(|w| w.side == side && w.amount_usd >= value)
        })
    }

    /// Marks matching armed alerts as triggered and returns them
    fn trigger_matching<F>(&mut self, symbol: &str, kind: AlertKind, matches: F) -> Vec<Alert>
    where
        F: Fn(AlertCondition, f64) -> bool,
    {
        let mut fired = Vec::new();

        for alert in self.alerts.iter_mut() {
            if !alert.active || alert.triggered || alert.kind != kind {
                continue;
            }
            if !alert.symbol.eq_ignore_ascii_case(symbol) {
                continue;
            }
            if matches(alert.condition, alert.value) {
                alert.triggered = true;
                tracing::info!(alert_id = %alert.id, symbol = %alert.symbol, condition = ?alert.condition, "Alert triggered");
                fired.push(alert.clone());
            }
        }

        fired
    }
}

fn default_message(symbol: &str, condition: AlertCondition, value: f64) -> String {
    match condition {
        AlertCondition::Above => format!("{} crossed above {}", symbol, value),
        AlertCondition::Below => format!("{} fell below {}", symbol, value),
        AlertCondition::RsiOverbought => format!("{} RSI reached overbought level {}", symbol, value),
        AlertCondition::RsiOversold => format!("{} RSI reached oversold level {}", symbol, value),
        AlertCondition::LargeBuy => format!("{} whale buy of at least ${}", symbol, value),
        AlertCondition::LargeSell => format!("{} whale sell of at least ${}", symbol, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::technical::Trend;
    use crate::types::whale::Confidence;

    fn new_alert(kind: AlertKind, condition: AlertCondition, value: f64) -> NewAlert {
        NewAlert {
            symbol: "nas100".to_string(),
            kind,
            condition,
            value,
            message: None,
        }
    }

    fn market(price: f64) -> MarketSnapshot {
        MarketSnapshot::try_new("NAS100", price, 0.0, "0.00%".to_string(), 1.0, "Yahoo Finance").unwrap()
    }

    fn technical(rsi: f64) -> TechnicalSnapshot {
        TechnicalSnapshot {
            ema50: 1.0,
            ema100: 1.0,
            ema200: 1.0,
            rsi,
            support_level: 1.0,
            resistance_level: 1.0,
            current_price: 1.0,
            trend: Trend::Sideways,
            pullback_signal: false,
        }
    }

    #[test]
    fn create_validates_condition_against_kind() {
        let mut book = AlertBook::new();

        let err = book.create(new_alert(AlertKind::Price, AlertCondition::LargeBuy, 1.0)).unwrap_err();
        assert!(matches!(err, Error::InvalidAlert(_)));

        let err = book.create(new_alert(AlertKind::Technical, AlertCondition::RsiOverbought, 120.0)).unwrap_err();
        assert!(matches!(err, Error::InvalidAlert(_)));

        let alert = book.create(new_alert(AlertKind::Price, AlertCondition::Above, 13_600.0)).unwrap();
        assert_eq!(alert.symbol, "NAS100");
        assert!(alert.active);
        assert!(!alert.triggered);
        assert_eq!(alert.message, "NAS100 crossed above 13600");
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn price_alert_fires_once_until_rearmed() {
        let mut book = AlertBook::new();
        let alert = book.create(new_alert(AlertKind::Price, AlertCondition::Above, 100.0)).unwrap();

        assert!(book.evaluate_price(&market(99.0)).is_empty());
        assert_eq!(book.evaluate_price(&market(101.0)).len(), 1);
        assert!(book.evaluate_price(&market(105.0)).is_empty());

        // off, then on again
        assert!(!book.toggle(alert.id).unwrap().active);
        assert!(book.evaluate_price(&market(105.0)).is_empty());
        let rearmed = book.toggle(alert.id).unwrap();
        assert!(rearmed.active && !rearmed.triggered);
        assert_eq!(book.evaluate_price(&market(105.0)).len(), 1);
    }

    #[test]
    fn technical_and_whale_alerts() {
        let mut book = AlertBook::new();
        book.create(new_alert(AlertKind::Technical, AlertCondition::RsiOverbought, 80.0)).unwrap();
        book.create(new_alert(AlertKind::Whale, AlertCondition::LargeSell, 1_000_000.0)).unwrap();

        assert!(book.evaluate_technical("NAS100", &technical(79.9)).is_empty());
        assert_eq!(book.evaluate_technical("NAS100", &technical(80.0)).len(), 1);

        let buy = WhaleTransaction {
            id: "binance-1".to_string(),
            timestamp: Utc::now(),
            side: TradeSide::Buy,
            amount: 50.0,
            amount_usd: 2_500_000.0,
            price: 50_000.0,
            confidence: Confidence::High,
            source: "Binance".to_string(),
        };
        assert!(book.evaluate_whales("NAS100", &[buy.clone()]).is_empty());

        let sell = WhaleTransaction { side: TradeSide::Sell, id: "binance-2".to_string(), ..buy };
        assert_eq!(book.evaluate_whales("NAS100", &[sell]).len(), 1);
    }

    #[test]
    fn other_symbols_do_not_trigger() {
        let mut book = AlertBook::new();
        book.create(new_alert(AlertKind::Price, AlertCondition::Below, 100.0)).unwrap();

        let mut snapshot = market(50.0);
        snapshot.symbol = "SPX".to_string();
        assert!(book.evaluate_price(&snapshot).is_empty());
    }

    #[test]
    fn delete_unknown_is_not_found() {
        let mut book = AlertBook::new();
        let alert = book.create(new_alert(AlertKind::Price, AlertCondition::Below, 1.0)).unwrap();

        book.delete(alert.id).unwrap();
        assert!(book.is_empty());
        assert!(matches!(book.delete(alert.id), Err(Error::NotFound(_))));
        assert!(matches!(book.toggle(alert.id), Err(Error::NotFound(_))));
    }
}
