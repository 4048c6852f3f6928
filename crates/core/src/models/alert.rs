use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::coin::CoinInfo;

/// Direction of a price alert: fire when the price crosses the target
/// from below (`Above`) or from above (`Below`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCondition {
    Above,
    Below,
}

impl AlertCondition {
    /// Whether a sampled price satisfies this condition against a target.
    /// Both comparisons are inclusive.
    #[must_use]
    pub fn is_met(&self, current: f64, target: f64) -> bool {
        match self {
            AlertCondition::Above => current >= target,
            AlertCondition::Below => current <= target,
        }
    }
}

impl std::fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertCondition::Above => write!(f, "above"),
            AlertCondition::Below => write!(f, "below"),
        }
    }
}

/// A persisted rule comparing a coin's live price to a target.
///
/// Triggering is level-sampled and edge-latched: once the condition holds at
/// any evaluation instant the alert fires exactly once and never re-arms,
/// even if the price later crosses back past the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlert {
    /// Unique identifier
    pub id: Uuid,

    /// The coin this alert watches (display fields cached at creation)
    pub coin: CoinInfo,

    /// Target price in USD (positive, finite)
    pub target_price: f64,

    /// Fire above or below the target
    pub condition: AlertCondition,

    /// Last price observed for this coin during evaluation.
    /// Starts at 0.0 until the first successful cycle.
    pub current_price: f64,

    /// Whether this alert has fired. Once true it stays true.
    pub triggered: bool,

    /// When the alert was created
    pub created_at: DateTime<Utc>,

    /// When the alert fired. Present iff `triggered`, immutable once set.
    #[serde(default)]
    pub triggered_at: Option<DateTime<Utc>>,
}

impl PriceAlert {
    pub fn new(coin: CoinInfo, target_price: f64, condition: AlertCondition) -> Self {
        Self {
            id: Uuid::new_v4(),
            coin,
            target_price,
            condition,
            current_price: 0.0,
            triggered: false,
            created_at: Utc::now(),
            triggered_at: None,
        }
    }

    /// An alert is active iff it has not yet triggered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.triggered
    }
}

/// Snapshot of an alert at the moment it fired, carrying the price that
/// satisfied the condition.
///
/// Held in a bounded most-recent-first feed, independent of alert storage —
/// dismissing a notification does not delete or mutate the underlying alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredNotification {
    /// Id of the alert that fired
    pub alert_id: Uuid,

    /// Coin display fields, copied from the alert
    pub coin: CoinInfo,

    /// The alert's target price
    pub target_price: f64,

    /// The alert's condition
    pub condition: AlertCondition,

    /// Price observed at trigger time
    pub observed_price: f64,

    /// When the alert fired
    pub triggered_at: DateTime<Utc>,
}

impl TriggeredNotification {
    /// Build a notification from an alert that just transitioned to triggered.
    pub(crate) fn from_alert(alert: &PriceAlert) -> Self {
        Self {
            alert_id: alert.id,
            coin: alert.coin.clone(),
            target_price: alert.target_price,
            condition: alert.condition,
            observed_price: alert.current_price,
            triggered_at: alert.triggered_at.unwrap_or_else(Utc::now),
        }
    }
}
