use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::alert::{AlertCondition, PriceAlert, TriggeredNotification};
use crate::models::coin::CoinInfo;
use crate::providers::traits::PriceSource;
use crate::storage::{alert_scope_key, traits::ScopeStore};

/// Maximum number of triggered notifications kept in the feed (most recent
/// first). Older entries fall off; the underlying alerts are untouched.
pub const NOTIFICATION_FEED_CAPACITY: usize = 10;

/// Quote currency used for every evaluation cycle.
const VS_CURRENCY: &str = "usd";

struct AlertState {
    alerts: Vec<PriceAlert>,
    /// Most-recent-first feed of trigger notifications, capped at
    /// `NOTIFICATION_FEED_CAPACITY`. Never persisted.
    notifications: Vec<TriggeredNotification>,
}

/// Owns the price-alert set for one user scope.
///
/// Persistence is write-through: every mutation serializes the full alert set
/// and saves it before the in-memory view is updated, so the two can never
/// diverge after a completed operation. Evaluation cycles are serialized by a
/// busy flag — a cycle that starts while a prior cycle's fetch is outstanding
/// is skipped, never interleaved.
///
/// Methods take `&self` (state lives behind a mutex) so the periodic scheduler
/// can share the center through an `Arc`. The state lock is never held across
/// an await point.
pub struct AlertCenter {
    scope_key: String,
    store: Arc<dyn ScopeStore>,
    source: Arc<dyn PriceSource>,
    state: Mutex<AlertState>,
    busy: AtomicBool,
}

impl AlertCenter {
    pub fn new(
        store: Arc<dyn ScopeStore>,
        source: Arc<dyn PriceSource>,
        user_id: Option<&str>,
    ) -> Self {
        Self {
            scope_key: alert_scope_key(user_id),
            store,
            source,
            state: Mutex::new(AlertState {
                alerts: Vec::new(),
                notifications: Vec::new(),
            }),
            busy: AtomicBool::new(false),
        }
    }

    /// Load the persisted alert set for this scope.
    ///
    /// An absent scope starts empty. A malformed document also starts empty:
    /// alert data is not safety-critical, so a corrupt record is logged and
    /// discarded rather than propagated.
    pub fn load(&self) -> Result<(), CoreError> {
        let alerts = match self.store.load(&self.scope_key)? {
            None => Vec::new(),
            Some(document) => match serde_json::from_str(&document) {
                Ok(alerts) => alerts,
                Err(e) => {
                    warn!(
                        scope = %self.scope_key,
                        error = %e,
                        "discarding corrupt alert document, starting empty"
                    );
                    Vec::new()
                }
            },
        };
        self.lock_state().alerts = alerts;
        Ok(())
    }

    /// Create and persist a new alert.
    ///
    /// The alert starts untriggered with no observed price. The write is
    /// synchronous write-through — the alert is durable before this returns.
    pub fn add_alert(
        &self,
        coin: CoinInfo,
        target_price: f64,
        condition: AlertCondition,
    ) -> Result<PriceAlert, CoreError> {
        if !target_price.is_finite() || target_price <= 0.0 {
            return Err(CoreError::Validation(format!(
                "Target price must be a positive finite number, got {target_price}"
            )));
        }

        let alert = PriceAlert::new(coin, target_price, condition);

        let mut state = self.lock_state();
        let mut next = state.alerts.clone();
        next.push(alert.clone());
        self.persist(&next)?;
        state.alerts = next;
        Ok(alert)
    }

    /// Delete an alert by id. Removing an unknown id is a no-op, not an error.
    pub fn remove_alert(&self, alert_id: Uuid) -> Result<(), CoreError> {
        let mut state = self.lock_state();
        if !state.alerts.iter().any(|a| a.id == alert_id) {
            return Ok(());
        }
        let next: Vec<PriceAlert> = state
            .alerts
            .iter()
            .filter(|a| a.id != alert_id)
            .cloned()
            .collect();
        self.persist(&next)?;
        state.alerts = next;
        Ok(())
    }

    /// Run one evaluation cycle. Returns the number of newly triggered alerts.
    ///
    /// 1. Snapshot the de-duplicated coin ids of active alerts; if empty,
    ///    return without any network call.
    /// 2. Fetch current USD prices for all of them in a single batched call.
    /// 3. Latch alerts whose condition is met (exactly once, no re-arm),
    ///    update the observed price on the rest. Alerts whose coin id is
    ///    missing from the response, or quoted at a non-positive price, are
    ///    left untouched — never trigger on missing data.
    /// 4. Persist the full set in one write, then prepend new notifications
    ///    to the bounded feed.
    ///
    /// A whole-batch fetch failure aborts the cycle with zero state mutation;
    /// the fixed evaluation period is the retry policy. Overlapping calls are
    /// skipped via the busy flag, so two cycles can never race on the store.
    pub async fn evaluate(&self) -> Result<usize, CoreError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(scope = %self.scope_key, "evaluation cycle already in flight, skipping");
            return Ok(0);
        }
        let result = self.evaluate_inner().await;
        self.busy.store(false, Ordering::Release);
        result
    }

    async fn evaluate_inner(&self) -> Result<usize, CoreError> {
        let coin_ids: Vec<String> = {
            let state = self.lock_state();
            let mut seen = std::collections::HashSet::new();
            state
                .alerts
                .iter()
                .filter(|a| a.is_active())
                .filter_map(|a| seen.insert(a.coin.id.clone()).then(|| a.coin.id.clone()))
                .collect()
        };

        if coin_ids.is_empty() {
            return Ok(0);
        }

        let prices = match self.source.simple_price(&coin_ids, &[VS_CURRENCY]).await {
            Ok(prices) => prices,
            Err(e) => {
                warn!(
                    scope = %self.scope_key,
                    source = self.source.name(),
                    error = %e,
                    "price fetch failed, aborting evaluation cycle"
                );
                return Err(e);
            }
        };

        // Apply the batch to a working copy, persist once, then commit.
        let mut state = self.lock_state();
        let mut next = state.alerts.clone();
        let mut new_notifications = Vec::new();
        let now = Utc::now();

        for alert in next.iter_mut().filter(|a| a.is_active()) {
            let Some(price) = prices
                .get(&alert.coin.id)
                .and_then(|by_currency| by_currency.get(VS_CURRENCY))
                .copied()
            else {
                // No data for this coin in the batch — leave the alert as-is.
                continue;
            };

            // A zero quote means "no data", not a price of zero; evaluating
            // it would latch every Below alert.
            if price <= 0.0 {
                continue;
            }

            alert.current_price = price;
            if alert.condition.is_met(price, alert.target_price) {
                alert.triggered = true;
                alert.triggered_at = Some(now);
                debug!(
                    alert = %alert.id,
                    coin = %alert.coin.id,
                    condition = %alert.condition,
                    target = alert.target_price,
                    observed = price,
                    "alert triggered"
                );
                new_notifications.push(TriggeredNotification::from_alert(alert));
            }
        }

        self.persist(&next)?;
        state.alerts = next;

        let triggered_count = new_notifications.len();
        if triggered_count > 0 {
            new_notifications.extend(state.notifications.drain(..));
            new_notifications.truncate(NOTIFICATION_FEED_CAPACITY);
            state.notifications = new_notifications;
        }

        Ok(triggered_count)
    }

    // ── Read model ──────────────────────────────────────────────────

    /// All alerts, triggered and active, in creation order.
    #[must_use]
    pub fn alerts(&self) -> Vec<PriceAlert> {
        self.lock_state().alerts.clone()
    }

    /// Alerts that have not yet triggered.
    #[must_use]
    pub fn active_alerts(&self) -> Vec<PriceAlert> {
        self.lock_state()
            .alerts
            .iter()
            .filter(|a| a.is_active())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn active_alert_count(&self) -> usize {
        self.lock_state()
            .alerts
            .iter()
            .filter(|a| a.is_active())
            .count()
    }

    /// The notification feed, most recent first.
    #[must_use]
    pub fn notifications(&self) -> Vec<TriggeredNotification> {
        self.lock_state().notifications.clone()
    }

    /// Drop one notification from the feed. The underlying alert keeps its
    /// triggered state.
    pub fn dismiss_notification(&self, alert_id: Uuid) {
        self.lock_state()
            .notifications
            .retain(|n| n.alert_id != alert_id);
    }

    /// Empty the notification feed.
    pub fn clear_notifications(&self) {
        self.lock_state().notifications.clear();
    }

    #[must_use]
    pub fn scope_key(&self) -> &str {
        &self.scope_key
    }

    // ── Internal ────────────────────────────────────────────────────

    fn persist(&self, alerts: &[PriceAlert]) -> Result<(), CoreError> {
        let document = serde_json::to_string(alerts)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize alerts: {e}")))?;
        self.store.save(&self.scope_key, &document)
    }

    fn lock_state(&self) -> MutexGuard<'_, AlertState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
