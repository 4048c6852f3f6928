// ═══════════════════════════════════════════════════════════════════
// Alert Tests — AlertCenter evaluation cycles, persistence,
// notification feed, AlertScheduler lifecycle
// ═══════════════════════════════════════════════════════════════════

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use cryptix_core::errors::CoreError;
use cryptix_core::models::alert::AlertCondition;
use cryptix_core::models::coin::CoinInfo;
use cryptix_core::providers::traits::{PriceMap, PriceSource};
use cryptix_core::services::alert_service::{AlertCenter, NOTIFICATION_FEED_CAPACITY};
use cryptix_core::services::scheduler::AlertScheduler;
use cryptix_core::storage::memory::MemoryStore;
use cryptix_core::storage::traits::ScopeStore;

// ═══════════════════════════════════════════════════════════════════
// Mock Price Source
// ═══════════════════════════════════════════════════════════════════

struct MockPriceSource {
    prices: Mutex<HashMap<String, f64>>,
    failing: AtomicBool,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockPriceSource {
    fn new() -> Self {
        Self {
            prices: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    fn set_price(&self, coin_id: &str, price: f64) {
        self.prices.lock().unwrap().insert(coin_id.into(), price);
    }

    fn remove_price(&self, coin_id: &str) {
        self.prices.lock().unwrap().remove(coin_id);
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    fn name(&self) -> &str {
        "MockSource"
    }

    async fn simple_price(
        &self,
        ids: &[String],
        vs_currencies: &[&str],
    ) -> Result<PriceMap, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoreError::Network("simulated outage".into()));
        }
        let prices = self.prices.lock().unwrap();
        let mut map = PriceMap::new();
        for id in ids {
            if let Some(price) = prices.get(id) {
                let by_currency: HashMap<String, f64> = vs_currencies
                    .iter()
                    .map(|c| (c.to_string(), *price))
                    .collect();
                map.insert(id.clone(), by_currency);
            }
        }
        Ok(map)
    }

    async fn search(&self, _query: &str) -> Result<Vec<CoinInfo>, CoreError> {
        Ok(Vec::new())
    }
}

// ═══════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════

fn coin(id: &str) -> CoinInfo {
    CoinInfo::new(id, id.to_uppercase(), id, format!("https://img.test/{id}.png"))
}

fn setup() -> (Arc<MemoryStore>, Arc<MockPriceSource>, AlertCenter) {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(MockPriceSource::new());
    let center = AlertCenter::new(
        Arc::clone(&store) as Arc<dyn ScopeStore>,
        Arc::clone(&source) as Arc<dyn PriceSource>,
        None,
    );
    (store, source, center)
}

// ═══════════════════════════════════════════════════════════════════
// Adding & removing
// ═══════════════════════════════════════════════════════════════════

mod add_remove {
    use super::*;

    #[test]
    fn new_alert_starts_inactive_state() {
        let (_, _, center) = setup();
        let alert = center
            .add_alert(coin("bitcoin"), 100_000.0, AlertCondition::Above)
            .unwrap();
        assert!(!alert.triggered);
        assert!(alert.is_active());
        assert_eq!(alert.current_price, 0.0);
        assert!(alert.triggered_at.is_none());
        assert_eq!(center.active_alert_count(), 1);
    }

    #[test]
    fn rejects_zero_target() {
        let (_, _, center) = setup();
        let err = center
            .add_alert(coin("bitcoin"), 0.0, AlertCondition::Above)
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(center.alerts().len(), 0);
    }

    #[test]
    fn rejects_negative_target() {
        let (_, _, center) = setup();
        assert!(center
            .add_alert(coin("bitcoin"), -5.0, AlertCondition::Below)
            .is_err());
    }

    #[test]
    fn rejects_nan_and_infinite_target() {
        let (_, _, center) = setup();
        assert!(center
            .add_alert(coin("bitcoin"), f64::NAN, AlertCondition::Above)
            .is_err());
        assert!(center
            .add_alert(coin("bitcoin"), f64::INFINITY, AlertCondition::Above)
            .is_err());
    }

    #[test]
    fn add_is_write_through() {
        let (store, _, center) = setup();
        center
            .add_alert(coin("bitcoin"), 100.0, AlertCondition::Above)
            .unwrap();

        let document = store.load(center.scope_key()).unwrap().unwrap();
        assert!(document.contains("bitcoin"));
        assert!(document.contains("above"));
    }

    #[test]
    fn remove_deletes_by_id() {
        let (_, _, center) = setup();
        let a = center
            .add_alert(coin("bitcoin"), 100.0, AlertCondition::Above)
            .unwrap();
        let b = center
            .add_alert(coin("ethereum"), 50.0, AlertCondition::Below)
            .unwrap();

        center.remove_alert(a.id).unwrap();
        let remaining = center.alerts();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, b.id);
    }

    // Scenario C: removing a non-existent id succeeds and changes nothing.
    #[test]
    fn remove_unknown_id_is_noop() {
        let (_, _, center) = setup();
        center
            .add_alert(coin("bitcoin"), 100.0, AlertCondition::Above)
            .unwrap();
        let before = center.alerts();

        center.remove_alert(Uuid::new_v4()).unwrap();
        assert_eq!(center.alerts(), before);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Loading persisted state
// ═══════════════════════════════════════════════════════════════════

mod loading {
    use super::*;

    #[test]
    fn absent_scope_starts_empty() {
        let (_, _, center) = setup();
        center.load().unwrap();
        assert!(center.alerts().is_empty());
    }

    #[test]
    fn corrupt_document_starts_empty() {
        let (store, _, center) = setup();
        store
            .save(center.scope_key(), "{not valid json at all")
            .unwrap();

        center.load().unwrap();
        assert!(center.alerts().is_empty());
    }

    #[test]
    fn round_trips_through_store() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(MockPriceSource::new());

        let center = AlertCenter::new(
            Arc::clone(&store) as Arc<dyn ScopeStore>,
            Arc::clone(&source) as Arc<dyn PriceSource>,
            Some("alice"),
        );
        let added = center
            .add_alert(coin("bitcoin"), 100.0, AlertCondition::Above)
            .unwrap();

        // A fresh center over the same store sees the same alert.
        let reloaded = AlertCenter::new(
            Arc::clone(&store) as Arc<dyn ScopeStore>,
            source as Arc<dyn PriceSource>,
            Some("alice"),
        );
        reloaded.load().unwrap();
        assert_eq!(reloaded.alerts(), vec![added]);
    }

    #[test]
    fn scopes_are_isolated_per_user() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(MockPriceSource::new());
        let alice = AlertCenter::new(
            Arc::clone(&store) as Arc<dyn ScopeStore>,
            Arc::clone(&source) as Arc<dyn PriceSource>,
            Some("alice"),
        );
        let guest = AlertCenter::new(
            Arc::clone(&store) as Arc<dyn ScopeStore>,
            source as Arc<dyn PriceSource>,
            None,
        );
        alice
            .add_alert(coin("bitcoin"), 100.0, AlertCondition::Above)
            .unwrap();

        guest.load().unwrap();
        assert!(guest.alerts().is_empty());
    }
}

// ═══════════════════════════════════════════════════════════════════
// Evaluation cycles
// ═══════════════════════════════════════════════════════════════════

mod evaluation {
    use super::*;

    // Scenario A: price below target first, crossing on a later cycle.
    #[tokio::test]
    async fn triggers_on_crossing_cycle_not_before() {
        let (_, source, center) = setup();
        center
            .add_alert(coin("x"), 100.0, AlertCondition::Above)
            .unwrap();

        source.set_price("x", 90.0);
        assert_eq!(center.evaluate().await.unwrap(), 0);
        let alert = center.alerts()[0].clone();
        assert!(!alert.triggered);
        assert_eq!(alert.current_price, 90.0);
        assert!(center.notifications().is_empty());

        source.set_price("x", 101.0);
        assert_eq!(center.evaluate().await.unwrap(), 1);
        let alert = center.alerts()[0].clone();
        assert!(alert.triggered);
        assert_eq!(alert.current_price, 101.0);
        assert!(alert.triggered_at.is_some());

        let feed = center.notifications();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].alert_id, alert.id);
        assert_eq!(feed[0].observed_price, 101.0);
    }

    #[tokio::test]
    async fn above_triggers_on_exact_target() {
        let (_, source, center) = setup();
        center
            .add_alert(coin("x"), 100.0, AlertCondition::Above)
            .unwrap();
        source.set_price("x", 100.0);
        assert_eq!(center.evaluate().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn below_condition_is_symmetric() {
        let (_, source, center) = setup();
        center
            .add_alert(coin("x"), 50.0, AlertCondition::Below)
            .unwrap();

        source.set_price("x", 60.0);
        assert_eq!(center.evaluate().await.unwrap(), 0);

        source.set_price("x", 49.5);
        assert_eq!(center.evaluate().await.unwrap(), 1);
        assert!(center.alerts()[0].triggered);
    }

    // Latch property: once triggered, an alert never re-arms and is never
    // re-evaluated, even when the price crosses back past the target.
    #[tokio::test]
    async fn triggered_alert_stays_latched() {
        let (_, source, center) = setup();
        center
            .add_alert(coin("x"), 100.0, AlertCondition::Above)
            .unwrap();
        source.set_price("x", 120.0);
        center.evaluate().await.unwrap();

        let triggered = center.alerts()[0].clone();
        assert!(triggered.triggered);

        source.set_price("x", 80.0);
        assert_eq!(center.evaluate().await.unwrap(), 0);

        // Bit-for-bit unchanged: trigger timestamp and observed price stay
        // frozen at the moment of the transition.
        assert_eq!(center.alerts()[0], triggered);
        assert_eq!(center.notifications().len(), 1);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_state_untouched() {
        let (store, source, center) = setup();
        center
            .add_alert(coin("x"), 100.0, AlertCondition::Above)
            .unwrap();
        source.set_price("x", 90.0);
        center.evaluate().await.unwrap();

        let before = center.alerts();
        let document_before = store.load(center.scope_key()).unwrap();

        source.set_failing(true);
        source.set_price("x", 200.0);
        assert!(center.evaluate().await.is_err());

        assert_eq!(center.alerts(), before);
        assert_eq!(store.load(center.scope_key()).unwrap(), document_before);
        assert!(center.notifications().is_empty());
    }

    #[tokio::test]
    async fn missing_coin_in_response_is_skipped() {
        let (_, source, center) = setup();
        center
            .add_alert(coin("x"), 100.0, AlertCondition::Above)
            .unwrap();
        center
            .add_alert(coin("y"), 10.0, AlertCondition::Above)
            .unwrap();
        source.set_price("x", 90.0);
        source.set_price("y", 15.0);
        center.evaluate().await.unwrap();

        // Next cycle returns data for y only; x must keep its last state.
        source.remove_price("x");
        assert_eq!(center.evaluate().await.unwrap(), 0);

        let alerts = center.alerts();
        let x = alerts.iter().find(|a| a.coin.id == "x").unwrap();
        assert_eq!(x.current_price, 90.0);
        assert!(!x.triggered);
    }

    #[tokio::test]
    async fn zero_quote_is_treated_as_missing_data() {
        let (_, source, center) = setup();
        center
            .add_alert(coin("x"), 50.0, AlertCondition::Below)
            .unwrap();
        source.set_price("x", 60.0);
        center.evaluate().await.unwrap();

        // A zero quote must not satisfy the Below condition or overwrite the
        // last observed price.
        source.set_price("x", 0.0);
        assert_eq!(center.evaluate().await.unwrap(), 0);

        let alert = center.alerts()[0].clone();
        assert!(!alert.triggered);
        assert_eq!(alert.current_price, 60.0);
        assert!(center.notifications().is_empty());
    }

    #[tokio::test]
    async fn no_active_alerts_means_no_network_call() {
        let (_, source, center) = setup();
        assert_eq!(center.evaluate().await.unwrap(), 0);
        assert_eq!(source.call_count(), 0);

        // Once every alert has triggered, later cycles are free too.
        center
            .add_alert(coin("x"), 100.0, AlertCondition::Above)
            .unwrap();
        source.set_price("x", 150.0);
        center.evaluate().await.unwrap();
        let calls = source.call_count();
        center.evaluate().await.unwrap();
        assert_eq!(source.call_count(), calls);
    }

    #[tokio::test]
    async fn batches_one_call_per_cycle() {
        let (_, source, center) = setup();
        for id in ["a", "b", "c"] {
            center
                .add_alert(coin(id), 1_000_000.0, AlertCondition::Above)
                .unwrap();
            source.set_price(id, 10.0);
        }
        center.evaluate().await.unwrap();
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn overlapping_cycles_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(MockPriceSource::with_delay(Duration::from_millis(100)));
        let center = Arc::new(AlertCenter::new(
            store as Arc<dyn ScopeStore>,
            Arc::clone(&source) as Arc<dyn PriceSource>,
            None,
        ));
        center
            .add_alert(coin("x"), 100.0, AlertCondition::Above)
            .unwrap();
        source.set_price("x", 150.0);

        let (first, second) = tokio::join!(center.evaluate(), center.evaluate());
        // Exactly one of the cycles actually ran; the overlapping one was
        // skipped by the busy flag.
        assert_eq!(first.unwrap() + second.unwrap(), 1);
        assert_eq!(source.call_count(), 1);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Notification feed
// ═══════════════════════════════════════════════════════════════════

mod notifications {
    use super::*;

    #[tokio::test]
    async fn feed_is_bounded_and_most_recent_first() {
        let (_, source, center) = setup();
        for i in 0..NOTIFICATION_FEED_CAPACITY + 2 {
            let id = format!("coin{i}");
            center
                .add_alert(coin(&id), 100.0, AlertCondition::Above)
                .unwrap();
            source.set_price(&id, 150.0);
        }

        let triggered = center.evaluate().await.unwrap();
        assert_eq!(triggered, NOTIFICATION_FEED_CAPACITY + 2);
        assert_eq!(center.notifications().len(), NOTIFICATION_FEED_CAPACITY);
    }

    #[tokio::test]
    async fn newer_cycles_prepend() {
        let (_, source, center) = setup();
        center
            .add_alert(coin("first"), 100.0, AlertCondition::Above)
            .unwrap();
        center
            .add_alert(coin("second"), 100.0, AlertCondition::Above)
            .unwrap();

        source.set_price("first", 150.0);
        center.evaluate().await.unwrap();
        source.set_price("second", 150.0);
        center.evaluate().await.unwrap();

        let feed = center.notifications();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].coin.id, "second");
        assert_eq!(feed[1].coin.id, "first");
    }

    #[tokio::test]
    async fn dismissing_leaves_the_alert_intact() {
        let (_, source, center) = setup();
        let alert = center
            .add_alert(coin("x"), 100.0, AlertCondition::Above)
            .unwrap();
        source.set_price("x", 150.0);
        center.evaluate().await.unwrap();

        center.dismiss_notification(alert.id);
        assert!(center.notifications().is_empty());
        assert!(center.alerts()[0].triggered);
    }

    #[tokio::test]
    async fn clear_empties_the_feed_only() {
        let (_, source, center) = setup();
        center
            .add_alert(coin("x"), 100.0, AlertCondition::Above)
            .unwrap();
        source.set_price("x", 150.0);
        center.evaluate().await.unwrap();

        center.clear_notifications();
        assert!(center.notifications().is_empty());
        assert_eq!(center.alerts().len(), 1);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Scheduler lifecycle
// ═══════════════════════════════════════════════════════════════════

mod scheduler {
    use super::*;

    fn shared_setup() -> (Arc<MockPriceSource>, Arc<AlertCenter>) {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(MockPriceSource::new());
        let center = Arc::new(AlertCenter::new(
            store as Arc<dyn ScopeStore>,
            Arc::clone(&source) as Arc<dyn PriceSource>,
            None,
        ));
        (source, center)
    }

    #[tokio::test]
    async fn sync_arms_and_disarms_with_active_count() {
        let (source, center) = shared_setup();
        let scheduler = AlertScheduler::with_period(Arc::clone(&center), Duration::from_secs(60));

        scheduler.sync();
        assert!(!scheduler.is_running());

        let alert = center
            .add_alert(coin("x"), 100.0, AlertCondition::Above)
            .unwrap();
        source.set_price("x", 90.0);
        scheduler.sync();
        assert!(scheduler.is_running());

        center.remove_alert(alert.id).unwrap();
        scheduler.sync();
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn evaluates_periodically_while_running() {
        let (source, center) = shared_setup();
        center
            .add_alert(coin("x"), 1_000_000.0, AlertCondition::Above)
            .unwrap();
        source.set_price("x", 10.0);

        let scheduler =
            AlertScheduler::with_period(Arc::clone(&center), Duration::from_millis(20));
        scheduler.start();
        tokio::time::sleep(Duration::from_millis(110)).await;
        scheduler.stop();

        assert!(source.call_count() >= 3);
        assert_eq!(center.alerts()[0].current_price, 10.0);
    }

    #[tokio::test]
    async fn loop_stops_itself_when_active_set_empties() {
        let (source, center) = shared_setup();
        center
            .add_alert(coin("x"), 100.0, AlertCondition::Above)
            .unwrap();
        source.set_price("x", 150.0);

        let scheduler =
            AlertScheduler::with_period(Arc::clone(&center), Duration::from_millis(20));
        scheduler.start();
        tokio::time::sleep(Duration::from_millis(120)).await;

        // The only alert triggered on the first tick; the loop observed an
        // empty active set and exited on its own.
        assert!(center.alerts()[0].triggered);
        assert!(!scheduler.is_running());

        let calls_after_stop = source.call_count();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(source.call_count(), calls_after_stop);
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let (source, center) = shared_setup();
        center
            .add_alert(coin("x"), 1_000_000.0, AlertCondition::Above)
            .unwrap();
        source.set_price("x", 10.0);

        let scheduler =
            AlertScheduler::with_period(Arc::clone(&center), Duration::from_millis(500));
        scheduler.start();
        scheduler.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.stop();

        // One loop, one immediate first tick — not two.
        assert_eq!(source.call_count(), 1);
    }
}
