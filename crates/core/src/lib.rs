pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use std::sync::Arc;

use chrono::NaiveDate;
use errors::CoreError;
use models::alert::{AlertCondition, PriceAlert};
use models::coin::CoinInfo;
use models::portfolio::{Portfolio, Transaction, TransactionKind};
use providers::traits::PriceSource;
use services::alert_service::AlertCenter;
use services::portfolio_service::PortfolioTracker;
use services::scheduler::AlertScheduler;
use storage::traits::ScopeStore;
use uuid::Uuid;

pub use services::alert_service::NOTIFICATION_FEED_CAPACITY;
pub use services::scheduler::EVALUATION_PERIOD;

/// Composition root for one user scope: wires the alert center (plus its
/// scheduler) and the portfolio tracker to a shared store and price source.
///
/// Both components remain independently usable; this facade only handles the
/// lifecycle glue: loading persisted state on startup, keeping the evaluation
/// timer armed exactly while active alerts exist, and refreshing the price
/// cache after every ledger or selection change.
#[must_use]
pub struct DashboardCore {
    alerts: Arc<AlertCenter>,
    scheduler: AlertScheduler,
    portfolio: PortfolioTracker,
}

impl std::fmt::Debug for DashboardCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardCore")
            .field("active_alerts", &self.alerts.active_alert_count())
            .field("portfolios", &self.portfolio.portfolios().len())
            .field("scheduler_running", &self.scheduler.is_running())
            .finish()
    }
}

impl DashboardCore {
    /// Build the core for a user scope (`None` = anonymous/guest).
    pub fn new(
        store: Arc<dyn ScopeStore>,
        source: Arc<dyn PriceSource>,
        user_id: Option<&str>,
    ) -> Self {
        let alerts = Arc::new(AlertCenter::new(
            Arc::clone(&store),
            Arc::clone(&source),
            user_id,
        ));
        let scheduler = AlertScheduler::new(Arc::clone(&alerts));
        let portfolio = PortfolioTracker::new(store, source, user_id);
        Self {
            alerts,
            scheduler,
            portfolio,
        }
    }

    /// Load persisted state for both components, run the initial evaluation
    /// cycle, arm the scheduler if active alerts exist, and warm the
    /// portfolio price cache.
    ///
    /// Fetch failures during warm-up degrade to "no data yet" — they are
    /// logged by the components and do not fail initialization.
    pub async fn init(&mut self) -> Result<(), CoreError> {
        self.alerts.load()?;
        self.portfolio.load()?;

        if self.alerts.active_alert_count() > 0 {
            let _ = self.alerts.evaluate().await;
        }
        self.scheduler.sync();

        if self.portfolio.active_portfolio().is_some() {
            let _ = self.portfolio.refresh_prices().await;
        }
        Ok(())
    }

    /// Add an alert and arm the evaluation timer if this was the 0→1
    /// active-alert transition.
    pub fn add_alert(
        &self,
        coin: CoinInfo,
        target_price: f64,
        condition: AlertCondition,
    ) -> Result<PriceAlert, CoreError> {
        let alert = self.alerts.add_alert(coin, target_price, condition)?;
        self.scheduler.sync();
        Ok(alert)
    }

    /// Remove an alert and disarm the timer if no active alerts remain.
    pub fn remove_alert(&self, alert_id: Uuid) -> Result<(), CoreError> {
        self.alerts.remove_alert(alert_id)?;
        self.scheduler.sync();
        Ok(())
    }

    /// Create a portfolio and make it the active one.
    /// An empty ledger needs no price data, so no fetch happens here.
    pub fn create_portfolio(&mut self, name: &str) -> Result<Portfolio, CoreError> {
        self.portfolio.create_portfolio(name)
    }

    /// Append a transaction, then refresh the price cache so the coin it
    /// references is priced in the very next summary. A failed refresh
    /// degrades to the stale cache; the mutation itself is already durable.
    pub async fn add_transaction(
        &mut self,
        portfolio_id: Uuid,
        coin: CoinInfo,
        kind: TransactionKind,
        amount: f64,
        price_per_coin: f64,
        date: NaiveDate,
    ) -> Result<Transaction, CoreError> {
        let transaction = self.portfolio.add_transaction(
            portfolio_id,
            coin,
            kind,
            amount,
            price_per_coin,
            date,
        )?;
        let _ = self.portfolio.refresh_prices().await;
        Ok(transaction)
    }

    /// Remove a transaction, then refresh the price cache against the
    /// shrunken ledger.
    pub async fn delete_transaction(
        &mut self,
        portfolio_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<(), CoreError> {
        self.portfolio.delete_transaction(portfolio_id, transaction_id)?;
        let _ = self.portfolio.refresh_prices().await;
        Ok(())
    }

    /// Switch the active portfolio, then refresh the price cache for the
    /// coins its ledger references.
    pub async fn set_active_portfolio(&mut self, portfolio_id: Uuid) -> Result<(), CoreError> {
        self.portfolio.set_active(portfolio_id)?;
        let _ = self.portfolio.refresh_prices().await;
        Ok(())
    }

    /// Stop background evaluation. Also happens automatically on drop.
    pub fn teardown(&self) {
        self.scheduler.stop();
    }

    #[must_use]
    pub fn alerts(&self) -> &Arc<AlertCenter> {
        &self.alerts
    }

    #[must_use]
    pub fn scheduler(&self) -> &AlertScheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn portfolio(&self) -> &PortfolioTracker {
        &self.portfolio
    }

    #[must_use]
    pub fn portfolio_mut(&mut self) -> &mut PortfolioTracker {
        &mut self.portfolio
    }
}
