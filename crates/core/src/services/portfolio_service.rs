use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::coin::CoinInfo;
use crate::models::portfolio::{Portfolio, PortfolioSummary, Transaction, TransactionKind};
use crate::providers::traits::PriceSource;
use crate::storage::{portfolio_scope_key, traits::ScopeStore};

/// Quote currency for portfolio valuation.
const VS_CURRENCY: &str = "usd";

/// Valuate a portfolio against a coin-id → USD price map.
///
/// Pure fold with no intermediate persisted state: the summary is always
/// consistent with the transaction log, and calling it twice with unchanged
/// inputs yields identical results.
///
/// Only coins with net amount > 0 contribute — a fully-sold (or oversold)
/// coin adds nothing to either total, so cost basis is never carried negative
/// into the aggregate. A coin with no cached price values at 0.
#[must_use]
pub fn compute_summary(
    portfolio: &Portfolio,
    prices: &HashMap<String, f64>,
) -> PortfolioSummary {
    let mut total_value = 0.0;
    let mut total_cost = 0.0;

    for (coin_id, holding) in portfolio.holdings() {
        if holding.amount > 0.0 {
            total_cost += holding.cost;
            total_value += holding.amount * prices.get(&coin_id).copied().unwrap_or(0.0);
        }
    }

    let profit_loss = total_value - total_cost;
    let profit_loss_pct = (total_cost > 0.0).then(|| (profit_loss / total_cost) * 100.0);

    PortfolioSummary {
        total_value,
        total_cost,
        profit_loss,
        profit_loss_pct,
    }
}

/// Owns the portfolio list for one user scope, the transient active-portfolio
/// selection, and a price cache for valuation.
///
/// Like the alert store, every ledger mutation is validated, persisted
/// write-through (full list, single atomic replacement), and only then
/// committed in memory. The active selection and the price cache are session
/// state and are never persisted.
pub struct PortfolioTracker {
    scope_key: String,
    store: Arc<dyn ScopeStore>,
    source: Arc<dyn PriceSource>,
    portfolios: Vec<Portfolio>,
    active_id: Option<Uuid>,
    prices: HashMap<String, f64>,
}

impl PortfolioTracker {
    pub fn new(
        store: Arc<dyn ScopeStore>,
        source: Arc<dyn PriceSource>,
        user_id: Option<&str>,
    ) -> Self {
        Self {
            scope_key: portfolio_scope_key(user_id),
            store,
            source,
            portfolios: Vec::new(),
            active_id: None,
            prices: HashMap::new(),
        }
    }

    /// Load the persisted portfolio list for this scope. Same fail-soft
    /// semantics as the alert store: absent or corrupt documents start empty.
    /// The first portfolio, if any, becomes active.
    pub fn load(&mut self) -> Result<(), CoreError> {
        self.portfolios = match self.store.load(&self.scope_key)? {
            None => Vec::new(),
            Some(document) => match serde_json::from_str(&document) {
                Ok(portfolios) => portfolios,
                Err(e) => {
                    warn!(
                        scope = %self.scope_key,
                        error = %e,
                        "discarding corrupt portfolio document, starting empty"
                    );
                    Vec::new()
                }
            },
        };
        self.active_id = self.portfolios.first().map(|p| p.id);
        Ok(())
    }

    /// Create a portfolio and make it the active one.
    /// The name must be non-empty after trimming.
    pub fn create_portfolio(&mut self, name: &str) -> Result<Portfolio, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation(
                "Portfolio name must not be empty".into(),
            ));
        }

        let portfolio = Portfolio::new(name);
        let mut next = self.portfolios.clone();
        next.push(portfolio.clone());
        self.persist(&next)?;
        self.portfolios = next;
        self.active_id = Some(portfolio.id);
        Ok(portfolio)
    }

    /// Append a transaction to a portfolio's ledger.
    ///
    /// Amount and price-per-coin must be positive finite numbers; an invalid
    /// transaction is rejected with no mutation and no write.
    ///
    /// A coin this introduces is unpriced (values at 0) until the next
    /// [`refresh_prices`](Self::refresh_prices); callers that value the
    /// portfolio should refresh after ledger changes, as the facade does.
    pub fn add_transaction(
        &mut self,
        portfolio_id: Uuid,
        coin: CoinInfo,
        kind: TransactionKind,
        amount: f64,
        price_per_coin: f64,
        date: NaiveDate,
    ) -> Result<Transaction, CoreError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(CoreError::Validation(format!(
                "Transaction amount must be a positive finite number, got {amount}"
            )));
        }
        if !price_per_coin.is_finite() || price_per_coin <= 0.0 {
            return Err(CoreError::Validation(format!(
                "Price per coin must be a positive finite number, got {price_per_coin}"
            )));
        }

        let mut next = self.portfolios.clone();
        let portfolio = next
            .iter_mut()
            .find(|p| p.id == portfolio_id)
            .ok_or_else(|| CoreError::PortfolioNotFound(portfolio_id.to_string()))?;

        let transaction = Transaction::new(coin, kind, amount, price_per_coin, date);
        portfolio.transactions.push(transaction.clone());
        self.persist(&next)?;
        self.portfolios = next;
        Ok(transaction)
    }

    /// Remove a transaction by id. Deleting an unknown transaction id is a
    /// no-op; the portfolio itself must exist. Follow with
    /// [`refresh_prices`](Self::refresh_prices) before the next valuation.
    pub fn delete_transaction(
        &mut self,
        portfolio_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<(), CoreError> {
        let mut next = self.portfolios.clone();
        let portfolio = next
            .iter_mut()
            .find(|p| p.id == portfolio_id)
            .ok_or_else(|| CoreError::PortfolioNotFound(portfolio_id.to_string()))?;

        let before = portfolio.transactions.len();
        portfolio.transactions.retain(|t| t.id != transaction_id);
        if portfolio.transactions.len() == before {
            return Ok(());
        }

        self.persist(&next)?;
        self.portfolios = next;
        Ok(())
    }

    /// Select the active portfolio. Selection is session state, not
    /// persisted. The price cache still reflects the previous selection until
    /// the next [`refresh_prices`](Self::refresh_prices).
    pub fn set_active(&mut self, portfolio_id: Uuid) -> Result<(), CoreError> {
        if !self.portfolios.iter().any(|p| p.id == portfolio_id) {
            return Err(CoreError::PortfolioNotFound(portfolio_id.to_string()));
        }
        self.active_id = Some(portfolio_id);
        Ok(())
    }

    /// Fetch current prices for every coin referenced by the active
    /// portfolio's transactions, in one batched call.
    ///
    /// A failed fetch keeps the previous price cache in place (stale but
    /// available) rather than blanking valuation to zero; the error is logged
    /// and returned, never escalated beyond the caller.
    pub async fn refresh_prices(&mut self) -> Result<(), CoreError> {
        let coin_ids = match self.active_portfolio() {
            Some(p) => p.coin_ids(),
            None => return Ok(()),
        };
        if coin_ids.is_empty() {
            return Ok(());
        }

        match self.source.simple_price(&coin_ids, &[VS_CURRENCY]).await {
            Ok(price_map) => {
                // Merge rather than replace: ids the response omitted keep
                // their last known price.
                for (coin_id, by_currency) in price_map {
                    if let Some(price) = by_currency.get(VS_CURRENCY) {
                        self.prices.insert(coin_id, *price);
                    }
                }
                Ok(())
            }
            Err(e) => {
                warn!(
                    scope = %self.scope_key,
                    source = self.source.name(),
                    error = %e,
                    "price refresh failed, keeping stale cache"
                );
                Err(e)
            }
        }
    }

    /// Valuate the active portfolio against the cached prices.
    #[must_use]
    pub fn summary(&self) -> PortfolioSummary {
        match self.active_portfolio() {
            Some(portfolio) => compute_summary(portfolio, &self.prices),
            None => PortfolioSummary::zero(),
        }
    }

    // ── Read model ──────────────────────────────────────────────────

    #[must_use]
    pub fn portfolios(&self) -> &[Portfolio] {
        &self.portfolios
    }

    #[must_use]
    pub fn active_portfolio(&self) -> Option<&Portfolio> {
        self.active_id
            .and_then(|id| self.portfolios.iter().find(|p| p.id == id))
    }

    /// The session price cache (coin id → USD price).
    #[must_use]
    pub fn prices(&self) -> &HashMap<String, f64> {
        &self.prices
    }

    #[must_use]
    pub fn scope_key(&self) -> &str {
        &self.scope_key
    }

    // ── Internal ────────────────────────────────────────────────────

    fn persist(&self, portfolios: &[Portfolio]) -> Result<(), CoreError> {
        let document = serde_json::to_string(portfolios).map_err(|e| {
            CoreError::Serialization(format!("Failed to serialize portfolios: {e}"))
        })?;
        self.store.save(&self.scope_key, &document)
    }
}
