use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::coin::CoinInfo;

/// Kind of portfolio transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    /// Buying / acquiring a coin
    Buy,
    /// Selling / disposing of a coin
    Sell,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Buy => write!(f, "BUY"),
            TransactionKind::Sell => write!(f, "SELL"),
        }
    }
}

/// A single buy/sell entry in a portfolio ledger.
///
/// Amount and price-per-coin are immutable after creation — corrections are
/// performed by deleting and re-adding, never by in-place edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier
    pub id: Uuid,

    /// The coin involved (display fields cached at creation)
    pub coin: CoinInfo,

    /// Buy or Sell
    pub kind: TransactionKind,

    /// Amount of the coin, in coin units (always positive)
    pub amount: f64,

    /// USD price per coin at execution time
    pub price_per_coin: f64,

    /// Execution date (daily granularity)
    pub date: NaiveDate,
}

impl Transaction {
    pub fn new(
        coin: CoinInfo,
        kind: TransactionKind,
        amount: f64,
        price_per_coin: f64,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            coin,
            kind,
            amount,
            price_per_coin,
            date,
        }
    }
}

/// Derived per-coin aggregate: net amount held and net cost basis.
/// Never persisted — recomputed from the transaction log on demand.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Holding {
    /// Net amount = Σ buy.amount − Σ sell.amount
    pub amount: f64,
    /// Net cost = Σ buy.amount×price − Σ sell.amount×price
    pub cost: f64,
}

/// A named collection of transactions. Order is insertion order and carries
/// no valuation meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    /// Unique identifier
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// The transaction ledger
    pub transactions: Vec<Transaction>,
}

impl Portfolio {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            transactions: Vec::new(),
        }
    }

    /// Fold the ledger into per-coin holdings.
    ///
    /// Buys add amount and cost, sells subtract both. Includes every coin that
    /// appears in the ledger, net-positive or not — valuation filters on
    /// `amount > 0` at summary time.
    #[must_use]
    pub fn holdings(&self) -> HashMap<String, Holding> {
        let mut holdings: HashMap<String, Holding> = HashMap::new();

        for tx in &self.transactions {
            let entry = holdings.entry(tx.coin.id.clone()).or_default();
            match tx.kind {
                TransactionKind::Buy => {
                    entry.amount += tx.amount;
                    entry.cost += tx.amount * tx.price_per_coin;
                }
                TransactionKind::Sell => {
                    entry.amount -= tx.amount;
                    entry.cost -= tx.amount * tx.price_per_coin;
                }
            }
        }

        holdings
    }

    /// De-duplicated coin ids appearing in this portfolio's transactions,
    /// in first-appearance order.
    #[must_use]
    pub fn coin_ids(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.transactions
            .iter()
            .filter_map(|tx| seen.insert(tx.coin.id.clone()).then(|| tx.coin.id.clone()))
            .collect()
    }
}

/// Point-in-time valuation of one portfolio against current prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    /// Σ net amount × current price over net-positive holdings
    pub total_value: f64,

    /// Σ net cost over net-positive holdings
    pub total_cost: f64,

    /// total_value − total_cost
    pub profit_loss: f64,

    /// (profit_loss / total_cost) × 100. `None` when total_cost is not
    /// positive — never reported as NaN or infinity.
    pub profit_loss_pct: Option<f64>,
}

impl PortfolioSummary {
    /// Summary of an empty or unpriced portfolio.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            total_value: 0.0,
            total_cost: 0.0,
            profit_loss: 0.0,
            profit_loss_pct: None,
        }
    }
}
