use async_trait::async_trait;
use std::collections::HashMap;

use crate::errors::CoreError;
use crate::models::coin::CoinInfo;

/// Batched price response: coin id → (vs-currency → price).
///
/// Best-effort: ids the provider does not know are simply absent from the map.
/// Consumers must treat a missing id as "no data this cycle", never as zero.
pub type PriceMap = HashMap<String, HashMap<String, f64>>;

/// Trait abstraction over the external market-data collaborator.
///
/// The alert evaluator and the portfolio valuator both consume this seam; in
/// tests it is replaced by a programmable mock. Errors surface as a single
/// failure for the whole batch — there is no partial-success contract at the
/// transport level.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Human-readable name of this source (for logs/errors).
    fn name(&self) -> &str;

    /// Fetch current prices for a batch of coin ids in the given quote
    /// currencies, in a single call.
    ///
    /// Must tolerate an empty id list by returning an empty map without
    /// performing any network request.
    async fn simple_price(
        &self,
        ids: &[String],
        vs_currencies: &[&str],
    ) -> Result<PriceMap, CoreError>;

    /// Search for coins by free-text query (coin discovery).
    async fn search(&self, query: &str) -> Result<Vec<CoinInfo>, CoreError>;
}
