use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::traits::{PriceMap, PriceSource};
use crate::errors::CoreError;
use crate::models::coin::CoinInfo;

const BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Bounded timeout for every HTTP call; a timed-out fetch is treated the same
/// as "no data for any requested id" by the callers.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// CoinGecko API source for cryptocurrency prices and coin discovery.
///
/// - **Free tier**: works without a key; a demo API key can be supplied and is
///   sent as the `x_cg_demo_api_key` query parameter.
/// - **Endpoints**: `/simple/price`, `/search`
///
/// CoinGecko addresses coins by lowercase ids like "bitcoin", "ethereum".
pub struct CoinGeckoSource {
    client: Client,
    api_key: Option<String>,
}

impl CoinGeckoSource {
    pub fn new() -> Self {
        Self::with_api_key(None)
    }

    /// Create a source with an optional demo API key.
    pub fn with_api_key(api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, api_key }
    }

    /// Append the API key to a parameter list if one is configured.
    fn params<'a>(&'a self, mut params: Vec<(&'a str, String)>) -> Vec<(&'a str, String)> {
        if let Some(key) = &self.api_key {
            params.push(("x_cg_demo_api_key", key.clone()));
        }
        params
    }
}

impl Default for CoinGeckoSource {
    fn default() -> Self {
        Self::new()
    }
}

// ── CoinGecko API response types ────────────────────────────────────

#[derive(Deserialize)]
struct SearchResponse {
    coins: Vec<SearchEntry>,
}

#[derive(Deserialize)]
struct SearchEntry {
    id: String,
    name: String,
    symbol: String,
    #[serde(default)]
    thumb: String,
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    fn name(&self) -> &str {
        "CoinGecko"
    }

    async fn simple_price(
        &self,
        ids: &[String],
        vs_currencies: &[&str],
    ) -> Result<PriceMap, CoreError> {
        // Contract: an empty id list is a valid call and never hits the network.
        if ids.is_empty() {
            return Ok(PriceMap::new());
        }

        let url = format!("{BASE_URL}/simple/price");
        let params = self.params(vec![
            ("ids", ids.join(",")),
            ("vs_currencies", vs_currencies.join(",")),
        ]);

        let prices: PriceMap = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: "CoinGecko".into(),
                message: format!("Failed to parse simple price response: {e}"),
            })?;

        Ok(prices)
    }

    async fn search(&self, query: &str) -> Result<Vec<CoinInfo>, CoreError> {
        let url = format!("{BASE_URL}/search");
        let params = self.params(vec![("query", query.to_string())]);

        let resp: SearchResponse = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: "CoinGecko".into(),
                message: format!("Failed to parse search response for '{query}': {e}"),
            })?;

        Ok(resp
            .coins
            .into_iter()
            .map(|c| CoinInfo::new(c.id, c.name, c.symbol, c.thumb))
            .collect())
    }
}
