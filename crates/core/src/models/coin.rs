use serde::{Deserialize, Serialize};

/// Display fields for a coin, denormalized at creation time.
///
/// Alerts and transactions cache these fields when they are created and never
/// re-fetch them — a renamed or delisted coin keeps the name it had when the
/// user referenced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinInfo {
    /// API coin identifier, lowercase (e.g., "bitcoin", "ethereum")
    pub id: String,

    /// Human-readable name (e.g., "Bitcoin")
    pub name: String,

    /// Ticker symbol (e.g., "btc")
    pub symbol: String,

    /// Thumbnail image URL
    pub image: String,
}

impl CoinInfo {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        symbol: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            symbol: symbol.into(),
            image: image.into(),
        }
    }
}
