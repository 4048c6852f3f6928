pub mod file;
pub mod memory;
pub mod traits;

/// Persistence scope key for a user's price alerts.
/// Anonymous sessions share the `guest` scope.
#[must_use]
pub fn alert_scope_key(user_id: Option<&str>) -> String {
    format!("cryptix-price-alerts-{}", user_id.unwrap_or("guest"))
}

/// Persistence scope key for a user's portfolios.
#[must_use]
pub fn portfolio_scope_key(user_id: Option<&str>) -> String {
    format!("portfolios-{}", user_id.unwrap_or("guest"))
}
