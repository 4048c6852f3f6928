pub mod alert_service;
pub mod portfolio_service;
pub mod scheduler;
