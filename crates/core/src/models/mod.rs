pub mod alert;
pub mod coin;
pub mod portfolio;
