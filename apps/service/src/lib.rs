pub mod accounts;
pub mod config;
pub mod error;
pub mod monitoring;
pub mod notify;
pub mod store;
