pub mod config;
pub mod types;
pub mod arbitrage;
pub mod sources;
pub mod database;
pub mod report;
pub mod bot;

pub use config::Config;
pub use types::*;
