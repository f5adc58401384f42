pub mod batch;
pub mod commands;
pub mod config;
pub mod context;
pub mod data_quality;
pub mod evaluator;
pub mod events;
pub mod jobs;
pub mod models;
pub mod validation;

pub use config::BacktestSettings;
pub use evaluator::{run_backtest, run_backtest_with};
pub use models::{BacktestResult, BacktestStatus, Candle, DataQuality, Timeframe, TradeSignal};
pub use validation::{validate, ValidationError};
