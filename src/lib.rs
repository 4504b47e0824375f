//! Basket Bot: pyramiding basket engine with an account risk guard
//!
//! This is the root crate that provides benchmark and integration test access
//! to the member crates:
//!
//! - `basket-core`: Domain types, instrument pip math, layered configuration, errors
//! - `risk-manager`: Exit ladder, daily loss and drawdown gate, ATR tracking
//! - `trading-engine`: Basket state machine and the per-tick trading session
//! - `basket-sim`: Paper-trading binary on a synthetic feed

// Re-export for benchmarks
pub use basket_core as core;
pub use risk_manager as risk;
pub use trading_engine as trading;
