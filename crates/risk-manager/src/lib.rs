//! Risk Manager
//!
//! Exit ladder for open baskets, daily loss and drawdown gate, and ATR tracking.

pub mod exit_rules;
pub mod risk_guard;
pub mod volatility;

pub use exit_rules::{CloseDecision, ExitCondition, ExitContext, ExitLadder, ExitReason};
pub use risk_guard::{GateReason, RiskManager, RiskState, RiskVerdict};
pub use volatility::{AtrTracker, DEFAULT_ATR_PERIOD};
