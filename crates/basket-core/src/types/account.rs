//! Account snapshot supplied by the broker collaborator.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Point-in-time view of the trading account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Settled balance.
    pub balance: Decimal,
    /// Balance plus floating profit of open positions.
    pub equity: Decimal,
    /// Highest equity the provider has seen, if it tracks one.
    pub peak_equity: Option<Decimal>,
}

impl AccountSnapshot {
    /// Snapshot of a flat account where equity equals balance.
    pub fn flat(balance: Decimal) -> Self {
        Self {
            balance,
            equity: balance,
            peak_equity: None,
        }
    }

    pub fn with_equity(mut self, equity: Decimal) -> Self {
        self.equity = equity;
        self
    }

    pub fn with_peak_equity(mut self, peak: Decimal) -> Self {
        self.peak_equity = Some(peak);
        self
    }

    /// Floating profit currently reflected in equity.
    pub fn floating_pnl(&self) -> Decimal {
        self.equity - self.balance
    }
}
