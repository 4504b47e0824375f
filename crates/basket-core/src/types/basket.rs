//! Basket lifecycle types shared between the engine and its collaborators.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current phase of the basket state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasketPhase {
    /// No basket is live.
    Idle,
    /// Basket live, breakeven stop not yet armed.
    Open,
    /// Basket live with the breakeven stop armed.
    OpenArmed,
}

impl BasketPhase {
    pub fn is_open(self) -> bool {
        !matches!(self, BasketPhase::Idle)
    }
}

impl fmt::Display for BasketPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BasketPhase::Idle => write!(f, "idle"),
            BasketPhase::Open => write!(f, "open"),
            BasketPhase::OpenArmed => write!(f, "open (armed)"),
        }
    }
}

/// A single fill inside a basket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub price: Decimal,
    pub volume: Decimal,
}

impl Entry {
    pub fn new(price: Decimal, volume: Decimal) -> Self {
        Self { price, volume }
    }
}

/// Total volume of a set of entries.
pub fn total_volume(entries: &[Entry]) -> Decimal {
    entries.iter().map(|e| e.volume).sum()
}

/// Volume-weighted average price of a set of entries; zero when there is no volume.
pub fn volume_weighted_price(entries: &[Entry]) -> Decimal {
    let volume = total_volume(entries);
    if volume <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let notional: Decimal = entries.iter().map(|e| e.price * e.volume).sum();
    notional / volume
}
