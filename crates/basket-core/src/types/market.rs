//! Market data types consumed by the basket engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a basket. Every entry in a basket shares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> Decimal {
        match self {
            Direction::Long => Decimal::ONE,
            Direction::Short => Decimal::NEGATIVE_ONE,
        }
    }

    /// Price displacement from `from` to `to`, positive when it favors this direction.
    pub fn favorable_move(self, from: Decimal, to: Decimal) -> Decimal {
        (to - from) * self.sign()
    }

    /// Whether `candidate` is strictly more favorable than `reference`.
    pub fn is_better(self, candidate: Decimal, reference: Decimal) -> bool {
        match self {
            Direction::Long => candidate > reference,
            Direction::Short => candidate < reference,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

/// A single price observation fed to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    pub price: Decimal,
    /// Average true range expressed in pips, when the feed can supply one.
    pub atr_pips: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

impl Tick {
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            atr_pips: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_atr(mut self, atr_pips: Decimal) -> Self {
        self.atr_pips = Some(atr_pips);
        self
    }
}

/// OHLC bar used for volatility estimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBar {
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub timestamp: DateTime<Utc>,
}
