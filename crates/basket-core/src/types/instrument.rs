//! Pip math for the traded symbol.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Direction;
use crate::config::InstrumentConfig;

/// Contract properties needed to turn price moves into account-currency profit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    /// Price units per pip (0.01 for gold, 0.0001 for most FX pairs).
    pub pip_size: Decimal,
    /// Account currency earned per pip per 1.0 lot.
    pub pip_value_per_lot: Decimal,
    /// Lot granularity accepted by the broker.
    pub volume_step: Decimal,
    /// Smallest tradable lot.
    pub min_volume: Decimal,
}

impl Instrument {
    /// Defaults inferred from the symbol name.
    pub fn for_symbol(symbol: &str) -> Self {
        let upper = symbol.to_uppercase();
        let (pip_size, pip_value_per_lot) = if upper.contains("XAU") || upper.contains("GOLD") {
            (Decimal::new(1, 2), Decimal::ONE)
        } else if upper.contains("JPY") {
            (Decimal::new(1, 2), Decimal::new(10, 0))
        } else {
            (Decimal::new(1, 4), Decimal::new(10, 0))
        };

        Self {
            symbol: symbol.to_string(),
            pip_size,
            pip_value_per_lot,
            volume_step: Decimal::new(1, 2),
            min_volume: Decimal::new(1, 2),
        }
    }

    /// Symbol defaults with any configured overrides applied.
    pub fn from_config(symbol: &str, overrides: &InstrumentConfig) -> Self {
        let mut instrument = Self::for_symbol(symbol);
        if let Some(pip_size) = overrides.pip_size {
            instrument.pip_size = pip_size;
        }
        if let Some(value) = overrides.pip_value_per_lot {
            instrument.pip_value_per_lot = value;
        }
        if let Some(step) = overrides.volume_step {
            instrument.volume_step = step;
        }
        if let Some(min) = overrides.min_volume {
            instrument.min_volume = min;
        }
        instrument
    }

    /// Convert a price difference into pips.
    pub fn to_pips(&self, price_delta: Decimal) -> Decimal {
        price_delta / self.pip_size
    }

    /// Convert a pip distance into a price difference.
    pub fn to_price(&self, pips: Decimal) -> Decimal {
        pips * self.pip_size
    }

    /// Profit of `volume` lots entered at `entry` and valued at `price`.
    pub fn profit(
        &self,
        direction: Direction,
        entry: Decimal,
        price: Decimal,
        volume: Decimal,
    ) -> Decimal {
        self.to_pips(direction.favorable_move(entry, price)) * volume * self.pip_value_per_lot
    }

    /// Round a requested volume to the broker's lot step, never below the minimum lot.
    pub fn normalize_volume(&self, volume: Decimal) -> Decimal {
        let steps = (volume / self.volume_step).round();
        (steps * self.volume_step).max(self.min_volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_defaults() {
        let gold = Instrument::for_symbol("XAUUSD");
        assert_eq!(gold.pip_size, Decimal::new(1, 2));
        assert_eq!(gold.pip_value_per_lot, Decimal::ONE);

        let yen = Instrument::for_symbol("usdjpy");
        assert_eq!(yen.pip_size, Decimal::new(1, 2));
        assert_eq!(yen.pip_value_per_lot, Decimal::new(10, 0));

        let euro = Instrument::for_symbol("EURUSD");
        assert_eq!(euro.pip_size, Decimal::new(1, 4));
    }

    #[test]
    fn test_overrides_apply() {
        let overrides = InstrumentConfig {
            pip_value_per_lot: Some(Decimal::new(100, 0)),
            ..Default::default()
        };
        let gold = Instrument::from_config("XAUUSD", &overrides);

        assert_eq!(gold.pip_size, Decimal::new(1, 2));
        assert_eq!(gold.pip_value_per_lot, Decimal::new(100, 0));
    }

    #[test]
    fn test_profit_long_and_short() {
        let gold = Instrument::for_symbol("XAUUSD");
        let entry = Decimal::new(20000, 1);
        let price = Decimal::new(20020, 1); // +200 pips
        let volume = Decimal::new(1, 1);

        // 200 pips * 0.1 lot * $1
        assert_eq!(gold.profit(Direction::Long, entry, price, volume), Decimal::new(20, 0));
        assert_eq!(gold.profit(Direction::Short, entry, price, volume), Decimal::new(-20, 0));
    }

    #[test]
    fn test_normalize_volume() {
        let gold = Instrument::for_symbol("XAUUSD");

        assert_eq!(gold.normalize_volume(Decimal::new(22, 3)), Decimal::new(2, 2));
        assert_eq!(gold.normalize_volume(Decimal::new(1331, 4)), Decimal::new(13, 2));
        assert_eq!(gold.normalize_volume(Decimal::new(1, 3)), Decimal::new(1, 2));
    }
}
