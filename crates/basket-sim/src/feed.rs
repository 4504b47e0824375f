//! Seeded random-walk price feed with bar-based ATR.

use basket_core::types::{PriceBar, Tick};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use risk_manager::AtrTracker;
use rust_decimal::Decimal;

/// Chance per tick that the trend regime changes.
const REGIME_SWITCH_PROBABILITY: f64 = 0.02;

/// Random walk in whole pips with short trending regimes.
pub struct SyntheticFeed {
    rng: StdRng,
    price: Decimal,
    pip_size: Decimal,
    max_step_pips: i64,
    /// -1, 0 or +1.
    trend: i64,
    bar_ticks: u32,
    ticks_in_bar: u32,
    bar_high: Decimal,
    bar_low: Decimal,
    atr: AtrTracker,
}

impl SyntheticFeed {
    pub fn new(
        seed: u64,
        start_price: Decimal,
        pip_size: Decimal,
        max_step_pips: i64,
        bar_ticks: u32,
    ) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            price: start_price,
            pip_size,
            max_step_pips: max_step_pips.max(1),
            trend: 0,
            bar_ticks: bar_ticks.max(1),
            ticks_in_bar: 0,
            bar_high: start_price,
            bar_low: start_price,
            atr: AtrTracker::default(),
        }
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    /// Advance one tick.
    pub fn next_tick(&mut self) -> Tick {
        if self.rng.gen_bool(REGIME_SWITCH_PROBABILITY) {
            self.trend = self.rng.gen_range(-1..=1);
        }

        let noise = self.rng.gen_range(-self.max_step_pips..=self.max_step_pips);
        let step = noise + self.trend * (self.max_step_pips / 2).max(1);
        self.price = (self.price + Decimal::from(step) * self.pip_size).max(self.pip_size);

        self.roll_bar();

        let tick = Tick::new(self.price);
        match self.atr.atr_pips(self.pip_size) {
            Some(atr) => tick.with_atr(atr),
            None => tick,
        }
    }

    fn roll_bar(&mut self) {
        if self.ticks_in_bar == 0 {
            self.bar_high = self.price;
            self.bar_low = self.price;
        } else {
            self.bar_high = self.bar_high.max(self.price);
            self.bar_low = self.bar_low.min(self.price);
        }
        self.ticks_in_bar += 1;

        if self.ticks_in_bar >= self.bar_ticks {
            self.atr.add_bar(PriceBar {
                high: self.bar_high,
                low: self.bar_low,
                close: self.price,
                timestamp: Utc::now(),
            });
            self.ticks_in_bar = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(seed: u64) -> SyntheticFeed {
        SyntheticFeed::new(seed, Decimal::new(200000, 2), Decimal::new(1, 2), 4, 10)
    }

    #[test]
    fn test_same_seed_same_path() {
        let mut a = feed(7);
        let mut b = feed(7);
        for _ in 0..200 {
            assert_eq!(a.next_tick().price, b.next_tick().price);
        }
    }

    #[test]
    fn test_prices_stay_on_pip_grid() {
        let mut f = feed(11);
        for _ in 0..500 {
            let tick = f.next_tick();
            assert_eq!(tick.price % Decimal::new(1, 2), Decimal::ZERO);
            assert!(tick.price > Decimal::ZERO);
        }
    }

    #[test]
    fn test_atr_appears_after_warmup() {
        let mut f = feed(3);
        // 14-bar ATR needs 15 bars of 10 ticks
        for _ in 0..149 {
            assert!(f.next_tick().atr_pips.is_none());
        }
        let tick = f.next_tick();
        let atr = tick.atr_pips.unwrap();
        assert!(atr >= Decimal::ZERO);
    }
}
