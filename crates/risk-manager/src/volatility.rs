//! Average true range over completed price bars.

use basket_core::types::PriceBar;
use rust_decimal::Decimal;
use std::collections::VecDeque;

/// Default ATR lookback.
pub const DEFAULT_ATR_PERIOD: usize = 14;

/// Rolling ATR calculator.
#[derive(Debug, Clone)]
pub struct AtrTracker {
    /// Last `period + 1` bars; the extra bar supplies the previous close.
    bars: VecDeque<PriceBar>,
    period: usize,
    current_atr: Option<Decimal>,
}

impl Default for AtrTracker {
    fn default() -> Self {
        Self::new(DEFAULT_ATR_PERIOD)
    }
}

impl AtrTracker {
    /// A zero period is treated as one.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            bars: VecDeque::with_capacity(period + 1),
            period,
            current_atr: None,
        }
    }

    /// Add a completed bar.
    pub fn add_bar(&mut self, bar: PriceBar) {
        self.bars.push_back(bar);
        if self.bars.len() > self.period + 1 {
            self.bars.pop_front();
        }
        self.calculate_atr();
    }

    fn calculate_atr(&mut self) {
        if self.bars.len() < self.period + 1 {
            return;
        }

        let sum: Decimal = self
            .bars
            .iter()
            .zip(self.bars.iter().skip(1))
            .map(|(prev, current)| {
                // True Range = max(H-L, |H-Pc|, |L-Pc|)
                let hl = current.high - current.low;
                let hpc = (current.high - prev.close).abs();
                let lpc = (current.low - prev.close).abs();
                hl.max(hpc).max(lpc)
            })
            .sum();

        self.current_atr = Some(sum / Decimal::from(self.period));
    }

    /// ATR in price units, once `period + 1` bars have been seen.
    pub fn current_atr(&self) -> Option<Decimal> {
        self.current_atr
    }

    /// ATR converted to pips.
    pub fn atr_pips(&self, pip_size: Decimal) -> Option<Decimal> {
        if pip_size <= Decimal::ZERO {
            return None;
        }
        self.current_atr.map(|atr| atr / pip_size)
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn is_ready(&self) -> bool {
        self.current_atr.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bar(high: i64, low: i64, close: i64) -> PriceBar {
        PriceBar {
            high: Decimal::new(high, 2),
            low: Decimal::new(low, 2),
            close: Decimal::new(close, 2),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_atr_needs_period_plus_one_bars() {
        let mut atr = AtrTracker::new(3);
        atr.add_bar(bar(200010, 199990, 200000));
        atr.add_bar(bar(200020, 200000, 200010));
        atr.add_bar(bar(200030, 200010, 200020));
        assert!(atr.current_atr().is_none());
        assert!(!atr.is_ready());

        atr.add_bar(bar(200040, 200020, 200030));
        // Every true range is 0.20
        assert_eq!(atr.current_atr(), Some(Decimal::new(20, 2)));
        assert_eq!(atr.atr_pips(Decimal::new(1, 2)), Some(Decimal::new(20, 0)));
    }

    #[test]
    fn test_true_range_uses_previous_close() {
        let mut atr = AtrTracker::new(1);
        atr.add_bar(bar(200010, 199990, 200000));
        // Gap up: |H - Pc| = 0.50 beats H - L = 0.10
        atr.add_bar(bar(200050, 200040, 200045));

        assert_eq!(atr.current_atr(), Some(Decimal::new(50, 2)));
    }

    #[test]
    fn test_window_rolls() {
        let mut atr = AtrTracker::new(2);
        atr.add_bar(bar(200000, 200000, 200000));
        atr.add_bar(bar(200100, 200000, 200000));
        atr.add_bar(bar(200100, 200000, 200000));
        assert_eq!(atr.current_atr(), Some(Decimal::ONE));

        atr.add_bar(bar(200010, 200000, 200000));
        atr.add_bar(bar(200010, 200000, 200000));
        assert_eq!(atr.current_atr(), Some(Decimal::new(10, 2)));
    }

    #[test]
    fn test_default_period() {
        assert_eq!(AtrTracker::default().period(), DEFAULT_ATR_PERIOD);
        assert_eq!(AtrTracker::new(0).period(), 1);
    }
}
