//! Account-level gate on opening new baskets.

use basket_core::config::RiskConfig;
use basket_core::types::AccountSnapshot;
use basket_core::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Reason a new basket was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    /// Realized loss today reached the daily limit.
    DailyLossLimit,
    /// Equity fell too far from its peak.
    MaxDrawdown,
}

impl GateReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateReason::DailyLossLimit => "DAILY_LOSS_LIMIT",
            GateReason::MaxDrawdown => "MAX_DRAWDOWN",
        }
    }
}

/// Outcome of a risk check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskVerdict {
    Allowed,
    Blocked(GateReason),
}

impl RiskVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RiskVerdict::Allowed)
    }
}

/// Per-session risk counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskState {
    /// Realized P&L for the current trading day.
    pub daily_pnl: Decimal,
    /// Balance at the start of the trading day (daily loss baseline).
    pub day_start_balance: Decimal,
    /// Highest equity seen this session (drawdown baseline).
    pub peak_equity: Decimal,
    /// Baskets closed today.
    pub daily_trades: u32,
    /// Day the counters belong to.
    pub trading_day: Option<NaiveDate>,
}

impl Default for RiskState {
    fn default() -> Self {
        Self {
            daily_pnl: Decimal::ZERO,
            day_start_balance: Decimal::ZERO,
            peak_equity: Decimal::ZERO,
            daily_trades: 0,
            trading_day: None,
        }
    }
}

/// Daily loss and drawdown guard.
///
/// The guard only accumulates and checks. When a day ends is decided by the
/// caller's clock, which feeds [`RiskManager::roll_day`].
#[derive(Debug, Clone)]
pub struct RiskManager {
    config: RiskConfig,
    state: RiskState,
}

impl RiskManager {
    /// Create a new risk manager, rejecting out-of-range thresholds.
    #[allow(clippy::result_large_err)]
    pub fn new(config: RiskConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: RiskState::default(),
        })
    }

    /// Start a trading day: reset daily counters and take the balance as baseline.
    pub fn start_day(&mut self, day: NaiveDate, account: &AccountSnapshot) {
        if self.state.trading_day.is_some() {
            info!(
                day = %day,
                daily_pnl = %self.state.daily_pnl,
                daily_trades = self.state.daily_trades,
                "Daily reset"
            );
        }

        self.state.trading_day = Some(day);
        self.state.daily_pnl = Decimal::ZERO;
        self.state.daily_trades = 0;
        self.state.day_start_balance = account.balance;
        self.observe_equity(account.equity);
    }

    /// Reset the daily counters if `today` is a new trading day.
    /// Returns true when a reset happened.
    pub fn roll_day(&mut self, today: NaiveDate, account: &AccountSnapshot) -> bool {
        if self.state.trading_day == Some(today) {
            return false;
        }
        self.start_day(today, account);
        true
    }

    /// Add the realized P&L of a closed basket to today's total.
    pub fn update_daily(&mut self, pnl: Decimal) {
        self.state.daily_pnl += pnl;
        self.state.daily_trades += 1;
    }

    /// Track peak equity for the drawdown check.
    pub fn observe_equity(&mut self, equity: Decimal) {
        if equity > self.state.peak_equity {
            self.state.peak_equity = equity;
        }
    }

    /// Check both gates against an account snapshot without mutating state.
    pub fn evaluate(&self, account: &AccountSnapshot) -> RiskVerdict {
        if self.daily_loss_pct(account) >= self.config.daily_loss_limit_percent {
            return RiskVerdict::Blocked(GateReason::DailyLossLimit);
        }

        if self.drawdown_pct(account) >= self.config.max_drawdown_percent {
            return RiskVerdict::Blocked(GateReason::MaxDrawdown);
        }

        RiskVerdict::Allowed
    }

    /// Whether a new basket may be opened.
    pub fn can_open_position(&self, account: &AccountSnapshot) -> bool {
        let verdict = self.evaluate(account);
        if let RiskVerdict::Blocked(reason) = verdict {
            warn!(
                reason = reason.as_str(),
                daily_pnl = %self.state.daily_pnl,
                equity = %account.equity,
                "Risk gate refused new basket"
            );
        }
        verdict.is_allowed()
    }

    /// Realized loss today as a percentage of the day-start balance. Zero when flat or up.
    pub fn daily_loss_pct(&self, account: &AccountSnapshot) -> Decimal {
        if self.state.daily_pnl >= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let baseline = if self.state.day_start_balance > Decimal::ZERO {
            self.state.day_start_balance
        } else {
            account.balance
        };
        if baseline <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        -self.state.daily_pnl / baseline * Decimal::ONE_HUNDRED
    }

    /// Current equity drawdown from peak as a percentage.
    pub fn drawdown_pct(&self, account: &AccountSnapshot) -> Decimal {
        let peak = self
            .state
            .peak_equity
            .max(account.peak_equity.unwrap_or(Decimal::ZERO))
            .max(account.equity);
        if peak <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        (peak - account.equity) / peak * Decimal::ONE_HUNDRED
    }

    /// Get current state.
    pub fn state(&self) -> &RiskState {
        &self.state
    }

    /// Get current configuration.
    pub fn config(&self) -> &RiskConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn manager() -> RiskManager {
        RiskManager::new(RiskConfig {
            daily_loss_limit_percent: Decimal::new(5, 0),
            max_drawdown_percent: Decimal::new(10, 0),
        })
        .unwrap()
    }

    #[test]
    fn test_daily_loss_limit_reached() {
        let mut risk = manager();
        let account = AccountSnapshot::flat(Decimal::new(10000, 0));
        risk.start_day(day(2), &account);

        risk.update_daily(Decimal::new(-499, 0));
        assert!(risk.can_open_position(&account));

        // 5% of $10,000 = $500
        risk.update_daily(Decimal::new(-1, 0));
        assert_eq!(
            risk.evaluate(&account),
            RiskVerdict::Blocked(GateReason::DailyLossLimit)
        );
        assert!(!risk.can_open_position(&account));
    }

    #[test]
    fn test_daily_pnl_accumulates() {
        let mut risk = manager();
        risk.update_daily(Decimal::new(-120, 0));
        risk.update_daily(Decimal::new(45, 0));

        assert_eq!(risk.state().daily_pnl, Decimal::new(-75, 0));
        assert_eq!(risk.state().daily_trades, 2);
    }

    #[test]
    fn test_baseline_falls_back_to_balance() {
        let mut risk = manager();
        risk.update_daily(Decimal::new(-500, 0));

        // No day started: the snapshot balance is the baseline
        let account = AccountSnapshot::flat(Decimal::new(10000, 0));
        assert!(!risk.can_open_position(&account));

        let bigger = AccountSnapshot::flat(Decimal::new(20000, 0));
        assert!(risk.can_open_position(&bigger));
    }

    #[test]
    fn test_drawdown_from_observed_peak() {
        let mut risk = manager();
        risk.observe_equity(Decimal::new(1000, 0));

        // 9% drawdown - allowed
        let account = AccountSnapshot::flat(Decimal::new(1000, 0)).with_equity(Decimal::new(910, 0));
        assert!(risk.can_open_position(&account));

        // 10% drawdown - blocked
        let account = AccountSnapshot::flat(Decimal::new(1000, 0)).with_equity(Decimal::new(900, 0));
        assert_eq!(
            risk.evaluate(&account),
            RiskVerdict::Blocked(GateReason::MaxDrawdown)
        );
    }

    #[test]
    fn test_drawdown_from_snapshot_peak() {
        let risk = manager();
        let account = AccountSnapshot::flat(Decimal::new(8000, 0))
            .with_equity(Decimal::new(8000, 0))
            .with_peak_equity(Decimal::new(10000, 0));

        assert_eq!(risk.drawdown_pct(&account), Decimal::new(20, 0));
        assert!(!risk.can_open_position(&account));
    }

    #[test]
    fn test_evaluate_does_not_mutate() {
        let mut risk = manager();
        risk.observe_equity(Decimal::new(500, 0));
        let account = AccountSnapshot::flat(Decimal::new(1000, 0));

        risk.evaluate(&account);
        risk.can_open_position(&account);

        assert_eq!(risk.state().peak_equity, Decimal::new(500, 0));
    }

    #[test]
    fn test_roll_day_resets_counters() {
        let mut risk = manager();
        let account = AccountSnapshot::flat(Decimal::new(10000, 0));
        risk.start_day(day(2), &account);
        risk.update_daily(Decimal::new(-600, 0));
        assert!(!risk.can_open_position(&account));

        // Same day: nothing happens
        assert!(!risk.roll_day(day(2), &account));
        assert_eq!(risk.state().daily_pnl, Decimal::new(-600, 0));

        // Next day: counters reset, new baseline
        let next = AccountSnapshot::flat(Decimal::new(9400, 0));
        assert!(risk.roll_day(day(3), &next));
        assert_eq!(risk.state().daily_pnl, Decimal::ZERO);
        assert_eq!(risk.state().daily_trades, 0);
        assert_eq!(risk.state().day_start_balance, Decimal::new(9400, 0));
        assert_eq!(risk.state().trading_day, Some(day(3)));
    }

    #[test]
    fn test_profitable_day_never_blocks_on_loss() {
        let mut risk = manager();
        risk.update_daily(Decimal::new(800, 0));
        let account = AccountSnapshot::flat(Decimal::new(10000, 0));

        assert_eq!(risk.daily_loss_pct(&account), Decimal::ZERO);
        assert!(risk.can_open_position(&account));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = RiskManager::new(RiskConfig {
            daily_loss_limit_percent: Decimal::new(-1, 0),
            ..Default::default()
        });
        assert!(result.is_err());
    }
}
