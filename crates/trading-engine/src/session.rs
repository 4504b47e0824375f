//! Per-tick driver contract tying a basket, the risk guard, telemetry and a clock together.

use basket_core::config::Config;
use basket_core::types::{AccountSnapshot, Direction, Entry, Tick};
use basket_core::Result;
use chrono::{NaiveDate, Utc};
use risk_manager::{CloseDecision, ExitReason, GateReason, RiskManager, RiskVerdict};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::basket::{Basket, BasketStateMachine, BasketStatus, ClosedBasket};

/// Receives basket lifecycle events.
#[cfg_attr(test, mockall::automock)]
pub trait TelemetrySink: Send {
    fn basket_opened(&self, basket: &Basket);
    fn basket_added(&self, basket: &Basket);
    fn basket_closed(&self, report: &ClosedBasket);
    fn entry_blocked(&self, direction: Direction, reason: GateReason);
}

/// Telemetry that writes structured `tracing` events.
#[derive(Debug, Clone, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn basket_opened(&self, basket: &Basket) {
        info!(
            basket_id = %basket.id,
            direction = %basket.direction,
            price = %basket.opened_at_price,
            volume = %basket.volume,
            "Opened basket"
        );
    }

    fn basket_added(&self, basket: &Basket) {
        info!(
            basket_id = %basket.id,
            entries = basket.entry_count(),
            volume = %basket.volume,
            vwap = %basket.vwap,
            armed = basket.armed,
            "Added to basket"
        );
    }

    fn basket_closed(&self, report: &ClosedBasket) {
        info!(
            basket_id = %report.id,
            direction = %report.direction,
            reason = report.reason.as_str(),
            entries = report.entry_count,
            volume = %report.volume,
            pnl = %report.realized_pnl,
            mfe = %report.mfe_profit,
            "Closed basket"
        );
    }

    fn entry_blocked(&self, direction: Direction, reason: GateReason) {
        warn!(
            direction = %direction,
            reason = reason.as_str(),
            "Entry blocked by risk gate"
        );
    }
}

/// Source of the current trading day.
#[cfg_attr(test, mockall::automock)]
pub trait TradingClock: Send {
    fn today(&self) -> NaiveDate;
}

/// Trading day from the system clock, in UTC.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl TradingClock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Result of an entry attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenOutcome {
    Opened(Uuid),
    Blocked(GateReason),
}

/// What happened on a tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickOutcome {
    /// No basket is live.
    Idle,
    Held,
    Added { entries: usize, volume: Decimal },
    Closed(ClosedBasket),
}

/// Running totals across closed baskets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub baskets_opened: u32,
    pub baskets_closed: u32,
    pub entries_blocked: u32,
    pub realized_pnl: Decimal,
    pub wins: u32,
    pub losses: u32,
}

/// One basket engine plus its risk guard.
pub struct TradingSession {
    baskets: BasketStateMachine,
    risk: RiskManager,
    telemetry: Box<dyn TelemetrySink>,
    clock: Box<dyn TradingClock>,
    stats: SessionStats,
}

/// Session shared between tasks. Lock once per tick.
pub type SharedSession = Arc<Mutex<TradingSession>>;

impl TradingSession {
    /// Build the engine from configuration and start the first trading day.
    #[allow(clippy::result_large_err)]
    pub fn new(
        config: &Config,
        telemetry: Box<dyn TelemetrySink>,
        clock: Box<dyn TradingClock>,
        account: &AccountSnapshot,
    ) -> Result<Self> {
        let baskets = BasketStateMachine::new(config.strategy.clone(), config.instrument())?;
        let mut risk = RiskManager::new(config.risk.clone())?;
        risk.start_day(clock.today(), account);

        Ok(Self {
            baskets,
            risk,
            telemetry,
            clock,
            stats: SessionStats::default(),
        })
    }

    pub fn shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    /// Open a basket if the risk gate allows it.
    #[allow(clippy::result_large_err)]
    pub fn try_open(
        &mut self,
        direction: Direction,
        price: Decimal,
        account: &AccountSnapshot,
    ) -> Result<OpenOutcome> {
        self.risk.roll_day(self.clock.today(), account);
        self.risk.observe_equity(account.equity);

        if let RiskVerdict::Blocked(reason) = self.risk.evaluate(account) {
            self.stats.entries_blocked += 1;
            self.telemetry.entry_blocked(direction, reason);
            return Ok(OpenOutcome::Blocked(reason));
        }

        let basket = self.baskets.open_basket(direction, price)?;
        self.telemetry.basket_opened(basket);
        self.stats.baskets_opened += 1;
        Ok(OpenOutcome::Opened(basket.id))
    }

    /// Trailing update, then close check, then add check.
    #[allow(clippy::result_large_err)]
    pub fn on_tick(&mut self, tick: &Tick) -> Result<TickOutcome> {
        if !self.baskets.phase().is_open() {
            return Ok(TickOutcome::Idle);
        }

        self.baskets.on_tick(tick.price);

        if let CloseDecision::Close(reason) =
            self.baskets.should_close_basket(tick.price, tick.atr_pips)
        {
            let report = self.close(tick.price, reason)?;
            return Ok(TickOutcome::Closed(report));
        }

        if self.baskets.should_add_to_basket(tick.price) {
            let basket = self.baskets.add_to_basket(tick.price)?;
            self.telemetry.basket_added(basket);
            return Ok(TickOutcome::Added {
                entries: basket.entry_count(),
                volume: basket.volume,
            });
        }

        Ok(TickOutcome::Held)
    }

    /// Close the live basket at `price`, if any.
    #[allow(clippy::result_large_err)]
    pub fn flatten(&mut self, price: Decimal) -> Result<Option<ClosedBasket>> {
        if !self.baskets.phase().is_open() {
            return Ok(None);
        }
        self.close(price, ExitReason::Manual).map(Some)
    }

    /// Adopt entries already held at the broker.
    #[allow(clippy::result_large_err)]
    pub fn restore(&mut self, direction: Direction, entries: Vec<Entry>) -> Result<()> {
        let basket = self.baskets.restore_basket(direction, entries)?;
        info!(
            basket_id = %basket.id,
            direction = %direction,
            entries = basket.entry_count(),
            armed = basket.armed,
            "Resumed basket from broker positions"
        );
        Ok(())
    }

    #[allow(clippy::result_large_err)]
    fn close(&mut self, price: Decimal, reason: ExitReason) -> Result<ClosedBasket> {
        let report = self.baskets.close_basket(price, reason)?;
        self.risk.update_daily(report.realized_pnl);

        self.stats.baskets_closed += 1;
        self.stats.realized_pnl += report.realized_pnl;
        if report.realized_pnl > Decimal::ZERO {
            self.stats.wins += 1;
        } else if report.realized_pnl < Decimal::ZERO {
            self.stats.losses += 1;
        }

        self.telemetry.basket_closed(&report);
        Ok(report)
    }

    pub fn status(&self) -> BasketStatus {
        self.baskets.status()
    }

    pub fn baskets(&self) -> &BasketStateMachine {
        &self.baskets
    }

    pub fn risk(&self) -> &RiskManager {
        &self.risk
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }
}
