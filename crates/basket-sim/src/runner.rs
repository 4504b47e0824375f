//! Paper-trading loop around a shared trading session.

use anyhow::Result;
use basket_core::types::{AccountSnapshot, Direction};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info};
use trading_engine::{ClosedBasket, OpenOutcome, SessionStats, SharedSession, TickOutcome};

use crate::feed::SyntheticFeed;

/// Direction of each new basket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EntryPolicy {
    Long,
    Short,
    /// Flip direction after every closed basket.
    Alternate,
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub ticks: u64,
    /// Pause between ticks; zero runs as fast as possible.
    pub interval: Duration,
    pub entry: EntryPolicy,
    /// Idle ticks after a close before the next entry attempt.
    pub reentry_delay_ticks: u32,
}

/// End-of-run report.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub ticks_processed: u64,
    pub interrupted: bool,
    pub start_balance: Decimal,
    pub final_balance: Decimal,
    pub max_drawdown_pct: Decimal,
    pub exits_by_reason: BTreeMap<String, u32>,
    pub stats: SessionStats,
    pub last_basket: Option<ClosedBasket>,
}

pub struct Simulator {
    session: SharedSession,
    feed: SyntheticFeed,
    settings: RunSettings,
    balance: Decimal,
    start_balance: Decimal,
    peak_equity: Decimal,
    max_drawdown_pct: Decimal,
    next_direction: Direction,
    cooldown: u32,
    exits_by_reason: BTreeMap<String, u32>,
    last_basket: Option<ClosedBasket>,
}

impl Simulator {
    pub fn new(
        session: SharedSession,
        feed: SyntheticFeed,
        settings: RunSettings,
        balance: Decimal,
    ) -> Self {
        let next_direction = match settings.entry {
            EntryPolicy::Short => Direction::Short,
            EntryPolicy::Long | EntryPolicy::Alternate => Direction::Long,
        };
        Self {
            session,
            feed,
            settings,
            balance,
            start_balance: balance,
            peak_equity: balance,
            max_drawdown_pct: Decimal::ZERO,
            next_direction,
            cooldown: 0,
            exits_by_reason: BTreeMap::new(),
            last_basket: None,
        }
    }

    /// Run until the tick budget is spent or Ctrl-C arrives, then flatten.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let started_at = Utc::now();
        let mut ticker = self.pacer();
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        let mut processed = 0;
        let mut interrupted = false;
        while processed < self.settings.ticks {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(ticks = processed, "Shutdown requested, flattening");
                    interrupted = true;
                    break;
                }
                _ = pace(ticker.as_mut()) => {
                    self.step().await?;
                    processed += 1;
                }
            }
        }

        self.flatten().await?;

        let stats = self.session.lock().await.stats().clone();
        Ok(RunSummary {
            started_at,
            finished_at: Utc::now(),
            ticks_processed: processed,
            interrupted,
            start_balance: self.start_balance,
            final_balance: self.balance,
            max_drawdown_pct: self.max_drawdown_pct,
            exits_by_reason: self.exits_by_reason.clone(),
            stats,
            last_basket: self.last_basket.clone(),
        })
    }

    fn pacer(&self) -> Option<Interval> {
        if self.settings.interval.is_zero() {
            return None;
        }
        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Some(ticker)
    }

    /// One feed tick through the session.
    pub async fn step(&mut self) -> Result<TickOutcome> {
        let tick = self.feed.next_tick();
        let shared = Arc::clone(&self.session);
        let mut session = shared.lock().await;

        let outcome = session.on_tick(&tick)?;
        match &outcome {
            TickOutcome::Closed(report) => {
                self.record_close(report);
            }
            TickOutcome::Idle => {
                if self.cooldown > 0 {
                    self.cooldown -= 1;
                } else {
                    let account = AccountSnapshot::flat(self.balance);
                    match session.try_open(self.next_direction, tick.price, &account)? {
                        OpenOutcome::Opened(id) => {
                            debug!(basket_id = %id, price = %tick.price, "Entry filled");
                        }
                        OpenOutcome::Blocked(_) => {
                            self.cooldown = self.settings.reentry_delay_ticks;
                        }
                    }
                }
            }
            TickOutcome::Held | TickOutcome::Added { .. } => {}
        }

        let equity = self.balance + session.baskets().unrealized_profit(tick.price);
        self.observe_equity(equity);

        Ok(outcome)
    }

    async fn flatten(&mut self) -> Result<()> {
        let price = self.feed.price();
        let closed = self.session.lock().await.flatten(price)?;
        if let Some(report) = closed {
            self.record_close(&report);
            self.observe_equity(self.balance);
        }
        Ok(())
    }

    fn record_close(&mut self, report: &ClosedBasket) {
        self.balance += report.realized_pnl;
        *self
            .exits_by_reason
            .entry(report.reason.as_str().to_string())
            .or_default() += 1;
        self.cooldown = self.settings.reentry_delay_ticks;
        if self.settings.entry == EntryPolicy::Alternate {
            self.next_direction = report.direction.opposite();
        }
        self.last_basket = Some(report.clone());
    }

    fn observe_equity(&mut self, equity: Decimal) {
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        if self.peak_equity > Decimal::ZERO {
            let drawdown = (self.peak_equity - equity) / self.peak_equity * Decimal::ONE_HUNDRED;
            self.max_drawdown_pct = self.max_drawdown_pct.max(drawdown);
        }
    }
}

async fn pace(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => tokio::task::yield_now().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basket_core::config::Config;
    use trading_engine::{SystemClock, TracingTelemetry, TradingSession};

    fn simulator(entry: EntryPolicy, ticks: u64) -> Simulator {
        let config = Config::default();
        let balance = Decimal::new(10000, 0);
        let session = TradingSession::new(
            &config,
            Box::new(TracingTelemetry),
            Box::new(SystemClock),
            &AccountSnapshot::flat(balance),
        )
        .unwrap()
        .shared();
        let feed = SyntheticFeed::new(42, Decimal::new(200000, 2), config.instrument().pip_size, 4, 10);
        let settings = RunSettings {
            ticks,
            interval: Duration::ZERO,
            entry,
            reentry_delay_ticks: 5,
        };
        Simulator::new(session, feed, settings, balance)
    }

    #[tokio::test]
    async fn test_run_processes_all_ticks_and_ends_flat() {
        let mut sim = simulator(EntryPolicy::Long, 2000);
        let summary = sim.run().await.unwrap();

        assert_eq!(summary.ticks_processed, 2000);
        assert!(!summary.interrupted);
        assert!(summary.stats.baskets_opened > 0);
        assert_eq!(summary.stats.baskets_opened, summary.stats.baskets_closed);
        assert_eq!(
            summary.final_balance,
            summary.start_balance + summary.stats.realized_pnl
        );
        assert!(!sim.session.lock().await.baskets().phase().is_open());
    }

    #[tokio::test]
    async fn test_first_tick_opens_basket() {
        let mut sim = simulator(EntryPolicy::Short, 1);
        let outcome = sim.step().await.unwrap();

        assert!(matches!(outcome, TickOutcome::Idle));
        let session = sim.session.lock().await;
        assert_eq!(session.status().direction, Some(Direction::Short));
    }

    #[tokio::test]
    async fn test_alternate_flips_after_close() {
        let mut sim = simulator(EntryPolicy::Alternate, 1);
        sim.step().await.unwrap();
        sim.flatten().await.unwrap();

        assert_eq!(sim.next_direction, Direction::Short);
        assert_eq!(sim.exits_by_reason.get("MANUAL"), Some(&1));
    }
}
