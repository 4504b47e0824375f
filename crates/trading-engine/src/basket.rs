//! Pyramiding basket lifecycle.
//!
//! A basket is a set of same-direction entries managed as one unit. It is
//! opened with a single entry, grows while price keeps moving in its favor,
//! and is closed as a whole when the exit ladder fires.

use basket_core::config::StrategyConfig;
use basket_core::types::{
    total_volume, volume_weighted_price, BasketPhase, Direction, Entry, Instrument,
};
use basket_core::{Error, Result};
use chrono::{DateTime, Utc};
use risk_manager::{CloseDecision, ExitContext, ExitLadder, ExitReason};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

/// The live basket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Basket {
    pub id: Uuid,
    pub direction: Direction,
    /// Fills in the order they were made.
    pub entries: Vec<Entry>,
    pub volume: Decimal,
    pub vwap: Decimal,
    /// Once set, stays set until the basket closes.
    pub armed: bool,
    /// Most favorable price seen since open.
    pub best_price: Decimal,
    /// Maximum favorable excursion in account currency. Never decreases.
    pub mfe_profit: Decimal,
    pub opened_at_price: Decimal,
    pub opened_at: DateTime<Utc>,
    pub ticks_open: u32,
    pub grace_ticks_remaining: u32,
    /// Whether the most recent tick fell inside the restore grace period.
    #[serde(skip)]
    in_grace: bool,
}

impl Basket {
    fn new(direction: Direction, entries: Vec<Entry>) -> Self {
        let opened_at_price = entries.first().map(|e| e.price).unwrap_or_default();
        let mut basket = Self {
            id: Uuid::new_v4(),
            direction,
            entries,
            volume: Decimal::ZERO,
            vwap: Decimal::ZERO,
            armed: false,
            best_price: opened_at_price,
            mfe_profit: Decimal::ZERO,
            opened_at_price,
            opened_at: Utc::now(),
            ticks_open: 0,
            grace_ticks_remaining: 0,
            in_grace: false,
        };
        basket.recompute();
        basket
    }

    fn recompute(&mut self) {
        self.volume = total_volume(&self.entries);
        self.vwap = volume_weighted_price(&self.entries);
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn last_entry(&self) -> Option<&Entry> {
        self.entries.last()
    }

    pub fn phase(&self) -> BasketPhase {
        if self.armed {
            BasketPhase::OpenArmed
        } else {
            BasketPhase::Open
        }
    }
}

/// Report produced when a basket is closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedBasket {
    pub id: Uuid,
    pub direction: Direction,
    pub entry_count: usize,
    pub volume: Decimal,
    pub vwap: Decimal,
    pub close_price: Decimal,
    pub realized_pnl: Decimal,
    pub mfe_profit: Decimal,
    pub reason: ExitReason,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
}

/// Serializable view of the state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasketStatus {
    pub phase: BasketPhase,
    pub basket_id: Option<Uuid>,
    pub direction: Option<Direction>,
    pub entries: Vec<Entry>,
    pub volume: Decimal,
    pub vwap: Decimal,
    pub mfe_profit: Decimal,
    pub armed: bool,
    pub best_price: Option<Decimal>,
}

impl BasketStatus {
    fn idle() -> Self {
        Self {
            phase: BasketPhase::Idle,
            basket_id: None,
            direction: None,
            entries: Vec::new(),
            volume: Decimal::ZERO,
            vwap: Decimal::ZERO,
            mfe_profit: Decimal::ZERO,
            armed: false,
            best_price: None,
        }
    }
}

/// Owns at most one basket and drives it through Idle, Open and OpenArmed.
#[derive(Debug, Clone)]
pub struct BasketStateMachine {
    config: StrategyConfig,
    instrument: Instrument,
    ladder: ExitLadder,
    basket: Option<Basket>,
}

impl BasketStateMachine {
    #[allow(clippy::result_large_err)]
    pub fn new(config: StrategyConfig, instrument: Instrument) -> Result<Self> {
        config.validate()?;
        if instrument.pip_size <= Decimal::ZERO {
            return Err(Error::configuration("pip_size must be positive"));
        }
        if instrument.volume_step <= Decimal::ZERO {
            return Err(Error::configuration("volume_step must be positive"));
        }
        config.validate_for(&instrument)?;

        let ladder = ExitLadder::from_config(&config);
        Ok(Self {
            config,
            instrument,
            ladder,
            basket: None,
        })
    }

    pub fn phase(&self) -> BasketPhase {
        self.basket
            .as_ref()
            .map(Basket::phase)
            .unwrap_or(BasketPhase::Idle)
    }

    pub fn basket(&self) -> Option<&Basket> {
        self.basket.as_ref()
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn ladder(&self) -> &ExitLadder {
        &self.ladder
    }

    /// Open a basket with a single entry at `price`.
    #[allow(clippy::result_large_err)]
    pub fn open_basket(&mut self, direction: Direction, price: Decimal) -> Result<&Basket> {
        if self.basket.is_some() {
            return Err(Error::InvalidState {
                operation: "open basket",
                phase: self.phase(),
            });
        }

        let volume = self.instrument.normalize_volume(self.config.initial_volume);
        let basket = Basket::new(direction, vec![Entry::new(price, volume)]);

        debug!(
            basket_id = %basket.id,
            direction = %direction,
            price = %price,
            volume = %volume,
            "Basket opened"
        );

        Ok(&*self.basket.insert(basket))
    }

    /// Volume of the next add: previous entry volume times the multiplier, on the lot grid.
    pub fn next_volume(&self) -> Decimal {
        let last = self
            .basket
            .as_ref()
            .and_then(Basket::last_entry)
            .map(|e| e.volume)
            .unwrap_or(self.config.initial_volume);
        self.instrument
            .normalize_volume(last * self.config.volume_multiplier)
    }

    fn within_caps(&self, basket: &Basket) -> bool {
        basket.entry_count() < self.config.max_positions
            && basket.volume + self.next_volume() <= self.config.max_total_volume
    }

    /// Whether price has moved far enough in the basket's favor to add another entry.
    pub fn should_add_to_basket(&self, price: Decimal) -> bool {
        let Some(basket) = &self.basket else {
            return false;
        };
        let Some(last) = basket.last_entry() else {
            return false;
        };

        let moved = basket.direction.favorable_move(last.price, price);
        if moved <= Decimal::ZERO {
            return false;
        }
        if self.instrument.to_pips(moved) < self.config.add_distance_pips {
            return false;
        }

        self.within_caps(basket)
    }

    /// Append an entry at `price`. Arms the basket on its first add when configured to.
    #[allow(clippy::result_large_err)]
    pub fn add_to_basket(&mut self, price: Decimal) -> Result<&Basket> {
        let phase = self.phase();
        let volume = self.next_volume();
        let allowed = self.basket.as_ref().map(|b| self.within_caps(b));

        let basket = match (self.basket.as_mut(), allowed) {
            (Some(basket), Some(true)) => basket,
            _ => {
                return Err(Error::InvalidState {
                    operation: "add to basket",
                    phase,
                })
            }
        };

        basket.entries.push(Entry::new(price, volume));
        basket.recompute();
        if !basket.armed
            && self.config.arm_after_add
            && basket.ticks_open >= self.config.min_ticks_for_be
        {
            basket.armed = true;
        }

        debug!(
            basket_id = %basket.id,
            price = %price,
            volume = %volume,
            entries = basket.entry_count(),
            vwap = %basket.vwap,
            armed = basket.armed,
            "Added to basket"
        );

        Ok(&*basket)
    }

    /// Trailing update; call once per tick before any close or add check.
    ///
    /// Ticks inside the restore grace period only advance the counters.
    pub fn on_tick(&mut self, price: Decimal) {
        let instrument = &self.instrument;
        let config = &self.config;
        let Some(basket) = self.basket.as_mut() else {
            return;
        };

        basket.ticks_open = basket.ticks_open.saturating_add(1);
        basket.in_grace = basket.grace_ticks_remaining > 0;
        if basket.in_grace {
            basket.grace_ticks_remaining -= 1;
            return;
        }

        if basket.direction.is_better(price, basket.best_price) {
            basket.best_price = price;
        }

        let profit = instrument.profit(basket.direction, basket.vwap, price, basket.volume);
        if profit > basket.mfe_profit {
            basket.mfe_profit = profit;
        }

        if basket.armed || basket.ticks_open < config.min_ticks_for_be {
            return;
        }
        let after_add = config.arm_after_add && basket.entry_count() >= 2;
        let on_profit =
            config.arm_profit_dollars > Decimal::ZERO && profit >= config.arm_profit_dollars;
        if after_add || on_profit {
            basket.armed = true;
            debug!(
                basket_id = %basket.id,
                profit = %profit,
                ticks_open = basket.ticks_open,
                "Basket armed"
            );
        }
    }

    /// Unrealized profit at `price`; zero when idle.
    pub fn unrealized_profit(&self, price: Decimal) -> Decimal {
        self.basket
            .as_ref()
            .map(|b| {
                self.instrument
                    .profit(b.direction, b.vwap, price, b.volume)
            })
            .unwrap_or(Decimal::ZERO)
    }

    /// Run the exit ladder against `price`.
    pub fn should_close_basket(&self, price: Decimal, atr_pips: Option<Decimal>) -> CloseDecision {
        let Some(basket) = &self.basket else {
            return CloseDecision::Hold;
        };
        if basket.in_grace {
            return CloseDecision::Hold;
        }

        let ctx = ExitContext {
            direction: basket.direction,
            price,
            vwap: basket.vwap,
            best_price: basket.best_price,
            profit: self.unrealized_profit(price),
            mfe_profit: basket.mfe_profit,
            armed: basket.armed,
            atr_pips,
            ticks_open: basket.ticks_open,
            pip_size: self.instrument.pip_size,
        };
        self.ladder.check(&ctx)
    }

    /// Close the basket at `price` and return to Idle.
    #[allow(clippy::result_large_err)]
    pub fn close_basket(&mut self, price: Decimal, reason: ExitReason) -> Result<ClosedBasket> {
        let Some(basket) = self.basket.take() else {
            return Err(Error::InvalidState {
                operation: "close basket",
                phase: BasketPhase::Idle,
            });
        };

        let realized_pnl =
            self.instrument
                .profit(basket.direction, basket.vwap, price, basket.volume);

        debug!(
            basket_id = %basket.id,
            reason = reason.as_str(),
            price = %price,
            pnl = %realized_pnl,
            "Basket closed"
        );

        Ok(ClosedBasket {
            id: basket.id,
            direction: basket.direction,
            entry_count: basket.entry_count(),
            volume: basket.volume,
            vwap: basket.vwap,
            close_price: price,
            realized_pnl,
            mfe_profit: basket.mfe_profit,
            reason,
            opened_at: basket.opened_at,
            closed_at: Utc::now(),
        })
    }

    /// Rebuild a basket from entries already held at the broker.
    ///
    /// Close checks are suppressed for `resume_grace_ticks` ticks afterwards.
    #[allow(clippy::result_large_err)]
    pub fn restore_basket(&mut self, direction: Direction, entries: Vec<Entry>) -> Result<&Basket> {
        if self.basket.is_some() {
            return Err(Error::InvalidState {
                operation: "restore basket",
                phase: self.phase(),
            });
        }
        if entries.is_empty() {
            return Err(Error::invalid_input("cannot restore a basket without entries"));
        }

        let mut basket = Basket::new(direction, entries);
        basket.armed = self.config.arm_after_add && basket.entry_count() >= 2;
        basket.best_price = basket
            .entries
            .iter()
            .map(|e| e.price)
            .fold(basket.opened_at_price, |best, p| {
                if direction.is_better(p, best) {
                    p
                } else {
                    best
                }
            });
        basket.grace_ticks_remaining = self.config.resume_grace_ticks;
        basket.in_grace = basket.grace_ticks_remaining > 0;

        if basket.entry_count() > self.config.max_positions
            || basket.volume > self.config.max_total_volume
        {
            warn!(
                entries = basket.entry_count(),
                volume = %basket.volume,
                "Restored basket exceeds configured caps; no further adds"
            );
        }

        debug!(
            basket_id = %basket.id,
            direction = %direction,
            entries = basket.entry_count(),
            vwap = %basket.vwap,
            armed = basket.armed,
            "Basket restored"
        );

        Ok(&*self.basket.insert(basket))
    }

    pub fn status(&self) -> BasketStatus {
        match &self.basket {
            None => BasketStatus::idle(),
            Some(basket) => BasketStatus {
                phase: basket.phase(),
                basket_id: Some(basket.id),
                direction: Some(basket.direction),
                entries: basket.entries.clone(),
                volume: basket.volume,
                vwap: basket.vwap,
                mfe_profit: basket.mfe_profit,
                armed: basket.armed,
                best_price: Some(basket.best_price),
            },
        }
    }
}
