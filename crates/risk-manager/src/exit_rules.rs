//! Ordered exit conditions for an open basket.
//!
//! Conditions are evaluated in ladder order and the first one that fires wins.
//! The hard stop always sits first so no trailing rule can shadow it, and every
//! rule after it is inert until the basket has been armed.

use basket_core::config::StrategyConfig;
use basket_core::types::Direction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Why a basket was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Loss reached the fail-fast cap.
    HardStop,
    /// Price retraced through vwap and buffer after arming.
    BreakevenStop,
    /// Price retraced from its best level by more than k x ATR.
    AtrTrail,
    /// Too much of the maximum favorable excursion was given back.
    TrailGiveback,
    /// Closed on request of the driver (shutdown, flatten).
    Manual,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::HardStop => "HARD_STOP",
            ExitReason::BreakevenStop => "BE_STOP",
            ExitReason::AtrTrail => "ATR_TRAIL",
            ExitReason::TrailGiveback => "TRAIL_GIVEBACK",
            ExitReason::Manual => "MANUAL",
        }
    }
}

/// Result of a close check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseDecision {
    Hold,
    Close(ExitReason),
}

impl CloseDecision {
    pub fn is_close(&self) -> bool {
        matches!(self, CloseDecision::Close(_))
    }

    pub fn reason(&self) -> Option<ExitReason> {
        match self {
            CloseDecision::Close(reason) => Some(*reason),
            CloseDecision::Hold => None,
        }
    }
}

/// Snapshot of a basket needed to evaluate exit conditions.
#[derive(Debug, Clone)]
pub struct ExitContext {
    pub direction: Direction,
    pub price: Decimal,
    pub vwap: Decimal,
    pub best_price: Decimal,
    /// Unrealized profit at `price`.
    pub profit: Decimal,
    /// Best unrealized profit since open.
    pub mfe_profit: Decimal,
    pub armed: bool,
    /// Current ATR in pips, if the feed supplied one.
    pub atr_pips: Option<Decimal>,
    pub ticks_open: u32,
    pub pip_size: Decimal,
}

/// Individual exit condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExitCondition {
    /// Loss reaches `max_loss`, armed or not.
    HardStop { max_loss: Decimal },
    /// Price crosses vwap minus (long) or plus (short) `buffer_pips`.
    BreakevenStop { buffer_pips: Decimal },
    /// Price retraces from best price by more than `atr_multiple` x ATR.
    AtrTrail { atr_multiple: Decimal },
    /// Profit falls to `mfe x (1 - giveback_pct)` once MFE exceeds `min_profit`.
    Giveback {
        giveback_pct: Decimal,
        min_profit: Decimal,
        min_ticks: u32,
    },
}

impl ExitCondition {
    pub fn reason(&self) -> ExitReason {
        match self {
            ExitCondition::HardStop { .. } => ExitReason::HardStop,
            ExitCondition::BreakevenStop { .. } => ExitReason::BreakevenStop,
            ExitCondition::AtrTrail { .. } => ExitReason::AtrTrail,
            ExitCondition::Giveback { .. } => ExitReason::TrailGiveback,
        }
    }

    /// Evaluate if this condition is triggered.
    pub fn evaluate(&self, ctx: &ExitContext) -> bool {
        match self {
            ExitCondition::HardStop { max_loss } => ctx.profit <= -*max_loss,
            ExitCondition::BreakevenStop { buffer_pips } => {
                if !ctx.armed {
                    return false;
                }
                let buffer = *buffer_pips * ctx.pip_size;
                match ctx.direction {
                    Direction::Long => ctx.price <= ctx.vwap - buffer,
                    Direction::Short => ctx.price >= ctx.vwap + buffer,
                }
            }
            ExitCondition::AtrTrail { atr_multiple } => {
                let Some(atr_pips) = ctx.atr_pips else {
                    return false;
                };
                if !ctx.armed {
                    return false;
                }
                let distance = atr_pips * *atr_multiple * ctx.pip_size;
                match ctx.direction {
                    Direction::Long => ctx.price < ctx.best_price - distance,
                    Direction::Short => ctx.price > ctx.best_price + distance,
                }
            }
            ExitCondition::Giveback {
                giveback_pct,
                min_profit,
                min_ticks,
            } => {
                if !ctx.armed || ctx.ticks_open < *min_ticks {
                    return false;
                }
                let floor = (*min_profit).max(Decimal::ZERO);
                if ctx.mfe_profit <= floor {
                    return false;
                }
                ctx.profit <= ctx.mfe_profit * (Decimal::ONE - *giveback_pct)
            }
        }
    }
}

/// Exit conditions in precedence order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExitLadder {
    conditions: Vec<ExitCondition>,
}

impl ExitLadder {
    /// Build a ladder from an explicit list; order is precedence.
    pub fn new(conditions: Vec<ExitCondition>) -> Self {
        Self { conditions }
    }

    /// Standard ladder: hard stop, breakeven, ATR trail, giveback.
    /// Disabled rules are left out.
    pub fn from_config(config: &StrategyConfig) -> Self {
        let mut conditions = Vec::with_capacity(4);

        if config.hard_stop_dollars > Decimal::ZERO {
            conditions.push(ExitCondition::HardStop {
                max_loss: config.hard_stop_dollars,
            });
        }
        conditions.push(ExitCondition::BreakevenStop {
            buffer_pips: config.be_buffer_pips,
        });
        if config.trail_atr_k > Decimal::ZERO {
            conditions.push(ExitCondition::AtrTrail {
                atr_multiple: config.trail_atr_k,
            });
        }
        if config.trail_enabled {
            conditions.push(ExitCondition::Giveback {
                giveback_pct: config.trail_giveback_pct,
                min_profit: config.trail_min_profit,
                min_ticks: config.min_ticks_for_trail,
            });
        }

        Self { conditions }
    }

    pub fn conditions(&self) -> &[ExitCondition] {
        &self.conditions
    }

    /// First triggered condition wins.
    pub fn check(&self, ctx: &ExitContext) -> CloseDecision {
        for condition in &self.conditions {
            if condition.evaluate(ctx) {
                debug!(
                    reason = condition.reason().as_str(),
                    price = %ctx.price,
                    profit = %ctx.profit,
                    mfe = %ctx.mfe_profit,
                    "Exit condition triggered"
                );
                return CloseDecision::Close(condition.reason());
            }
        }
        CloseDecision::Hold
    }
}
