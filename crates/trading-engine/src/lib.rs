//! Trading Engine
//!
//! Pyramiding basket state machine and the per-tick trading session that drives it.

pub mod basket;
pub mod session;

pub use basket::{Basket, BasketStateMachine, BasketStatus, ClosedBasket};
pub use session::{
    OpenOutcome, SessionStats, SharedSession, SystemClock, TelemetrySink, TickOutcome,
    TracingTelemetry, TradingClock, TradingSession,
};
