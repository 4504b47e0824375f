//! Core domain types for the basket engine.

pub mod account;
pub mod basket;
pub mod instrument;
pub mod market;

pub use account::*;
pub use basket::*;
pub use instrument::*;
pub use market::*;
