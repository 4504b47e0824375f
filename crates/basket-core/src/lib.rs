//! Basket Core Library
//!
//! Shared types, instrument pip math and configuration for the basket engine.

pub mod config;
pub mod error;
pub mod types;

pub use error::{Error, Result};
