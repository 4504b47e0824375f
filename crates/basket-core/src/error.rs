//! Error types for the basket engine.

use thiserror::Error;

use crate::types::BasketPhase;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot {operation} while basket is {phase}")]
    InvalidState {
        operation: &'static str,
        phase: BasketPhase,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] config::ConfigError),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Whether this error was raised for an operation attempted in the wrong phase.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
