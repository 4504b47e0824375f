//! Configuration management for the basket engine.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `BASKET_*` environment variables (`BASKET_STRATEGY__HARD_STOP_DOLLARS=25`).
//! Every value is range-checked once by [`Config::validate`] so the engine never
//! has to guard against nonsensical parameters at tick time.

use config::{Environment, File, FileFormat};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::types::Instrument;
use crate::{Error, Result};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Traded symbol; drives the instrument defaults.
    pub symbol: String,
    pub instrument: InstrumentConfig,
    pub strategy: StrategyConfig,
    pub risk: RiskConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbol: "XAUUSD".to_string(),
            instrument: InstrumentConfig::default(),
            strategy: StrategyConfig::default(),
            risk: RiskConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Optional overrides of the pip math inferred from the symbol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    pub pip_size: Option<Decimal>,
    pub pip_value_per_lot: Option<Decimal>,
    pub volume_step: Option<Decimal>,
    pub min_volume: Option<Decimal>,
}

/// Basket sizing, pyramiding and exit parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Lot size of the first entry.
    pub initial_volume: Decimal,
    /// Minimum favorable move from the last entry before adding.
    pub add_distance_pips: Decimal,
    /// Each add is the previous entry's volume times this.
    pub volume_multiplier: Decimal,
    /// Maximum entries per basket.
    pub max_positions: usize,
    /// Maximum summed volume per basket.
    pub max_total_volume: Decimal,
    /// Loss that closes the basket unconditionally. Zero disables.
    pub hard_stop_dollars: Decimal,
    /// Distance below (long) or above (short) vwap for the breakeven stop.
    pub be_buffer_pips: Decimal,
    /// Fraction of MFE that may be surrendered before closing.
    pub trail_giveback_pct: Decimal,
    /// ATR multiple for the volatility trail. Zero disables.
    pub trail_atr_k: Decimal,
    /// Whether the MFE giveback rule is active.
    pub trail_enabled: bool,
    /// MFE must exceed this before the giveback rule can fire.
    pub trail_min_profit: Decimal,
    /// Ticks a basket must have been open before the giveback rule can fire.
    pub min_ticks_for_trail: u32,
    /// Arm the breakeven stop on the first add.
    pub arm_after_add: bool,
    /// Ticks a basket must have been open before it can arm.
    pub min_ticks_for_be: u32,
    /// Arm the breakeven stop once unrealized profit reaches this. Zero disables.
    pub arm_profit_dollars: Decimal,
    /// Ticks of suppressed exits after restoring a basket from the broker.
    pub resume_grace_ticks: u32,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            initial_volume: Decimal::new(2, 2),     // 0.02 lots
            add_distance_pips: Decimal::new(5, 0),  // 5 pips
            volume_multiplier: Decimal::new(11, 1), // 1.1x
            max_positions: 6,
            max_total_volume: Decimal::new(2, 0),
            hard_stop_dollars: Decimal::ZERO,
            be_buffer_pips: Decimal::ONE,
            trail_giveback_pct: Decimal::new(4, 1), // 40%
            trail_atr_k: Decimal::ZERO,
            trail_enabled: true,
            trail_min_profit: Decimal::ZERO,
            min_ticks_for_trail: 0,
            arm_after_add: true,
            min_ticks_for_be: 0,
            arm_profit_dollars: Decimal::ZERO,
            resume_grace_ticks: 3,
        }
    }
}

/// Account-level gating thresholds, both in percent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub daily_loss_limit_percent: Decimal,
    pub max_drawdown_percent: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            daily_loss_limit_percent: Decimal::new(5, 0),
            max_drawdown_percent: Decimal::new(10, 0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit JSON lines instead of the human-readable format.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file and `BASKET_*` environment variables.
    #[allow(clippy::result_large_err)]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("BASKET")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;

        info!(
            symbol = %config.symbol,
            file = ?path,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    #[allow(clippy::result_large_err)]
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?;
        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Range-check every section.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(Error::configuration("symbol must not be empty"));
        }
        self.instrument.validate()?;
        self.strategy.validate()?;
        self.strategy.validate_for(&self.instrument())?;
        self.risk.validate()?;
        Ok(())
    }

    /// Instrument for the configured symbol with overrides applied.
    pub fn instrument(&self) -> Instrument {
        Instrument::from_config(&self.symbol, &self.instrument)
    }
}

impl InstrumentConfig {
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("instrument.pip_size", self.pip_size),
            ("instrument.pip_value_per_lot", self.pip_value_per_lot),
            ("instrument.volume_step", self.volume_step),
            ("instrument.min_volume", self.min_volume),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                require_positive(name, value)?;
            }
        }
        Ok(())
    }
}

impl StrategyConfig {
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        require_positive("strategy.initial_volume", self.initial_volume)?;
        require_positive("strategy.add_distance_pips", self.add_distance_pips)?;
        require_positive("strategy.volume_multiplier", self.volume_multiplier)?;
        require_positive("strategy.max_total_volume", self.max_total_volume)?;
        require_non_negative("strategy.hard_stop_dollars", self.hard_stop_dollars)?;
        require_non_negative("strategy.be_buffer_pips", self.be_buffer_pips)?;
        require_non_negative("strategy.trail_atr_k", self.trail_atr_k)?;
        require_non_negative("strategy.trail_min_profit", self.trail_min_profit)?;
        require_non_negative("strategy.arm_profit_dollars", self.arm_profit_dollars)?;

        if self.max_positions == 0 {
            return Err(Error::configuration(
                "strategy.max_positions must be at least 1",
            ));
        }
        if self.trail_giveback_pct < Decimal::ZERO || self.trail_giveback_pct > Decimal::ONE {
            return Err(Error::configuration(format!(
                "strategy.trail_giveback_pct must be within [0, 1], got {}",
                self.trail_giveback_pct
            )));
        }
        if self.initial_volume > self.max_total_volume {
            return Err(Error::configuration(format!(
                "strategy.initial_volume ({}) exceeds strategy.max_total_volume ({})",
                self.initial_volume, self.max_total_volume
            )));
        }
        Ok(())
    }

    /// Check sizing against the lot grid of `instrument`.
    #[allow(clippy::result_large_err)]
    pub fn validate_for(&self, instrument: &Instrument) -> Result<()> {
        let first = instrument.normalize_volume(self.initial_volume);
        if first > self.max_total_volume {
            return Err(Error::configuration(format!(
                "strategy.initial_volume ({}) normalizes to {} for {}, above strategy.max_total_volume ({})",
                self.initial_volume, first, instrument.symbol, self.max_total_volume
            )));
        }
        Ok(())
    }
}

impl RiskConfig {
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        require_percent("risk.daily_loss_limit_percent", self.daily_loss_limit_percent)?;
        require_percent("risk.max_drawdown_percent", self.max_drawdown_percent)?;
        Ok(())
    }
}

#[allow(clippy::result_large_err)]
fn require_positive(name: &str, value: Decimal) -> Result<()> {
    if value <= Decimal::ZERO {
        return Err(Error::configuration(format!(
            "{} must be positive, got {}",
            name, value
        )));
    }
    Ok(())
}

#[allow(clippy::result_large_err)]
fn require_non_negative(name: &str, value: Decimal) -> Result<()> {
    if value < Decimal::ZERO {
        return Err(Error::configuration(format!(
            "{} must not be negative, got {}",
            name, value
        )));
    }
    Ok(())
}

#[allow(clippy::result_large_err)]
fn require_percent(name: &str, value: Decimal) -> Result<()> {
    if value <= Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(Error::configuration(format!(
            "{} must be within (0, 100], got {}",
            name, value
        )));
    }
    Ok(())
}
