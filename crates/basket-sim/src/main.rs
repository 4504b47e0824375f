//! Basket Simulator
//!
//! Paper-trades the basket engine against a seeded synthetic price feed.

mod feed;
mod runner;

use anyhow::Result;
use basket_core::config::{Config, LoggingConfig};
use basket_core::types::AccountSnapshot;
use clap::Parser;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use trading_engine::{SystemClock, TracingTelemetry, TradingSession};

use crate::feed::SyntheticFeed;
use crate::runner::{EntryPolicy, RunSettings, Simulator};

#[derive(Parser)]
#[command(name = "basket-sim")]
#[command(about = "Paper-trade the pyramiding basket engine on a synthetic feed", long_about = None)]
struct Cli {
    /// TOML configuration file (BASKET_* environment variables override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of ticks to simulate
    #[arg(short, long, default_value = "5000")]
    ticks: u64,

    /// Seed for the price feed
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Direction of new baskets
    #[arg(short, long, value_enum, default_value = "alternate")]
    direction: EntryPolicy,

    /// Milliseconds between ticks (0 = as fast as possible)
    #[arg(long, default_value = "0")]
    interval_ms: u64,

    /// Opening price of the feed
    #[arg(long, default_value = "2000.00")]
    start_price: Decimal,

    /// Starting account balance
    #[arg(long, default_value = "10000")]
    balance: Decimal,

    /// Largest random move per tick, in pips
    #[arg(long, default_value = "4")]
    max_step_pips: i64,

    /// Ticks per ATR bar
    #[arg(long, default_value = "20")]
    bar_ticks: u32,

    /// Idle ticks between a close and the next entry
    #[arg(long, default_value = "10")]
    reentry_delay: u32,
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter.as_str()));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    init_logging(&config.logging);

    let instrument = config.instrument();
    info!(
        symbol = %instrument.symbol,
        pip_size = %instrument.pip_size,
        ticks = cli.ticks,
        seed = cli.seed,
        "Starting basket simulator"
    );

    let account = AccountSnapshot::flat(cli.balance);
    let session = TradingSession::new(
        &config,
        Box::new(TracingTelemetry),
        Box::new(SystemClock),
        &account,
    )?
    .shared();

    let feed = SyntheticFeed::new(
        cli.seed,
        cli.start_price,
        instrument.pip_size,
        cli.max_step_pips,
        cli.bar_ticks,
    );
    let settings = RunSettings {
        ticks: cli.ticks,
        interval: Duration::from_millis(cli.interval_ms),
        entry: cli.direction,
        reentry_delay_ticks: cli.reentry_delay,
    };

    let mut simulator = Simulator::new(session, feed, settings, cli.balance);
    let summary = simulator.run().await?;

    info!(
        baskets = summary.stats.baskets_closed,
        pnl = %summary.stats.realized_pnl,
        final_balance = %summary.final_balance,
        "Simulation finished"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
