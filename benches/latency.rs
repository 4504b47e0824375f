//! Latency benchmarks for per-tick basket operations.
//!
//! Run with: `cargo bench --bench latency`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use chrono::Utc;
use rust_decimal::Decimal;

use basket_core::config::StrategyConfig;
use basket_core::types::{Direction, Instrument, PriceBar};
use risk_manager::{AtrTracker, ExitContext, ExitLadder};
use trading_engine::BasketStateMachine;

fn gold() -> Instrument {
    Instrument::for_symbol("XAUUSD")
}

/// Full exit ladder: hard stop, breakeven, ATR trail, giveback.
fn full_ladder_config() -> StrategyConfig {
    StrategyConfig {
        hard_stop_dollars: Decimal::new(50, 0),
        trail_atr_k: Decimal::new(15, 1),
        ..Default::default()
    }
}

/// Build an armed basket with `entries` fills stepping up in price.
fn armed_basket(entries: usize) -> BasketStateMachine {
    let config = StrategyConfig {
        max_positions: entries.max(1),
        volume_multiplier: Decimal::ONE,
        ..full_ladder_config()
    };
    let mut sm = BasketStateMachine::new(config, gold()).expect("valid config");
    sm.open_basket(Direction::Long, Decimal::new(200000, 2))
        .expect("idle");
    for i in 1..entries {
        sm.add_to_basket(Decimal::new(200000 + i as i64 * 10, 2))
            .expect("within caps");
    }
    sm.on_tick(Decimal::new(201000, 2));
    sm
}

/// Benchmark the close decision on a live basket.
fn bench_close_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("close_check");

    for entries in [1usize, 3, 6].iter() {
        let sm = armed_basket(*entries);
        let atr = Some(Decimal::new(25, 0));

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("hold", entries), &sm, |b, sm| {
            b.iter(|| black_box(sm.should_close_basket(black_box(Decimal::new(200990, 2)), atr)))
        });
        group.bench_with_input(BenchmarkId::new("close", entries), &sm, |b, sm| {
            b.iter(|| black_box(sm.should_close_basket(black_box(Decimal::new(199000, 2)), atr)))
        });
    }

    group.finish();
}

/// Benchmark the trailing update run on every tick.
fn bench_trailing_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("trailing_update");

    group.bench_function("on_tick", |b| {
        let mut sm = armed_basket(4);
        let mut up = true;
        b.iter(|| {
            let price = if up {
                Decimal::new(201010, 2)
            } else {
                Decimal::new(200990, 2)
            };
            up = !up;
            sm.on_tick(black_box(price));
        })
    });

    group.bench_function("should_add", |b| {
        let sm = armed_basket(2);
        b.iter(|| black_box(sm.should_add_to_basket(black_box(Decimal::new(201100, 2)))))
    });

    group.finish();
}

/// Benchmark the exit ladder in isolation.
fn bench_exit_ladder(c: &mut Criterion) {
    let ladder = ExitLadder::from_config(&full_ladder_config());
    let ctx = ExitContext {
        direction: Direction::Long,
        price: Decimal::new(200950, 2),
        vwap: Decimal::new(200500, 2),
        best_price: Decimal::new(201000, 2),
        profit: Decimal::new(45, 0),
        mfe_profit: Decimal::new(60, 0),
        armed: true,
        atr_pips: Some(Decimal::new(25, 0)),
        ticks_open: 100,
        pip_size: Decimal::new(1, 2),
    };

    c.bench_function("exit_ladder_check", |b| {
        b.iter(|| black_box(ladder.check(black_box(&ctx))))
    });
}

/// Benchmark ATR bar ingestion.
fn bench_atr_update(c: &mut Criterion) {
    let mut tracker = AtrTracker::default();
    let mut close = 200000i64;

    c.bench_function("atr_add_bar", |b| {
        b.iter(|| {
            close += if close % 3 == 0 { 7 } else { -5 };
            tracker.add_bar(PriceBar {
                high: Decimal::new(close + 12, 2),
                low: Decimal::new(close - 9, 2),
                close: Decimal::new(close, 2),
                timestamp: Utc::now(),
            });
            black_box(tracker.atr_pips(Decimal::new(1, 2)))
        })
    });
}

/// Benchmark Decimal pip math (hot path inside every profit calculation).
fn bench_profit_math(c: &mut Criterion) {
    let instrument = gold();
    let vwap = Decimal::new(200512, 2);
    let volume = Decimal::new(13, 2);

    c.bench_function("instrument_profit", |b| {
        b.iter(|| {
            black_box(instrument.profit(
                Direction::Short,
                black_box(vwap),
                black_box(Decimal::new(200437, 2)),
                volume,
            ))
        })
    });
}

criterion_group!(
    benches,
    bench_close_check,
    bench_trailing_update,
    bench_exit_ladder,
    bench_atr_update,
    bench_profit_math,
);

criterion_main!(benches);
