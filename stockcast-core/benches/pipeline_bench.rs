//! Criterion benchmarks for the preprocessing hot paths.
//!
//! Benchmarks:
//! 1. Session grid build (canonicalize + forward-fill) over sparse ticks
//! 2. Rolling features over a full grid
//! 3. Labels over a full grid
//! 4. Grid → feature rows → split for several symbols

use chrono::{Duration, NaiveDateTime};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use stockcast_core::{
    DatasetAssembler, FeatureEngine, LabelGenerator, RawTick, SessionCalendar,
    SessionGridBuilder, SymbolRows,
};

// ── Helpers ──────────────────────────────────────────────────────────

/// `sessions` trading days of ticks with every seventh minute missing.
fn make_ticks(symbol: &str, sessions: usize) -> Vec<RawTick> {
    let cal = SessionCalendar::default();
    let from = NaiveDateTime::parse_from_str("2021-01-04 09:15", "%Y-%m-%d %H:%M").unwrap();
    let to = from + Duration::days(sessions as i64 * 7 / 5 + 2);

    cal.trading_minutes(from, to)
        .enumerate()
        .filter(|(i, _)| i % 7 != 3)
        .map(|(i, ts)| {
            let close = 100.0 + (i as f64 * 0.05).sin() * 5.0;
            RawTick {
                symbol: symbol.to_string(),
                timestamp: ts,
                open: close - 0.1,
                high: close + 0.2,
                low: close - 0.2,
                close,
                volume: 1_000.0 + (i % 50) as f64,
            }
        })
        .collect()
}

fn bench_grid(c: &mut Criterion) {
    let builder = SessionGridBuilder::new(SessionCalendar::default());
    let mut group = c.benchmark_group("grid_build");
    for sessions in [5, 20, 60] {
        let ticks = make_ticks("BENCH", sessions);
        group.bench_with_input(BenchmarkId::from_parameter(sessions), &ticks, |b, ticks| {
            b.iter(|| builder.build("BENCH", black_box(ticks.clone())).unwrap())
        });
    }
    group.finish();
}

fn bench_features_and_labels(c: &mut Criterion) {
    let grid = SessionGridBuilder::new(SessionCalendar::default())
        .build("BENCH", make_ticks("BENCH", 60))
        .unwrap();
    let engine = FeatureEngine::default();
    let labels = LabelGenerator::default();

    c.bench_function("rolling_features_60_sessions", |b| {
        b.iter(|| engine.compute(black_box(&grid.ticks)))
    });
    c.bench_function("labels_60_sessions", |b| {
        b.iter(|| labels.compute(black_box(&grid.ticks)))
    });
}

fn bench_assembly(c: &mut Criterion) {
    let builder = SessionGridBuilder::new(SessionCalendar::default());
    let engine = FeatureEngine::default();
    let labels = LabelGenerator::default();
    let symbols = ["AARTIIND", "ABCAPITAL", "ABFRL", "ADANIENT", "ADANIGAS"];
    let inputs: Vec<Vec<RawTick>> = symbols.iter().map(|s| make_ticks(s, 20)).collect();

    c.bench_function("five_symbols_end_to_end", |b| {
        b.iter(|| {
            let rows: Vec<SymbolRows> = symbols
                .iter()
                .zip(&inputs)
                .map(|(s, ticks)| {
                    let series = builder.build(s, ticks.clone()).unwrap();
                    SymbolRows::from_series(&series, &engine, &labels)
                })
                .collect();
            DatasetAssembler::default().assemble(black_box(rows)).unwrap()
        })
    });
}

criterion_group!(benches, bench_grid, bench_features_and_labels, bench_assembly);
criterion_main!(benches);
