//! Normalization Benchmarks - Per-Trade Hot Path
//!
//! Benchmarks the work done for every fetched page: cursor filtering
//! and raw-to-canonical trade conversion.
//!
//! Run with: cargo bench --bench normalize_bench

use chrono::DateTime;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use trade_scrapers::domain::cursor::CursorBook;
use trade_scrapers::domain::pair;
use trade_scrapers::domain::trade::{ExchangePair, RawTrade, ResolvedPair, TradeRecord};

fn page(len: u64) -> Vec<RawTrade> {
    // Newest first, the usual exchange page order.
    (0..len)
        .rev()
        .map(|i| RawTrade {
            foreign_trade_id: i.to_string(),
            sequence: i,
            price: format!("{}.{}", 1000 + i, i % 100),
            volume: "0.25".to_string(),
            time: DateTime::from_timestamp(1_700_000_000 + i64::try_from(i).unwrap_or(0), 0)
                .unwrap_or_default(),
        })
        .collect()
}

/// Benchmark cursor acceptance of a 100-trade page.
fn bench_cursor_accept(c: &mut Criterion) {
    let trades = page(100);

    c.bench_function("cursor_accept_100", |b| {
        b.iter(|| {
            let mut book = CursorBook::new();
            let _fresh = book.accept("ETH-DAI", black_box(trades.clone()));
        });
    });
}

/// Benchmark decoding a 100-trade page into records.
fn bench_from_raw(c: &mut Criterion) {
    let trades = page(100);
    let pair = ExchangePair::new("Maker", "ETH", "ETH-DAI");
    let resolved = ResolvedPair::default();

    c.bench_function("trade_record_from_raw_100", |b| {
        b.iter(|| {
            for raw in black_box(&trades) {
                let _record = TradeRecord::from_raw(raw, &pair, "Maker", &resolved);
            }
        });
    });
}

/// Benchmark pair-name canonicalization.
fn bench_canonicalize(c: &mut Criterion) {
    c.bench_function("canonicalize_pair", |b| {
        b.iter(|| {
            let _name = pair::canonicalize(black_box("ETH/DAI"), '/');
        });
    });
}

criterion_group!(benches, bench_cursor_accept, bench_from_raw, bench_canonicalize);
criterion_main!(benches);
