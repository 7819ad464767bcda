//! Benchmark for bulk-writing 1 million key-value pairs
//!
//! Measures the throughput of the generation-driven write path against the
//! in-memory store, reporting per-chunk progress along the way.

use sluice_bulk::{BulkConfig, write_with_progress};
use sluice_sequence::from_vec;
use sluice_store::{Key, MemoryStore, Value};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    println!("=== 1 Million Pair Bulk Write Benchmark ===\n");

    const NUM_PAIRS: usize = 1_000_000;

    let store = MemoryStore::new();
    let cancel = CancellationToken::new();

    println!("Generating {} pairs...", NUM_PAIRS);
    let pairs: Vec<(Key, Value)> = (0..NUM_PAIRS)
        .map(|i| {
            // zero-padded keys for consistent ordering
            let key = format!("bench/{i:08}").into_bytes();
            let value = format!("value_{i}").into_bytes();
            (key, value)
        })
        .collect();
    let total_bytes: usize = pairs.iter().map(|(k, v)| k.len() + v.len()).sum();

    println!("Starting...");
    let start = Instant::now();
    let mut chunks = 0u32;
    let count = write_with_progress(
        &store,
        &from_vec(pairs),
        &BulkConfig::default(),
        |n| {
            chunks += 1;
            println!("  chunk #{chunks}: {n} written");
        },
        &cancel,
    )
    .await
    .expect("bulk write failed");

    let elapsed = start.elapsed();
    println!(
        "\nWrote {} pairs ({} bytes) in {:.3}s across {} chunks",
        count,
        total_bytes,
        elapsed.as_secs_f64(),
        chunks
    );
    println!(
        "Throughput: {:.0} pairs/sec",
        count as f64 / elapsed.as_secs_f64()
    );
    assert_eq!(store.len(), NUM_PAIRS);
}
