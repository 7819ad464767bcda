//! Integration tests for the range export operation.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sluice_bulk::{BulkConfig, export, write};
use sluice_sequence::from_vec;
use sluice_store::{Key, KeyRange, KeyValue, MemoryStore, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

fn small_chunks() -> BulkConfig {
    BulkConfig {
        initial_step: 128,
        max_step: 512,
        cooldown_initial: Duration::from_millis(1),
        ..BulkConfig::default()
    }
}

async fn prepare_random(store: &MemoryStore, prefix: &str, n: u32, seed: u64) -> Vec<(Key, Value)> {
    let cancel = CancellationToken::new();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pairs: Vec<(Key, Value)> = (0..n)
        .map(|_| {
            let mut id = [0u8; 16];
            rng.fill(&mut id[..]);
            let mut key = prefix.as_bytes().to_vec();
            key.push(b'/');
            key.extend_from_slice(&id);
            let len = rng.random_range(8..256);
            let mut value = vec![0u8; len];
            rng.fill(&mut value[..]);
            (key, value)
        })
        .collect();

    write(store, &from_vec(pairs.clone()), &small_chunks(), &cancel)
        .await
        .unwrap();

    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
}

#[tokio::test]
async fn test_export_delivers_ordered_contiguous_chunks() {
    const N: u32 = 5_000;

    let store = MemoryStore::new();
    let cancel = CancellationToken::new();
    let expected = prepare_random(&store, "export/order", N, 2403).await;

    let chunks: Arc<Mutex<Vec<(u64, Vec<KeyValue>)>>> = Arc::new(Mutex::new(Vec::new()));
    let total = {
        let chunks = chunks.clone();
        export(
            &store,
            &KeyRange::from_prefix(b"export/order/"),
            &small_chunks(),
            move |chunk, start, _cancel| {
                let chunks = chunks.clone();
                async move {
                    chunks.lock().push((start, chunk));
                    Ok(())
                }
            },
            &cancel,
        )
        .await
        .unwrap()
    };

    assert_eq!(total, N as u64);
    let chunks = chunks.lock();
    assert!(chunks.len() > 1, "scan split into generations");

    // start positions are contiguous with no gap or overlap
    let mut next_start = 0u64;
    for (start, chunk) in chunks.iter() {
        assert_eq!(*start, next_start);
        next_start += chunk.len() as u64;
    }
    assert_eq!(next_start, N as u64);

    // concatenated chunks reproduce the full key-sorted sequence
    let delivered: Vec<&KeyValue> = chunks.iter().flat_map(|(_, c)| c.iter()).collect();
    assert_eq!(delivered.len(), expected.len());
    for (kv, (key, value)) in delivered.iter().zip(expected.iter()) {
        assert_eq!(&kv.key, key);
        assert_eq!(&kv.value, value);
    }
}

#[tokio::test]
async fn test_export_retries_injected_read_failure() {
    const N: u32 = 2_000;

    let store = MemoryStore::new();
    let cancel = CancellationToken::new();
    let expected = prepare_random(&store, "export/retry", N, 99).await;

    store.inject_read_failures(1);

    let delivered: Arc<Mutex<Vec<KeyValue>>> = Arc::new(Mutex::new(Vec::new()));
    let total = {
        let delivered = delivered.clone();
        export(
            &store,
            &KeyRange::from_prefix(b"export/retry/"),
            &small_chunks(),
            move |chunk, _start, _cancel| {
                let delivered = delivered.clone();
                async move {
                    delivered.lock().extend(chunk);
                    Ok(())
                }
            },
            &cancel,
        )
        .await
        .unwrap()
    };

    // one transient read failure changes nothing observable
    assert_eq!(total, N as u64);
    let delivered = delivered.lock();
    assert_eq!(delivered.len(), N as usize);
    for (kv, (key, _)) in delivered.iter().zip(expected.iter()) {
        assert_eq!(&kv.key, key);
    }
}

#[tokio::test]
async fn test_export_to_disk() {
    const N: u32 = 5_000;

    let store = MemoryStore::new();
    let cancel = CancellationToken::new();
    prepare_random(&store, "export/disk", N, 2403).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.txt");
    let file = Arc::new(tokio::sync::Mutex::new(
        tokio::fs::File::create(&path).await.unwrap(),
    ));

    let total = {
        let file = file.clone();
        export(
            &store,
            &KeyRange::from_prefix(b"export/disk/"),
            &small_chunks(),
            move |chunk, _start, _cancel| {
                let file = file.clone();
                async move {
                    let mut lines = String::new();
                    for kv in &chunk {
                        lines.push_str(&format!(
                            "{} = {}\n",
                            hex(&kv.key),
                            hex(&kv.value)
                        ));
                    }
                    file.lock()
                        .await
                        .write_all(lines.as_bytes())
                        .await
                        .map_err(|e| sluice_bulk::BulkError::Fatal(e.to_string()))?;
                    Ok(())
                }
            },
            &cancel,
        )
        .await
        .unwrap()
    };

    file.lock().await.flush().await.unwrap();
    assert_eq!(total, N as u64);

    let contents = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(contents.lines().count(), N as usize);
}

#[tokio::test]
async fn test_export_empty_range() {
    let store = MemoryStore::new();
    let cancel = CancellationToken::new();

    let sink_calls = Arc::new(Mutex::new(0u32));
    let total = {
        let sink_calls = sink_calls.clone();
        export(
            &store,
            &KeyRange::from_prefix(b"export/empty/"),
            &small_chunks(),
            move |_chunk, _start, _cancel| {
                let sink_calls = sink_calls.clone();
                async move {
                    *sink_calls.lock() += 1;
                    Ok(())
                }
            },
            &cancel,
        )
        .await
        .unwrap()
    };

    assert_eq!(total, 0);
    assert_eq!(*sink_calls.lock(), 0, "sink never runs for an empty range");
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
