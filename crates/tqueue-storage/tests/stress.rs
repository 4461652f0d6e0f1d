//! Stress tests for tqueue-storage
//!
//! These tests drive the storage adapters with large and randomized
//! workloads and check that a restart always rebuilds the same queues.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use tqueue_core::{QueueId, TQueue, TQueueConfig};
use tqueue_storage::{Binlog, BinlogConfig, TQueueBinlog, TQueueMemoryStorage};

const QUEUES: QueueId = 5;

fn fast() -> BinlogConfig {
    BinlogConfig::default().with_sync_on_write(false)
}

fn assert_same_queues(expected: &TQueue, actual: &TQueue, context: &str) {
    for queue_id in 0..QUEUES {
        assert_eq!(
            actual.get_head(queue_id),
            expected.get_head(queue_id),
            "head of queue {} {}",
            queue_id,
            context
        );
        assert_eq!(
            actual.get_tail(queue_id),
            expected.get_tail(queue_id),
            "tail of queue {} {}",
            queue_id,
            context
        );
        assert!(
            actual.retained(queue_id).eq(expected.retained(queue_id)),
            "events of queue {} {}",
            queue_id,
            context
        );
    }
}

/// Apply one random mutation to both engines
fn random_step(rng: &mut StdRng, now: &mut f64, engines: [&mut TQueue; 2]) {
    let queue_id = rng.random_range(0..QUEUES);
    match rng.random_range(0..10) {
        0..=5 => {
            let ttl = f64::from(rng.random_range(1..40u32));
            let payload = format!("event at {}", now);
            for engine in engines {
                engine.push(queue_id, payload.clone(), *now + ttl, None).unwrap();
            }
        }
        6..=7 => {
            let skip = rng.random_range(0..4);
            for engine in engines {
                if let Some(head) = engine.get_head(queue_id)
                    && let Ok(from) = head.advance(skip)
                {
                    engine.get_events(queue_id, from, true, *now, 8).unwrap();
                }
            }
        }
        8 => {
            for engine in engines {
                engine.run_gc(*now).unwrap();
            }
        }
        _ => *now += f64::from(rng.random_range(1..5u32)),
    }
}

// ============================================================================
// Throughput Tests
// ============================================================================

/// Append 10,000 records and read them all back on reopen
#[test]
fn test_binlog_append_throughput() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("throughput.binlog");
    let record_count: u64 = 10_000;

    let start = Instant::now();
    {
        let mut log = Binlog::init(&path, fast(), |_: &[u8]| Ok::<(), tqueue_core::StorageError>(()))
            .expect("Failed to open binlog");
        for i in 0..record_count {
            log.append(format!("record {}", i).as_bytes())
                .expect("Failed to append record");
        }
    }
    let duration = start.elapsed();
    println!(
        "Appended {} records in {:?} ({:.2} records/sec)",
        record_count,
        duration,
        record_count as f64 / duration.as_secs_f64()
    );

    let mut next = 0u64;
    let log = Binlog::init(&path, fast(), |raw: &[u8]| {
        assert_eq!(raw, format!("record {}", next).as_bytes());
        next += 1;
        Ok::<(), tqueue_core::StorageError>(())
    })
    .unwrap();
    assert_eq!(next, record_count);
    assert_eq!(log.record_count(), record_count);
}

/// Push across many queues through the memory recorder and replay it
#[test]
fn test_memory_storage_many_queues() {
    let mut engine = TQueue::new();
    engine.set_callback(Box::new(TQueueMemoryStorage::new()));

    for round in 0..100 {
        for queue_id in 0..100 {
            engine
                .push(queue_id, format!("{}:{}", queue_id, round), 1_000.0, None)
                .unwrap();
        }
    }
    assert_eq!(engine.queue_count(), 100);

    engine.emulate_restart();
    assert_eq!(engine.queue_count(), 0);
    let storage = engine
        .extract_callback_as::<TQueueMemoryStorage>()
        .unwrap();
    assert_eq!(storage.len(), 10_000);

    let mut restored = TQueue::new();
    storage.replay(&mut restored).unwrap();
    assert_eq!(restored.queue_count(), 100);
    for queue_id in 0..100 {
        assert_eq!(restored.get_size(queue_id), 100);
        assert_eq!(restored.get_tail(queue_id).unwrap().value(), 100);
    }
}

// ============================================================================
// Randomized Restart Tests
// ============================================================================

#[test]
fn test_memory_storage_random_restarts() {
    let mut rng = StdRng::seed_from_u64(0x7175_6575);
    let mut now = 0.0;
    let mut baseline = TQueue::new();
    let mut engine = TQueue::new();
    engine.set_callback(Box::new(TQueueMemoryStorage::new()));

    for step in 0..5_000 {
        random_step(&mut rng, &mut now, [&mut baseline, &mut engine]);

        if step % 500 == 499 {
            engine.emulate_restart();
            let mut storage = engine
                .extract_callback_as::<TQueueMemoryStorage>()
                .unwrap();
            if step % 1_000 == 999 {
                storage.compact().unwrap();
            }
            engine = TQueue::new();
            storage.replay(&mut engine).unwrap();
            engine.set_callback(storage);
            assert_same_queues(&baseline, &engine, &format!("after restart at step {}", step));
        }
    }
}

#[test]
fn test_binlog_random_restarts() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("random.binlog");
    let mut rng = StdRng::seed_from_u64(42);
    let mut now = 0.0;
    let mut baseline = TQueue::new();
    let mut engine = TQueueBinlog::open(&path, fast(), TQueueConfig::default()).unwrap();

    for step in 0..3_000 {
        random_step(&mut rng, &mut now, [&mut baseline, &mut engine]);

        if step % 300 == 299 {
            if step % 900 == 899 {
                let mut adapter = engine.extract_callback_as::<TQueueBinlog>().unwrap();
                adapter.compact().unwrap();
                engine.set_callback(adapter);
            }
            engine.emulate_restart();
            drop(engine);
            engine = TQueueBinlog::open(&path, fast(), TQueueConfig::default()).unwrap();
            assert_same_queues(&baseline, &engine, &format!("after restart at step {}", step));
        }
    }
}

// ============================================================================
// Compaction Tests
// ============================================================================

/// A long log of mostly forgotten events shrinks to the retained window
#[test]
fn test_binlog_compaction_shrinks_log() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("compact.binlog");

    let mut engine = TQueueBinlog::open(&path, fast(), TQueueConfig::default()).unwrap();
    for i in 0..5_000 {
        engine.push(i % QUEUES, vec![b'x'; 64], 10_000.0, None).unwrap();
    }
    for queue_id in 0..QUEUES {
        let tail = engine.get_tail(queue_id).unwrap();
        let keep_from = tail.advance(-10).unwrap();
        engine.get_events(queue_id, keep_from, true, 0.0, 1).unwrap();
    }

    let mut adapter = engine.extract_callback_as::<TQueueBinlog>().unwrap();
    let size_before = adapter.binlog().unwrap().size_bytes();
    let result = adapter.compact().unwrap();
    let size_after = adapter.binlog().unwrap().size_bytes();
    assert_eq!(result.entries_before, 5_000 + QUEUES as usize);
    assert_eq!(result.entries_after, 10 * QUEUES as usize);
    assert!(size_after * 10 < size_before);
    engine.set_callback(adapter);

    engine.emulate_restart();
    drop(engine);
    let engine = TQueueBinlog::open(&path, fast(), TQueueConfig::default()).unwrap();
    for queue_id in 0..QUEUES {
        assert_eq!(engine.get_size(queue_id), 10);
        assert_eq!(engine.get_tail(queue_id).unwrap().value(), 1_000);
    }
}
