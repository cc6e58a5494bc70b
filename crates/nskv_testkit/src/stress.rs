//! Stress tests for nskv stores.
//!
//! These drive a store under heavy load and concurrent access. Every
//! function works on any [`KvStore`], so the same load runs on each
//! backend.

use nskv_storage::{ErrorKind, KvStore, WriteBatch};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
///
/// `threads` and `key_count` must be at least 1; every stress function
/// panics otherwise.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Number of concurrent threads (for concurrent tests).
    pub threads: usize,
    /// Size of each value in bytes.
    pub value_size: usize,
    /// Number of distinct keys.
    pub key_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            value_size: 256,
            key_count: 1_000,
        }
    }
}

impl StressConfig {
    fn assert_valid(&self) {
        assert!(self.threads > 0, "stress threads must be at least 1");
        assert!(self.key_count > 0, "stress key_count must be at least 1");
    }
}

const NAMESPACE: &str = "stress";

fn key(index: usize) -> [u8; 8] {
    (index as u64).to_be_bytes()
}

fn tally(result: Result<(), nskv_storage::StoreError>, ok: &AtomicUsize, failed: &AtomicUsize) {
    match result {
        Ok(()) => ok.fetch_add(1, Ordering::Relaxed),
        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
    };
}

/// Run a sequential write stress test.
pub fn stress_sequential_writes(store: &dyn KvStore, config: &StressConfig) -> StressTestResult {
    config.assert_valid();
    let value = vec![0xABu8; config.value_size];

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        match store.put(NAMESPACE, &key(i % config.key_count), &value) {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run a mixed put/get/delete stress test.
///
/// Reads of deleted keys count as successful: only unexpected error kinds
/// are failures.
pub fn stress_mixed_operations(store: &dyn KvStore, config: &StressConfig) -> StressTestResult {
    config.assert_valid();
    let value = vec![0xABu8; config.value_size];

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let key = key(i % config.key_count);
        let result = match i % 3 {
            0 => store.put(NAMESPACE, &key, &value),
            1 => match store.get(NAMESPACE, &key) {
                Ok(_) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotExist => Ok(()),
                Err(err) if err.kind() == ErrorKind::NamespaceNotFound => Ok(()),
                Err(err) => Err(err),
            },
            _ => store.delete(NAMESPACE, &key),
        };

        match result {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run concurrent writers, each on its own key range.
pub fn stress_concurrent_writes(
    store: Arc<dyn KvStore>,
    config: &StressConfig,
) -> StressTestResult {
    config.assert_valid();
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let ops_per_thread = config.operations / config.threads;
    let value_size = config.value_size;

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let store = Arc::clone(&store);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);

            thread::spawn(move || {
                let value = vec![t as u8; value_size];
                for i in 0..ops_per_thread {
                    let result = store.put(NAMESPACE, &key(t * ops_per_thread + i), &value);
                    tally(result, &successful, &failed);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Run concurrent batch commits of `batch_size` puts each.
///
/// Counts one operation per committed entry.
pub fn stress_concurrent_batches(
    store: Arc<dyn KvStore>,
    config: &StressConfig,
    batch_size: usize,
) -> StressTestResult {
    config.assert_valid();
    assert!(batch_size > 0, "batch_size must be at least 1");
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let batches_per_thread = config.operations / config.threads / batch_size;
    let value_size = config.value_size;

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let store = Arc::clone(&store);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);

            thread::spawn(move || {
                let value = vec![t as u8; value_size];
                let batch = WriteBatch::with_capacity(batch_size);
                for b in 0..batches_per_thread {
                    for i in 0..batch_size {
                        let index = (t * batches_per_thread + b) * batch_size + i;
                        batch.put(NAMESPACE, &key(index), &value);
                    }
                    match store.commit(&batch) {
                        Ok(()) => successful.fetch_add(batch_size, Ordering::Relaxed),
                        Err(_) => {
                            batch.clear();
                            failed.fetch_add(batch_size, Ordering::Relaxed)
                        }
                    };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Run repeated put-if-not-exists races on fresh keys.
///
/// Every round releases all threads at once onto one key. A round that
/// does not end with exactly one winner counts as failed.
pub fn stress_put_if_not_exists_races(
    store: Arc<dyn KvStore>,
    config: &StressConfig,
) -> StressTestResult {
    config.assert_valid();
    let rounds = config.operations / config.threads;
    let barrier = Arc::new(Barrier::new(config.threads));
    let wins: Arc<Vec<AtomicUsize>> = Arc::new((0..rounds).map(|_| AtomicUsize::new(0)).collect());
    let errors = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            let wins = Arc::clone(&wins);
            let errors = Arc::clone(&errors);

            thread::spawn(move || {
                for (round, round_wins) in wins.iter().enumerate() {
                    barrier.wait();
                    match store.put_if_not_exists("race", &key(round), &[t as u8]) {
                        Ok(()) => {
                            round_wins.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
                        Err(_) => {
                            errors.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let clean_rounds = wins
        .iter()
        .filter(|w| w.load(Ordering::Relaxed) == 1)
        .count();
    let failed = rounds - clean_rounds + errors.load(Ordering::Relaxed);
    StressTestResult::new(clean_rounds, failed, start.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{BackendKind, TestStore};
    use nskv_storage::{LifecycleContext, MemKvStore, StartStopper};

    fn shared_memory_store() -> Arc<dyn KvStore> {
        let store = MemKvStore::new();
        store.start(&LifecycleContext::new()).unwrap();
        Arc::new(store)
    }

    #[test]
    fn test_sequential_writes() {
        let store = TestStore::started(BackendKind::Memory);
        let config = StressConfig {
            operations: 1_000,
            value_size: 64,
            ..Default::default()
        };

        let result = stress_sequential_writes(&*store, &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, 1_000);
    }

    #[test]
    fn test_mixed_operations() {
        let store = TestStore::started(BackendKind::Memory);
        let config = StressConfig {
            operations: 1_000,
            key_count: 100,
            value_size: 64,
            ..Default::default()
        };

        let result = stress_mixed_operations(&*store, &config);
        assert_eq!(result.failed_ops, 0);
    }

    #[test]
    fn test_concurrent_writes() {
        let store = shared_memory_store();
        let config = StressConfig {
            operations: 1_000,
            threads: 4,
            key_count: 1_000,
            value_size: 64,
        };

        let result = stress_concurrent_writes(Arc::clone(&store), &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(store.get(NAMESPACE, &key(999)).unwrap(), vec![3u8; 64]);
    }

    #[test]
    fn test_concurrent_batches() {
        let store = shared_memory_store();
        let config = StressConfig {
            operations: 800,
            threads: 4,
            ..Default::default()
        };

        let result = stress_concurrent_batches(store, &config, 20);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, 800);
    }

    #[test]
    fn test_put_if_not_exists_races() {
        let store = shared_memory_store();
        let config = StressConfig {
            operations: 400,
            threads: 8,
            ..Default::default()
        };

        let result = stress_put_if_not_exists_races(store, &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, 50);
    }

    #[test]
    #[should_panic(expected = "stress key_count must be at least 1")]
    fn test_zero_key_count_is_rejected() {
        let store = TestStore::started(BackendKind::Memory);
        let config = StressConfig {
            operations: 10,
            key_count: 0,
            ..Default::default()
        };
        stress_sequential_writes(&*store, &config);
    }

    #[test]
    #[should_panic(expected = "stress threads must be at least 1")]
    fn test_zero_threads_is_rejected() {
        let config = StressConfig {
            threads: 0,
            ..Default::default()
        };
        stress_concurrent_writes(shared_memory_store(), &config);
    }
}
