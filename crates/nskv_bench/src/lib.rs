//! Benchmark utilities.

use nskv_storage::{
    new_mem_store, new_on_disk_store, Engine, KvStore, LifecycleContext, StoreConfig,
};
use tempfile::TempDir;

/// Backends compared by every benchmark.
pub const BACKENDS: [&str; 3] = ["memory", "redb", "sled"];

/// Create deterministic data of given size.
pub fn value_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// Start a store of the named backend: `memory` or an [`Engine`] name.
///
/// On-disk stores live in the returned directory, which must be kept alive
/// for the duration of the benchmark.
///
/// # Panics
///
/// Panics if `backend` names no known backend.
pub fn started_store(backend: &str) -> (Box<dyn KvStore>, Option<TempDir>) {
    let (store, temp_dir) = match backend {
        "memory" => (new_mem_store(), None),
        other => {
            let engine: Engine = other
                .parse()
                .unwrap_or_else(|err| panic!("unknown backend {other:?}: {err}"));
            let temp_dir = TempDir::new().expect("Failed to create temp directory");
            let config = StoreConfig::new(temp_dir.path())
                .engine(engine)
                .flush_interval_ms(None);
            (new_on_disk_store(config), Some(temp_dir))
        }
    };
    store
        .start(&LifecycleContext::new())
        .expect("Failed to start store");
    (store, temp_dir)
}
