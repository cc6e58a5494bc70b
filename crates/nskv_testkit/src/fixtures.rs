//! Test fixtures and store helpers.
//!
//! Provides started stores of every backend, with on-disk stores placed in
//! a temporary directory that lives as long as the fixture.

use nskv_storage::{Engine, KvStore, LifecycleContext, MemKvStore, StoreConfig};
use std::fmt;
use std::path::Path;
use tempfile::TempDir;

/// The backends a fixture can be built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// [`MemKvStore`].
    Memory,
    /// [`nskv_storage::RedbStore`].
    Redb,
    /// [`nskv_storage::SledStore`].
    Sled,
}

impl BackendKind {
    /// Every backend, reference first.
    pub const ALL: [BackendKind; 3] = [BackendKind::Memory, BackendKind::Redb, BackendKind::Sled];
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Redb => f.write_str("redb"),
            Self::Sled => f.write_str("sled"),
        }
    }
}

/// A store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: Box<dyn KvStore>,
    /// Which backend the store runs on.
    pub kind: BackendKind,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a store of `kind` without starting it.
    pub fn unstarted(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Memory => Self {
                store: Box::new(MemKvStore::new()),
                kind,
                _temp_dir: None,
            },
            BackendKind::Redb | BackendKind::Sled => {
                let temp_dir = TempDir::new().expect("Failed to create temp directory");
                let store = nskv_storage::new_on_disk_store(on_disk_config(temp_dir.path(), kind));
                Self {
                    store,
                    kind,
                    _temp_dir: Some(temp_dir),
                }
            }
        }
    }

    /// Creates and starts a store of `kind`.
    pub fn started(kind: BackendKind) -> Self {
        let test_store = Self::unstarted(kind);
        test_store
            .store
            .start(&LifecycleContext::new())
            .expect("Failed to start store");
        test_store
    }

    /// Creates and starts an in-memory store.
    pub fn memory() -> Self {
        Self::started(BackendKind::Memory)
    }

    /// Creates and starts a redb store in a temporary directory.
    pub fn redb() -> Self {
        Self::started(BackendKind::Redb)
    }

    /// Creates and starts a sled store in a temporary directory.
    pub fn sled() -> Self {
        Self::started(BackendKind::Sled)
    }

    /// Returns the storage directory if on-disk, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self._temp_dir.as_ref().map(TempDir::path)
    }

    /// Stops this store and starts a fresh one over the same directory.
    ///
    /// Panics for in-memory stores, which have nothing to reopen.
    pub fn reopen(self) -> Self {
        let ctx = LifecycleContext::new();
        self.store.stop(&ctx).expect("Failed to stop store");

        let path = self.path().expect("Only on-disk stores can be reopened");
        let store = nskv_storage::new_on_disk_store(on_disk_config(path, self.kind));
        store.start(&ctx).expect("Failed to restart store");

        Self {
            store,
            kind: self.kind,
            _temp_dir: self._temp_dir,
        }
    }
}

impl std::ops::Deref for TestStore {
    type Target = dyn KvStore;

    fn deref(&self) -> &Self::Target {
        self.store.as_ref()
    }
}

/// Small-cache configuration for an on-disk test store at `path`.
pub fn on_disk_config(path: &Path, kind: BackendKind) -> StoreConfig {
    let engine = match kind {
        BackendKind::Sled => Engine::Sled,
        BackendKind::Memory | BackendKind::Redb => Engine::Redb,
    };
    StoreConfig::new(path)
        .engine(engine)
        .cache_size_bytes(4 * 1024 * 1024)
        .flush_interval_ms(None)
}

/// Runs a test against a started store of every backend.
///
/// # Example
///
/// ```rust,ignore
/// use nskv_testkit::with_each_backend;
///
/// #[test]
/// fn my_test() {
///     with_each_backend(|store| {
///         store.put("ns", b"k", b"v").unwrap();
///     });
/// }
/// ```
pub fn with_each_backend<F>(mut f: F)
where
    F: FnMut(&TestStore),
{
    for kind in BackendKind::ALL {
        let test_store = TestStore::started(kind);
        f(&test_store);
    }
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a started store with `count` records in namespace `ns`.
    ///
    /// Keys are `key-<i>`, values are `value-<i>`.
    pub fn populated_store(kind: BackendKind, count: usize) -> TestStore {
        let test_store = TestStore::started(kind);
        for i in 0..count {
            test_store
                .put(
                    "ns",
                    format!("key-{i}").as_bytes(),
                    format!("value-{i}").as_bytes(),
                )
                .expect("Failed to put record");
        }
        test_store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nskv_storage::LifecycleState;

    #[test]
    fn fixtures_start_every_backend() {
        for kind in BackendKind::ALL {
            let test_store = TestStore::started(kind);
            assert_eq!(test_store.state(), LifecycleState::Running);
            assert_eq!(test_store.engine(), kind.to_string());
        }
    }

    #[test]
    fn memory_fixture_has_no_path() {
        assert!(TestStore::memory().path().is_none());
        assert!(TestStore::redb().path().is_some());
    }

    #[test]
    fn populated_scenario() {
        let test_store = scenarios::populated_store(BackendKind::Memory, 5);
        assert_eq!(test_store.get("ns", b"key-3").unwrap(), b"value-3");
    }
}
