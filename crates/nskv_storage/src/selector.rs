//! Backend selection.

use crate::config::{Engine, StoreConfig};
use crate::memory::MemKvStore;
use crate::redb_store::RedbStore;
use crate::sled_store::SledStore;
use crate::store::KvStore;

/// Builds the on-disk store selected by `config.engine`.
///
/// This is a pure mapping: no file is touched until the returned store is
/// started.
#[must_use]
pub fn new_on_disk_store(config: StoreConfig) -> Box<dyn KvStore> {
    match config.engine {
        Engine::Redb => Box::new(RedbStore::new(config)),
        Engine::Sled => Box::new(SledStore::new(config)),
    }
}

/// Builds an in-memory reference store.
#[must_use]
pub fn new_mem_store() -> Box<dyn KvStore> {
    Box::new(MemKvStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{LifecycleContext, LifecycleState};
    use tempfile::tempdir;

    #[test]
    fn selects_engine_from_config() {
        let temp = tempdir().unwrap();

        let store = new_on_disk_store(StoreConfig::new(temp.path()).engine(Engine::Redb));
        assert_eq!(store.engine(), "redb");

        let store = new_on_disk_store(StoreConfig::new(temp.path()).engine(Engine::Sled));
        assert_eq!(store.engine(), "sled");

        assert_eq!(new_mem_store().engine(), "memory");
    }

    #[test]
    fn selection_defers_resource_acquisition() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("deferred");

        for engine in [Engine::Redb, Engine::Sled] {
            let store = new_on_disk_store(StoreConfig::new(&path).engine(engine));
            assert_eq!(store.state(), LifecycleState::Created);
            assert!(!path.exists());
        }

        let store = new_on_disk_store(StoreConfig::new(&path).engine(Engine::Sled));
        store.start(&LifecycleContext::new()).unwrap();
        assert!(path.join("sled").exists());
        assert!(!path.join("store.redb").exists());
    }
}
