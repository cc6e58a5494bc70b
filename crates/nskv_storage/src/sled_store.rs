//! sled-backed store.
//!
//! Each namespace maps to one sled tree named `ns/<namespace>`. The prefix
//! keeps namespaces apart from sled's own default tree.

use crate::batch::{commit_with, WriteBatch};
use crate::config::StoreConfig;
use crate::dir::StoreDir;
use crate::error::{StoreError, StoreResult};
use crate::lifecycle::{Lifecycle, LifecycleContext, LifecycleState, StartStopper};
use crate::record::{validate_namespace, WriteOp};
use crate::store::KvStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};

const ENGINE: &str = "sled";
const TREE_PREFIX: &str = "ns/";

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::engine(ENGINE, err)
    }
}

struct SledHandle {
    db: sled::Db,
    /// Open trees by namespace. Seeded from disk on start.
    trees: RwLock<HashMap<String, sled::Tree>>,
    _dir: StoreDir,
}

impl SledHandle {
    fn tree(&self, namespace: &str) -> Option<sled::Tree> {
        self.trees.read().get(namespace).cloned()
    }

    /// Returns the namespace's tree, creating it on first use.
    fn tree_or_create(&self, namespace: &str) -> StoreResult<sled::Tree> {
        validate_namespace(namespace)?;
        if let Some(tree) = self.tree(namespace) {
            return Ok(tree);
        }

        let mut trees = self.trees.write();
        if let Some(tree) = trees.get(namespace) {
            return Ok(tree.clone());
        }
        let tree = self.db.open_tree(format!("{TREE_PREFIX}{namespace}"))?;
        trees.insert(namespace.to_string(), tree.clone());
        debug!(engine = ENGINE, namespace, "namespace created");
        Ok(tree)
    }

    fn put(&self, namespace: &str, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.tree_or_create(namespace)?.insert(key, value)?;
        Ok(())
    }

    fn put_if_absent(&self, namespace: &str, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let tree = self.tree_or_create(namespace)?;
        match tree.compare_and_swap(key, None::<&[u8]>, Some(value))? {
            Ok(()) => Ok(()),
            Err(_) => Err(StoreError::already_exists(namespace, key)),
        }
    }

    fn get(&self, namespace: &str, key: &[u8]) -> StoreResult<Vec<u8>> {
        let tree = self
            .tree(namespace)
            .ok_or_else(|| StoreError::namespace_not_found(namespace))?;
        tree.get(key)?
            .map(|value| value.to_vec())
            .ok_or_else(|| StoreError::not_exist(namespace, key))
    }

    fn delete(&self, namespace: &str, key: &[u8]) -> StoreResult<()> {
        if let Some(tree) = self.tree(namespace) {
            tree.remove(key)?;
        }
        Ok(())
    }

    fn apply(&self, op: &WriteOp) -> StoreResult<()> {
        match op {
            WriteOp::Put {
                namespace,
                key,
                value,
            } => self.put(namespace, key, value),
            WriteOp::PutIfNotExists {
                namespace,
                key,
                value,
            } => self.put_if_absent(namespace, key, value),
            WriteOp::Delete { namespace, key } => self.delete(namespace, key),
        }
    }
}

/// A store backed by a sled database directory.
///
/// Construction only records the configuration; the directory lock and
/// the database are acquired by [`start`](StartStopper::start). `stop`
/// flushes before closing.
///
/// # Example
///
/// ```no_run
/// use nskv_storage::{Engine, KvStore, LifecycleContext, SledStore, StartStopper, StoreConfig};
///
/// let store = SledStore::new(StoreConfig::new("chain-data").engine(Engine::Sled));
/// let ctx = LifecycleContext::new();
/// store.start(&ctx).unwrap();
/// store.put_if_not_exists("blocks", b"h1", b"data").unwrap();
/// store.stop(&ctx).unwrap();
/// ```
pub struct SledStore {
    config: StoreConfig,
    lifecycle: Lifecycle<SledHandle>,
}

impl SledStore {
    /// Creates a store for `config`. Nothing is opened until start.
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            lifecycle: Lifecycle::new(ENGINE),
        }
    }

    /// Returns the store's configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn open(&self) -> StoreResult<SledHandle> {
        let dir = StoreDir::open(&self.config.storage_path, self.config.create_if_missing)?;
        let path = dir.sled_path();
        let db = sled::Config::new()
            .path(&path)
            .cache_capacity(self.config.cache_size_bytes as u64)
            .flush_every_ms(self.config.flush_interval_ms)
            .open()?;

        let mut trees = HashMap::new();
        for name in db.tree_names() {
            let Some(namespace) = std::str::from_utf8(&name)
                .ok()
                .and_then(|name| name.strip_prefix(TREE_PREFIX))
            else {
                continue;
            };
            trees.insert(namespace.to_string(), db.open_tree(&name)?);
        }

        info!(
            engine = ENGINE,
            path = %path.display(),
            namespaces = trees.len(),
            "store opened"
        );
        Ok(SledHandle {
            db,
            trees: RwLock::new(trees),
            _dir: dir,
        })
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("path", &self.config.storage_path)
            .field("state", &self.lifecycle.state())
            .finish()
    }
}

impl StartStopper for SledStore {
    fn start(&self, ctx: &LifecycleContext) -> StoreResult<()> {
        self.lifecycle.start(ctx, || self.open())
    }

    fn stop(&self, _ctx: &LifecycleContext) -> StoreResult<()> {
        self.lifecycle.stop(|handle| {
            let flushed = handle.db.flush()?;
            info!(
                engine = ENGINE,
                path = %self.config.storage_path.display(),
                flushed_bytes = flushed,
                "store closed"
            );
            Ok(())
        })
    }
}

impl KvStore for SledStore {
    fn put(&self, namespace: &str, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.lifecycle.with(|handle| handle.put(namespace, key, value))
    }

    fn put_if_not_exists(&self, namespace: &str, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.lifecycle.with(|handle| handle.put_if_absent(namespace, key, value))
    }

    fn get(&self, namespace: &str, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.lifecycle.with(|handle| handle.get(namespace, key))
    }

    fn delete(&self, namespace: &str, key: &[u8]) -> StoreResult<()> {
        self.lifecycle.with(|handle| handle.delete(namespace, key))
    }

    fn commit(&self, batch: &WriteBatch) -> StoreResult<()> {
        self.lifecycle.with(|handle| commit_with(batch, ENGINE, |op| handle.apply(op)))
    }

    fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    fn engine(&self) -> &'static str {
        ENGINE
    }
}
