//! In-memory store for testing.

use crate::batch::{commit_with, WriteBatch};
use crate::error::{StoreError, StoreResult};
use crate::lifecycle::{Lifecycle, LifecycleContext, LifecycleState, StartStopper};
use crate::record::{validate_namespace, RecordKey, WriteOp};
use crate::store::KvStore;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashSet;

const ENGINE: &str = "memory";

/// An in-memory key-value store.
///
/// This is the reference backend: its behavior defines the contract the
/// on-disk adapters are tested against. It is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// # Thread Safety
///
/// Records live in a sharded concurrent map; conditional puts use the
/// map's entry API, so exactly one of many racing callers wins. A
/// namespace is marked as known before its first record is inserted, so
/// a reader that sees a record also sees its namespace.
///
/// # Example
///
/// ```rust
/// use nskv_storage::{KvStore, LifecycleContext, MemKvStore, StartStopper, StoreError};
///
/// let store = MemKvStore::new();
/// store.start(&LifecycleContext::new()).unwrap();
///
/// store.put("blocks", b"h1", b"data").unwrap();
/// assert_eq!(store.get("blocks", b"h1").unwrap(), b"data");
/// assert!(matches!(
///     store.get("receipts", b"h1"),
///     Err(StoreError::NamespaceNotFound { .. })
/// ));
/// ```
pub struct MemKvStore {
    lifecycle: Lifecycle<()>,
    data: DashMap<RecordKey, Vec<u8>>,
    namespaces: RwLock<HashSet<String>>,
}

impl MemKvStore {
    /// Creates an empty store. Call [`start`](StartStopper::start) before use.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new(ENGINE),
            data: DashMap::new(),
            namespaces: RwLock::new(HashSet::new()),
        }
    }

    /// Returns the number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if no records are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the known namespaces, sorted.
    #[must_use]
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.read().iter().cloned().collect();
        names.sort();
        names
    }

    fn mark_namespace(&self, namespace: &str) {
        if self.namespaces.read().contains(namespace) {
            return;
        }
        self.namespaces.write().insert(namespace.to_string());
    }

    fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.read().contains(namespace)
    }

    fn put_record(&self, namespace: &str, key: &[u8], value: &[u8]) -> StoreResult<()> {
        validate_namespace(namespace)?;
        self.mark_namespace(namespace);
        self.data.insert(RecordKey::new(namespace, key), value.to_vec());
        Ok(())
    }

    fn put_record_if_absent(&self, namespace: &str, key: &[u8], value: &[u8]) -> StoreResult<()> {
        validate_namespace(namespace)?;
        self.mark_namespace(namespace);
        match self.data.entry(RecordKey::new(namespace, key)) {
            Entry::Occupied(_) => Err(StoreError::already_exists(namespace, key)),
            Entry::Vacant(slot) => {
                slot.insert(value.to_vec());
                Ok(())
            }
        }
    }

    fn get_record(&self, namespace: &str, key: &[u8]) -> StoreResult<Vec<u8>> {
        if !self.has_namespace(namespace) {
            return Err(StoreError::namespace_not_found(namespace));
        }
        self.data.get(&RecordKey::new(namespace, key))
            .map(|value| value.value().clone())
            .ok_or_else(|| StoreError::not_exist(namespace, key))
    }

    fn delete_record(&self, namespace: &str, key: &[u8]) {
        self.data.remove(&RecordKey::new(namespace, key));
    }

    fn apply(&self, op: &WriteOp) -> StoreResult<()> {
        match op {
            WriteOp::Put {
                namespace,
                key,
                value,
            } => self.put_record(namespace, key, value),
            WriteOp::PutIfNotExists {
                namespace,
                key,
                value,
            } => self.put_record_if_absent(namespace, key, value),
            WriteOp::Delete { namespace, key } => {
                self.delete_record(namespace, key);
                Ok(())
            }
        }
    }
}

impl Default for MemKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemKvStore")
            .field("state", &self.lifecycle.state())
            .field("records", &self.data.len())
            .field("namespaces", &self.namespaces.read().len())
            .finish()
    }
}

impl StartStopper for MemKvStore {
    fn start(&self, ctx: &LifecycleContext) -> StoreResult<()> {
        self.lifecycle.start(ctx, || Ok(()))
    }

    fn stop(&self, _ctx: &LifecycleContext) -> StoreResult<()> {
        self.lifecycle.stop(|_| Ok(()))
    }
}

impl KvStore for MemKvStore {
    fn put(&self, namespace: &str, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.lifecycle.with(|_| self.put_record(namespace, key, value))
    }

    fn put_if_not_exists(&self, namespace: &str, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.lifecycle.with(|_| self.put_record_if_absent(namespace, key, value))
    }

    fn get(&self, namespace: &str, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.lifecycle.with(|_| self.get_record(namespace, key))
    }

    fn delete(&self, namespace: &str, key: &[u8]) -> StoreResult<()> {
        self.lifecycle.with(|_| {
            self.delete_record(namespace, key);
            Ok(())
        })
    }

    fn commit(&self, batch: &WriteBatch) -> StoreResult<()> {
        self.lifecycle.with(|_| commit_with(batch, ENGINE, |op| self.apply(op)))
    }

    fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    fn engine(&self) -> &'static str {
        ENGINE
    }
}
