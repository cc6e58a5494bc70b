//! redb-backed store.
//!
//! Each namespace maps to one redb table of raw byte keys and values.
//! redb serializes write transactions, so the conditional put's check and
//! insert happen atomically inside a single transaction.
//!
//! Opening a table in a write transaction creates it, so the store keeps
//! the set of existing tables in memory and only opens tables it knows
//! about when deleting.

use crate::batch::{drain, WriteBatch};
use crate::config::StoreConfig;
use crate::dir::StoreDir;
use crate::error::{StoreError, StoreResult};
use crate::lifecycle::{Lifecycle, LifecycleContext, LifecycleState, StartStopper};
use crate::record::{validate_namespace, WriteOp};
use crate::store::KvStore;
use parking_lot::RwLock;
use redb::{
    Database, ReadableTable, Table, TableDefinition, TableError, TableHandle, WriteTransaction,
};
use std::collections::HashSet;
use tracing::{info, warn};

const ENGINE: &str = "redb";

type NamespaceTable<'a> = TableDefinition<'a, &'static [u8], &'static [u8]>;

fn namespace_table(namespace: &str) -> NamespaceTable<'_> {
    TableDefinition::new(namespace)
}

impl From<redb::DatabaseError> for StoreError {
    fn from(err: redb::DatabaseError) -> Self {
        StoreError::engine(ENGINE, err)
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(err: redb::TransactionError) -> Self {
        StoreError::engine(ENGINE, err)
    }
}

impl From<redb::TableError> for StoreError {
    fn from(err: redb::TableError) -> Self {
        StoreError::engine(ENGINE, err)
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(err: redb::StorageError) -> Self {
        StoreError::engine(ENGINE, err)
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(err: redb::CommitError) -> Self {
        StoreError::engine(ENGINE, err)
    }
}

struct RedbHandle {
    db: Database,
    /// Tables committed to the database. Only updated while holding the
    /// write lock across a transaction commit.
    namespaces: RwLock<HashSet<String>>,
    // Declared after `db` so the lock outlives the open database.
    _dir: StoreDir,
}

/// A write transaction plus the namespaces it has created so far.
struct NamespaceWriter<'h> {
    txn: WriteTransaction,
    committed: &'h RwLock<HashSet<String>>,
    created: Vec<String>,
}

impl<'h> NamespaceWriter<'h> {
    fn begin(handle: &'h RedbHandle) -> StoreResult<Self> {
        Ok(Self {
            txn: handle.db.begin_write()?,
            committed: &handle.namespaces,
            created: Vec::new(),
        })
    }

    fn exists(&self, namespace: &str) -> bool {
        self.created.iter().any(|name| name == namespace)
            || self.committed.read().contains(namespace)
    }

    /// Opens the namespace's table, creating it if needed.
    fn open(&mut self, namespace: &str) -> StoreResult<Table<'_, &'static [u8], &'static [u8]>> {
        validate_namespace(namespace)?;
        if !self.exists(namespace) {
            self.created.push(namespace.to_string());
        }
        Ok(self.txn.open_table(namespace_table(namespace))?)
    }

    fn put(&mut self, namespace: &str, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.open(namespace)?.insert(key, value)?;
        Ok(())
    }

    fn put_if_absent(&mut self, namespace: &str, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let mut table = self.open(namespace)?;
        if table.get(key)?.is_some() {
            return Err(StoreError::already_exists(namespace, key));
        }
        table.insert(key, value)?;
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &[u8]) -> StoreResult<()> {
        if !self.exists(namespace) {
            return Ok(());
        }
        self.open(namespace)?.remove(key)?;
        Ok(())
    }

    fn apply(&mut self, op: &WriteOp) -> StoreResult<()> {
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

    /// Commits the transaction and publishes the namespaces it created.
    ///
    /// The next write transaction cannot begin before this one commits, and
    /// cannot read the namespace set before it is published.
    fn commit(self) -> StoreResult<()> {
        let mut committed = self.committed.write();
        self.txn.commit()?;
        committed.extend(self.created);
        Ok(())
    }

    fn abort(self) -> StoreResult<()> {
        self.txn.abort()?;
        Ok(())
    }
}

/// Picks the error a batch commit reports.
///
/// A failing entry wins over a failure to commit the entries before it;
/// the commit failure is logged.
fn settle_commit(applied: StoreResult<()>, committed: StoreResult<()>) -> StoreResult<()> {
    match (applied, committed) {
        (Ok(()), committed) => committed,
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(commit_err)) => {
            warn!(
                engine = ENGINE,
                error = %commit_err,
                "failed to commit entries applied before a failing entry"
            );
            Err(err)
        }
    }
}

/// A store backed by a redb database file.
///
/// Construction only records the configuration; the directory lock and
/// the database file are acquired by [`start`](StartStopper::start).
///
/// # Example
///
/// ```no_run
/// use nskv_storage::{KvStore, LifecycleContext, RedbStore, StartStopper, StoreConfig};
///
/// let store = RedbStore::new(StoreConfig::new("chain-data"));
/// let ctx = LifecycleContext::new();
/// store.start(&ctx).unwrap();
/// store.put("blocks", b"h1", b"data").unwrap();
/// store.stop(&ctx).unwrap();
/// ```
pub struct RedbStore {
    config: StoreConfig,
    lifecycle: Lifecycle<RedbHandle>,
}

impl RedbStore {
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

    fn open(&self) -> StoreResult<RedbHandle> {
        let dir = StoreDir::open(&self.config.storage_path, self.config.create_if_missing)?;
        let path = dir.redb_path();
        let db = redb::Builder::new()
            .set_cache_size(self.config.cache_size_bytes)
            .create(&path)?;

        let namespaces: HashSet<String> = db
            .begin_read()?
            .list_tables()?
            .map(|table| table.name().to_string())
            .collect();

        info!(
            engine = ENGINE,
            path = %path.display(),
            cache_size = self.config.cache_size_bytes,
            namespaces = namespaces.len(),
            "store opened"
        );
        Ok(RedbHandle {
            db,
            namespaces: RwLock::new(namespaces),
            _dir: dir,
        })
    }

    /// Runs `f` in a write transaction, committing on success and aborting
    /// on failure.
    fn write<F>(handle: &RedbHandle, f: F) -> StoreResult<()>
    where
        F: FnOnce(&mut NamespaceWriter<'_>) -> StoreResult<()>,
    {
        let mut writer = NamespaceWriter::begin(handle)?;
        match f(&mut writer) {
            Ok(()) => writer.commit(),
            Err(err) => {
                writer.abort()?;
                Err(err)
            }
        }
    }

    fn get_from(db: &Database, namespace: &str, key: &[u8]) -> StoreResult<Vec<u8>> {
        if namespace.is_empty() {
            return Err(StoreError::namespace_not_found(namespace));
        }
        let txn = db.begin_read()?;
        let table = match txn.open_table(namespace_table(namespace)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => {
                return Err(StoreError::namespace_not_found(namespace))
            }
            Err(err) => return Err(err.into()),
        };
        let value = table.get(key)?;
        value
            .map(|guard| guard.value().to_vec())
            .ok_or_else(|| StoreError::not_exist(namespace, key))
    }
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("path", &self.config.storage_path)
            .field("state", &self.lifecycle.state())
            .finish()
    }
}

impl StartStopper for RedbStore {
    fn start(&self, ctx: &LifecycleContext) -> StoreResult<()> {
        self.lifecycle.start(ctx, || self.open())
    }

    fn stop(&self, _ctx: &LifecycleContext) -> StoreResult<()> {
        self.lifecycle.stop(|handle| {
            drop(handle);
            info!(
                engine = ENGINE,
                path = %self.config.storage_path.display(),
                "store closed"
            );
            Ok(())
        })
    }
}

impl KvStore for RedbStore {
    fn put(&self, namespace: &str, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.lifecycle.with(|handle| {
            Self::write(handle, |writer| writer.put(namespace, key, value))
        })
    }

    fn put_if_not_exists(&self, namespace: &str, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.lifecycle.with(|handle| {
            Self::write(handle, |writer| writer.put_if_absent(namespace, key, value))
        })
    }

    fn get(&self, namespace: &str, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.lifecycle.with(|handle| Self::get_from(&handle.db, namespace, key))
    }

    fn delete(&self, namespace: &str, key: &[u8]) -> StoreResult<()> {
        self.lifecycle.with(|handle| Self::write(handle, |writer| writer.delete(namespace, key)))
    }

    /// Applies the batch inside one write transaction.
    ///
    /// The transaction is committed even when an entry fails, so entries
    /// before the failure are durable exactly as on every other backend.
    /// The failing entry's error is returned even if that commit fails.
    fn commit(&self, batch: &WriteBatch) -> StoreResult<()> {
        self.lifecycle.with(|handle| {
            let guard = batch.lock();
            if guard.size() == 0 {
                guard.unlock();
                return Ok(());
            }

            let mut writer = NamespaceWriter::begin(handle)?;
            let applied = drain(&guard, ENGINE, |op| writer.apply(op));

            match settle_commit(applied, writer.commit()) {
                Ok(()) => {
                    guard.clear_and_unlock();
                    Ok(())
                }
                Err(err) => {
                    guard.unlock();
                    Err(err)
                }
            }
        })
    }

    fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    fn engine(&self) -> &'static str {
        ENGINE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config(path: &std::path::Path) -> StoreConfig {
        StoreConfig::new(path).cache_size_bytes(1024 * 1024)
    }

    #[test]
    fn redb_nothing_opened_before_start() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");

        let store = RedbStore::new(config(&path));
        assert_eq!(store.state(), LifecycleState::Created);
        assert!(!path.exists());
        assert!(matches!(
            store.get("ns", b"k"),
            Err(StoreError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn redb_put_get_delete() {
        let temp = tempdir().unwrap();
        let store = RedbStore::new(config(temp.path()));
        let ctx = LifecycleContext::new();
        store.start(&ctx).unwrap();

        assert!(matches!(
            store.get("ns", b"k"),
            Err(StoreError::NamespaceNotFound { .. })
        ));

        store.put("ns", b"k", b"v").unwrap();
        assert_eq!(store.get("ns", b"k").unwrap(), b"v");

        store.delete("ns", b"k").unwrap();
        assert!(matches!(store.get("ns", b"k"), Err(StoreError::NotExist { .. })));
        store.stop(&ctx).unwrap();
    }

    #[test]
    fn redb_delete_in_unknown_namespace_does_not_create_it() {
        let temp = tempdir().unwrap();
        let store = RedbStore::new(config(temp.path()));
        store.start(&LifecycleContext::new()).unwrap();

        store.delete("ghost", b"k").unwrap();
        assert!(matches!(
            store.get("ghost", b"k"),
            Err(StoreError::NamespaceNotFound { .. })
        ));
    }

    #[test]
    fn redb_put_if_not_exists_conflict_keeps_value() {
        let temp = tempdir().unwrap();
        let store = RedbStore::new(config(temp.path()));
        store.start(&LifecycleContext::new()).unwrap();

        store.put_if_not_exists("ns", b"k", b"v1").unwrap();
        assert!(matches!(
            store.put_if_not_exists("ns", b"k", b"v2"),
            Err(StoreError::AlreadyExists { .. })
        ));
        assert_eq!(store.get("ns", b"k").unwrap(), b"v1");
    }

    #[test]
    fn redb_failed_commit_keeps_applied_prefix() {
        let temp = tempdir().unwrap();
        let store = RedbStore::new(config(temp.path()));
        store.start(&LifecycleContext::new()).unwrap();
        store.put("ns", b"b", b"old").unwrap();

        let batch = WriteBatch::new();
        batch.put("ns", b"a", b"1");
        batch.put_if_not_exists("ns", b"b", b"2");
        batch.put("ns", b"c", b"3");

        assert!(matches!(store.commit(&batch), Err(StoreError::AlreadyExists { .. })));
        assert_eq!(store.get("ns", b"a").unwrap(), b"1");
        assert_eq!(store.get("ns", b"b").unwrap(), b"old");
        assert!(matches!(store.get("ns", b"c"), Err(StoreError::NotExist { .. })));
        assert_eq!(batch.size(), 3);
    }

    #[test]
    fn redb_data_survives_reopen() {
        let temp = tempdir().unwrap();
        let ctx = LifecycleContext::new();

        {
            let store = RedbStore::new(config(temp.path()));
            store.start(&ctx).unwrap();
            store.put("ns", b"k", b"persisted").unwrap();
            store.put("empty", b"gone", b"x").unwrap();
            store.delete("empty", b"gone").unwrap();
            store.stop(&ctx).unwrap();
        }

        let store = RedbStore::new(config(temp.path()));
        store.start(&ctx).unwrap();
        assert_eq!(store.get("ns", b"k").unwrap(), b"persisted");
        assert!(matches!(
            store.get("empty", b"gone"),
            Err(StoreError::NotExist { .. })
        ));
    }

    #[test]
    fn redb_second_store_on_same_path_is_locked() {
        let temp = tempdir().unwrap();
        let ctx = LifecycleContext::new();

        let first = RedbStore::new(config(temp.path()));
        first.start(&ctx).unwrap();

        let second = RedbStore::new(config(temp.path()));
        assert!(matches!(second.start(&ctx), Err(StoreError::Locked { .. })));
        assert_eq!(second.state(), LifecycleState::Created);

        first.stop(&ctx).unwrap();
        second.start(&ctx).unwrap();
    }

    #[test]
    fn redb_start_with_expired_context_opens_nothing() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");
        let store = RedbStore::new(config(&path));

        let expired = LifecycleContext::with_timeout(std::time::Duration::ZERO);
        assert!(matches!(
            store.start(&expired),
            Err(StoreError::InvalidOperation { .. })
        ));
        assert_eq!(store.state(), LifecycleState::Created);
        assert!(!path.exists());
    }

    #[test]
    fn redb_stop_with_cancelled_context_releases_lock() {
        let temp = tempdir().unwrap();
        let first = RedbStore::new(config(temp.path()));
        first.start(&LifecycleContext::new()).unwrap();

        let cancelled = LifecycleContext::new();
        cancelled.cancel();
        first.stop(&cancelled).unwrap();
        assert_eq!(first.state(), LifecycleState::Stopped);

        let second = RedbStore::new(config(temp.path()));
        second.start(&LifecycleContext::new()).unwrap();
    }

    #[test]
    fn redb_entry_error_wins_over_commit_error() {
        let entry = StoreError::already_exists("ns", b"k");
        let commit = StoreError::engine(ENGINE, "disk full");

        let err = settle_commit(Err(entry), Err(commit)).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));

        let err = settle_commit(Ok(()), Err(StoreError::engine(ENGINE, "disk full")));
        assert!(matches!(err, Err(StoreError::Engine { .. })));

        let err = settle_commit(Err(StoreError::namespace_not_found("")), Ok(()));
        assert!(matches!(err, Err(StoreError::NamespaceNotFound { .. })));
        assert!(settle_commit(Ok(()), Ok(())).is_ok());
    }

    #[test]
    fn redb_delete_after_reopen_finds_existing_namespace() {
        let temp = tempdir().unwrap();
        let ctx = LifecycleContext::new();

        {
            let store = RedbStore::new(config(temp.path()));
            store.start(&ctx).unwrap();
            store.put("ns", b"k", b"v").unwrap();
            store.stop(&ctx).unwrap();
        }

        let store = RedbStore::new(config(temp.path()));
        store.start(&ctx).unwrap();
        store.delete("ns", b"k").unwrap();
        assert!(matches!(store.get("ns", b"k"), Err(StoreError::NotExist { .. })));
    }

    #[test]
    fn redb_batch_deletes_from_namespace_it_created() {
        let temp = tempdir().unwrap();
        let store = RedbStore::new(config(temp.path()));
        store.start(&LifecycleContext::new()).unwrap();

        let batch = WriteBatch::new();
        batch.put("fresh", b"a", b"1");
        batch.put("fresh", b"b", b"2");
        batch.delete("fresh", b"a");
        batch.delete("ghost", b"a");
        store.commit(&batch).unwrap();

        assert!(matches!(store.get("fresh", b"a"), Err(StoreError::NotExist { .. })));
        assert_eq!(store.get("fresh", b"b").unwrap(), b"2");
        assert!(matches!(
            store.get("ghost", b"a"),
            Err(StoreError::NamespaceNotFound { .. })
        ));
        assert_eq!(batch.size(), 0);
    }

    #[test]
    fn redb_failed_batch_still_records_created_namespace() {
        let temp = tempdir().unwrap();
        let store = RedbStore::new(config(temp.path()));
        store.start(&LifecycleContext::new()).unwrap();
        store.put("ns", b"k", b"v").unwrap();

        let batch = WriteBatch::new();
        batch.put("fresh", b"a", b"1");
        batch.put_if_not_exists("ns", b"k", b"again");
        assert!(store.commit(&batch).is_err());
        store.delete("fresh", b"a").unwrap();
        assert!(matches!(store.get("fresh", b"a"), Err(StoreError::NotExist { .. })));
    }
}
