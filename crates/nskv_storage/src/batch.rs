//! Write batches.
//!
//! A [`WriteBatch`] is an ordered log of pending [`WriteOp`]s. Callers build
//! it without touching a store and hand it to [`KvStore::commit`], which
//! drains it under the batch's own lock:
//!
//! - entries are applied in insertion order
//! - the log is cleared only if every entry applied without error
//! - on failure the log is left intact and the lock is released
//!
//! The lock protects the log, not the store. Two batches committed against
//! the same store concurrently race at record level like any other writes.
//!
//! [`KvStore::commit`]: crate::KvStore::commit

use crate::error::{StoreError, StoreResult};
use crate::record::WriteOp;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// An ordered, lockable log of pending writes.
///
/// All methods take `&self`, so a batch can be shared (e.g. in an `Arc`)
/// between the thread filling it and the thread committing it.
///
/// # Example
///
/// ```rust
/// use nskv_storage::{KvStore, LifecycleContext, MemKvStore, StartStopper, WriteBatch};
///
/// let store = MemKvStore::new();
/// store.start(&LifecycleContext::new()).unwrap();
///
/// let batch = WriteBatch::new();
/// batch.put("accounts", b"alice", b"100");
/// batch.put_if_not_exists("accounts", b"bob", b"50");
/// assert_eq!(batch.size(), 2);
///
/// store.commit(&batch).unwrap();
/// assert!(batch.is_empty());
/// assert_eq!(store.get("accounts", b"bob").unwrap(), b"50");
/// ```
#[derive(Debug, Default)]
pub struct WriteBatch {
    entries: Mutex<Vec<WriteOp>>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty batch with room for `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Appends an unconditional put.
    pub fn put(&self, namespace: &str, key: &[u8], value: &[u8]) {
        self.push(WriteOp::put(namespace, key, value));
    }

    /// Appends a put that only applies if the key is absent.
    pub fn put_if_not_exists(&self, namespace: &str, key: &[u8], value: &[u8]) {
        self.push(WriteOp::put_if_not_exists(namespace, key, value));
    }

    /// Appends a delete.
    pub fn delete(&self, namespace: &str, key: &[u8]) {
        self.push(WriteOp::delete(namespace, key));
    }

    /// Appends an already-built operation.
    ///
    /// Blocks while the batch is being committed.
    pub fn push(&self, op: WriteOp) {
        self.entries.lock().push(op);
    }

    /// Returns the number of pending entries.
    #[must_use]
    pub fn size(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if no entries are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns a copy of the pending entries, in order.
    #[must_use]
    pub fn entries(&self) -> Vec<WriteOp> {
        self.entries.lock().clone()
    }

    /// Discards all pending entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Locks the log for draining.
    ///
    /// Appends from other threads block until the returned guard is
    /// released with [`BatchGuard::unlock`], [`BatchGuard::clear_and_unlock`],
    /// or by dropping it.
    pub fn lock(&self) -> BatchGuard<'_> {
        BatchGuard {
            entries: self.entries.lock(),
        }
    }
}

impl Clone for WriteBatch {
    fn clone(&self) -> Self {
        Self {
            entries: Mutex::new(self.entries()),
        }
    }
}

impl FromIterator<WriteOp> for WriteBatch {
    fn from_iter<I: IntoIterator<Item = WriteOp>>(iter: I) -> Self {
        Self {
            entries: Mutex::new(iter.into_iter().collect()),
        }
    }
}

/// Exclusive access to a batch's log while it is drained.
#[must_use = "dropping the guard unlocks the batch immediately"]
pub struct BatchGuard<'a> {
    entries: MutexGuard<'a, Vec<WriteOp>>,
}

impl<'a> BatchGuard<'a> {
    /// Returns the number of entries in the locked log.
    #[must_use]
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Returns the entry at `index`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `index` is out of range.
    pub fn entry(&self, index: usize) -> StoreResult<&WriteOp> {
        self.entries.get(index).ok_or_else(|| {
            StoreError::invalid_operation(format!(
                "batch entry {} out of range (size {})",
                index,
                self.entries.len()
            ))
        })
    }

    /// Iterates the locked entries in order.
    pub fn iter(&self) -> impl Iterator<Item = &WriteOp> {
        self.entries.iter()
    }

    /// Releases the lock, leaving the log intact.
    pub fn unlock(self) {}

    /// Clears the log and releases the lock.
    pub fn clear_and_unlock(mut self) {
        self.entries.clear();
    }
}

/// Applies the locked entries through `apply`, in order.
///
/// Stops at the first failing entry and returns its error. Does not touch
/// the log; the caller decides whether to clear it.
pub(crate) fn drain<F>(guard: &BatchGuard<'_>, engine: &str, mut apply: F) -> StoreResult<()>
where
    F: FnMut(&WriteOp) -> StoreResult<()>,
{
    let size = guard.size();
    for index in 0..size {
        let op = guard.entry(index)?;
        if let Err(err) = apply(op) {
            warn!(
                engine,
                index,
                size,
                op = ?op.write_type(),
                error = %err,
                "batch commit stopped"
            );
            return Err(err);
        }
    }
    debug!(engine, size, "batch drained");
    Ok(())
}

/// Drains `batch` through `apply`, one entry at a time.
///
/// Entries applied before a failure stay applied. The log is cleared only
/// when every entry succeeded.
pub(crate) fn commit_with<F>(batch: &WriteBatch, engine: &str, apply: F) -> StoreResult<()>
where
    F: FnMut(&WriteOp) -> StoreResult<()>,
{
    let guard = batch.lock();
    match drain(&guard, engine, apply) {
        Ok(()) => {
            guard.clear_and_unlock();
            Ok(())
        }
        Err(err) => {
            guard.unlock();
            Err(err)
        }
    }
}
