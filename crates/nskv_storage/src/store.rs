//! The key-value store contract.

use crate::batch::WriteBatch;
use crate::error::StoreResult;
use crate::lifecycle::{LifecycleState, StartStopper};

/// A namespaced key-value store.
///
/// Every backend implements this contract with identical semantics. The
/// in-memory [`MemKvStore`](crate::MemKvStore) is the executable reference;
/// the on-disk adapters must behave the same way.
///
/// # Invariants
///
/// - A namespace exists from its first put and is never removed by deletes
/// - `get` checks the namespace before the key
/// - At most one of many concurrent `put_if_not_exists` calls on the same
///   key succeeds
/// - `commit` applies entries in order and stops at the first failure,
///   without rolling back what it already applied
/// - Every method fails with `InvalidOperation` before `start` and after
///   `stop`
///
/// # Implementors
///
/// - [`MemKvStore`](crate::MemKvStore) - reference backend for tests
/// - [`RedbStore`](crate::RedbStore) - B-tree engine
/// - [`SledStore`](crate::SledStore) - log-structured engine
pub trait KvStore: StartStopper + Send + Sync {
    /// Inserts or overwrites the record for `(namespace, key)`.
    ///
    /// # Errors
    ///
    /// Fails only if the store is unusable or the namespace is empty.
    fn put(&self, namespace: &str, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Inserts the record only if none exists for `(namespace, key)`.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if a record is present; the stored value is
    /// left untouched.
    fn put_if_not_exists(&self, namespace: &str, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Returns the current value for `(namespace, key)`.
    ///
    /// # Errors
    ///
    /// Returns `NamespaceNotFound` if the namespace was never written to,
    /// and `NotExist` if the key is absent or deleted.
    fn get(&self, namespace: &str, key: &[u8]) -> StoreResult<Vec<u8>>;

    /// Removes the record if present.
    ///
    /// Deleting an absent key, or a key in an unknown namespace, succeeds
    /// and does not create the namespace.
    ///
    /// # Errors
    ///
    /// Fails only if the store is unusable.
    fn delete(&self, namespace: &str, key: &[u8]) -> StoreResult<()>;

    /// Applies every entry of `batch`, in order.
    ///
    /// On success the batch is cleared. On the first failing entry the
    /// commit stops, returns that entry's error, and leaves the batch
    /// intact; entries before it remain applied.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing entry.
    fn commit(&self, batch: &WriteBatch) -> StoreResult<()>;

    /// Returns the store's lifecycle state.
    fn state(&self) -> LifecycleState;

    /// Short engine name, used in logs.
    fn engine(&self) -> &'static str;
}
