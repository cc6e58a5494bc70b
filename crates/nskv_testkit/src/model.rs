//! Model-based checking.
//!
//! [`ModelStore`] is a deliberately naive single-threaded model of the
//! store contract. [`check_against_model`] drives a real store and the
//! model with the same operations and reports the first divergence.

use crate::generators::StoreOp;
use nskv_storage::{ErrorKind, KvStore, StoreError, StoreResult, WriteBatch, WriteOp};
use std::collections::{HashMap, HashSet};

/// A plain-collections model of a store.
#[derive(Debug, Default, Clone)]
pub struct ModelStore {
    records: HashMap<(String, Vec<u8>), Vec<u8>>,
    namespaces: HashSet<String>,
}

impl ModelStore {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Models `put`.
    pub fn put(&mut self, namespace: &str, key: &[u8], value: &[u8]) -> StoreResult<()> {
        nskv_storage::validate_namespace(namespace)?;
        self.namespaces.insert(namespace.to_string());
        self.records
            .insert((namespace.to_string(), key.to_vec()), value.to_vec());
        Ok(())
    }

    /// Models `put_if_not_exists`.
    pub fn put_if_not_exists(
        &mut self,
        namespace: &str,
        key: &[u8],
        value: &[u8],
    ) -> StoreResult<()> {
        nskv_storage::validate_namespace(namespace)?;
        self.namespaces.insert(namespace.to_string());
        let id = (namespace.to_string(), key.to_vec());
        if self.records.contains_key(&id) {
            return Err(StoreError::already_exists(namespace, key));
        }
        self.records.insert(id, value.to_vec());
        Ok(())
    }

    /// Models `get`.
    pub fn get(&self, namespace: &str, key: &[u8]) -> StoreResult<Vec<u8>> {
        if !self.namespaces.contains(namespace) {
            return Err(StoreError::namespace_not_found(namespace));
        }
        self.records
            .get(&(namespace.to_string(), key.to_vec()))
            .cloned()
            .ok_or_else(|| StoreError::not_exist(namespace, key))
    }

    /// Models `delete`.
    pub fn delete(&mut self, namespace: &str, key: &[u8]) -> StoreResult<()> {
        self.records.remove(&(namespace.to_string(), key.to_vec()));
        Ok(())
    }

    /// Models a single write.
    pub fn apply(&mut self, op: &WriteOp) -> StoreResult<()> {
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
            } => self.put_if_not_exists(namespace, key, value),
            WriteOp::Delete { namespace, key } => self.delete(namespace, key),
        }
    }

    /// Models `commit`: in order, stopping at the first failure.
    pub fn commit(&mut self, ops: &[WriteOp]) -> StoreResult<()> {
        for op in ops {
            self.apply(op)?;
        }
        Ok(())
    }

    /// Returns every modelled record.
    pub fn records(&self) -> impl Iterator<Item = (&str, &[u8], &[u8])> {
        self.records
            .iter()
            .map(|((ns, key), value)| (ns.as_str(), key.as_slice(), value.as_slice()))
    }
}

fn outcome<T>(result: &StoreResult<T>) -> Result<&T, ErrorKind> {
    result.as_ref().map_err(StoreError::kind)
}

/// Runs `ops` against `store` and a fresh model, comparing every outcome
/// and finally every modelled record.
///
/// # Errors
///
/// Returns a description of the first divergence.
pub fn check_against_model(store: &dyn KvStore, ops: &[StoreOp]) -> Result<(), String> {
    let mut model = ModelStore::new();

    for (step, op) in ops.iter().enumerate() {
        match op {
            StoreOp::Write(write) => {
                let actual = match write {
                    WriteOp::Put {
                        namespace,
                        key,
                        value,
                    } => store.put(namespace, key, value),
                    WriteOp::PutIfNotExists {
                        namespace,
                        key,
                        value,
                    } => store.put_if_not_exists(namespace, key, value),
                    WriteOp::Delete { namespace, key } => store.delete(namespace, key),
                };
                let expected = model.apply(write);
                if outcome(&actual) != outcome(&expected) {
                    return Err(format!(
                        "step {step}: {write:?}: store {actual:?}, model {expected:?}"
                    ));
                }
            }
            StoreOp::Get { namespace, key } => {
                let actual = store.get(namespace, key);
                let expected = model.get(namespace, key);
                if outcome(&actual) != outcome(&expected) {
                    return Err(format!(
                        "step {step}: get {namespace}/{key:?}: store {actual:?}, model {expected:?}"
                    ));
                }
            }
            StoreOp::Commit(writes) => {
                let batch: WriteBatch = writes.iter().cloned().collect();
                let actual = store.commit(&batch);
                let expected = model.commit(writes);
                if outcome(&actual) != outcome(&expected) {
                    return Err(format!(
                        "step {step}: commit {writes:?}: store {actual:?}, model {expected:?}"
                    ));
                }
                let expected_left = if expected.is_ok() { 0 } else { writes.len() };
                if batch.size() != expected_left {
                    return Err(format!(
                        "step {step}: batch left with {} entries, expected {expected_left}",
                        batch.size()
                    ));
                }
            }
        }
    }

    for (namespace, key, value) in model.records() {
        match store.get(namespace, key) {
            Ok(actual) if actual == value => {}
            other => {
                return Err(format!(
                    "final state: {namespace}/{key:?}: store {other:?}, model {value:?}"
                ))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_reports_namespace_before_key() {
        let mut model = ModelStore::new();
        assert_eq!(
            model.get("ns", b"k").unwrap_err().kind(),
            ErrorKind::NamespaceNotFound
        );
        model.put("ns", b"other", b"v").unwrap();
        assert_eq!(
            model.get("ns", b"k").unwrap_err().kind(),
            ErrorKind::NotExist
        );
    }

    #[test]
    fn model_commit_stops_at_failure() {
        let mut model = ModelStore::new();
        model.put("n", b"b", b"old").unwrap();

        let result = model.commit(&[
            WriteOp::put("n", b"a".to_vec(), b"1".to_vec()),
            WriteOp::put_if_not_exists("n", b"b".to_vec(), b"2".to_vec()),
            WriteOp::put("n", b"c".to_vec(), b"3".to_vec()),
        ]);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::AlreadyExists);
        assert_eq!(model.get("n", b"a").unwrap(), b"1");
        assert_eq!(
            model.get("n", b"c").unwrap_err().kind(),
            ErrorKind::NotExist
        );
    }
}
