//! Property-based test generators using proptest.
//!
//! Namespaces and keys are drawn from small pools so that generated
//! operation sequences collide often enough to exercise overwrites,
//! conflicts and deletes of existing records.

use nskv_storage::WriteOp;
use proptest::prelude::*;

/// Strategy for namespaces from a small fixed pool.
pub fn namespace_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["blocks", "receipts", "state", "a.b"]).prop_map(str::to_string)
}

/// Strategy for keys from a small pool, including the empty key.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..4, 0..3)
}

/// Strategy for arbitrary values.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

/// Strategy for a single write operation.
pub fn write_op_strategy() -> impl Strategy<Value = WriteOp> {
    prop_oneof![
        3 => (namespace_strategy(), key_strategy(), value_strategy())
            .prop_map(|(ns, key, value)| WriteOp::put(ns, key, value)),
        2 => (namespace_strategy(), key_strategy(), value_strategy())
            .prop_map(|(ns, key, value)| WriteOp::put_if_not_exists(ns, key, value)),
        2 => (namespace_strategy(), key_strategy())
            .prop_map(|(ns, key)| WriteOp::delete(ns, key)),
    ]
}

/// An operation against a store, as driven by model-based tests.
#[derive(Debug, Clone)]
pub enum StoreOp {
    /// A single write.
    Write(WriteOp),
    /// A read.
    Get {
        /// Namespace read from.
        namespace: String,
        /// Key read.
        key: Vec<u8>,
    },
    /// A batch of writes committed together.
    Commit(Vec<WriteOp>),
}

/// Strategy for a store operation.
pub fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        4 => write_op_strategy().prop_map(StoreOp::Write),
        3 => (namespace_strategy(), key_strategy())
            .prop_map(|(namespace, key)| StoreOp::Get { namespace, key }),
        1 => prop::collection::vec(write_op_strategy(), 0..6).prop_map(StoreOp::Commit),
    ]
}

/// Strategy for a sequence of one to `max_len` store operations.
///
/// A `max_len` of zero is treated as one.
pub fn store_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<StoreOp>> {
    prop::collection::vec(store_op_strategy(), 1..=max_len.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_namespaces_are_valid(ns in namespace_strategy()) {
            prop_assert!(nskv_storage::validate_namespace(&ns).is_ok());
        }

        #[test]
        fn generated_keys_are_short(key in key_strategy()) {
            prop_assert!(key.len() < 3);
        }

        #[test]
        fn single_op_sequences(ops in store_ops_strategy(1)) {
            prop_assert_eq!(ops.len(), 1);
        }

        #[test]
        fn zero_max_len_still_yields_one_op(ops in store_ops_strategy(0)) {
            prop_assert_eq!(ops.len(), 1);
        }
    }
}
