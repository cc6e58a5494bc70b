//! Record addressing and write operations.

use crate::error::{StoreError, StoreResult};
use std::fmt;

/// Separator between namespace and key in the textual form of a [`RecordKey`].
pub const KEY_DELIMITER: &str = ".";

/// Identity of a record: a namespace plus a key unique within it.
///
/// Kept structured rather than concatenated, so `("a.b", "c")` and
/// `("a", "b.c")` never alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    /// Namespace the record lives in.
    pub namespace: String,
    /// Key within the namespace.
    pub key: Vec<u8>,
}

impl RecordKey {
    /// Creates a record key.
    pub fn new(namespace: impl Into<String>, key: impl Into<Vec<u8>>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.namespace, KEY_DELIMITER, hex_key(&self.key)
        )
    }
}

/// Discriminant of a [`WriteOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteType {
    /// Insert or overwrite.
    Put,
    /// Insert only if absent.
    PutIfNotExists,
    /// Remove if present.
    Delete,
}

/// A pending write, as recorded in a [`WriteBatch`](crate::WriteBatch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Insert or overwrite the record.
    Put {
        /// Target namespace.
        namespace: String,
        /// Target key.
        key: Vec<u8>,
        /// Value to store.
        value: Vec<u8>,
    },
    /// Insert the record only if no record exists for the key.
    PutIfNotExists {
        /// Target namespace.
        namespace: String,
        /// Target key.
        key: Vec<u8>,
        /// Value to store.
        value: Vec<u8>,
    },
    /// Remove the record if present.
    Delete {
        /// Target namespace.
        namespace: String,
        /// Target key.
        key: Vec<u8>,
    },
}

impl WriteOp {
    /// Creates a put operation.
    pub fn put(
        namespace: impl Into<String>,
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Self::Put {
            namespace: namespace.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    /// Creates a conditional put operation.
    pub fn put_if_not_exists(
        namespace: impl Into<String>,
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Self::PutIfNotExists {
            namespace: namespace.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    /// Creates a delete operation.
    pub fn delete(namespace: impl Into<String>, key: impl Into<Vec<u8>>) -> Self {
        Self::Delete {
            namespace: namespace.into(),
            key: key.into(),
        }
    }

    /// Returns the operation type.
    #[must_use]
    pub fn write_type(&self) -> WriteType {
        match self {
            Self::Put { .. } => WriteType::Put,
            Self::PutIfNotExists { .. } => WriteType::PutIfNotExists,
            Self::Delete { .. } => WriteType::Delete,
        }
    }

    /// Returns the target namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        match self {
            Self::Put { namespace, .. }
            | Self::PutIfNotExists { namespace, .. }
            | Self::Delete { namespace, .. } => namespace,
        }
    }

    /// Returns the target key.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Put { key, .. }
            | Self::PutIfNotExists { key, .. }
            | Self::Delete { key, .. } => key,
        }
    }

    /// Returns the value for put variants, `None` for deletes.
    #[must_use]
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            Self::Put { value, .. } | Self::PutIfNotExists { value, .. } => Some(value.as_slice()),
            Self::Delete { .. } => None,
        }
    }
}

/// Rejects namespaces that cannot be created on every backend.
///
/// # Errors
///
/// Returns `InvalidOperation` for the empty namespace.
pub fn validate_namespace(namespace: &str) -> StoreResult<()> {
    if namespace.is_empty() {
        return Err(StoreError::invalid_operation("namespace must not be empty"));
    }
    Ok(())
}

/// Lower-case hex rendering of a key, for logs and error messages.
pub(crate) fn hex_key(key: &[u8]) -> String {
    use std::fmt::Write as _;

    let mut out = String::with_capacity(key.len() * 2);
    for byte in key {
        // Writing to a String cannot fail.
        let _ = write!(out, "{byte:02x}");
    }
    out
}
