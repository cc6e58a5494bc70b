//! Error types for store operations.

use crate::record::hex_key;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by every [`KvStore`](crate::KvStore) backend.
///
/// The first five variants are the contract's failure kinds and mean the
/// same thing on every backend. `Locked`, `Io` and `Engine` surface failures
/// of the on-disk layer and its embedded engine.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Operation attempted on a backend not in a usable lifecycle state,
    /// or an otherwise malformed call.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Why the operation was rejected.
        message: String,
    },

    /// The key is absent from an existing namespace.
    #[error("not exist: key = {} in namespace {namespace}", hex_key(.key))]
    NotExist {
        /// Namespace that was searched.
        namespace: String,
        /// Key that was not found.
        key: Vec<u8>,
    },

    /// The namespace has never been written to.
    #[error("namespace not found: {namespace}")]
    NamespaceNotFound {
        /// Name of the namespace.
        namespace: String,
    },

    /// A conditional write found an existing record.
    #[error("already exists: key = {} in namespace {namespace}", hex_key(.key))]
    AlreadyExists {
        /// Namespace of the existing record.
        namespace: String,
        /// Key of the existing record.
        key: Vec<u8>,
    },

    /// The record was already removed.
    ///
    /// Reserved for callers that must tell a deleted record apart from one
    /// that never existed. No backend returns it today.
    #[error("already deleted: key = {} in namespace {namespace}", hex_key(.key))]
    AlreadyDeleted {
        /// Namespace of the deleted record.
        namespace: String,
        /// Key of the deleted record.
        key: Vec<u8>,
    },

    /// Another store holds the storage directory.
    #[error("store locked: {} is held by another store", .path.display())]
    Locked {
        /// The locked storage directory.
        path: PathBuf,
    },

    /// An I/O error occurred while preparing the storage directory.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The embedded engine reported a failure.
    #[error("{engine} error: {message}")]
    Engine {
        /// Engine name (`redb`, `sled`).
        engine: &'static str,
        /// Engine error text.
        message: String,
    },
}

/// Payload-free discriminant of [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`StoreError::InvalidOperation`].
    InvalidOperation,
    /// See [`StoreError::NotExist`].
    NotExist,
    /// See [`StoreError::NamespaceNotFound`].
    NamespaceNotFound,
    /// See [`StoreError::AlreadyExists`].
    AlreadyExists,
    /// See [`StoreError::AlreadyDeleted`].
    AlreadyDeleted,
    /// See [`StoreError::Locked`].
    Locked,
    /// See [`StoreError::Io`].
    Io,
    /// See [`StoreError::Engine`].
    Engine,
}

impl StoreError {
    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidOperation { .. } => ErrorKind::InvalidOperation,
            Self::NotExist { .. } => ErrorKind::NotExist,
            Self::NamespaceNotFound { .. } => ErrorKind::NamespaceNotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::AlreadyDeleted { .. } => ErrorKind::AlreadyDeleted,
            Self::Locked { .. } => ErrorKind::Locked,
            Self::Io(_) => ErrorKind::Io,
            Self::Engine { .. } => ErrorKind::Engine,
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a not-exist error.
    pub fn not_exist(namespace: &str, key: &[u8]) -> Self {
        Self::NotExist {
            namespace: namespace.to_string(),
            key: key.to_vec(),
        }
    }

    /// Creates a namespace-not-found error.
    pub fn namespace_not_found(namespace: &str) -> Self {
        Self::NamespaceNotFound {
            namespace: namespace.to_string(),
        }
    }

    /// Creates an already-exists error.
    pub fn already_exists(namespace: &str, key: &[u8]) -> Self {
        Self::AlreadyExists {
            namespace: namespace.to_string(),
            key: key.to_vec(),
        }
    }

    /// Creates an already-deleted error.
    pub fn already_deleted(namespace: &str, key: &[u8]) -> Self {
        Self::AlreadyDeleted {
            namespace: namespace.to_string(),
            key: key.to_vec(),
        }
    }

    /// Creates an engine error.
    pub fn engine(engine: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Engine {
            engine,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(
            StoreError::invalid_operation("x").kind(),
            ErrorKind::InvalidOperation
        );
        assert_eq!(
            StoreError::not_exist("ns", b"k").kind(),
            ErrorKind::NotExist
        );
        assert_eq!(
            StoreError::namespace_not_found("ns").kind(),
            ErrorKind::NamespaceNotFound
        );
        assert_eq!(
            StoreError::already_exists("ns", b"k").kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            StoreError::already_deleted("ns", b"k").kind(),
            ErrorKind::AlreadyDeleted
        );
        assert_eq!(StoreError::engine("redb", "boom").kind(), ErrorKind::Engine);
    }

    #[test]
    fn display_renders_key_as_hex() {
        let err = StoreError::not_exist("accounts", &[0xde, 0xad]);
        assert_eq!(
            err.to_string(),
            "not exist: key = dead in namespace accounts"
        );

        let err = StoreError::already_exists("accounts", b"");
        assert_eq!(
            err.to_string(),
            "already exists: key =  in namespace accounts"
        );
    }

    #[test]
    fn io_errors_convert() {
        let err: StoreError = io::Error::new(io::ErrorKind::Other, "disk gone").into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
