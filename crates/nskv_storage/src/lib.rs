//! # nskv Storage
//!
//! Namespaced key-value storage for a node process.
//!
//! This crate defines the storage contract ([`KvStore`]) and every backend
//! that implements it. Callers address records by namespace and key, issue
//! single operations or accumulate them in a [`WriteBatch`], and never see
//! which engine sits underneath.
//!
//! ## Design Principles
//!
//! - One contract, identical semantics on every backend
//! - Backends treat keys and values as opaque bytes
//! - Nothing is opened until [`StartStopper::start`]
//! - Commits are sequential best-effort: they stop at the first failing
//!   entry and do not roll back
//!
//! ## Available Backends
//!
//! - [`MemKvStore`] - Reference backend for testing
//! - [`RedbStore`] - On-disk B-tree engine (redb)
//! - [`SledStore`] - On-disk log-structured engine (sled)
//!
//! [`new_on_disk_store`] picks between the on-disk engines from a
//! [`StoreConfig`].
//!
//! ## Example
//!
//! ```rust
//! use nskv_storage::{new_mem_store, KvStore, LifecycleContext, StoreError, WriteBatch};
//!
//! let store = new_mem_store();
//! let ctx = LifecycleContext::new();
//! store.start(&ctx).unwrap();
//!
//! store.put("accounts", b"alice", b"100").unwrap();
//! assert!(matches!(
//!     store.put_if_not_exists("accounts", b"alice", b"0"),
//!     Err(StoreError::AlreadyExists { .. })
//! ));
//!
//! let batch = WriteBatch::new();
//! batch.put("accounts", b"bob", b"50");
//! batch.delete("accounts", b"alice");
//! store.commit(&batch).unwrap();
//!
//! assert_eq!(store.get("accounts", b"bob").unwrap(), b"50");
//! store.stop(&ctx).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod config;
mod dir;
mod error;
mod lifecycle;
mod memory;
mod record;
mod redb_store;
mod selector;
mod sled_store;
mod store;

pub use batch::{BatchGuard, WriteBatch};
pub use config::{Engine, ParseEngineError, StoreConfig};
pub use error::{ErrorKind, StoreError, StoreResult};
pub use lifecycle::{LifecycleContext, LifecycleState, StartStopper};
pub use memory::MemKvStore;
pub use record::{validate_namespace, RecordKey, WriteOp, WriteType, KEY_DELIMITER};
pub use redb_store::RedbStore;
pub use selector::{new_mem_store, new_on_disk_store};
pub use sled_store::SledStore;
pub use store::KvStore;
