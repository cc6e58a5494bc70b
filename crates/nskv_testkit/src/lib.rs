//! # nskv Testkit
//!
//! Test utilities for nskv stores.
//!
//! This crate provides:
//! - Test fixtures that start a store of any backend in a temporary directory
//! - A conformance suite every backend must pass
//! - Property-based test generators using proptest
//! - A model store for model-based checking
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nskv_testkit::prelude::*;
//!
//! #[test]
//! fn redb_conforms() {
//!     run_contract_suite(BackendKind::Redb);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod contract;
pub mod fixtures;
pub mod generators;
pub mod model;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::contract::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::model::*;
    pub use crate::stress::*;
}

pub use contract::*;
pub use fixtures::*;
pub use generators::*;
pub use model::*;
pub use stress::*;
