//! Command implementations.
//!
//! Every command runs against a started store and writes its output to
//! the given writer, so commands can be exercised without a terminal.

use nskv_storage::{KvStore, LifecycleContext, StoreError, WriteBatch};
use std::io::{self, Write};
use tracing::debug;

/// Errors produced by CLI commands.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A `key=value` argument had no `=`.
    #[error("invalid pair {0:?}: expected key=value")]
    InvalidPair(String),

    /// Writing output failed.
    #[error("output error: {0}")]
    Output(#[from] io::Error),
}

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Starts `store`, runs `f` against it and stops it again.
///
/// The store is stopped even when `f` fails; the first error wins.
pub fn with_store<F>(store: &dyn KvStore, f: F) -> CliResult<()>
where
    F: FnOnce(&dyn KvStore) -> CliResult<()>,
{
    let ctx = LifecycleContext::new();
    store.start(&ctx)?;

    let result = f(store);
    let stopped = store.stop(&ctx);
    result?;
    stopped?;
    Ok(())
}

/// Runs the put command.
pub fn put(store: &dyn KvStore, namespace: &str, key: &str, value: &str) -> CliResult<()> {
    store.put(namespace, key.as_bytes(), value.as_bytes())?;
    Ok(())
}

/// Runs the put-if-absent command.
pub fn put_if_absent(
    store: &dyn KvStore,
    namespace: &str,
    key: &str,
    value: &str,
) -> CliResult<()> {
    store.put_if_not_exists(namespace, key.as_bytes(), value.as_bytes())?;
    Ok(())
}

/// Runs the get command, printing the value as text or hex.
pub fn get(
    store: &dyn KvStore,
    namespace: &str,
    key: &str,
    hex: bool,
    out: &mut impl Write,
) -> CliResult<()> {
    let value = store.get(namespace, key.as_bytes())?;
    if hex {
        writeln!(out, "{}", to_hex(&value))?;
    } else {
        writeln!(out, "{}", String::from_utf8_lossy(&value))?;
    }
    Ok(())
}

/// Runs the delete command.
pub fn delete(store: &dyn KvStore, namespace: &str, key: &str) -> CliResult<()> {
    store.delete(namespace, key.as_bytes())?;
    Ok(())
}

/// Runs the batch command: one committed batch of puts.
pub fn batch(
    store: &dyn KvStore,
    namespace: &str,
    pairs: &[String],
    out: &mut impl Write,
) -> CliResult<()> {
    let batch = WriteBatch::with_capacity(pairs.len());
    for pair in pairs {
        let (key, value) = parse_pair(pair)?;
        batch.put(namespace, key.as_bytes(), value.as_bytes());
    }

    debug!(namespace, entries = batch.size(), "committing batch");
    store.commit(&batch)?;
    writeln!(out, "committed {} entries to {namespace}", pairs.len())?;
    Ok(())
}

fn parse_pair(pair: &str) -> CliResult<(&str, &str)> {
    pair.split_once('=').ok_or_else(|| CliError::InvalidPair(pair.to_string()))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
