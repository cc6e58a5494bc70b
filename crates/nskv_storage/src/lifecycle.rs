//! Store lifecycle: start/stop hooks and the context passed to them.

use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Cancellation token handed to [`StartStopper::start`] and
/// [`StartStopper::stop`].
///
/// The context only governs setup and teardown. Reads, writes and commits
/// never observe it.
///
/// Clones share the same cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct LifecycleContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl LifecycleContext {
    /// Creates a context that is never cancelled on its own.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context that expires after `timeout`.
    ///
    /// A timeout too large to be represented as an instant never expires.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Creates a context that expires at `deadline`.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// Cancels this context and every clone of it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns true once the deadline, if any, has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Fails if the context is cancelled or expired.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` naming the reason.
    pub fn check(&self) -> StoreResult<()> {
        if self.is_cancelled() {
            return Err(StoreError::invalid_operation("lifecycle context cancelled"));
        }
        if self.is_expired() {
            return Err(StoreError::invalid_operation("lifecycle context deadline exceeded"));
        }
        Ok(())
    }
}

/// Where a store is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Constructed; no resources acquired, all operations rejected.
    Created,
    /// Started; operations are served.
    Running,
    /// Stopped; resources released, all operations rejected.
    Stopped,
}

/// Components that acquire resources on start and release them on stop.
pub trait StartStopper {
    /// Acquires the component's resources.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if already started or stopped, or if `ctx`
    /// is cancelled. Backends add their own resource errors.
    fn start(&self, ctx: &LifecycleContext) -> StoreResult<()>;

    /// Releases the component's resources.
    ///
    /// Teardown runs even when `ctx` is cancelled. Stopping a store that was
    /// never started, or is already stopped, succeeds.
    ///
    /// # Errors
    ///
    /// Returns backend errors raised while closing resources.
    fn stop(&self, ctx: &LifecycleContext) -> StoreResult<()>;
}

enum Slot<H> {
    Created,
    Running(H),
    Stopped,
}

/// Lifecycle state plus the resource handle it guards.
///
/// Operations hold the read side for their whole duration, so `stop`
/// waits for in-flight operations before the handle is closed.
pub(crate) struct Lifecycle<H> {
    engine: &'static str,
    slot: RwLock<Slot<H>>,
}

impl<H> Lifecycle<H> {
    pub(crate) fn new(engine: &'static str) -> Self {
        Self {
            engine,
            slot: RwLock::new(Slot::Created),
        }
    }

    pub(crate) fn state(&self) -> LifecycleState {
        match &*self.slot.read() {
            Slot::Created => LifecycleState::Created,
            Slot::Running(_) => LifecycleState::Running,
            Slot::Stopped => LifecycleState::Stopped,
        }
    }

    /// Moves `Created -> Running`, storing the handle produced by `open`.
    ///
    /// A failed `open` leaves the store in `Created`.
    pub(crate) fn start<F>(&self, ctx: &LifecycleContext, open: F) -> StoreResult<()>
    where
        F: FnOnce() -> StoreResult<H>,
    {
        let mut slot = self.slot.write();
        match &*slot {
            Slot::Created => {}
            Slot::Running(_) => {
                return Err(StoreError::invalid_operation(format!(
                    "{} store already started",
                    self.engine
                )))
            }
            Slot::Stopped => {
                return Err(StoreError::invalid_operation(format!(
                    "{} store is stopped and cannot be restarted",
                    self.engine
                )))
            }
        }

        ctx.check()?;
        let handle = open()?;
        *slot = Slot::Running(handle);
        debug!(engine = self.engine, "store started");
        Ok(())
    }

    /// Moves to `Stopped`, passing a running handle to `close`.
    ///
    /// The store is `Stopped` afterwards even if `close` fails.
    pub(crate) fn stop<F>(&self, close: F) -> StoreResult<()>
    where
        F: FnOnce(H) -> StoreResult<()>,
    {
        let mut slot = self.slot.write();
        match std::mem::replace(&mut *slot, Slot::Stopped) {
            Slot::Running(handle) => {
                close(handle)?;
                debug!(engine = self.engine, "store stopped");
                Ok(())
            }
            Slot::Created | Slot::Stopped => Ok(()),
        }
    }

    /// Runs `f` against the handle if the store is running.
    pub(crate) fn with<R, F>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&H) -> StoreResult<R>,
    {
        let slot = self.slot.read();
        match &*slot {
            Slot::Running(handle) => f(handle),
            Slot::Created => Err(StoreError::invalid_operation(format!(
                "{} store not started",
                self.engine
            ))),
            Slot::Stopped => Err(StoreError::invalid_operation(format!(
                "{} store is stopped",
                self.engine
            ))),
        }
    }
}
