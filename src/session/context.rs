//! Per-request background execution contexts.
//!
//! A context is a current-thread tokio runtime that drives one request's
//! async work to completion from synchronous code. It lives in a session's
//! [`ContextSlot`] only while the [`ContextScope`] that created it is alive,
//! and is destroyed when that scope drops, on every exit path.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Grace period for tasks still running when a context is torn down.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
#[error("failed to start execution context: {0}")]
pub struct ContextError(#[from] std::io::Error);

pub struct ExecutionContext {
    id: u64,
    runtime: tokio::runtime::Runtime,
}

impl ExecutionContext {
    fn create(id: u64) -> Result<Self, ContextError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .thread_name("browser-agent-request")
            .build()?;
        Ok(Self { id, runtime })
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    fn shutdown(self) {
        self.runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
    }
}

/// A session's single execution-context slot.
#[derive(Default)]
pub struct ContextSlot {
    current: Option<ExecutionContext>,
    created: u64,
    destroyed: u64,
}

impl ContextSlot {
    /// Create a fresh context for one request. The returned scope destroys
    /// it when dropped.
    pub fn acquire(&mut self) -> Result<ContextScope<'_>, ContextError> {
        // A previous scope always empties the slot on drop.
        self.destroy();
        let context = ExecutionContext::create(self.created + 1)?;
        self.created += 1;
        debug!(context = context.id(), "Execution context created");
        self.current = Some(context);
        Ok(ContextScope { slot: self })
    }

    /// True while a request holds a context.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    #[must_use]
    pub fn created(&self) -> u64 {
        self.created
    }

    #[must_use]
    pub fn destroyed(&self) -> u64 {
        self.destroyed
    }

    fn destroy(&mut self) {
        if let Some(context) = self.current.take() {
            let id = context.id();
            context.shutdown();
            self.destroyed += 1;
            debug!(context = id, "Execution context destroyed");
        }
    }
}

/// Borrow of a session's execution context for the span of one request.
pub struct ContextScope<'a> {
    slot: &'a mut ContextSlot,
}

impl ContextScope<'_> {
    /// Drive `future` to completion on this context.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        match self.slot.current {
            Some(ref context) => context.runtime.block_on(future),
            // The slot is only emptied by this scope's drop.
            None => unreachable!("execution context released while in scope"),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.slot.current.as_ref().map_or(0, ExecutionContext::id)
    }
}

impl Drop for ContextScope<'_> {
    fn drop(&mut self) {
        self.slot.destroy();
    }
}
