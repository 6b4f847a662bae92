//! Counting semaphore.
//!
//! Created with an initial count and a maximum. `enter` consumes a unit,
//! waiting up to the timeout for one to become available; `exit` returns
//! a unit and fails if doing so would exceed the maximum.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::{KernelError, Result};
use crate::handle::{self, CreateDisposition, HandleKind, KernelObject, RawHandle};
use crate::naming::{ResourceName, ResourceType};
use crate::time;

/// Shared state of one semaphore object.
pub(crate) struct SemaphoreState {
    count: AtomicU32,
    max_count: u32,
}

impl SemaphoreState {
    pub(crate) fn new(initial: u32, max_count: u32) -> Self {
        SemaphoreState {
            count: AtomicU32::new(initial),
            max_count,
        }
    }
}

/// Counting semaphore wrapper.
pub struct KrnlSemaphore {
    handle: RawHandle,
    state: Option<Arc<SemaphoreState>>,
}

impl KrnlSemaphore {
    /// Create an anonymous, single-process semaphore. The initial count
    /// must not exceed the maximum.
    pub fn new(initial: u32, max_count: u32) -> Result<Self> {
        if initial > max_count || max_count == 0 {
            return Err(KernelError::bad_parms());
        }
        let state = Arc::new(SemaphoreState::new(initial, max_count));
        let id = handle::create_anonymous(KernelObject::Semaphore(state.clone()));
        Ok(KrnlSemaphore {
            handle: RawHandle::new(id, HandleKind::Semaphore),
            state: Some(state),
        })
    }

    /// Create or open a named, cross-process semaphore per the
    /// disposition. The counts only apply when the semaphore is freshly
    /// created; on open they are taken from the existing object.
    pub fn create_named(
        name: &ResourceName,
        disposition: CreateDisposition,
        initial: u32,
        max_count: u32,
    ) -> Result<(Self, bool)> {
        if initial > max_count || max_count == 0 {
            return Err(KernelError::bad_parms());
        }
        let full = name.full_name(ResourceType::Semaphore);
        let (id, created, object) =
            handle::open_named(HandleKind::Semaphore, &full, disposition, || {
                KernelObject::Semaphore(Arc::new(SemaphoreState::new(initial, max_count)))
            })?;
        let state = match object {
            KernelObject::Semaphore(state) => state,
            _ => return Err(KernelError::invalid_handle()),
        };
        Ok((
            KrnlSemaphore {
                handle: RawHandle::new(id, HandleKind::Semaphore),
                state: Some(state),
            },
            created,
        ))
    }

    fn state(&self) -> Result<&Arc<SemaphoreState>> {
        self.state.as_ref().ok_or_else(KernelError::invalid_handle)
    }

    /// Whether this wrapper is bound to a live semaphore.
    pub fn is_valid(&self) -> bool {
        self.state.is_some()
    }

    /// The opaque handle.
    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    /// Current available count.
    pub fn count(&self) -> Result<u32> {
        Ok(self.state()?.count.load(Ordering::SeqCst))
    }

    /// Consume one unit, waiting up to the timeout for one to become
    /// available. `Ok(false)` means the timeout expired.
    pub fn enter(&self, timeout_ms: u32) -> Result<bool> {
        let state = self.state()?.clone();
        let entered = time::poll_until(timeout_ms, || {
            let current = state.count.load(Ordering::Acquire);
            current > 0
                && state
                    .count
                    .compare_exchange(current, current - 1, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
        });
        Ok(entered)
    }

    /// Return one unit. Fails if the count is already at the maximum.
    pub fn exit(&self) -> Result<()> {
        let state = self.state()?;
        loop {
            let current = state.count.load(Ordering::Acquire);
            if current >= state.max_count {
                return Err(KernelError::index_range());
            }
            if state
                .count
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Ok(());
            }
        }
    }

    /// Produce a second wrapper sharing the same semaphore.
    pub fn duplicate(&self) -> Result<Self> {
        let state = self.state()?.clone();
        handle::duplicate(self.handle.id())?;
        Ok(KrnlSemaphore {
            handle: self.handle,
            state: Some(state),
        })
    }

    /// Release this wrapper's claim. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.state.take().is_some() {
            handle::close(self.handle.id())?;
            self.handle.clear();
        }
        Ok(())
    }
}

impl Drop for KrnlSemaphore {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
