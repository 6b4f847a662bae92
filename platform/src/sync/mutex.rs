//! Mutex semaphore.
//!
//! Lock acquisition takes a timeout like every other wait in this layer;
//! `Ok(false)` means the lock could not be had in time. Unlocking a mutex
//! that is not locked is an error, not a silent no-op.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::error::{KernelError, Result};
use crate::handle::{self, CreateDisposition, HandleKind, KernelObject, RawHandle};
use crate::naming::{ResourceName, ResourceType};
use crate::time;

/// Shared state of one mutex object.
pub(crate) struct MutexState {
    locked: AtomicBool,
}

impl MutexState {
    pub(crate) fn new() -> Self {
        MutexState {
            locked: AtomicBool::new(false),
        }
    }
}

/// Mutex semaphore wrapper.
pub struct KrnlMutex {
    handle: RawHandle,
    state: Option<Arc<MutexState>>,
}

impl KrnlMutex {
    /// Create an anonymous, single-process mutex, initially unlocked.
    pub fn new() -> Self {
        let state = Arc::new(MutexState::new());
        let id = handle::create_anonymous(KernelObject::Mutex(state.clone()));
        KrnlMutex {
            handle: RawHandle::new(id, HandleKind::Mutex),
            state: Some(state),
        }
    }

    /// Create or open a named, cross-process mutex per the disposition.
    pub fn create_named(
        name: &ResourceName,
        disposition: CreateDisposition,
    ) -> Result<(Self, bool)> {
        let full = name.full_name(ResourceType::Mutex);
        let (id, created, object) =
            handle::open_named(HandleKind::Mutex, &full, disposition, || {
                KernelObject::Mutex(Arc::new(MutexState::new()))
            })?;
        let state = match object {
            KernelObject::Mutex(state) => state,
            _ => return Err(KernelError::invalid_handle()),
        };
        Ok((
            KrnlMutex {
                handle: RawHandle::new(id, HandleKind::Mutex),
                state: Some(state),
            },
            created,
        ))
    }

    fn state(&self) -> Result<&Arc<MutexState>> {
        self.state.as_ref().ok_or_else(KernelError::invalid_handle)
    }

    /// Whether this wrapper is bound to a live mutex.
    pub fn is_valid(&self) -> bool {
        self.state.is_some()
    }

    /// The opaque handle.
    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    /// Acquire the lock. `Ok(false)` means the timeout expired with the
    /// lock still held elsewhere.
    pub fn lock(&self, timeout_ms: u32) -> Result<bool> {
        let state = self.state()?.clone();
        let acquired = time::poll_until(timeout_ms, || {
            state
                .locked
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
        });
        Ok(acquired)
    }

    /// Release the lock. Fails if the mutex is not locked.
    pub fn unlock(&self) -> Result<()> {
        let state = self.state()?;
        state
            .locked
            .compare_exchange(true, false, Ordering::Release, Ordering::Relaxed)
            .map_err(|_| KernelError::not_ready())?;
        Ok(())
    }

    /// Produce a second wrapper sharing the same mutex.
    pub fn duplicate(&self) -> Result<Self> {
        let state = self.state()?.clone();
        handle::duplicate(self.handle.id())?;
        Ok(KrnlMutex {
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

impl Default for KrnlMutex {
    fn default() -> Self {
        KrnlMutex::new()
    }
}

impl Drop for KrnlMutex {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
