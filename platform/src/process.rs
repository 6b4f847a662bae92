//! Process attachment.
//!
//! A process wrapper never owns the process it names; it only tracks
//! liveness through a pluggable query backend. Waits for process death
//! use the same bounded-slice scheme as thread waits.

use alloc::sync::Arc;
use spin::RwLock;

use crate::error::{KernelError, Result};
use crate::handle::{self, HandleKind, KernelObject, RawHandle};
use crate::time::{self, WAIT_FOREVER};

/// Backend answering "is this pid still running".
pub type ProcessQuery = fn(u64) -> bool;

static PROC_QUERY: RwLock<Option<ProcessQuery>> = RwLock::new(None);

const SLICE_MS: u32 = 250;

/// Install the liveness query. Without one, every attached process is
/// reported as not running.
pub fn register_process_query(query: ProcessQuery) {
    *PROC_QUERY.write() = Some(query);
    log::debug!("[Platform Process] Liveness query registered");
}

fn query_running(pid: u64) -> bool {
    let query = *PROC_QUERY.read();
    match query {
        Some(q) => q(pid),
        None => false,
    }
}

/// Shared state of one process attachment.
pub(crate) struct ProcessState {
    pid: u64,
}

/// Process wrapper.
pub struct KrnlProcess {
    handle: RawHandle,
    state: Option<Arc<ProcessState>>,
}

impl KrnlProcess {
    /// Attach to a process by id.
    pub fn attach(pid: u64) -> Result<Self> {
        if pid == 0 {
            return Err(KernelError::bad_parms());
        }
        let state = Arc::new(ProcessState { pid });
        let id = handle::create_anonymous(KernelObject::Process(state.clone()));
        Ok(KrnlProcess {
            handle: RawHandle::new(id, HandleKind::Process),
            state: Some(state),
        })
    }

    fn state(&self) -> Result<&Arc<ProcessState>> {
        self.state.as_ref().ok_or_else(KernelError::invalid_handle)
    }

    /// Whether this wrapper is bound to an attachment.
    pub fn is_valid(&self) -> bool {
        self.state.is_some()
    }

    /// The opaque handle.
    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    /// The attached process id.
    pub fn pid(&self) -> Result<u64> {
        Ok(self.state()?.pid)
    }

    /// Whether the attached process is still running per the backend.
    pub fn is_running(&self) -> Result<bool> {
        Ok(query_running(self.state()?.pid))
    }

    /// Wait for the process to exit, in bounded slices. `Ok(false)`
    /// means it was still running at expiry.
    pub fn wait_for_death(&self, timeout_ms: u32) -> Result<bool> {
        let pid = self.state()?.pid;
        let mut remaining = timeout_ms;
        loop {
            let slice = if remaining == WAIT_FOREVER {
                SLICE_MS
            } else {
                remaining.min(SLICE_MS)
            };
            if time::poll_until(slice, || !query_running(pid)) {
                return Ok(true);
            }
            if remaining != WAIT_FOREVER {
                remaining -= slice;
                if remaining == 0 {
                    return Ok(false);
                }
            }
        }
    }

    /// Produce a second wrapper for the same attachment.
    pub fn duplicate(&self) -> Result<Self> {
        let state = self.state()?.clone();
        handle::duplicate(self.handle.id())?;
        Ok(KrnlProcess {
            handle: self.handle,
            state: Some(state),
        })
    }

    /// Release this wrapper's claim. The process itself is unaffected.
    /// Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.state.take().is_some() {
            handle::close(self.handle.id())?;
            self.handle.clear();
        }
        Ok(())
    }
}

impl Drop for KrnlProcess {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
