//! Thread control.
//!
//! Threads run under a pluggable spawn backend so the layer itself stays
//! freestanding. Each thread carries a cooperative shutdown flag; waits
//! for thread death are chopped into bounded slices so a waiter never
//! wedges on a stuck clock source.

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use spin::RwLock;

use crate::error::{KernelError, Result};
use crate::handle::{self, HandleKind, KernelObject, RawHandle};
use crate::time::{self, WAIT_FOREVER};

/// Work handed to the spawn backend.
pub type ThreadEntry = Box<dyn FnOnce() + Send + 'static>;

/// Backend that actually starts a thread of execution.
pub type SpawnBackend = fn(ThreadEntry);

static SPAWN_BACKEND: RwLock<Option<SpawnBackend>> = RwLock::new(None);

static NEXT_TID: AtomicU64 = AtomicU64::new(1);

/// Upper bound on a single sub-wait while waiting for thread death.
const SLICE_MS: u32 = 250;

/// Install the function used to start threads. Without one, spawned
/// entries run inline on the caller.
pub fn register_spawn_backend(backend: SpawnBackend) {
    *SPAWN_BACKEND.write() = Some(backend);
    log::debug!("[Platform Thread] Spawn backend registered");
}

/// Shared state of one thread object.
pub(crate) struct ThreadState {
    tid: u64,
    name: String,
    running: AtomicBool,
    shutdown: AtomicBool,
}

impl ThreadState {
    fn new(tid: u64, name: &str) -> Self {
        ThreadState {
            tid,
            name: name.to_string(),
            running: AtomicBool::new(true),
            shutdown: AtomicBool::new(false),
        }
    }
}

/// Handle given to the thread entry itself, for checking the shutdown
/// flag and reporting identity.
#[derive(Clone)]
pub struct ThreadCtl(Arc<ThreadState>);

impl ThreadCtl {
    /// The thread's id.
    pub fn tid(&self) -> u64 {
        self.0.tid
    }

    /// The thread's name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Whether a shutdown has been requested. Entries are expected to
    /// poll this and return promptly once it goes true.
    pub fn shutdown_requested(&self) -> bool {
        self.0.shutdown.load(Ordering::SeqCst)
    }
}

/// Thread wrapper held by the spawner.
pub struct KrnlThread {
    handle: RawHandle,
    state: Option<Arc<ThreadState>>,
}

impl KrnlThread {
    /// Start a named thread running the given entry. The entry receives
    /// a [`ThreadCtl`] for cooperative shutdown.
    pub fn spawn<F>(name: &str, entry: F) -> Result<Self>
    where
        F: FnOnce(ThreadCtl) + Send + 'static,
    {
        if name.is_empty() {
            return Err(KernelError::bad_parms());
        }
        let tid = NEXT_TID.fetch_add(1, Ordering::SeqCst);
        let state = Arc::new(ThreadState::new(tid, name));
        let id = handle::create_anonymous(KernelObject::Thread(state.clone()));

        let ctl = ThreadCtl(state.clone());
        let run_state = state.clone();
        let body: ThreadEntry = Box::new(move || {
            entry(ctl);
            run_state.running.store(false, Ordering::SeqCst);
        });

        // Copy the backend out so the lock is not held across the call.
        let backend = *SPAWN_BACKEND.read();
        match backend {
            Some(spawn) => spawn(body),
            None => body(),
        }

        log::debug!("[Platform Thread] Spawned '{}' tid={}", name, tid);
        Ok(KrnlThread {
            handle: RawHandle::new(id, HandleKind::Thread),
            state: Some(state),
        })
    }

    fn state(&self) -> Result<&Arc<ThreadState>> {
        self.state.as_ref().ok_or_else(KernelError::invalid_handle)
    }

    /// Whether this wrapper is bound to a thread object.
    pub fn is_valid(&self) -> bool {
        self.state.is_some()
    }

    /// The opaque handle.
    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    /// The thread's id.
    pub fn tid(&self) -> Result<u64> {
        Ok(self.state()?.tid)
    }

    /// The thread's name.
    pub fn name(&self) -> Result<&str> {
        Ok(&self.state()?.name)
    }

    /// Whether the thread's entry is still running.
    pub fn is_running(&self) -> Result<bool> {
        Ok(self.state()?.running.load(Ordering::SeqCst))
    }

    /// Ask the thread to shut down. Cooperative; the entry must notice.
    pub fn request_shutdown(&self) -> Result<()> {
        self.state()?.shutdown.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Wait for the thread to finish. The wait is carved into bounded
    /// slices so a total timeout of forever still re-checks regularly.
    /// `Ok(false)` means the thread was still running at expiry.
    pub fn wait_for_death(&self, timeout_ms: u32) -> Result<bool> {
        let state = self.state()?.clone();
        let mut remaining = timeout_ms;
        loop {
            let slice = if remaining == WAIT_FOREVER {
                SLICE_MS
            } else {
                remaining.min(SLICE_MS)
            };
            if time::poll_until(slice, || !state.running.load(Ordering::SeqCst)) {
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

    /// Produce a second wrapper sharing the same thread object.
    pub fn duplicate(&self) -> Result<Self> {
        let state = self.state()?.clone();
        handle::duplicate(self.handle.id())?;
        Ok(KrnlThread {
            handle: self.handle,
            state: Some(state),
        })
    }

    /// Release this wrapper's claim on the thread object. Does not stop
    /// the thread. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.state.take().is_some() {
            handle::close(self.handle.id())?;
            self.handle.clear();
        }
        Ok(())
    }
}

impl Drop for KrnlThread {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
