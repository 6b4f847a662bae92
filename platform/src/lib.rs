//! Ferrox platform layer.
//!
//! Uniform wrappers over the host's kernel primitives: events, mutexes,
//! semaphores, shared memory, files, directory searches, threads, and
//! processes. Every wrapper follows one handle contract: create with a
//! disposition, wait with a millisecond timeout where zero polls and
//! [`time::WAIT_FOREVER`] never expires, duplicate to share, close
//! idempotently, and let Drop close what was left open.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod atomic;
pub mod error;
pub mod fs;
pub mod handle;
pub mod naming;
pub mod process;
pub mod shmem;
pub mod sync;
pub mod thread;
pub mod time;

pub use error::{ErrClass, KernelError, OsCode, Result, Severity};
pub use fs::{KrnlDirSearch, KrnlFile, SeekFrom};
pub use handle::{AccessFlags, CreateDisposition, HandleId, HandleKind, RawHandle};
pub use naming::{ResourceName, ResourceType};
pub use process::KrnlProcess;
pub use shmem::KrnlSharedMem;
pub use sync::{KrnlEvent, KrnlMutex, KrnlSemaphore};
pub use thread::{KrnlThread, ThreadCtl};
pub use time::WAIT_FOREVER;

/// Initialize the platform layer. Idempotent; safe to call more than
/// once.
pub fn init() {
    time::init();
    handle::init();
    sync::init();
    fs::init();
    log::info!("[Platform] Initialized");
}
