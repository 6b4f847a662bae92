//! Synchronization primitive wrappers.
//!
//! One wrapper type per kind: event, mutex, counting semaphore. Named
//! and unnamed variants share the same wait/signal contract; only
//! construction differs. All waits take a millisecond timeout where 0
//! polls and [`crate::time::WAIT_FOREVER`] blocks indefinitely, and a
//! timeout is a normal `Ok(false)` outcome, never an error.

pub mod event;
pub mod mutex;
pub mod semaphore;

pub use event::KrnlEvent;
pub use mutex::KrnlMutex;
pub use semaphore::KrnlSemaphore;

/// Initialize the sync subsystem.
pub fn init() {
    log::debug!("[Platform Sync] Initializing sync primitives");
}
