//! Event semaphore.
//!
//! A manual-reset event: `trigger` latches the signaled state until
//! `reset`, releasing every waiter in between; `pulse` releases the
//! waiters present at the instant of the pulse without latching.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::{KernelError, Result};
use crate::handle::{self, CreateDisposition, HandleKind, KernelObject, RawHandle};
use crate::naming::{ResourceName, ResourceType};
use crate::time;

/// Shared state of one event object.
pub(crate) struct EventState {
    signaled: AtomicBool,
    /// Bumped on every pulse; waiters capture the value at wait start.
    pulses: AtomicU64,
}

impl EventState {
    pub(crate) fn new() -> Self {
        EventState {
            signaled: AtomicBool::new(false),
            pulses: AtomicU64::new(0),
        }
    }
}

/// Event semaphore wrapper.
pub struct KrnlEvent {
    handle: RawHandle,
    state: Option<Arc<EventState>>,
}

impl KrnlEvent {
    /// Create an anonymous, single-process event, initially unsignaled.
    pub fn new() -> Self {
        let state = Arc::new(EventState::new());
        let id = handle::create_anonymous(KernelObject::Event(state.clone()));
        KrnlEvent {
            handle: RawHandle::new(id, HandleKind::Event),
            state: Some(state),
        }
    }

    /// Create or open a named, cross-process event per the disposition.
    /// The returned flag tells whether the event was freshly created,
    /// which is what decides whether to set its initial state.
    pub fn create_named(
        name: &ResourceName,
        disposition: CreateDisposition,
    ) -> Result<(Self, bool)> {
        let full = name.full_name(ResourceType::Event);
        let (id, created, object) =
            handle::open_named(HandleKind::Event, &full, disposition, || {
                KernelObject::Event(Arc::new(EventState::new()))
            })?;
        let state = match object {
            KernelObject::Event(state) => state,
            _ => return Err(KernelError::invalid_handle()),
        };
        Ok((
            KrnlEvent {
                handle: RawHandle::new(id, HandleKind::Event),
                state: Some(state),
            },
            created,
        ))
    }

    fn state(&self) -> Result<&Arc<EventState>> {
        self.state.as_ref().ok_or_else(KernelError::invalid_handle)
    }

    /// Whether this wrapper is bound to a live event.
    pub fn is_valid(&self) -> bool {
        self.state.is_some()
    }

    /// The opaque handle.
    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    /// Latch the event signaled, releasing all current and future
    /// waiters until reset.
    pub fn trigger(&self) -> Result<()> {
        self.state()?.signaled.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Return the event to the unsignaled state.
    pub fn reset(&self) -> Result<()> {
        self.state()?.signaled.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Release the waiters present right now without latching the
    /// signaled state.
    pub fn pulse(&self) -> Result<()> {
        self.state()?.pulses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Wait for the event to become signaled or pulsed. `Ok(false)`
    /// means the timeout expired, a normal outcome.
    pub fn wait_for(&self, timeout_ms: u32) -> Result<bool> {
        let state = self.state()?.clone();
        let start_pulse = state.pulses.load(Ordering::SeqCst);
        let satisfied = time::poll_until(timeout_ms, || {
            state.signaled.load(Ordering::SeqCst)
                || state.pulses.load(Ordering::SeqCst) != start_pulse
        });
        Ok(satisfied)
    }

    /// Produce a second wrapper sharing the same event. Only legal while
    /// this wrapper is valid.
    pub fn duplicate(&self) -> Result<Self> {
        let state = self.state()?.clone();
        handle::duplicate(self.handle.id())?;
        Ok(KrnlEvent {
            handle: self.handle,
            state: Some(state),
        })
    }

    /// Release this wrapper's claim. Idempotent; the underlying event is
    /// only destroyed when the last owner closes.
    pub fn close(&mut self) -> Result<()> {
        if self.state.take().is_some() {
            handle::close(self.handle.id())?;
            self.handle.clear();
        }
        Ok(())
    }
}

impl Default for KrnlEvent {
    fn default() -> Self {
        KrnlEvent::new()
    }
}

impl Drop for KrnlEvent {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{install_std_clock, WAIT_FOREVER};
    use std::time::Duration;

    #[test]
    fn test_trigger_and_reset() {
        install_std_clock();
        let event = KrnlEvent::new();
        assert!(!event.wait_for(0).unwrap());
        event.trigger().unwrap();
        assert!(event.wait_for(0).unwrap());
        // Manual reset: stays signaled until reset
        assert!(event.wait_for(0).unwrap());
        event.reset().unwrap();
        assert!(!event.wait_for(0).unwrap());
    }

    #[test]
    fn test_zero_timeout_returns_immediately() {
        install_std_clock();
        let event = KrnlEvent::new();
        let before = std::time::Instant::now();
        assert!(!event.wait_for(0).unwrap());
        assert!(before.elapsed() < Duration::from_millis(20));
    }

    #[test]
    fn test_cross_thread_trigger_beats_timeout() {
        install_std_clock();
        let event = KrnlEvent::new();
        let remote = event.duplicate().unwrap();
        let worker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            remote.trigger().unwrap();
        });
        let before = std::time::Instant::now();
        assert!(event.wait_for(50).unwrap());
        assert!(before.elapsed() < Duration::from_millis(50));
        worker.join().unwrap();
    }

    #[test]
    fn test_pulse_does_not_latch() {
        install_std_clock();
        let event = KrnlEvent::new();
        let remote = event.duplicate().unwrap();
        let worker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            remote.pulse().unwrap();
        });
        // The waiter present at pulse time is released...
        assert!(event.wait_for(500).unwrap());
        worker.join().unwrap();
        // ...but a later wait sees the event unsignaled
        assert!(!event.wait_for(0).unwrap());
    }

    #[test]
    fn test_named_rendezvous() {
        install_std_clock();
        let name = ResourceName::new("Acme", "Test", "Ready").unwrap();

        let (first, created) =
            KrnlEvent::create_named(&name, CreateDisposition::OpenOrCreate).unwrap();
        assert!(created);

        // Second open of the same triple reports "already existed"
        let (second, created) =
            KrnlEvent::create_named(&name, CreateDisposition::OpenOrCreate).unwrap();
        assert!(!created);

        // Triggering through one handle satisfies a wait on the other
        first.trigger().unwrap();
        assert!(second.wait_for(WAIT_FOREVER).unwrap());
    }

    #[test]
    fn test_closed_wrapper_rejects_operations() {
        install_std_clock();
        let mut event = KrnlEvent::new();
        event.close().unwrap();
        // Idempotent close
        event.close().unwrap();
        assert!(!event.is_valid());
        assert!(event.trigger().is_err());
        assert!(event.duplicate().is_err());
    }

    #[test]
    fn test_duplicate_keeps_event_alive() {
        install_std_clock();
        let mut event = KrnlEvent::new();
        let id = event.handle().id();
        let mut dup = event.duplicate().unwrap();
        event.close().unwrap();
        assert_eq!(crate::handle::ref_count_of(id), Some(1));
        dup.trigger().unwrap();
        assert!(dup.wait_for(0).unwrap());
        dup.close().unwrap();
        assert_eq!(crate::handle::ref_count_of(id), None);
    }
}
