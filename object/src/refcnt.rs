//! Manual reference counting mixin.
//!
//! Deliberately unsynchronized and non-owning: no atomics, no
//! self-destruction at zero. The container or pool holding the object
//! decides what zero means and provides any cross-thread locking.

use core::cell::Cell;

use crate::error::{ObjResult, ObjectError};

/// Embeddable manual reference count. Starts at 1: construction assumes
/// initial ownership.
#[derive(Debug)]
pub struct RefCount(Cell<u32>);

impl RefCount {
    pub fn new() -> Self {
        RefCount(Cell::new(1))
    }

    /// Current count.
    pub fn count(&self) -> u32 {
        self.0.get()
    }

    /// Add an owner. No upper bound.
    pub fn increment(&self) {
        self.0.set(self.0.get() + 1);
    }

    /// Drop an owner. Underflow (decrementing at zero) is an error.
    /// Returns whether any owners remain.
    pub fn decrement(&self) -> ObjResult<bool> {
        let current = self.0.get();
        if current == 0 {
            return Err(ObjectError::RefCountUnderflow);
        }
        self.0.set(current - 1);
        Ok(current - 1 > 0)
    }

    /// Force the count back to 1, as when a pooled object is handed out
    /// again.
    pub fn reset(&self) {
        self.0.set(1);
    }
}

impl Default for RefCount {
    fn default() -> Self {
        RefCount::new()
    }
}
