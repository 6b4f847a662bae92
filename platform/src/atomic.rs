//! Atomic exchange primitives.
//!
//! Thin wrappers over the compare-and-swap and exchange intrinsics, used
//! to build lock-free counters and pointer swaps. All operations are
//! lock-free and total-order-consistent for the single location involved;
//! they promise nothing about other memory locations, so callers needing
//! happens-before across several fields must add their own barrier or lock.

use core::sync::atomic::{AtomicPtr, AtomicU32, AtomicU64, Ordering};

/// Compare-and-exchange on a 32-bit word. Returns the previous value;
/// the store happened iff the return value equals `expected`.
pub fn compare_and_exchange(target: &AtomicU32, new: u32, expected: u32) -> u32 {
    match target.compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst) {
        Ok(old) => old,
        Err(old) => old,
    }
}

/// Unconditional exchange on a 32-bit word, returning the previous value.
pub fn exchange(target: &AtomicU32, new: u32) -> u32 {
    target.swap(new, Ordering::SeqCst)
}

/// Compare-and-exchange on a 64-bit word.
pub fn compare_and_exchange64(target: &AtomicU64, new: u64, expected: u64) -> u64 {
    match target.compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst) {
        Ok(old) => old,
        Err(old) => old,
    }
}

/// Unconditional exchange on a 64-bit word.
pub fn exchange64(target: &AtomicU64, new: u64) -> u64 {
    target.swap(new, Ordering::SeqCst)
}

/// Compare-and-exchange on a pointer. Returns the previous pointer.
pub fn compare_and_exchange_ptr<T>(
    target: &AtomicPtr<T>,
    new: *mut T,
    expected: *mut T,
) -> *mut T {
    match target.compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst) {
        Ok(old) => old,
        Err(old) => old,
    }
}

/// Unconditional pointer exchange, returning the previous pointer.
pub fn exchange_ptr<T>(target: &AtomicPtr<T>, new: *mut T) -> *mut T {
    target.swap(new, Ordering::SeqCst)
}

/// A spin-free, non-reentrant gate built on an atomic counter.
///
/// `safe_acquire` either takes the gate and returns true, or returns false
/// without blocking. Useful for "first caller wins" scenarios where losers
/// simply move on rather than wait.
pub struct SafeGate {
    taken: AtomicU32,
}

impl SafeGate {
    /// Create an open gate.
    pub const fn new() -> Self {
        SafeGate {
            taken: AtomicU32::new(0),
        }
    }

    /// Try to take the gate. Returns false if another owner holds it.
    pub fn safe_acquire(&self) -> bool {
        compare_and_exchange(&self.taken, 1, 0) == 0
    }

    /// Release the gate. Harmless if the gate was not held.
    pub fn safe_release(&self) {
        exchange(&self.taken, 0);
    }

    /// Whether the gate is currently held.
    pub fn is_held(&self) -> bool {
        self.taken.load(Ordering::SeqCst) != 0
    }
}

impl Default for SafeGate {
    fn default() -> Self {
        SafeGate::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_and_exchange() {
        let word = AtomicU32::new(5);
        // Mismatched expectation leaves the value alone
        assert_eq!(compare_and_exchange(&word, 9, 4), 5);
        assert_eq!(word.load(Ordering::SeqCst), 5);
        // Matching expectation swaps
        assert_eq!(compare_and_exchange(&word, 9, 5), 5);
        assert_eq!(word.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn test_exchange() {
        let word = AtomicU32::new(1);
        assert_eq!(exchange(&word, 2), 1);
        assert_eq!(word.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_exchange_ptr() {
        let mut a = 10u32;
        let mut b = 20u32;
        let ptr = AtomicPtr::new(&mut a as *mut u32);
        let old = exchange_ptr(&ptr, &mut b as *mut u32);
        assert_eq!(old, &mut a as *mut u32);
        assert_eq!(ptr.load(Ordering::SeqCst), &mut b as *mut u32);
    }

    #[test]
    fn test_safe_gate() {
        let gate = SafeGate::new();
        assert!(gate.safe_acquire());
        assert!(!gate.safe_acquire());
        assert!(gate.is_held());
        gate.safe_release();
        assert!(gate.safe_acquire());
    }

    #[test]
    fn test_safe_gate_single_winner() {
        use std::sync::Arc;

        let gate = Arc::new(SafeGate::new());
        let mut joins = Vec::new();
        for _ in 0..8 {
            let gate = gate.clone();
            joins.push(std::thread::spawn(move || gate.safe_acquire()));
        }
        let won: usize = joins.into_iter().map(|h| h.join().unwrap() as usize).sum();
        assert_eq!(won, 1);
    }
}
