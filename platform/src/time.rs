//! Time and timeout support for the primitive wrappers.
//!
//! All blocking operations in this crate are parameterized by a millisecond
//! timeout: 0 means poll without blocking, [`WAIT_FOREVER`] means wait
//! indefinitely. The millisecond source itself is pluggable so the same
//! wait code runs against an APIC/TSC-backed counter in kernel builds and
//! a host clock under test.

use core::sync::atomic::{AtomicU64, Ordering};
use spin::RwLock;

/// Timeout sentinel meaning "wait indefinitely".
pub const WAIT_FOREVER: u32 = u32::MAX;

/// A registered monotonic millisecond source.
pub type TickSource = fn() -> u64;

static TICK_SOURCE: RwLock<Option<TickSource>> = RwLock::new(None);

/// Fallback counter used before a real source is registered. Bumped on
/// every read so bounded waits still terminate.
static FALLBACK_TICKS: AtomicU64 = AtomicU64::new(0);

/// Initialize the time subsystem.
pub fn init() {
    log::debug!("[Platform Time] Initializing time subsystem");
}

/// Register the monotonic millisecond source for this process.
pub fn register_tick_source(source: TickSource) {
    *TICK_SOURCE.write() = Some(source);
}

/// Current monotonic time in milliseconds.
pub fn now_ms() -> u64 {
    let source = *TICK_SOURCE.read();
    match source {
        Some(f) => f(),
        None => FALLBACK_TICKS.fetch_add(1, Ordering::Relaxed),
    }
}

/// Poll `cond` until it holds or `timeout_ms` elapses.
///
/// Returns true if the condition held, false on timeout. A timeout of 0
/// checks the condition exactly once; [`WAIT_FOREVER`] never gives up.
pub(crate) fn poll_until(timeout_ms: u32, mut cond: impl FnMut() -> bool) -> bool {
    if cond() {
        return true;
    }
    if timeout_ms == 0 {
        return false;
    }

    let start = now_ms();
    loop {
        if cond() {
            return true;
        }
        if timeout_ms != WAIT_FOREVER && now_ms().saturating_sub(start) >= timeout_ms as u64 {
            return false;
        }
        core::hint::spin_loop();
        #[cfg(test)]
        std::thread::yield_now();
    }
}

/// Test-only millisecond source backed by the host clock. Other modules'
/// tests install this before exercising timed waits.
#[cfg(test)]
pub(crate) fn install_std_clock() {
    fn std_ms() -> u64 {
        static START: spin::Once<std::time::Instant> = spin::Once::new();
        let start = START.call_once(std::time::Instant::now);
        start.elapsed().as_millis() as u64
    }
    register_tick_source(std_ms);
}
