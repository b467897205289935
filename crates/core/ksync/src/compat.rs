//! Model-checker compatibility shim.
//!
//! The fifo indices and the memory barrier come from here so the SPSC
//! protocol runs unchanged under `--cfg loom` and `--cfg shuttle`. Statics
//! that must stay `const`-constructible keep using `core` atomics directly.

pub(crate) use core::sync::atomic::Ordering;

// ---------------------------------------------------------------------------
// Loom mode
// ---------------------------------------------------------------------------

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicU32, fence};

#[cfg(loom)]
#[inline]
pub(crate) fn spin_hint() {
    loom::thread::yield_now();
}

// ---------------------------------------------------------------------------
// Shuttle mode
// ---------------------------------------------------------------------------

#[cfg(all(shuttle, not(loom)))]
pub(crate) use core::sync::atomic::fence;
#[cfg(all(shuttle, not(loom)))]
pub(crate) use shuttle::sync::atomic::AtomicU32;

#[cfg(all(shuttle, not(loom)))]
#[inline]
pub(crate) fn spin_hint() {
    shuttle::thread::yield_now();
}

// ---------------------------------------------------------------------------
// Normal mode
// ---------------------------------------------------------------------------

#[cfg(not(any(loom, shuttle)))]
pub(crate) use core::sync::atomic::{AtomicU32, fence};

#[cfg(not(any(loom, shuttle)))]
#[inline]
pub(crate) fn spin_hint() {
    core::hint::spin_loop();
}

// ---------------------------------------------------------------------------
// Host thread-locals (interrupt simulation)
// ---------------------------------------------------------------------------

#[cfg(all(not(target_os = "none"), loom))]
pub(crate) use loom::thread_local;
#[cfg(all(not(target_os = "none"), shuttle, not(loom)))]
pub(crate) use shuttle::thread_local;
#[cfg(all(not(target_os = "none"), not(any(loom, shuttle))))]
pub(crate) use std::thread_local;
