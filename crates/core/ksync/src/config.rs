//! Compile-time configuration.
//!
//! Backend selection happens through Cargo features; the remaining knobs are
//! constants so they fold into the code that uses them.

/// Timeout used by [`Mutex::lock_default_timeout`](crate::lock::Mutex::lock_default_timeout),
/// in milliseconds.
pub const DEFAULT_TIMEOUT_MS: i32 = 1000;

/// Largest capacity (in elements) a [`Kfifo`](crate::kfifo::Kfifo) will use.
///
/// The free-running indices are 32-bit, so `in - out` must stay representable.
pub const FIFO_MAX_CAPACITY: usize = 1 << 31;

/// Name of the lock backend selected for this build.
#[cfg(feature = "kernel-semaphore")]
pub const BACKEND_NAME: &str = "semaphore";
/// Name of the lock backend selected for this build.
#[cfg(feature = "kernel-prio-mutex")]
pub const BACKEND_NAME: &str = "prio-mutex";
/// Name of the lock backend selected for this build.
#[cfg(feature = "kernel-cmsis")]
pub const BACKEND_NAME: &str = "cmsis";
/// Name of the lock backend selected for this build.
#[cfg(not(any(
    feature = "kernel-semaphore",
    feature = "kernel-prio-mutex",
    feature = "kernel-cmsis"
)))]
pub const BACKEND_NAME: &str = "bare-metal";

crate::static_assert!(DEFAULT_TIMEOUT_MS > 0);
crate::static_assert!(FIFO_MAX_CAPACITY.is_power_of_two());
crate::static_assert!(FIFO_MAX_CAPACITY <= (u32::MAX as usize / 2) + 1);
