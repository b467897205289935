//! Portable locks: mutex, IRQ lock, critical section and spinlock.
//!
//! Each lock class is implemented once on top of [`LockBackend`]; a backend
//! supplies the native primitives. One backend is selected per build through
//! Cargo features and named by [`Selected`]:
//!
//! | Lock class | Blocks? | Context | Bare metal | Kernel backends |
//! |---|---|---|---|---|
//! | [`Mutex`] | yes | task | interrupt mask + depth counter | native mutex / semaphore |
//! | [`IrqGuard`] | no | task or ISR | interrupt mask | port interrupt mask |
//! | [`CriticalGuard`] | no | task or ISR | interrupt mask | scheduler lock |
//! | [`SpinLock`] | spins | task or ISR | lock word + IRQ lock | lock word + IRQ lock |
//!
//! Backends differ in what a "wait" really is. [`Capabilities`] makes that
//! visible to callers: without [`Capabilities::TIMED_WAIT`] a finite timeout
//! is a single attempt, and without [`Capabilities::BLOCKING`] a contended
//! lock never yields the CPU.

use core::num::NonZeroU32;

use crate::Result;
use crate::arch::IrqState;

mod bare;
mod cmsis;
mod irq;
mod mutex;
mod nesting;
mod prio_mutex;
mod semaphore;
mod spinlock;

#[cfg(all(test, not(any(loom, shuttle))))]
pub(crate) mod sim;

pub use bare::{BareMetal, BareMutex};
pub use cmsis::{CmsisBackend, CmsisPort, OsStatus};
pub use irq::{CriticalGuard, CriticalState, IrqGuard, with_critical, with_irq_lock};
pub use mutex::{Mutex, MutexGuard};
#[cfg(ksync_lock_stat)]
pub use mutex::MutexStats;
pub use nesting::{InterruptNesting, IsrScope};
pub use prio_mutex::{PrioMutexBackend, PrioMutexPort, TakeStatus};
pub use semaphore::{SemaphoreBackend, SemaphorePort};
pub use spinlock::{RawSpinLock, SpinLock, SpinLockGuard};

// ---------------------------------------------------------------------------
// Backend interface
// ---------------------------------------------------------------------------

bitflags::bitflags! {
    /// What a backend's primitives can actually do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        /// A contended `lock` suspends the caller instead of excluding
        /// everyone else by masking interrupts.
        const BLOCKING              = 1 << 0;
        /// Finite timeouts wait for up to the requested duration.
        const TIMED_WAIT            = 1 << 1;
        /// The native mutex boosts the owner's priority.
        const PRIORITY_INHERITANCE  = 1 << 2;
        /// Critical sections lock the scheduler rather than masking
        /// interrupts.
        const SCHEDULER_LOCK        = 1 << 3;
        /// "In interrupt" queries come from the kernel, not the local
        /// nesting counter.
        const NATIVE_NESTING        = 1 << 4;
    }
}

/// How long a mutex acquire may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// A single attempt.
    Poll,
    /// Wait until acquired.
    Forever,
    /// Wait at most this many milliseconds.
    Millis(NonZeroU32),
}

impl Timeout {
    /// Converts the signed millisecond convention: negative waits forever,
    /// zero polls once.
    #[must_use]
    pub const fn from_millis(ms: i32) -> Self {
        if ms < 0 {
            return Self::Forever;
        }
        match NonZeroU32::new(ms.unsigned_abs()) {
            Some(ms) => Self::Millis(ms),
            None => Self::Poll,
        }
    }
}

/// The native primitives behind every lock class.
///
/// All functions are associated functions: a backend is a type-level
/// selection, never a runtime object. Implementations for kernel backends
/// forward to a port trait that the firmware implements on its kernel.
pub trait LockBackend: Sized + 'static {
    /// Opaque native mutex handle.
    type MutexHandle: Send + Sync;

    /// Short backend name for diagnostics.
    const NAME: &'static str;

    /// What this backend's primitives can do.
    const CAPS: Capabilities;

    /// Allocates a native mutex.
    ///
    /// # Errors
    ///
    /// [`Error::NoMemory`](crate::Error::NoMemory) if the kernel has no
    /// handle to give.
    fn mutex_create(name: &'static str) -> Result<Self::MutexHandle>;

    /// Releases a native mutex. The handle must not be held.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`](crate::Error::Busy) if the handle is still held,
    /// [`Error::Unsupported`](crate::Error::Unsupported) if the kernel
    /// refuses the call from this context. The handle is consumed either
    /// way.
    fn mutex_delete(handle: Self::MutexHandle) -> Result<()>;

    /// Acquires, waiting as long as necessary.
    ///
    /// # Errors
    ///
    /// [`Error::Backend`](crate::Error::Backend) if the kernel call fails.
    fn mutex_lock(handle: &Self::MutexHandle) -> Result<()>;

    /// Acquires only if immediately available.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`](crate::Error::Busy) if the mutex is held.
    fn mutex_trylock(handle: &Self::MutexHandle) -> Result<()>;

    /// Acquires, waiting at most `ms` milliseconds.
    ///
    /// # Errors
    ///
    /// [`Error::TimedOut`](crate::Error::TimedOut) if the wait expires.
    fn mutex_lock_for(handle: &Self::MutexHandle, ms: NonZeroU32) -> Result<()>;

    /// Releases a mutex held by the caller.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`](crate::Error::InvalidArgument) if the
    /// caller does not hold it.
    fn mutex_unlock(handle: &Self::MutexHandle) -> Result<()>;

    /// Masks interrupts and returns the prior state.
    fn irq_lock() -> IrqState;

    /// Restores the state returned by [`irq_lock`](Self::irq_lock).
    fn irq_unlock(state: IrqState);

    /// Enters a critical section.
    fn critical_enter() -> CriticalState;

    /// Leaves the critical section entered by
    /// [`critical_enter`](Self::critical_enter).
    fn critical_exit(state: CriticalState);

    /// Reports whether the caller runs in interrupt context. `local_nest` is
    /// the caller-maintained nesting depth, used by backends without a
    /// native query.
    fn in_interrupt(local_nest: u32) -> bool;
}

/// Clamps a finite wait of `ticks` into `1..forever`: never a poll, never
/// the port's "wait forever" value.
pub(crate) const fn finite_ticks(ticks: u32, forever: u32) -> u32 {
    let max = forever.saturating_sub(1);
    if ticks >= max {
        max
    } else if ticks == 0 {
        1
    } else {
        ticks
    }
}

// ---------------------------------------------------------------------------
// Build-time selection
// ---------------------------------------------------------------------------

/// The backend selected for this build: bare metal.
#[cfg(not(any(
    feature = "kernel-semaphore",
    feature = "kernel-prio-mutex",
    feature = "kernel-cmsis"
)))]
pub type Selected = BareMetal;

/// The backend selected for this build: counting-semaphore kernel over port
/// `P`.
#[cfg(feature = "kernel-semaphore")]
pub type Selected<P> = SemaphoreBackend<P>;

/// The backend selected for this build: priority-inheriting kernel mutex
/// over port `P`.
#[cfg(feature = "kernel-prio-mutex")]
pub type Selected<P> = PrioMutexBackend<P>;

/// The backend selected for this build: standardized RTOS API over port `P`.
#[cfg(feature = "kernel-cmsis")]
pub type Selected<P> = CmsisBackend<P>;
