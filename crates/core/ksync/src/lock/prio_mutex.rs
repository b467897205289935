//! Kernel backend B: the kernel's priority-inheriting mutex.
//!
//! Fits kernels with a native mutex taken with a signed tick timeout
//! (`-1` forever, `0` poll) that is recursive for its owner. The critical
//! section locks the scheduler instead of masking interrupts, so ISRs keep
//! running inside it.

use core::convert::Infallible;
use core::marker::PhantomData;
use core::num::NonZeroU32;

use super::{Capabilities, CriticalState, LockBackend};
use crate::arch::IrqState;
use crate::{Error, Result};

/// Outcome of a native mutex take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TakeStatus {
    /// Acquired.
    Ok,
    /// The wait expired (or a poll found the mutex held).
    Timeout,
    /// Any other kernel error.
    Error,
}

/// Binding of backend B to a concrete kernel.
///
/// # Safety
///
/// `take` must block the calling task rather than spin, must be recursive
/// for the owning task, and `release` must fail for a non-owner.
/// `interrupt_disable`/`interrupt_enable` must nest when levels are
/// threaded in LIFO order.
pub unsafe trait PrioMutexPort: 'static {
    /// Native mutex handle.
    type Handle: Send + Sync;

    /// Timeout meaning "wait forever".
    const WAIT_FOREVER: i32 = -1;

    /// Creates a named, priority-inheriting mutex.
    fn create(name: &'static str) -> Option<Self::Handle>;

    /// Destroys a mutex.
    fn delete(handle: Self::Handle);

    /// Takes the mutex, waiting up to `ticks`.
    fn take(handle: &Self::Handle, ticks: i32) -> TakeStatus;

    /// Releases the mutex. Returns `false` if the caller is not the owner.
    fn release(handle: &Self::Handle) -> bool;

    /// Converts milliseconds to kernel ticks.
    fn tick_from_ms(ms: u32) -> i32;

    /// Disables interrupts, returning the previous level.
    fn interrupt_disable() -> usize;

    /// Restores a level returned by `interrupt_disable`.
    fn interrupt_enable(level: usize);

    /// Locks the scheduler.
    fn enter_critical();

    /// Unlocks the scheduler.
    fn exit_critical();

    /// Current interrupt nesting depth as tracked by the kernel.
    fn interrupt_nest() -> u32;
}

/// Backend B over port `P`.
pub struct PrioMutexBackend<P: PrioMutexPort> {
    _port: PhantomData<fn() -> P>,
    _never: Infallible,
}

impl<P: PrioMutexPort> LockBackend for PrioMutexBackend<P> {
    type MutexHandle = P::Handle;

    const NAME: &'static str = "prio-mutex";
    const CAPS: Capabilities = Capabilities::all();

    fn mutex_create(name: &'static str) -> Result<P::Handle> {
        P::create(name).ok_or(Error::NoMemory)
    }

    fn mutex_delete(handle: P::Handle) -> Result<()> {
        P::delete(handle);
        Ok(())
    }

    fn mutex_lock(handle: &P::Handle) -> Result<()> {
        match P::take(handle, P::WAIT_FOREVER) {
            TakeStatus::Ok => Ok(()),
            TakeStatus::Timeout | TakeStatus::Error => Err(Error::Backend),
        }
    }

    fn mutex_trylock(handle: &P::Handle) -> Result<()> {
        match P::take(handle, 0) {
            TakeStatus::Ok => Ok(()),
            TakeStatus::Timeout | TakeStatus::Error => Err(Error::Busy),
        }
    }

    fn mutex_lock_for(handle: &P::Handle, ms: NonZeroU32) -> Result<()> {
        let ticks = P::tick_from_ms(ms.get()).max(1);
        match P::take(handle, ticks) {
            TakeStatus::Ok => Ok(()),
            TakeStatus::Timeout => Err(Error::TimedOut),
            TakeStatus::Error => Err(Error::Backend),
        }
    }

    fn mutex_unlock(handle: &P::Handle) -> Result<()> {
        if P::release(handle) {
            Ok(())
        } else {
            Err(Error::InvalidArgument)
        }
    }

    fn irq_lock() -> IrqState {
        IrqState(P::interrupt_disable())
    }

    fn irq_unlock(state: IrqState) {
        P::interrupt_enable(state.0);
    }

    fn critical_enter() -> CriticalState {
        P::enter_critical();
        CriticalState::Kernel(0)
    }

    fn critical_exit(_state: CriticalState) {
        P::exit_critical();
    }

    fn in_interrupt(_local_nest: u32) -> bool {
        P::interrupt_nest() != 0
    }
}
