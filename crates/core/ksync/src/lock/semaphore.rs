//! Kernel backend A: mutual exclusion from a counting semaphore.
//!
//! Fits kernels whose primitive is a semaphore taken with a tick timeout
//! (`take(ticks) -> bool`). A semaphore with one token is the mutex; the
//! IRQ lock is the port's interrupt mask and the critical section is the
//! kernel's own critical-section call.

use core::convert::Infallible;
use core::marker::PhantomData;
use core::num::NonZeroU32;

use super::{Capabilities, CriticalState, LockBackend};
use crate::arch::IrqState;
use crate::{Error, Result};

/// Binding of backend A to a concrete kernel.
///
/// # Safety
///
/// `take` must block the calling task, never spin with interrupts masked,
/// and give the usual semaphore guarantees: a token taken by one task is not
/// observable by another until it is given back. `mask_interrupts` and
/// `unmask_interrupts` must nest when states are threaded in LIFO order.
pub unsafe trait SemaphorePort: 'static {
    /// Native semaphore handle.
    type Handle: Send + Sync;

    /// Tick count meaning "wait forever". Must be above 1.
    const MAX_DELAY: u32;

    /// Creates a counting semaphore holding `initial` of `max` tokens.
    fn create(max: u32, initial: u32) -> Option<Self::Handle>;

    /// Destroys a semaphore.
    fn delete(handle: Self::Handle);

    /// Takes a token, waiting up to `ticks`. Returns whether one was taken.
    fn take(handle: &Self::Handle, ticks: u32) -> bool;

    /// Returns a token. Fails if the semaphore is already full.
    fn give(handle: &Self::Handle) -> bool;

    /// Converts milliseconds to kernel ticks.
    fn ms_to_ticks(ms: u32) -> u32;

    /// Masks interrupts up to the kernel's syscall priority, returning the
    /// previous mask.
    fn mask_interrupts() -> usize;

    /// Restores a mask returned by `mask_interrupts`.
    fn unmask_interrupts(state: usize);

    /// Enters the kernel critical section.
    fn enter_critical();

    /// Leaves the kernel critical section.
    fn exit_critical();

    /// Reports whether the caller is an ISR.
    fn inside_interrupt() -> bool;
}

/// Backend A over port `P`.
pub struct SemaphoreBackend<P: SemaphorePort> {
    _port: PhantomData<fn() -> P>,
    _never: Infallible,
}

impl<P: SemaphorePort> SemaphoreBackend<P> {
    fn ticks_for(ms: NonZeroU32) -> u32 {
        const {
            assert!(P::MAX_DELAY > 1, "SemaphorePort::MAX_DELAY leaves no finite wait");
        }
        super::finite_ticks(P::ms_to_ticks(ms.get()), P::MAX_DELAY)
    }
}

impl<P: SemaphorePort> LockBackend for SemaphoreBackend<P> {
    type MutexHandle = P::Handle;

    const NAME: &'static str = "semaphore";
    const CAPS: Capabilities = Capabilities::BLOCKING
        .union(Capabilities::TIMED_WAIT)
        .union(Capabilities::NATIVE_NESTING);

    fn mutex_create(_name: &'static str) -> Result<P::Handle> {
        P::create(1, 1).ok_or(Error::NoMemory)
    }

    fn mutex_delete(handle: P::Handle) -> Result<()> {
        P::delete(handle);
        Ok(())
    }

    fn mutex_lock(handle: &P::Handle) -> Result<()> {
        if P::take(handle, P::MAX_DELAY) {
            Ok(())
        } else {
            Err(Error::Backend)
        }
    }

    fn mutex_trylock(handle: &P::Handle) -> Result<()> {
        if P::take(handle, 0) {
            Ok(())
        } else {
            Err(Error::Busy)
        }
    }

    fn mutex_lock_for(handle: &P::Handle, ms: NonZeroU32) -> Result<()> {
        if P::take(handle, Self::ticks_for(ms)) {
            Ok(())
        } else {
            Err(Error::TimedOut)
        }
    }

    fn mutex_unlock(handle: &P::Handle) -> Result<()> {
        if P::give(handle) {
            Ok(())
        } else {
            Err(Error::InvalidArgument)
        }
    }

    fn irq_lock() -> IrqState {
        IrqState(P::mask_interrupts())
    }

    fn irq_unlock(state: IrqState) {
        P::unmask_interrupts(state.0);
    }

    fn critical_enter() -> CriticalState {
        P::enter_critical();
        CriticalState::Kernel(0)
    }

    fn critical_exit(_state: CriticalState) {
        P::exit_critical();
    }

    fn in_interrupt(_local_nest: u32) -> bool {
        P::inside_interrupt()
    }
}
