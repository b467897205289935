//! Kernel backend C: the standardized RTOS mutex API.
//!
//! Status codes follow the standardized `osStatus_t` values. Timeouts are
//! given in kernel ticks, converted from milliseconds with the port's tick
//! frequency. The IRQ lock masks interrupts directly (the API has no call
//! for it). The critical section is the kernel lock, except in an ISR or
//! when the kernel refuses the lock: there it masks interrupts instead.

use core::convert::Infallible;
use core::marker::PhantomData;
use core::num::NonZeroU32;

use super::{Capabilities, CriticalState, LockBackend};
use crate::arch::{self, IrqState};
use crate::{Error, Result};

/// Standardized RTOS status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsStatus {
    /// `osOK`.
    Ok,
    /// `osError`: unspecified failure.
    Error,
    /// `osErrorTimeout`.
    ErrorTimeout,
    /// `osErrorResource`: not available (a poll found it held).
    ErrorResource,
    /// `osErrorParameter`.
    ErrorParameter,
    /// `osErrorNoMemory`.
    ErrorNoMemory,
    /// `osErrorISR`: not allowed from an ISR.
    ErrorIsr,
}

impl OsStatus {
    /// Decodes a raw `osStatus_t`.
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Ok,
            -2 => Self::ErrorTimeout,
            -3 => Self::ErrorResource,
            -4 => Self::ErrorParameter,
            -5 => Self::ErrorNoMemory,
            -6 => Self::ErrorIsr,
            _ => Self::Error,
        }
    }

    /// Maps a status onto the crate's error taxonomy.
    ///
    /// # Errors
    ///
    /// Every status except [`OsStatus::Ok`].
    pub const fn into_result(self) -> Result<()> {
        match self {
            Self::Ok => Ok(()),
            Self::ErrorTimeout => Err(Error::TimedOut),
            Self::ErrorResource => Err(Error::Busy),
            Self::ErrorParameter => Err(Error::InvalidArgument),
            Self::ErrorNoMemory => Err(Error::NoMemory),
            Self::ErrorIsr => Err(Error::Unsupported),
            Self::Error => Err(Error::Backend),
        }
    }
}

/// Binding of backend C to a concrete kernel.
///
/// # Safety
///
/// `mutex_acquire` must block the calling thread rather than spin, and
/// `kernel_lock`/`kernel_restore_lock` must behave as the standardized
/// calls: the former returns the previous lock state (`0` or `1`) or a
/// negative status.
pub unsafe trait CmsisPort: 'static {
    /// Native mutex handle.
    type Handle: Send + Sync;

    /// Timeout meaning "wait forever" (`osWaitForever`). Must be above 1.
    const WAIT_FOREVER: u32 = u32::MAX;

    /// Kernel tick frequency.
    const TICK_FREQ_HZ: u32;

    /// `osMutexNew`.
    fn mutex_new(name: &'static str) -> Option<Self::Handle>;

    /// `osMutexDelete`.
    fn mutex_delete(handle: Self::Handle) -> OsStatus;

    /// `osMutexAcquire`.
    fn mutex_acquire(handle: &Self::Handle, timeout: u32) -> OsStatus;

    /// `osMutexRelease`.
    fn mutex_release(handle: &Self::Handle) -> OsStatus;

    /// `osKernelLock`.
    fn kernel_lock() -> i32;

    /// `osKernelRestoreLock`.
    fn kernel_restore_lock(lock: i32) -> i32;

    /// Reports whether the caller is an ISR.
    fn in_isr() -> bool;
}

/// Backend C over port `P`.
pub struct CmsisBackend<P: CmsisPort> {
    _port: PhantomData<fn() -> P>,
    _never: Infallible,
}

impl<P: CmsisPort> CmsisBackend<P> {
    fn ticks_for(ms: NonZeroU32) -> u32 {
        const {
            assert!(P::WAIT_FOREVER > 1, "CmsisPort::WAIT_FOREVER leaves no finite wait");
        }
        let ticks = (u64::from(ms.get()) * u64::from(P::TICK_FREQ_HZ)).div_ceil(1000);
        super::finite_ticks(u32::try_from(ticks).unwrap_or(u32::MAX), P::WAIT_FOREVER)
    }
}

impl<P: CmsisPort> LockBackend for CmsisBackend<P> {
    type MutexHandle = P::Handle;

    const NAME: &'static str = "cmsis";
    const CAPS: Capabilities = Capabilities::BLOCKING
        .union(Capabilities::TIMED_WAIT)
        .union(Capabilities::SCHEDULER_LOCK)
        .union(Capabilities::NATIVE_NESTING);

    fn mutex_create(name: &'static str) -> Result<P::Handle> {
        P::mutex_new(name).ok_or(Error::NoMemory)
    }

    fn mutex_delete(handle: P::Handle) -> Result<()> {
        P::mutex_delete(handle).into_result()
    }

    fn mutex_lock(handle: &P::Handle) -> Result<()> {
        P::mutex_acquire(handle, P::WAIT_FOREVER).into_result()
    }

    fn mutex_trylock(handle: &P::Handle) -> Result<()> {
        match P::mutex_acquire(handle, 0) {
            OsStatus::ErrorResource | OsStatus::ErrorTimeout => Err(Error::Busy),
            status => status.into_result(),
        }
    }

    fn mutex_lock_for(handle: &P::Handle, ms: NonZeroU32) -> Result<()> {
        match P::mutex_acquire(handle, Self::ticks_for(ms)) {
            OsStatus::ErrorResource | OsStatus::ErrorTimeout => Err(Error::TimedOut),
            status => status.into_result(),
        }
    }

    fn mutex_unlock(handle: &P::Handle) -> Result<()> {
        match P::mutex_release(handle) {
            OsStatus::Ok => Ok(()),
            _ => Err(Error::InvalidArgument),
        }
    }

    fn irq_lock() -> IrqState {
        arch::irq_save()
    }

    fn irq_unlock(state: IrqState) {
        arch::irq_restore(state);
    }

    fn critical_enter() -> CriticalState {
        if !P::in_isr() {
            let prev = P::kernel_lock();
            if let Ok(prev) = usize::try_from(prev) {
                return CriticalState::Kernel(prev);
            }
            crate::kdebug!(
                "ksync: kernel lock refused ({:?}), masking interrupts",
                OsStatus::from_raw(prev)
            );
        }
        CriticalState::Irq(arch::irq_save())
    }

    fn critical_exit(state: CriticalState) {
        match state {
            CriticalState::Irq(irq) => arch::irq_restore(irq),
            CriticalState::Kernel(prev) => {
                let res = P::kernel_restore_lock(i32::from(prev != 0));
                if res < 0 {
                    crate::kwarn!(
                        "ksync: kernel lock restore failed: {:?}",
                        OsStatus::from_raw(res)
                    );
                }
            }
        }
    }

    fn in_interrupt(_local_nest: u32) -> bool {
        P::in_isr()
    }
}

#[cfg(all(test, not(any(loom, shuttle))))]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::lock::sim::{self, SimCmsis};
    use crate::lock::{Mutex, with_critical};

    type Backend = CmsisBackend<SimCmsis>;

    #[test]
    fn status_decoding() {
        assert_eq!(OsStatus::from_raw(0), OsStatus::Ok);
        assert_eq!(OsStatus::from_raw(-2), OsStatus::ErrorTimeout);
        assert_eq!(OsStatus::from_raw(-6), OsStatus::ErrorIsr);
        assert_eq!(OsStatus::from_raw(-99), OsStatus::Error);
        assert_eq!(OsStatus::ErrorIsr.into_result(), Err(Error::Unsupported));
        assert_eq!(OsStatus::Ok.into_result(), Ok(()));
    }

    #[test]
    fn ticks_round_up_and_never_poll() {
        assert_eq!(Backend::ticks_for(NonZeroU32::new(1).unwrap()), 1);
        assert_eq!(Backend::ticks_for(NonZeroU32::new(250).unwrap()), 250);
        assert_eq!(
            Backend::ticks_for(NonZeroU32::new(u32::MAX).unwrap()),
            u32::MAX - 1
        );
    }

    #[test]
    fn timed_lock_expires() {
        let m = Arc::new(Mutex::<Backend>::create().unwrap());
        let _g = m.lock().unwrap();
        let other = Arc::clone(&m);
        let (poll, timed, waited) = std::thread::spawn(move || {
            let poll = other.lock_timeout(0).err();
            let start = Instant::now();
            let timed = other.lock_timeout(40).err();
            (poll, timed, start.elapsed())
        })
        .join()
        .unwrap();
        assert_eq!(poll, Some(Error::Busy));
        assert_eq!(timed, Some(Error::TimedOut));
        assert!(waited >= Duration::from_millis(35), "waited {waited:?}");
    }

    #[test]
    fn lock_from_isr_is_unsupported() {
        let m = Mutex::<Backend>::create().unwrap();
        let _isr = sim::enter_isr();
        assert_eq!(m.lock().err(), Some(Error::Unsupported));
        assert!(Backend::in_interrupt(0));
    }

    #[test]
    fn kernel_lock_nests() {
        assert!(!sim::kernel_locked());
        with_critical::<Backend, _>(|| {
            assert!(sim::kernel_locked());
            with_critical::<Backend, _>(|| assert!(sim::kernel_locked()));
            assert!(sim::kernel_locked(), "inner exit restores the outer lock");
        });
        assert!(!sim::kernel_locked());
    }

    #[test]
    fn release_by_non_owner_fails() {
        let handle = Backend::mutex_create("own").unwrap();
        Backend::mutex_lock(&handle).unwrap();
        let shared = Arc::clone(&handle);
        let res = std::thread::spawn(move || Backend::mutex_unlock(&shared))
            .join()
            .unwrap();
        assert_eq!(res, Err(Error::InvalidArgument));
        assert_eq!(Backend::mutex_unlock(&handle), Ok(()));
        assert_eq!(Backend::mutex_delete(handle), Ok(()));
    }

    #[test]
    fn critical_section_in_isr_masks_interrupts() {
        let _isr = sim::enter_isr();
        with_critical::<Backend, _>(|| {
            assert!(arch::irq_masked());
            assert!(!sim::kernel_locked());
            with_critical::<Backend, _>(|| assert!(arch::irq_masked()));
            assert!(arch::irq_masked(), "inner exit keeps the outer mask");
        });
        assert!(!arch::irq_masked());
        assert!(!sim::kernel_locked());
    }

    #[test]
    fn refused_kernel_lock_falls_back_to_masking() {
        let _refuse = sim::refuse_kernel_lock();
        let state = Backend::critical_enter();
        assert!(matches!(state, CriticalState::Irq(_)));
        assert!(arch::irq_masked());
        Backend::critical_exit(state);
        assert!(!arch::irq_masked());
    }

    #[test]
    fn delete_from_isr_reports_status() {
        let m = Mutex::<Backend>::create_named("isr").unwrap();
        let _isr = sim::enter_isr();
        assert_eq!(m.delete(), Err(Error::Unsupported));
    }
}
