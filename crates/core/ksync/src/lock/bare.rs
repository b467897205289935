//! No-kernel backend.
//!
//! There is nothing to block on, so a "mutex" is the global interrupt mask
//! plus a depth counter: the first acquisition masks interrupts and records
//! the prior state, the last release restores it. Consequences callers must
//! plan for, advertised through an empty [`Capabilities`] set:
//!
//! - `lock` never waits; it excludes everyone by masking interrupts.
//! - `trylock` reports [`Error::Busy`] whenever interrupts are already
//!   masked in the calling context, including by the caller's own hold.
//! - A finite timeout is a single `trylock` attempt reported as
//!   [`Error::TimedOut`] on failure.

use core::num::NonZeroU32;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use super::{Capabilities, CriticalState, LockBackend};
use crate::arch::{self, IrqState};
use crate::{Error, Result};

/// The bare-metal backend.
#[derive(Debug)]
pub enum BareMetal {}

/// Bare-metal mutex state: nesting depth and the interrupt state to
/// restore when the depth returns to zero.
///
/// Only touched with interrupts masked.
#[derive(Debug, Default)]
pub struct BareMutex {
    depth: AtomicU32,
    saved: AtomicUsize,
}

impl BareMutex {
    /// Creates an unheld mutex.
    pub const fn new() -> Self {
        Self {
            depth: AtomicU32::new(0),
            saved: AtomicUsize::new(0),
        }
    }

    /// Current nesting depth.
    pub fn depth(&self) -> u32 {
        self.depth.load(Ordering::Relaxed)
    }
}

impl LockBackend for BareMetal {
    type MutexHandle = BareMutex;

    const NAME: &'static str = "bare-metal";
    const CAPS: Capabilities = Capabilities::empty();

    fn mutex_create(_name: &'static str) -> Result<BareMutex> {
        Ok(BareMutex::new())
    }

    fn mutex_delete(handle: BareMutex) -> Result<()> {
        if handle.depth() != 0 {
            return Err(Error::Busy);
        }
        Ok(())
    }

    fn mutex_lock(handle: &BareMutex) -> Result<()> {
        let state = arch::irq_save();
        let depth = handle.depth.load(Ordering::Relaxed);
        if depth == 0 {
            handle.saved.store(state.0, Ordering::Relaxed);
        }
        handle.depth.store(depth + 1, Ordering::Relaxed);
        Ok(())
    }

    fn mutex_trylock(handle: &BareMutex) -> Result<()> {
        if arch::irq_masked() {
            return Err(Error::Busy);
        }
        Self::mutex_lock(handle)
    }

    fn mutex_lock_for(handle: &BareMutex, ms: NonZeroU32) -> Result<()> {
        Self::mutex_trylock(handle).map_err(|_| {
            crate::ktrace!("ksync: bare-metal lock_timeout({} ms) is a single attempt", ms);
            Error::TimedOut
        })
    }

    fn mutex_unlock(handle: &BareMutex) -> Result<()> {
        let depth = handle.depth.load(Ordering::Relaxed);
        if depth == 0 {
            return Err(Error::InvalidArgument);
        }
        handle.depth.store(depth - 1, Ordering::Relaxed);
        if depth == 1 {
            arch::irq_restore(IrqState(handle.saved.load(Ordering::Relaxed)));
        }
        Ok(())
    }

    fn irq_lock() -> IrqState {
        arch::irq_save()
    }

    fn irq_unlock(state: IrqState) {
        arch::irq_restore(state);
    }

    fn critical_enter() -> CriticalState {
        CriticalState::Irq(arch::irq_save())
    }

    fn critical_exit(state: CriticalState) {
        if let CriticalState::Irq(irq) = state {
            arch::irq_restore(irq);
        }
    }

    fn in_interrupt(local_nest: u32) -> bool {
        local_nest > 0
    }
}

#[cfg(all(test, not(any(loom, shuttle))))]
mod tests {
    use super::*;

    #[test]
    fn depth_tracks_nesting() {
        let m = BareMetal::mutex_create("t").unwrap();
        BareMetal::mutex_lock(&m).unwrap();
        BareMetal::mutex_lock(&m).unwrap();
        assert_eq!(m.depth(), 2);
        BareMetal::mutex_unlock(&m).unwrap();
        assert!(arch::irq_masked());
        BareMetal::mutex_unlock(&m).unwrap();
        assert!(!arch::irq_masked());
        assert_eq!(m.depth(), 0);
    }

    #[test]
    fn unlock_without_lock_is_invalid() {
        let m = BareMutex::new();
        assert_eq!(BareMetal::mutex_unlock(&m), Err(Error::InvalidArgument));
    }

    #[test]
    fn trylock_busy_under_irq_lock() {
        let m = BareMutex::new();
        let state = BareMetal::irq_lock();
        assert_eq!(BareMetal::mutex_trylock(&m), Err(Error::Busy));
        assert_eq!(
            BareMetal::mutex_lock_for(&m, NonZeroU32::new(100).unwrap()),
            Err(Error::TimedOut)
        );
        BareMetal::irq_unlock(state);
        assert_eq!(BareMetal::mutex_trylock(&m), Ok(()));
        BareMetal::mutex_unlock(&m).unwrap();
    }

    #[test]
    fn lock_inside_irq_lock_keeps_mask_after_unlock() {
        let m = BareMutex::new();
        let state = BareMetal::irq_lock();
        BareMetal::mutex_lock(&m).unwrap();
        BareMetal::mutex_unlock(&m).unwrap();
        assert!(arch::irq_masked());
        BareMetal::irq_unlock(state);
        assert!(!arch::irq_masked());
    }

    #[test]
    fn deleting_a_held_mutex_is_busy() {
        let m = BareMutex::new();
        BareMetal::mutex_lock(&m).unwrap();
        assert_eq!(BareMetal::mutex_delete(m), Err(Error::Busy));
        // The hold went away with the handle; hand the mask back.
        arch::irq_restore(IrqState(0));
        assert!(!arch::irq_masked());
        assert_eq!(BareMetal::mutex_delete(BareMutex::new()), Ok(()));
    }

    #[test]
    fn local_nesting_answers_in_interrupt() {
        assert!(!BareMetal::in_interrupt(0));
        assert!(BareMetal::in_interrupt(2));
    }
}
