//! Interrupt-safe spinlock.
//!
//! The lock word is taken with test-and-test-and-set on an
//! [`AtomicWord`] while interrupts are masked through the backend's IRQ
//! lock, so the holder can neither be preempted nor interrupted. Not
//! reentrant: relocking from the holding context spins forever. No fairness
//! among waiters.

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

use super::LockBackend;
use crate::arch::{self, IrqState};
use crate::atomic::AtomicWord;
use crate::compat;

/// Spinlock word plus the interrupt state to restore on unlock.
///
/// `#[repr(C)]` so C code sharing the lock sees `{ lock, irq_state }`.
#[repr(C)]
pub struct RawSpinLock<B: LockBackend> {
    lock: AtomicWord,
    irq_state: UnsafeCell<IrqState>,
    _backend: PhantomData<fn() -> B>,
}

// SAFETY: `irq_state` is only written by the context that just acquired
// `lock` and only read by that same context when releasing it.
unsafe impl<B: LockBackend> Sync for RawSpinLock<B> {}
// SAFETY: No thread-bound state is stored while the lock is free.
unsafe impl<B: LockBackend> Send for RawSpinLock<B> {}

crate::static_assert!(core::mem::offset_of!(RawSpinLock<super::BareMetal>, lock) == 0);
crate::static_assert!(
    core::mem::offset_of!(RawSpinLock<super::BareMetal>, irq_state)
        == core::mem::align_of::<usize>()
);

impl<B: LockBackend> RawSpinLock<B> {
    /// Creates a free spinlock.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lock: AtomicWord::new(0),
            irq_state: UnsafeCell::new(IrqState(0)),
            _backend: PhantomData,
        }
    }

    /// Masks interrupts, then spins until the lock word is acquired.
    pub fn lock(&self) {
        let state = B::irq_lock();
        loop {
            if self.lock.flag_test_and_set() == 0 {
                break;
            }
            // TTAS: wait on plain loads until the word looks free.
            while self.lock.load() != 0 {
                compat::spin_hint();
            }
        }
        arch::barrier();
        // SAFETY: The lock is held, nobody else touches `irq_state`.
        unsafe { *self.irq_state.get() = state };
    }

    /// Makes one attempt to acquire the lock.
    ///
    /// On failure interrupts are restored before returning.
    pub fn try_lock(&self) -> bool {
        let state = B::irq_lock();
        if self.lock.flag_test_and_set() != 0 {
            B::irq_unlock(state);
            return false;
        }
        arch::barrier();
        // SAFETY: The lock is held, nobody else touches `irq_state`.
        unsafe { *self.irq_state.get() = state };
        true
    }

    /// Releases the lock and restores the interrupt state saved by the
    /// acquiring call.
    ///
    /// # Safety
    ///
    /// The calling context must hold the lock.
    pub unsafe fn unlock(&self) {
        crate::assert_unsafe_precondition!(self.is_locked(), "unlocking a free spinlock");
        // SAFETY: The caller holds the lock.
        let state = unsafe { *self.irq_state.get() };
        arch::barrier();
        self.lock.flag_clear();
        B::irq_unlock(state);
    }

    /// Returns whether the lock is currently held by anyone.
    pub fn is_locked(&self) -> bool {
        self.lock.load() != 0
    }
}

impl<B: LockBackend> Default for RawSpinLock<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// A spinlock protecting a value.
pub struct SpinLock<T, B: LockBackend> {
    raw: RawSpinLock<B>,
    data: UnsafeCell<T>,
}

// SAFETY: The raw lock provides exclusive access to `T`.
unsafe impl<T: Send, B: LockBackend> Send for SpinLock<T, B> {}
// SAFETY: The raw lock provides exclusive access to `T`.
unsafe impl<T: Send, B: LockBackend> Sync for SpinLock<T, B> {}

impl<T, B: LockBackend> SpinLock<T, B> {
    /// Creates an unlocked spinlock wrapping `value`.
    pub const fn new(value: T) -> Self {
        Self {
            raw: RawSpinLock::new(),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquires the lock, spinning until it becomes available.
    pub fn lock(&self) -> SpinLockGuard<'_, T, B> {
        self.raw.lock();
        SpinLockGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Attempts to acquire the lock once.
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T, B>> {
        self.raw.try_lock().then(|| SpinLockGuard {
            lock: self,
            _not_send: PhantomData,
        })
    }

    /// Returns a mutable reference to the value; no locking needed.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Consumes the lock and returns the value.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

/// RAII guard; releases the [`SpinLock`] and restores interrupts on drop.
///
/// `!Send`: the saved interrupt state belongs to the acquiring CPU.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct SpinLockGuard<'a, T, B: LockBackend> {
    lock: &'a SpinLock<T, B>,
    _not_send: PhantomData<*mut ()>,
}

impl<T, B: LockBackend> Deref for SpinLockGuard<'_, T, B> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: The guard guarantees exclusive access while it exists.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T, B: LockBackend> DerefMut for SpinLockGuard<'_, T, B> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: The guard guarantees exclusive access while it exists.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T, B: LockBackend> Drop for SpinLockGuard<'_, T, B> {
    fn drop(&mut self) {
        // SAFETY: The guard exists only while the lock is held.
        unsafe { self.lock.raw.unlock() };
    }
}
