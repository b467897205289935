//! Scoped IRQ lock and critical section.

use core::marker::PhantomData;

use super::LockBackend;
use crate::arch::IrqState;

/// Snapshot returned by [`LockBackend::critical_enter`], recording which
/// mechanism the section took so `critical_exit` undoes that one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriticalState {
    /// Interrupts were masked; holds the state to restore.
    Irq(IrqState),
    /// The scheduler was locked; holds the kernel's previous lock state.
    Kernel(usize),
}

/// Interrupts stay masked for as long as this guard lives.
///
/// Nesting is correct as long as guards drop in reverse order, which scoping
/// guarantees. The guard is `!Send`: interrupt state belongs to the CPU that
/// captured it.
#[must_use = "interrupts are re-enabled as soon as the guard is dropped"]
pub struct IrqGuard<B: LockBackend> {
    state: IrqState,
    _not_send: PhantomData<(*mut (), B)>,
}

impl<B: LockBackend> IrqGuard<B> {
    /// Masks interrupts until the guard is dropped.
    pub fn new() -> Self {
        Self {
            state: B::irq_lock(),
            _not_send: PhantomData,
        }
    }

    /// Returns the interrupt state that will be restored on drop.
    pub fn saved_state(&self) -> IrqState {
        self.state
    }
}

impl<B: LockBackend> Default for IrqGuard<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: LockBackend> Drop for IrqGuard<B> {
    fn drop(&mut self) {
        B::irq_unlock(self.state);
    }
}

/// A critical section lasts for as long as this guard lives.
#[must_use = "the critical section ends as soon as the guard is dropped"]
pub struct CriticalGuard<B: LockBackend> {
    state: CriticalState,
    _not_send: PhantomData<(*mut (), B)>,
}

impl<B: LockBackend> CriticalGuard<B> {
    /// Enters a critical section until the guard is dropped.
    pub fn new() -> Self {
        Self {
            state: B::critical_enter(),
            _not_send: PhantomData,
        }
    }
}

impl<B: LockBackend> Default for CriticalGuard<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: LockBackend> Drop for CriticalGuard<B> {
    fn drop(&mut self) {
        B::critical_exit(self.state);
    }
}

/// Runs `f` with interrupts masked.
pub fn with_irq_lock<B: LockBackend, R>(f: impl FnOnce() -> R) -> R {
    let _guard = IrqGuard::<B>::new();
    f()
}

/// Runs `f` inside a critical section.
pub fn with_critical<B: LockBackend, R>(f: impl FnOnce() -> R) -> R {
    let _guard = CriticalGuard::<B>::new();
    f()
}
