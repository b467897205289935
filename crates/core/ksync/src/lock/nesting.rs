//! Interrupt nesting depth.
//!
//! Board support code calls [`InterruptNesting::enter`] at the top of every
//! ISR and [`InterruptNesting::leave`] at the bottom (or holds an
//! [`IsrScope`]). Kernel backends answer [`in_interrupt`] from the kernel
//! instead of this counter.
//!
//! [`in_interrupt`]: InterruptNesting::in_interrupt

use core::marker::PhantomData;
use core::sync::atomic::{AtomicU32, Ordering};

use super::{IrqGuard, LockBackend};

/// Interrupt nesting context, usually a `static`.
pub struct InterruptNesting<B: LockBackend> {
    nest: AtomicU32,
    _backend: PhantomData<fn() -> B>,
}

impl<B: LockBackend> InterruptNesting<B> {
    /// Creates a context at depth zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nest: AtomicU32::new(0),
            _backend: PhantomData,
        }
    }

    /// Records entry into an ISR.
    pub fn enter(&self) {
        let _irq = IrqGuard::<B>::new();
        let nest = self.nest.load(Ordering::Relaxed);
        self.nest.store(nest.wrapping_add(1), Ordering::Relaxed);
    }

    /// Records exit from an ISR. A `leave` without a matching `enter` leaves
    /// the depth at zero.
    pub fn leave(&self) {
        let underflow = {
            let _irq = IrqGuard::<B>::new();
            let nest = self.nest.load(Ordering::Relaxed);
            if nest > 0 {
                self.nest.store(nest - 1, Ordering::Relaxed);
            }
            nest == 0
        };
        if underflow {
            crate::kwarn!("ksync: interrupt leave without matching enter");
        }
    }

    /// Current nesting depth.
    pub fn nest(&self) -> u32 {
        self.nest.load(Ordering::Relaxed)
    }

    /// Reports whether the caller runs in interrupt context.
    pub fn in_interrupt(&self) -> bool {
        B::in_interrupt(self.nest())
    }

    /// Returns the depth to zero. Only for (re)initialization, when no ISR
    /// can be running.
    pub fn reset(&self) {
        self.nest.store(0, Ordering::Relaxed);
    }

    /// Enters and returns a guard that leaves when dropped.
    pub fn isr_scope(&self) -> IsrScope<'_, B> {
        self.enter();
        IsrScope { nesting: self }
    }
}

impl<B: LockBackend> Default for InterruptNesting<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks the extent of an ISR body.
#[must_use = "the ISR scope ends as soon as the guard is dropped"]
pub struct IsrScope<'a, B: LockBackend> {
    nesting: &'a InterruptNesting<B>,
}

impl<B: LockBackend> Drop for IsrScope<'_, B> {
    fn drop(&mut self) {
        self.nesting.leave();
    }
}
