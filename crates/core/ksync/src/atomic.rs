//! Word-sized atomic read-modify-write primitives.
//!
//! Every operation is a single indivisible read-modify-write with respect to
//! all observers of the same word. On targets with a native compare-and-swap
//! (`target_has_atomic = "32"`, i.e. LDREX/STREX, LR/SC or `lock cmpxchg`)
//! each operation reads the word, computes the new value and attempts a
//! conditional store, re-reading on failure. There is no bound on retries;
//! under pathological contention the loop can livelock.
//!
//! Targets with only atomic loads and stores (ARMv6-M) run the same
//! read-compute-store inside an interrupt-masked section instead.
//!
//! All operations return the value held *before* the operation.

use core::sync::atomic::{AtomicU32, Ordering};

/// A 32-bit word shared between execution contexts.
#[derive(Debug, Default)]
#[repr(transparent)]
pub struct AtomicWord {
    v: AtomicU32,
}

impl AtomicWord {
    /// Creates a new word holding `value`.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self {
            v: AtomicU32::new(value),
        }
    }

    /// Reads the current value.
    #[inline]
    pub fn load(&self) -> u32 {
        self.v.load(Ordering::SeqCst)
    }

    /// Writes `value`.
    #[inline]
    pub fn store(&self, value: u32) {
        self.v.store(value, Ordering::SeqCst);
    }

    /// Replaces the value with `f(old)` and returns `old`.
    ///
    /// `f` may run more than once if the conditional store fails, so it must
    /// be a pure function of its argument.
    #[cfg(target_has_atomic = "32")]
    #[inline]
    pub fn update(&self, mut f: impl FnMut(u32) -> u32) -> u32 {
        let mut current = self.v.load(Ordering::Relaxed);
        loop {
            match self
                .v
                .compare_exchange_weak(current, f(current), Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(previous) => return previous,
                Err(observed) => current = observed,
            }
        }
    }

    /// Replaces the value with `f(old)` and returns `old`.
    ///
    /// Runs with interrupts masked; `f` runs exactly once.
    #[cfg(not(target_has_atomic = "32"))]
    #[inline]
    pub fn update(&self, mut f: impl FnMut(u32) -> u32) -> u32 {
        let state = crate::arch::irq_save();
        let previous = self.v.load(Ordering::SeqCst);
        self.v.store(f(previous), Ordering::SeqCst);
        crate::arch::irq_restore(state);
        previous
    }

    /// Wrapping add; returns the previous value.
    #[inline]
    pub fn add(&self, value: u32) -> u32 {
        self.update(|old| old.wrapping_add(value))
    }

    /// Wrapping subtract; returns the previous value.
    #[inline]
    pub fn sub(&self, value: u32) -> u32 {
        self.update(|old| old.wrapping_sub(value))
    }

    /// Bitwise AND; returns the previous value.
    #[inline]
    pub fn and(&self, value: u32) -> u32 {
        self.update(|old| old & value)
    }

    /// Bitwise OR; returns the previous value.
    #[inline]
    pub fn or(&self, value: u32) -> u32 {
        self.update(|old| old | value)
    }

    /// Bitwise XOR; returns the previous value.
    #[inline]
    pub fn xor(&self, value: u32) -> u32 {
        self.update(|old| old ^ value)
    }

    /// Stores `value` and returns the previous value.
    #[inline]
    pub fn exchange(&self, value: u32) -> u32 {
        self.update(|_| value)
    }

    /// Clears the word to `0`.
    #[inline]
    pub fn flag_clear(&self) {
        self.store(0);
    }

    /// Sets the word to `1` and returns the previous value (`0` means the
    /// caller set the flag).
    #[inline]
    pub fn flag_test_and_set(&self) -> u32 {
        self.exchange(1)
    }

    /// Stores `desired` if the word equals `*expected`.
    ///
    /// Returns `true` on success. On failure `*expected` is overwritten with
    /// the value actually observed and `false` is returned. A lost
    /// reservation with a matching value is retried, never reported, so the
    /// result is never a spurious failure.
    #[cfg(target_has_atomic = "32")]
    pub fn compare_exchange_strong(&self, expected: &mut u32, desired: u32) -> bool {
        loop {
            match self
                .v
                .compare_exchange_weak(*expected, desired, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return true,
                Err(observed) if observed != *expected => {
                    *expected = observed;
                    return false;
                }
                Err(_) => {}
            }
        }
    }

    /// Stores `desired` if the word equals `*expected`.
    ///
    /// Returns `true` on success. On failure `*expected` is overwritten with
    /// the value actually observed and `false` is returned.
    #[cfg(not(target_has_atomic = "32"))]
    pub fn compare_exchange_strong(&self, expected: &mut u32, desired: u32) -> bool {
        let state = crate::arch::irq_save();
        let observed = self.v.load(Ordering::SeqCst);
        let matched = observed == *expected;
        if matched {
            self.v.store(desired, Ordering::SeqCst);
        } else {
            *expected = observed;
        }
        crate::arch::irq_restore(state);
        matched
    }

    /// Consumes the word and returns its value.
    #[must_use]
    pub fn into_inner(self) -> u32 {
        self.v.into_inner()
    }

    /// Returns a raw pointer to the word, for handing to C code that uses
    /// the same exclusive-access discipline.
    #[must_use]
    pub const fn as_ptr(&self) -> *mut u32 {
        self.v.as_ptr()
    }
}
