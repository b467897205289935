//! Bit-field operations on 8-, 16- and 32-bit words.
//!
//! [`AtomicBitOps`] extends `AtomicU8`, `AtomicU16` and `AtomicU32` with
//! mask-based set/clear/toggle/test operations. The mutating forms use the
//! same read, compute, conditional-store, retry pattern as
//! [`AtomicWord`](crate::atomic::AtomicWord). [`BitOps`] offers the same
//! vocabulary for plain integers owned by a single context.
//!
//! All `test*` results report whether *any* bit of the mask was set.

use core::ops::{BitAnd, BitOr, BitXor, Not};
use core::sync::atomic::{AtomicU8, AtomicU16, AtomicU32, Ordering};

/// Returns a 32-bit mask with only bit `n` set.
///
/// `n` must be below 32.
#[inline]
#[must_use]
pub const fn bit(n: u32) -> u32 {
    1 << n
}

mod sealed {
    pub trait Sealed {}
}

/// Integer types usable as bit masks.
pub trait Bits:
    Copy
    + PartialEq
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + BitXor<Output = Self>
    + Not<Output = Self>
    + sealed::Sealed
{
    /// The all-zero mask.
    const ZERO: Self;
}

/// Atomic mask operations on a shared word.
pub trait AtomicBitOps: sealed::Sealed {
    /// The integer type of the word.
    type Bits: Bits;

    /// Replaces the word with `f(old)` and returns `old`.
    #[doc(hidden)]
    fn modify(&self, f: impl FnMut(Self::Bits) -> Self::Bits) -> Self::Bits;

    /// Reads the word.
    #[doc(hidden)]
    fn snapshot(&self) -> Self::Bits;

    /// Sets every bit of `mask`.
    #[inline]
    fn set_bits(&self, mask: Self::Bits) {
        self.modify(|old| old | mask);
    }

    /// Clears every bit of `mask`.
    #[inline]
    fn clear_bits(&self, mask: Self::Bits) {
        self.modify(|old| old & !mask);
    }

    /// Toggles every bit of `mask`.
    #[inline]
    fn change_bits(&self, mask: Self::Bits) {
        self.modify(|old| old ^ mask);
    }

    /// Reports whether any bit of `mask` is set.
    ///
    /// This is a snapshot read. It does not order anything against
    /// concurrent writers: the answer may already be stale when it returns.
    /// Use one of the `test_and_*` forms to act on a bit atomically.
    #[inline]
    fn test_bits(&self, mask: Self::Bits) -> bool {
        self.snapshot() & mask != Self::Bits::ZERO
    }

    /// Sets `mask`, returning whether any of its bits was already set.
    #[inline]
    fn test_and_set_bits(&self, mask: Self::Bits) -> bool {
        self.modify(|old| old | mask) & mask != Self::Bits::ZERO
    }

    /// Clears `mask`, returning whether any of its bits was set.
    #[inline]
    fn test_and_clear_bits(&self, mask: Self::Bits) -> bool {
        self.modify(|old| old & !mask) & mask != Self::Bits::ZERO
    }

    /// Toggles `mask`, returning whether any of its bits was set before.
    #[inline]
    fn test_and_change_bits(&self, mask: Self::Bits) -> bool {
        self.modify(|old| old ^ mask) & mask != Self::Bits::ZERO
    }
}

/// Mask operations on a word owned by the caller.
pub trait BitOps: Bits {
    /// Sets every bit of `mask`.
    fn set_bits(&mut self, mask: Self);
    /// Clears every bit of `mask`.
    fn clear_bits(&mut self, mask: Self);
    /// Toggles every bit of `mask`.
    fn change_bits(&mut self, mask: Self);
    /// Reports whether any bit of `mask` is set.
    fn test_bits(&self, mask: Self) -> bool;
    /// Sets `mask`, returning whether any of its bits was already set.
    fn test_and_set_bits(&mut self, mask: Self) -> bool;
    /// Clears `mask`, returning whether any of its bits was set.
    fn test_and_clear_bits(&mut self, mask: Self) -> bool;
    /// Toggles `mask`, returning whether any of its bits was set before.
    fn test_and_change_bits(&mut self, mask: Self) -> bool;
}

impl<T: Bits> BitOps for T {
    #[inline]
    fn set_bits(&mut self, mask: Self) {
        *self = *self | mask;
    }

    #[inline]
    fn clear_bits(&mut self, mask: Self) {
        *self = *self & !mask;
    }

    #[inline]
    fn change_bits(&mut self, mask: Self) {
        *self = *self ^ mask;
    }

    #[inline]
    fn test_bits(&self, mask: Self) -> bool {
        *self & mask != Self::ZERO
    }

    #[inline]
    fn test_and_set_bits(&mut self, mask: Self) -> bool {
        let was = self.test_bits(mask);
        self.set_bits(mask);
        was
    }

    #[inline]
    fn test_and_clear_bits(&mut self, mask: Self) -> bool {
        let was = self.test_bits(mask);
        self.clear_bits(mask);
        was
    }

    #[inline]
    fn test_and_change_bits(&mut self, mask: Self) -> bool {
        let was = self.test_bits(mask);
        self.change_bits(mask);
        was
    }
}

macro_rules! impl_bitops {
    ($atomic:ty, $int:ty, $width:tt) => {
        impl sealed::Sealed for $int {}
        impl sealed::Sealed for $atomic {}

        impl Bits for $int {
            const ZERO: Self = 0;
        }

        impl AtomicBitOps for $atomic {
            type Bits = $int;

            #[cfg(target_has_atomic = $width)]
            #[inline]
            fn modify(&self, mut f: impl FnMut($int) -> $int) -> $int {
                let mut current = self.load(Ordering::Relaxed);
                loop {
                    match self.compare_exchange_weak(
                        current,
                        f(current),
                        Ordering::SeqCst,
                        Ordering::Relaxed,
                    ) {
                        Ok(previous) => return previous,
                        Err(observed) => current = observed,
                    }
                }
            }

            #[cfg(not(target_has_atomic = $width))]
            #[inline]
            fn modify(&self, mut f: impl FnMut($int) -> $int) -> $int {
                let state = crate::arch::irq_save();
                let previous = self.load(Ordering::SeqCst);
                self.store(f(previous), Ordering::SeqCst);
                crate::arch::irq_restore(state);
                previous
            }

            #[inline]
            fn snapshot(&self) -> $int {
                self.load(Ordering::Relaxed)
            }
        }
    };
}

impl_bitops!(AtomicU8, u8, "8");
impl_bitops!(AtomicU16, u16, "16");
impl_bitops!(AtomicU32, u32, "32");
