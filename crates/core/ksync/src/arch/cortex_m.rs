//! ARMv6-M / ARMv7-M / ARMv8-M: interrupt masking through PRIMASK.

use core::arch::asm;

const PRIMASK_PM: usize = 1;

#[inline]
pub(super) fn save() -> usize {
    let primask: u32;
    // SAFETY: Reading PRIMASK and setting it with `cpsid i` only affects the
    // interrupt mask. No `nomem`: the asm must also act as a compiler barrier.
    unsafe {
        asm!(
            "mrs {}, PRIMASK",
            "cpsid i",
            out(reg) primask,
            options(nostack, preserves_flags),
        );
    }
    primask as usize
}

#[inline]
pub(super) fn restore(state: usize) {
    if state & PRIMASK_PM == 0 {
        // SAFETY: Interrupts were enabled when the state was captured.
        unsafe {
            asm!("cpsie i", options(nostack, preserves_flags));
        }
    }
}

#[inline]
pub(super) fn masked() -> bool {
    let primask: u32;
    // SAFETY: Reading PRIMASK has no side effects.
    unsafe {
        asm!("mrs {}, PRIMASK", out(reg) primask, options(nomem, nostack, preserves_flags));
    }
    state_is_masked(primask as usize)
}

#[inline]
pub(super) fn state_is_masked(state: usize) -> bool {
    state & PRIMASK_PM != 0
}
