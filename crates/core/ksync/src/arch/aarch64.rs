//! AArch64: interrupt masking through the DAIF I and F bits.

use core::arch::asm;

const DAIF_I: usize = 1 << 7;

#[inline]
pub(super) fn save() -> usize {
    let daif: u64;
    // SAFETY: Reading DAIF and masking IRQ/FIQ is safe at EL1.
    unsafe {
        asm!(
            "mrs {}, DAIF",
            "msr DAIFSet, #0x3",
            out(reg) daif,
            options(nostack, preserves_flags),
        );
    }
    daif as usize
}

#[inline]
pub(super) fn restore(state: usize) {
    // SAFETY: Writing back a DAIF value captured by `save`.
    unsafe {
        asm!("msr DAIF, {}", in(reg) state as u64, options(nostack, preserves_flags));
    }
}

#[inline]
pub(super) fn masked() -> bool {
    let daif: u64;
    // SAFETY: Reading DAIF has no side effects.
    unsafe {
        asm!("mrs {}, DAIF", out(reg) daif, options(nomem, nostack, preserves_flags));
    }
    state_is_masked(daif as usize)
}

#[inline]
pub(super) fn state_is_masked(state: usize) -> bool {
    state & DAIF_I != 0
}
