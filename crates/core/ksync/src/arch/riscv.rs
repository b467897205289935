//! RISC-V machine mode: interrupt masking through `mstatus.MIE`.

use core::arch::asm;

const MSTATUS_MIE: usize = 1 << 3;

#[inline]
pub(super) fn save() -> usize {
    let mstatus: usize;
    // SAFETY: Clearing MIE only affects machine-mode interrupt delivery.
    unsafe {
        asm!("csrrci {}, mstatus, 8", out(reg) mstatus, options(nostack));
    }
    mstatus
}

#[inline]
pub(super) fn restore(state: usize) {
    if state & MSTATUS_MIE != 0 {
        // SAFETY: MIE was set when the state was captured.
        unsafe {
            asm!("csrsi mstatus, 8", options(nostack));
        }
    }
}

#[inline]
pub(super) fn masked() -> bool {
    let mstatus: usize;
    // SAFETY: Reading mstatus has no side effects.
    unsafe {
        asm!("csrr {}, mstatus", out(reg) mstatus, options(nomem, nostack));
    }
    state_is_masked(mstatus)
}

#[inline]
pub(super) fn state_is_masked(state: usize) -> bool {
    state & MSTATUS_MIE == 0
}
