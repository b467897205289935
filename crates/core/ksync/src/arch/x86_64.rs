//! x86_64: interrupt masking through RFLAGS.IF.

use core::arch::asm;

const RFLAGS_IF: usize = 1 << 9;

#[inline]
pub(super) fn save() -> usize {
    let flags: u64;
    // SAFETY: Reading RFLAGS and clearing IF is safe in kernel mode.
    unsafe {
        asm!("pushfq", "pop {}", "cli", out(reg) flags);
    }
    flags as usize
}

#[inline]
pub(super) fn restore(state: usize) {
    if state & RFLAGS_IF != 0 {
        // SAFETY: IF was set when the state was captured.
        unsafe {
            asm!("sti", options(nostack, preserves_flags));
        }
    }
}

#[inline]
pub(super) fn masked() -> bool {
    let flags: u64;
    // SAFETY: Reading RFLAGS has no side effects.
    unsafe {
        asm!("pushfq", "pop {}", out(reg) flags, options(nomem, preserves_flags));
    }
    state_is_masked(flags as usize)
}

#[inline]
pub(super) fn state_is_masked(state: usize) -> bool {
    state & RFLAGS_IF == 0
}
