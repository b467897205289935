//! Host simulation of a single core's interrupt mask.
//!
//! The mask is a global flag owned by at most one thread. A thread that
//! masks interrupts while another thread holds the mask waits for it: on
//! real hardware that thread could not be running at all.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::compat::{self, thread_local};

const UNMASKED: usize = 0;
const MASKED: usize = 1;

static CPU_MASKED: AtomicBool = AtomicBool::new(false);

thread_local! {
    static HOLDS_MASK: Cell<bool> = Cell::new(false);
}

fn holds_mask() -> bool {
    HOLDS_MASK.with(Cell::get)
}

pub(super) fn save() -> usize {
    if holds_mask() {
        return MASKED;
    }
    while CPU_MASKED
        .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
        .is_err()
    {
        compat::spin_hint();
    }
    HOLDS_MASK.with(|h| h.set(true));
    UNMASKED
}

pub(super) fn restore(state: usize) {
    if state == UNMASKED && holds_mask() {
        HOLDS_MASK.with(|h| h.set(false));
        CPU_MASKED.store(false, Ordering::Release);
    }
}

pub(super) fn masked() -> bool {
    holds_mask()
}

pub(super) fn state_is_masked(state: usize) -> bool {
    state == MASKED
}
