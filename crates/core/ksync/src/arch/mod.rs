//! Interrupt masking and memory barriers for the supported targets.
//!
//! Every target provides the same four operations: save-and-mask, restore,
//! query, and a full barrier. The interrupt state is an opaque word holding
//! whatever the CPU reported before masking (PRIMASK, `mstatus`, DAIF,
//! RFLAGS), so nested save/restore pairs restore correctly as long as each
//! caller hands back the state it was given.
//!
//! Host builds simulate a single core: masking interrupts means taking
//! ownership of the simulated CPU, so two host threads can never both be
//! inside a masked section. That models an ISR that cannot run while the
//! task it would preempt has interrupts off.

#[cfg(all(target_os = "none", target_arch = "arm", target_feature = "mclass"))]
#[path = "cortex_m.rs"]
mod imp;

#[cfg(all(
    target_os = "none",
    any(target_arch = "riscv32", target_arch = "riscv64")
))]
#[path = "riscv.rs"]
mod imp;

#[cfg(all(target_os = "none", target_arch = "aarch64"))]
#[path = "aarch64.rs"]
mod imp;

#[cfg(all(target_os = "none", target_arch = "x86_64"))]
#[path = "x86_64.rs"]
mod imp;

#[cfg(not(target_os = "none"))]
#[path = "host.rs"]
mod imp;

#[cfg(all(
    target_os = "none",
    not(any(
        all(target_arch = "arm", target_feature = "mclass"),
        target_arch = "riscv32",
        target_arch = "riscv64",
        target_arch = "aarch64",
        target_arch = "x86_64",
    ))
))]
compile_error!("ksync: no interrupt-masking support for this target architecture");

use crate::compat::{Ordering, fence};

/// Interrupt-mask snapshot returned by [`irq_save`].
///
/// Only meaningful on the context that produced it. Hand it back to
/// [`irq_restore`] exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct IrqState(pub usize);

impl IrqState {
    /// Returns whether interrupts were already masked when this snapshot was
    /// taken.
    #[must_use]
    pub fn was_masked(self) -> bool {
        imp::state_is_masked(self.0)
    }
}

/// Masks all maskable interrupts on the current CPU and returns the previous
/// state.
#[inline]
#[must_use = "the returned state must be passed to `irq_restore`"]
pub fn irq_save() -> IrqState {
    IrqState(imp::save())
}

/// Restores the interrupt state captured by [`irq_save`].
///
/// Restoring an already-masked snapshot leaves interrupts masked, which is
/// what makes nested sections compose.
#[inline]
pub fn irq_restore(state: IrqState) {
    imp::restore(state.0);
}

/// Returns whether interrupts are currently masked on this CPU.
#[inline]
#[must_use]
pub fn irq_masked() -> bool {
    imp::masked()
}

/// Full memory barrier (a `DMB` on Arm, `fence rw,rw` on RISC-V).
#[inline]
pub fn barrier() {
    fence(Ordering::SeqCst);
}

#[cfg(all(test, not(any(loom, shuttle))))]
mod tests {
    use super::*;

    #[test]
    fn save_restore_round_trip() {
        assert!(!irq_masked());
        let state = irq_save();
        assert!(!state.was_masked());
        assert!(irq_masked());
        irq_restore(state);
        assert!(!irq_masked());
    }

    #[test]
    fn nested_sections_restore_in_order() {
        let outer = irq_save();
        let inner = irq_save();
        assert!(inner.was_masked());
        irq_restore(inner);
        assert!(irq_masked(), "inner restore must not unmask");
        irq_restore(outer);
        assert!(!irq_masked());
    }

    #[test]
    fn masked_section_excludes_other_threads() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let counter = Arc::new(AtomicU32::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let state = irq_save();
                        // Non-atomic read-modify-write is safe inside the section.
                        let v = counter.load(Ordering::Relaxed);
                        counter.store(v + 1, Ordering::Relaxed);
                        irq_restore(state);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::Relaxed), 4000);
    }
}
