//! Simulated kernels for exercising the kernel backends on the host.
//!
//! One tick is one millisecond. Mutex state lives behind a std mutex and
//! condition variable, so timed waits really wait. Interrupt masking goes
//! through the host interrupt simulation; ISR context, critical-section
//! depth and the kernel lock are per-thread flags.

use std::cell::Cell;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use super::{CmsisPort, OsStatus, PrioMutexPort, SemaphorePort, TakeStatus};
use crate::arch::{self, IrqState};

thread_local! {
    static IN_ISR: Cell<bool> = const { Cell::new(false) };
    static CRITICAL: Cell<u32> = const { Cell::new(0) };
    static KERNEL_LOCKED: Cell<bool> = const { Cell::new(false) };
    static REFUSE_KERNEL_LOCK: Cell<bool> = const { Cell::new(false) };
    static FAIL_CREATE: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as running an ISR until dropped.
pub(crate) struct IsrGuard;

pub(crate) fn enter_isr() -> IsrGuard {
    IN_ISR.with(|f| f.set(true));
    IsrGuard
}

impl Drop for IsrGuard {
    fn drop(&mut self) {
        IN_ISR.with(|f| f.set(false));
    }
}

/// Makes the next handle creation on this thread fail.
pub(crate) struct FailGuard;

pub(crate) fn fail_next_create() -> FailGuard {
    FAIL_CREATE.with(|f| f.set(true));
    FailGuard
}

impl Drop for FailGuard {
    fn drop(&mut self) {
        FAIL_CREATE.with(|f| f.set(false));
    }
}

/// Makes `kernel_lock` on this thread fail with a generic error until
/// dropped.
pub(crate) struct RefuseGuard;

pub(crate) fn refuse_kernel_lock() -> RefuseGuard {
    REFUSE_KERNEL_LOCK.with(|f| f.set(true));
    RefuseGuard
}

impl Drop for RefuseGuard {
    fn drop(&mut self) {
        REFUSE_KERNEL_LOCK.with(|f| f.set(false));
    }
}

pub(crate) fn critical_depth() -> u32 {
    CRITICAL.with(Cell::get)
}

pub(crate) fn kernel_locked() -> bool {
    KERNEL_LOCKED.with(Cell::get)
}

fn isr_flag() -> bool {
    IN_ISR.with(Cell::get)
}

fn creation_fails() -> bool {
    FAIL_CREATE.with(|f| f.replace(false))
}

fn critical_inc() {
    CRITICAL.with(|c| c.set(c.get() + 1));
}

fn critical_dec() {
    CRITICAL.with(|c| c.set(c.get() - 1));
}

// ---------------------------------------------------------------------------
// Shared wait object
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Wait {
    Poll,
    Forever,
    Ticks(u64),
}

#[derive(Debug, Default)]
struct State {
    tokens: u32,
    max: u32,
    owner: Option<ThreadId>,
    depth: u32,
}

/// A kernel object: semaphore tokens or mutex ownership.
#[derive(Debug, Default)]
pub(crate) struct SimLock {
    state: Mutex<State>,
    cond: Condvar,
}

impl SimLock {
    fn semaphore(max: u32, initial: u32) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                tokens: initial,
                max,
                ..State::default()
            }),
            cond: Condvar::new(),
        })
    }

    fn mutex() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(&self, wait: Wait, mut take: impl FnMut(&mut State) -> bool) -> bool {
        let mut st = self.state();
        let deadline = match wait {
            Wait::Poll => return take(&mut st),
            Wait::Forever => None,
            Wait::Ticks(ms) => Some(Instant::now() + Duration::from_millis(ms)),
        };
        loop {
            if take(&mut st) {
                return true;
            }
            match deadline {
                None => st = self.cond.wait(st).unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    st = self
                        .cond
                        .wait_timeout(st, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }

    fn release(&self, give: impl FnOnce(&mut State) -> bool) -> bool {
        let released = give(&mut self.state());
        if released {
            self.cond.notify_all();
        }
        released
    }
}

fn take_mutex(st: &mut State, recursive: bool) -> bool {
    let me = thread::current().id();
    match st.owner {
        None => {
            st.owner = Some(me);
            st.depth = 1;
            true
        }
        Some(owner) if recursive && owner == me => {
            st.depth += 1;
            true
        }
        Some(_) => false,
    }
}

fn give_mutex(st: &mut State) -> bool {
    if st.owner != Some(thread::current().id()) {
        return false;
    }
    st.depth -= 1;
    if st.depth == 0 {
        st.owner = None;
    }
    true
}

// ---------------------------------------------------------------------------
// Backend A: counting semaphore kernel
// ---------------------------------------------------------------------------

/// Semaphore kernel port.
pub(crate) enum SimSemaphore {}

// SAFETY: Waits block on a condition variable; tokens are guarded by a mutex.
unsafe impl SemaphorePort for SimSemaphore {
    type Handle = Arc<SimLock>;

    const MAX_DELAY: u32 = u32::MAX;

    fn create(max: u32, initial: u32) -> Option<Self::Handle> {
        (!creation_fails()).then(|| SimLock::semaphore(max, initial))
    }

    fn delete(_handle: Self::Handle) {}

    fn take(handle: &Self::Handle, ticks: u32) -> bool {
        let wait = match ticks {
            0 => Wait::Poll,
            t if t == Self::MAX_DELAY => Wait::Forever,
            t => Wait::Ticks(u64::from(t)),
        };
        handle.acquire(wait, |st| {
            if st.tokens == 0 {
                return false;
            }
            st.tokens -= 1;
            true
        })
    }

    fn give(handle: &Self::Handle) -> bool {
        handle.release(|st| {
            if st.tokens == st.max {
                return false;
            }
            st.tokens += 1;
            true
        })
    }

    fn ms_to_ticks(ms: u32) -> u32 {
        ms
    }

    fn mask_interrupts() -> usize {
        arch::irq_save().0
    }

    fn unmask_interrupts(state: usize) {
        arch::irq_restore(IrqState(state));
    }

    fn enter_critical() {
        critical_inc();
    }

    fn exit_critical() {
        critical_dec();
    }

    fn inside_interrupt() -> bool {
        isr_flag()
    }
}

// ---------------------------------------------------------------------------
// Backend B: priority-inheriting recursive mutex kernel
// ---------------------------------------------------------------------------

/// Native-mutex kernel port.
pub(crate) enum SimPrioMutex {}

// SAFETY: Waits block on a condition variable; release checks ownership.
unsafe impl PrioMutexPort for SimPrioMutex {
    type Handle = Arc<SimLock>;

    fn create(_name: &'static str) -> Option<Self::Handle> {
        (!creation_fails()).then(SimLock::mutex)
    }

    fn delete(_handle: Self::Handle) {}

    fn take(handle: &Self::Handle, ticks: i32) -> TakeStatus {
        let wait = match ticks {
            0 => Wait::Poll,
            t if t < 0 => Wait::Forever,
            t => Wait::Ticks(u64::from(t.unsigned_abs())),
        };
        if handle.acquire(wait, |st| take_mutex(st, true)) {
            TakeStatus::Ok
        } else {
            TakeStatus::Timeout
        }
    }

    fn release(handle: &Self::Handle) -> bool {
        handle.release(give_mutex)
    }

    fn tick_from_ms(ms: u32) -> i32 {
        i32::try_from(ms).unwrap_or(i32::MAX)
    }

    fn interrupt_disable() -> usize {
        arch::irq_save().0
    }

    fn interrupt_enable(level: usize) {
        arch::irq_restore(IrqState(level));
    }

    fn enter_critical() {
        critical_inc();
    }

    fn exit_critical() {
        critical_dec();
    }

    fn interrupt_nest() -> u32 {
        u32::from(isr_flag())
    }
}

// ---------------------------------------------------------------------------
// Backend C: standardized RTOS API
// ---------------------------------------------------------------------------

/// Standardized-API kernel port.
pub(crate) enum SimCmsis {}

// SAFETY: Waits block on a condition variable; release checks ownership.
unsafe impl CmsisPort for SimCmsis {
    type Handle = Arc<SimLock>;

    const TICK_FREQ_HZ: u32 = 1000;

    fn mutex_new(_name: &'static str) -> Option<Self::Handle> {
        (!creation_fails()).then(SimLock::mutex)
    }

    fn mutex_delete(_handle: Self::Handle) -> OsStatus {
        if isr_flag() {
            OsStatus::ErrorIsr
        } else {
            OsStatus::Ok
        }
    }

    fn mutex_acquire(handle: &Self::Handle, timeout: u32) -> OsStatus {
        if isr_flag() {
            return OsStatus::ErrorIsr;
        }
        let wait = match timeout {
            0 => Wait::Poll,
            t if t == Self::WAIT_FOREVER => Wait::Forever,
            t => Wait::Ticks(u64::from(t)),
        };
        match (handle.acquire(wait, |st| take_mutex(st, false)), wait) {
            (true, _) => OsStatus::Ok,
            (false, Wait::Poll) => OsStatus::ErrorResource,
            (false, _) => OsStatus::ErrorTimeout,
        }
    }

    fn mutex_release(handle: &Self::Handle) -> OsStatus {
        if handle.release(give_mutex) {
            OsStatus::Ok
        } else {
            OsStatus::ErrorResource
        }
    }

    fn kernel_lock() -> i32 {
        if isr_flag() {
            return -6;
        }
        if REFUSE_KERNEL_LOCK.with(Cell::get) {
            return -1;
        }
        i32::from(KERNEL_LOCKED.with(|k| k.replace(true)))
    }

    fn kernel_restore_lock(lock: i32) -> i32 {
        if isr_flag() {
            return -6;
        }
        KERNEL_LOCKED.with(|k| k.set(lock != 0));
        lock
    }

    fn in_isr() -> bool {
        isr_flag()
    }
}
