//! Task-level mutex over the selected backend.
//!
//! The mutex guards a region of code, not a value: kernel mutexes on some
//! backends (and the bare-metal one) are recursive for their owner, so a
//! data-carrying wrapper could hand out two `&mut` to the same value.

use core::marker::PhantomData;
use core::mem::ManuallyDrop;

use super::{LockBackend, Timeout};
use crate::{Result, config};

#[cfg(ksync_lock_stat)]
use crate::Error;

#[cfg(ksync_lock_stat)]
use core::sync::atomic::{AtomicU32, Ordering};

/// An owned native mutex.
///
/// Neither `Clone` nor `Copy`. Dropping it (or calling [`delete`](Self::delete))
/// releases the native handle; it must not be held at that point.
pub struct Mutex<B: LockBackend> {
    handle: ManuallyDrop<B::MutexHandle>,
    name: &'static str,
    #[cfg(ksync_lock_stat)]
    stats: StatCounters,
}

impl<B: LockBackend> Mutex<B> {
    /// Creates an unnamed mutex.
    ///
    /// # Errors
    ///
    /// [`Error::NoMemory`](crate::Error::NoMemory) if the backend cannot allocate a handle.
    pub fn create() -> Result<Self> {
        Self::create_named("<unnamed>")
    }

    /// Creates a mutex with a name for diagnostics (and for kernels that
    /// record object names).
    ///
    /// # Errors
    ///
    /// [`Error::NoMemory`](crate::Error::NoMemory) if the backend cannot allocate a handle.
    pub fn create_named(name: &'static str) -> Result<Self> {
        let handle = B::mutex_create(name).inspect_err(|e| {
            crate::kerr!("ksync: {} mutex '{}' create failed: {}", B::NAME, name, e);
        })?;
        Ok(Self {
            handle: ManuallyDrop::new(handle),
            name,
            #[cfg(ksync_lock_stat)]
            stats: StatCounters::new(),
        })
    }

    /// Releases the native handle and reports the backend status.
    ///
    /// The handle is gone afterwards whatever the status; dropping the
    /// mutex does the same but only logs a failure.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`](crate::Error::Busy) if the mutex is still held,
    /// [`Error::Unsupported`](crate::Error::Unsupported) if the kernel
    /// refuses the call from this context.
    pub fn delete(self) -> Result<()> {
        let mut this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so the handle is taken only here.
        let handle = unsafe { ManuallyDrop::take(&mut this.handle) };
        B::mutex_delete(handle)
    }

    /// Returns the diagnostic name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Acquires the mutex, waiting as long as necessary.
    ///
    /// On bare metal this masks interrupts and never waits.
    ///
    /// # Errors
    ///
    /// [`Error::Backend`](crate::Error::Backend) if the kernel call fails.
    pub fn lock(&self) -> Result<MutexGuard<'_, B>> {
        self.acquired(B::mutex_lock(&self.handle))
    }

    /// Acquires the mutex only if it is immediately available.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`](crate::Error::Busy) if it is held.
    pub fn try_lock(&self) -> Result<MutexGuard<'_, B>> {
        self.acquired(B::mutex_trylock(&self.handle))
    }

    /// Acquires the mutex, waiting at most `ms` milliseconds.
    ///
    /// `ms < 0` behaves exactly like [`lock`](Self::lock) and `ms == 0`
    /// exactly like [`try_lock`](Self::try_lock). A positive `ms` waits for
    /// up to that long on backends with [`Capabilities::TIMED_WAIT`]; on
    /// the others it is a single attempt that reports [`Error::TimedOut`](crate::Error::TimedOut)
    /// on contention.
    ///
    /// [`Capabilities::TIMED_WAIT`]: super::Capabilities::TIMED_WAIT
    ///
    /// # Errors
    ///
    /// [`Error::TimedOut`](crate::Error::TimedOut) if the wait expires, [`Error::Busy`](crate::Error::Busy) for a
    /// contended poll.
    pub fn lock_timeout(&self, ms: i32) -> Result<MutexGuard<'_, B>> {
        self.lock_for(Timeout::from_millis(ms))
    }

    /// Acquires the mutex with an explicit [`Timeout`].
    ///
    /// # Errors
    ///
    /// See [`lock_timeout`](Self::lock_timeout).
    pub fn lock_for(&self, timeout: Timeout) -> Result<MutexGuard<'_, B>> {
        match timeout {
            Timeout::Poll => self.try_lock(),
            Timeout::Forever => self.lock(),
            Timeout::Millis(ms) => self.acquired(B::mutex_lock_for(&self.handle, ms)),
        }
    }

    /// Acquires the mutex, waiting at most
    /// [`DEFAULT_TIMEOUT_MS`](config::DEFAULT_TIMEOUT_MS).
    ///
    /// # Errors
    ///
    /// See [`lock_timeout`](Self::lock_timeout).
    pub fn lock_default_timeout(&self) -> Result<MutexGuard<'_, B>> {
        self.lock_timeout(config::DEFAULT_TIMEOUT_MS)
    }

    /// Returns a snapshot of the acquisition statistics.
    #[cfg(ksync_lock_stat)]
    pub fn stats(&self) -> MutexStats {
        self.stats.snapshot()
    }

    fn acquired(&self, status: Result<()>) -> Result<MutexGuard<'_, B>> {
        #[cfg(ksync_lock_stat)]
        self.stats.record(status);
        status.map(|()| MutexGuard {
            mutex: self,
            _not_send: PhantomData,
        })
    }
}

impl<B: LockBackend> Drop for Mutex<B> {
    fn drop(&mut self) {
        // SAFETY: The handle is taken exactly once, here, and never used again.
        let handle = unsafe { ManuallyDrop::take(&mut self.handle) };
        if let Err(e) = B::mutex_delete(handle) {
            crate::kwarn!(
                "ksync: {} mutex '{}' delete failed: {}",
                B::NAME,
                self.name,
                e
            );
        }
    }
}

impl<B: LockBackend> core::fmt::Debug for Mutex<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Mutex")
            .field("backend", &B::NAME)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Proof that the calling context holds a [`Mutex`].
///
/// Dropping the guard unlocks; a failed unlock on drop is logged. Use
/// [`unlock`](Self::unlock) to observe the status instead.
#[must_use = "the mutex is released as soon as the guard is dropped"]
pub struct MutexGuard<'a, B: LockBackend> {
    mutex: &'a Mutex<B>,
    _not_send: PhantomData<*mut ()>,
}

impl<B: LockBackend> MutexGuard<'_, B> {
    /// Releases the mutex and reports the backend status.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`](crate::Error::InvalidArgument) if the backend says the caller did not
    /// hold it.
    pub fn unlock(self) -> Result<()> {
        let mutex = self.mutex;
        core::mem::forget(self);
        B::mutex_unlock(&mutex.handle)
    }
}

impl<B: LockBackend> Drop for MutexGuard<'_, B> {
    fn drop(&mut self) {
        if let Err(e) = B::mutex_unlock(&self.mutex.handle) {
            crate::kwarn!(
                "ksync: {} mutex '{}' unlock failed: {}",
                B::NAME,
                self.mutex.name,
                e
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Per-mutex acquisition counters.
#[cfg(ksync_lock_stat)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutexStats {
    /// Successful acquisitions.
    pub acquisitions: u32,
    /// Acquires that found the mutex held.
    pub contentions: u32,
    /// Bounded waits that expired.
    pub timeouts: u32,
}

#[cfg(ksync_lock_stat)]
struct StatCounters {
    acquisitions: AtomicU32,
    contentions: AtomicU32,
    timeouts: AtomicU32,
}

#[cfg(ksync_lock_stat)]
impl StatCounters {
    const fn new() -> Self {
        Self {
            acquisitions: AtomicU32::new(0),
            contentions: AtomicU32::new(0),
            timeouts: AtomicU32::new(0),
        }
    }

    fn record(&self, status: Result<()>) {
        let counter = match status {
            Ok(()) => &self.acquisitions,
            Err(Error::Busy) => &self.contentions,
            Err(Error::TimedOut) => {
                self.contentions.fetch_add(1, Ordering::Relaxed);
                &self.timeouts
            }
            Err(_) => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> MutexStats {
        MutexStats {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            contentions: self.contentions.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}
