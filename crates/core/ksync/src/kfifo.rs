//! Power-of-two ring buffer of fixed-size elements.
//!
//! A [`Kfifo`] moves elements between contexts without blocking and without
//! allocating. The indices are free-running `u32` counters; wraparound is
//! ordinary unsigned overflow and the storage offset is `index & mask`.
//!
//! # Concurrency
//!
//! - One producer and one consumer may run concurrently with no locking:
//!   [`Kfifo::split`] hands out a [`Producer`] and a [`Consumer`], and the
//!   borrow checker keeps anyone else away while they live.
//! - Every other arrangement (several producers, several consumers, a task
//!   and an ISR sharing one side) goes through the `*_locked` methods, which
//!   mask interrupts through the backend's IRQ lock for the length of the
//!   copy.
//! - One side may stay unlocked while the other is shared:
//!   [`Kfifo::split_consumer`] pairs a copyable [`LockedProducer`] with a
//!   plain [`Consumer`], and [`Kfifo::split_producer`] does the reverse.
//!
//! Payload bytes are published before the index: the producer copies,
//! issues a full barrier, then stores `in` with release ordering; the
//! consumer loads `in` with acquire ordering before reading. The consumer
//! side mirrors this for `out`.
//!
//! Transfers are short, never failing: every transfer returns the number of
//! elements actually moved, which may be less than requested.

use core::marker::PhantomData;
use core::ptr::{self, NonNull};

use crate::arch;
use crate::compat::{AtomicU32, Ordering};
use crate::config::FIFO_MAX_CAPACITY;
use crate::lock::{IrqGuard, LockBackend};
use crate::{Error, Result};

/// Contiguous readable region, in elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Linear {
    /// Element offset of the first readable element in the storage.
    pub offset: usize,
    /// Number of elements readable from `offset` before the storage wraps.
    pub len: usize,
}

/// Ring buffer descriptor over caller-owned storage.
///
/// `#[repr(C)]` with the field order `{ in, out, mask, esize, data }` so
/// C code can share a descriptor.
#[repr(C)]
pub struct Kfifo<'a, B: LockBackend> {
    in_: AtomicU32,
    out: AtomicU32,
    mask: usize,
    esize: usize,
    data: NonNull<u8>,
    _storage: PhantomData<&'a mut [u8]>,
    _backend: PhantomData<fn() -> B>,
}

// SAFETY: The descriptor owns exclusive access to its storage for 'a.
unsafe impl<B: LockBackend> Send for Kfifo<'_, B> {}
// SAFETY: Shared access mutates the storage only through the locked methods
// (serialized by the IRQ lock) or through the single Producer/Consumer pair,
// which write disjoint regions delimited by the index protocol.
unsafe impl<B: LockBackend> Sync for Kfifo<'_, B> {}

#[cfg(not(any(loom, shuttle)))]
mod layout {
    use core::mem::{offset_of, size_of};

    use super::Kfifo;
    use crate::lock::BareMetal;

    type K = Kfifo<'static, BareMetal>;

    crate::static_assert!(offset_of!(K, in_) == 0);
    crate::static_assert!(offset_of!(K, out) == 4);
    crate::static_assert!(offset_of!(K, esize) == offset_of!(K, mask) + size_of::<usize>());
    crate::static_assert!(offset_of!(K, data) == offset_of!(K, esize) + size_of::<usize>());
}

/// Converts an element count bounded by the capacity to index arithmetic.
#[allow(clippy::cast_possible_truncation)]
#[inline]
fn idx(n: usize) -> u32 {
    debug_assert!(n <= FIFO_MAX_CAPACITY);
    n as u32
}

impl<'a, B: LockBackend> Kfifo<'a, B> {
    /// Creates a fifo over `buffer` holding elements of `esize` bytes.
    ///
    /// The capacity is the largest power of two not above
    /// `buffer.len() / esize`, capped at
    /// [`FIFO_MAX_CAPACITY`](crate::config::FIFO_MAX_CAPACITY). Bytes past
    /// `capacity * esize` are never touched.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `esize` is zero or the capacity would
    /// be below 2.
    pub fn new(buffer: &'a mut [u8], esize: usize) -> Result<Self> {
        let len = buffer.len();
        // SAFETY: `buffer` is valid and exclusively borrowed for 'a.
        unsafe { Self::from_raw_parts(buffer.as_mut_ptr(), len, esize) }
    }

    /// Creates a fifo over `len` bytes at `data`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `data` is null, `esize` is zero or the
    /// capacity would be below 2.
    ///
    /// # Safety
    ///
    /// A non-null `data` must be valid for reads and writes of `len` bytes
    /// for 'a, and nothing else may access those bytes during 'a.
    pub unsafe fn from_raw_parts(data: *mut u8, len: usize, esize: usize) -> Result<Self> {
        let Some(data) = NonNull::new(data) else {
            crate::kdebug!("ksync: kfifo rejected null storage");
            return Err(Error::InvalidArgument);
        };
        if esize == 0 {
            crate::kdebug!("ksync: kfifo rejected zero element size");
            return Err(Error::InvalidArgument);
        }
        let elements = len / esize;
        let capacity = match elements {
            0 => 0,
            n => (1usize << n.ilog2()).min(FIFO_MAX_CAPACITY),
        };
        if capacity < 2 {
            crate::kdebug!(
                "ksync: kfifo of {} bytes cannot hold two {}-byte elements",
                len,
                esize
            );
            return Err(Error::InvalidArgument);
        }
        Ok(Self {
            in_: AtomicU32::new(0),
            out: AtomicU32::new(0),
            mask: capacity - 1,
            esize,
            data,
            _storage: PhantomData,
            _backend: PhantomData,
        })
    }

    /// Capacity in elements.
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Element size in bytes.
    pub fn esize(&self) -> usize {
        self.esize
    }

    /// Number of elements currently stored, at most the capacity.
    ///
    /// A snapshot: either side may change it concurrently. The two index
    /// loads are not atomic together, so a concurrent transfer can make the
    /// raw difference exceed the capacity; it is clamped.
    pub fn len(&self) -> usize {
        let out = self.out.load(Ordering::Acquire);
        let in_ = self.in_.load(Ordering::Acquire);
        (in_.wrapping_sub(out) as usize).min(self.capacity())
    }

    /// Number of free element slots.
    pub fn avail(&self) -> usize {
        self.capacity().saturating_sub(self.len())
    }

    /// Returns whether no element is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns whether every slot is used.
    pub fn is_full(&self) -> bool {
        self.len() > self.mask
    }

    /// Empties the fifo.
    pub fn reset(&mut self) {
        self.in_.store(0, Ordering::Relaxed);
        self.out.store(0, Ordering::Relaxed);
    }

    /// Splits the fifo into its producer and consumer roles.
    pub fn split(&mut self) -> (Producer<'_, 'a, B>, Consumer<'_, 'a, B>) {
        let fifo: &Self = self;
        (Producer { fifo }, Consumer { fifo })
    }

    /// Splits off an unlocked consumer, leaving the producing side to any
    /// number of contexts through [`LockedProducer`] copies.
    pub fn split_consumer(&mut self) -> (LockedProducer<'_, 'a, B>, Consumer<'_, 'a, B>) {
        let fifo: &Self = self;
        (LockedProducer { fifo }, Consumer { fifo })
    }

    /// Splits off an unlocked producer, leaving the consuming side to any
    /// number of contexts through [`LockedConsumer`] copies.
    pub fn split_producer(&mut self) -> (Producer<'_, 'a, B>, LockedConsumer<'_, 'a, B>) {
        let fifo: &Self = self;
        (Producer { fifo }, LockedConsumer { fifo })
    }

    // -- Locked variants ----------------------------------------------------

    /// [`Producer::produce`] under the IRQ lock.
    pub fn produce_locked(&self, src: &[u8]) -> usize {
        let _irq = IrqGuard::<B>::new();
        self.produce_raw(src)
    }

    /// [`Consumer::consume`] under the IRQ lock.
    pub fn consume_locked(&self, dst: &mut [u8]) -> usize {
        let _irq = IrqGuard::<B>::new();
        self.consume_raw(dst)
    }

    /// [`Consumer::peek`] under the IRQ lock.
    pub fn peek_locked(&self, dst: &mut [u8]) -> usize {
        let _irq = IrqGuard::<B>::new();
        self.peek_raw(dst, self.out.load(Ordering::Relaxed))
    }

    /// [`Consumer::linear_extent`] under the IRQ lock.
    pub fn linear_extent_locked(&self, requested: usize) -> Linear {
        let _irq = IrqGuard::<B>::new();
        self.linear_raw(requested)
    }

    /// [`Consumer::skip`] under the IRQ lock.
    pub fn skip_locked(&self, count: usize) -> usize {
        let _irq = IrqGuard::<B>::new();
        self.skip_raw(count)
    }

    // -- Core ---------------------------------------------------------------

    fn produce_raw(&self, src: &[u8]) -> usize {
        let in_ = self.in_.load(Ordering::Relaxed);
        let out = self.out.load(Ordering::Acquire);
        let unused = self.capacity() - in_.wrapping_sub(out) as usize;
        let n = (src.len() / self.esize).min(unused);
        self.copy_in(src, n, in_);
        self.in_.store(in_.wrapping_add(idx(n)), Ordering::Release);
        n
    }

    fn peek_raw(&self, dst: &mut [u8], out: u32) -> usize {
        let in_ = self.in_.load(Ordering::Acquire);
        let n = (dst.len() / self.esize).min(in_.wrapping_sub(out) as usize);
        self.copy_out(dst, n, out);
        n
    }

    fn consume_raw(&self, dst: &mut [u8]) -> usize {
        let out = self.out.load(Ordering::Relaxed);
        let n = self.peek_raw(dst, out);
        self.out.store(out.wrapping_add(idx(n)), Ordering::Release);
        n
    }

    fn linear_raw(&self, requested: usize) -> Linear {
        let out = self.out.load(Ordering::Relaxed);
        let in_ = self.in_.load(Ordering::Acquire);
        let offset = out as usize & self.mask;
        let len = requested
            .min(in_.wrapping_sub(out) as usize)
            .min(self.capacity() - offset);
        Linear { offset, len }
    }

    fn skip_raw(&self, count: usize) -> usize {
        let out = self.out.load(Ordering::Relaxed);
        let in_ = self.in_.load(Ordering::Acquire);
        let n = count.min(in_.wrapping_sub(out) as usize);
        self.out.store(out.wrapping_add(idx(n)), Ordering::Release);
        n
    }

    fn discard_raw(&self) {
        let in_ = self.in_.load(Ordering::Acquire);
        self.out.store(in_, Ordering::Release);
    }

    /// Copies `n` elements from `src` into the storage at index `at`,
    /// splitting at the end of the storage.
    fn copy_in(&self, src: &[u8], n: usize, at: u32) {
        let size = self.capacity() * self.esize;
        let off = (at as usize & self.mask) * self.esize;
        let len = n * self.esize;
        let first = len.min(size - off);
        crate::assert_unsafe_precondition!(len <= size && len <= src.len());
        // SAFETY: `off + first <= size` and `len - first <= off`, so both
        // ranges lie inside the storage. The index protocol guarantees the
        // consumer is not reading the free slots being written.
        unsafe {
            let base = self.data.as_ptr();
            ptr::copy_nonoverlapping(src.as_ptr(), base.add(off), first);
            ptr::copy_nonoverlapping(src.as_ptr().add(first), base, len - first);
        }
        arch::barrier();
    }

    /// Copies `n` elements at index `at` out of the storage into `dst`.
    fn copy_out(&self, dst: &mut [u8], n: usize, at: u32) {
        let size = self.capacity() * self.esize;
        let off = (at as usize & self.mask) * self.esize;
        let len = n * self.esize;
        let first = len.min(size - off);
        crate::assert_unsafe_precondition!(len <= size && len <= dst.len());
        // SAFETY: As in `copy_in`; the producer is not writing the used
        // slots being read.
        unsafe {
            let base = self.data.as_ptr();
            ptr::copy_nonoverlapping(base.add(off), dst.as_mut_ptr(), first);
            ptr::copy_nonoverlapping(base, dst.as_mut_ptr().add(first), len - first);
        }
        arch::barrier();
    }

    #[cfg(test)]
    fn set_indices(&mut self, in_: u32, out: u32) {
        self.in_.store(in_, Ordering::Relaxed);
        self.out.store(out, Ordering::Relaxed);
    }
}

impl<B: LockBackend> core::fmt::Debug for Kfifo<'_, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Kfifo")
            .field("capacity", &self.capacity())
            .field("esize", &self.esize)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// The producing side of a split [`Kfifo`].
pub struct Producer<'f, 'a, B: LockBackend> {
    fifo: &'f Kfifo<'a, B>,
}

impl<B: LockBackend> Producer<'_, '_, B> {
    /// Copies whole elements from `src` into free slots.
    ///
    /// Copies `min(src.len() / esize, avail)` elements and returns that
    /// count. A trailing partial element in `src` is ignored.
    pub fn produce(&mut self, src: &[u8]) -> usize {
        self.fifo.produce_raw(src)
    }

    /// Number of free element slots. Can only grow until the next
    /// `produce`.
    pub fn avail(&self) -> usize {
        self.fifo.avail()
    }
}

/// A shareable producing side: every call takes the IRQ lock, so copies
/// may be used from several contexts at once.
pub struct LockedProducer<'f, 'a, B: LockBackend> {
    fifo: &'f Kfifo<'a, B>,
}

impl<B: LockBackend> Clone for LockedProducer<'_, '_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: LockBackend> Copy for LockedProducer<'_, '_, B> {}

impl<B: LockBackend> LockedProducer<'_, '_, B> {
    /// [`Producer::produce`] under the IRQ lock.
    pub fn produce(&self, src: &[u8]) -> usize {
        self.fifo.produce_locked(src)
    }

    /// Number of free element slots.
    pub fn avail(&self) -> usize {
        self.fifo.avail()
    }
}

/// A shareable consuming side: every call takes the IRQ lock.
pub struct LockedConsumer<'f, 'a, B: LockBackend> {
    fifo: &'f Kfifo<'a, B>,
}

impl<B: LockBackend> Clone for LockedConsumer<'_, '_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: LockBackend> Copy for LockedConsumer<'_, '_, B> {}

impl<B: LockBackend> LockedConsumer<'_, '_, B> {
    /// [`Consumer::consume`] under the IRQ lock.
    pub fn consume(&self, dst: &mut [u8]) -> usize {
        self.fifo.consume_locked(dst)
    }

    /// [`Consumer::peek`] under the IRQ lock.
    pub fn peek(&self, dst: &mut [u8]) -> usize {
        self.fifo.peek_locked(dst)
    }

    /// [`Consumer::linear_extent`] under the IRQ lock.
    pub fn linear_extent(&self, requested: usize) -> Linear {
        self.fifo.linear_extent_locked(requested)
    }

    /// [`Consumer::skip`] under the IRQ lock.
    pub fn skip(&self, count: usize) -> usize {
        self.fifo.skip_locked(count)
    }

    /// Number of stored elements.
    pub fn len(&self) -> usize {
        self.fifo.len()
    }

    /// Returns whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.fifo.is_empty()
    }
}

/// The consuming side of a split [`Kfifo`].
pub struct Consumer<'f, 'a, B: LockBackend> {
    fifo: &'f Kfifo<'a, B>,
}

impl<B: LockBackend> Consumer<'_, '_, B> {
    /// Copies up to `dst.len() / esize` stored elements into `dst` and
    /// removes them. Returns the number of elements copied.
    pub fn consume(&mut self, dst: &mut [u8]) -> usize {
        self.fifo.consume_raw(dst)
    }

    /// Like [`consume`](Self::consume) but leaves the elements stored.
    pub fn peek(&self, dst: &mut [u8]) -> usize {
        self.fifo.peek_raw(dst, self.fifo.out.load(Ordering::Relaxed))
    }

    /// Returns where the next elements live and how many of them (at most
    /// `requested`) are contiguous in storage.
    pub fn linear_extent(&self, requested: usize) -> Linear {
        self.fifo.linear_raw(requested)
    }

    /// Borrows up to `requested` contiguous stored elements without
    /// copying. Release them with [`skip`](Self::skip).
    pub fn linear_slice(&self, requested: usize) -> &[u8] {
        let Linear { offset, len } = self.fifo.linear_raw(requested);
        // SAFETY: The region holds published elements the producer will not
        // overwrite until `skip` (which needs `&mut self`) releases them.
        unsafe {
            core::slice::from_raw_parts(
                self.fifo.data.as_ptr().add(offset * self.fifo.esize),
                len * self.fifo.esize,
            )
        }
    }

    /// Removes up to `count` elements without copying them. Returns the
    /// number removed, never more than are stored.
    pub fn skip(&mut self, count: usize) -> usize {
        self.fifo.skip_raw(count)
    }

    /// Removes every stored element.
    pub fn reset_out(&mut self) {
        self.fifo.discard_raw();
    }

    /// Number of stored elements. Can only grow until the next
    /// `consume`/`skip`.
    pub fn len(&self) -> usize {
        self.fifo.len()
    }

    /// Returns whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.fifo.is_empty()
    }
}
