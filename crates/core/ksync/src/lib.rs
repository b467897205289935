//! Portable concurrency substrate for embedded firmware.
//!
//! `ksync` provides the pieces firmware needs to move data and guard shared
//! state without a heap, on bare metal or under an RTOS:
//!
//! - [`atomic`]: word-sized read-modify-write primitives built as
//!   retry-until-success loops.
//! - [`bitops`]: byte/halfword/word bit-field operations on the same pattern.
//! - [`kfifo`]: a power-of-two ring buffer that is lock-free for one producer
//!   and one consumer, with IRQ-masked variants for everyone else.
//! - [`lock`]: mutex, IRQ lock, critical section and spinlock behind one
//!   [`LockBackend`](lock::LockBackend) trait, with one backend selected per
//!   build.
//!
//! ## Backend selection
//!
//! | Cargo feature       | [`lock::Selected`]                         |
//! |---------------------|--------------------------------------------|
//! | *(none)*            | [`lock::BareMetal`]                        |
//! | `kernel-semaphore`  | [`lock::SemaphoreBackend<P>`](lock::SemaphoreBackend) |
//! | `kernel-prio-mutex` | [`lock::PrioMutexBackend<P>`](lock::PrioMutexBackend) |
//! | `kernel-cmsis`      | [`lock::CmsisBackend<P>`](lock::CmsisBackend)         |
//!
//! Kernel backends are generic over a port (`P`) that the firmware
//! implements on top of its kernel's native API.
//!
//! On `target_os = "none"` the crate is `no_std`. Host builds use `std` to
//! simulate a single core's interrupt mask, which is what the tests run on.

#![cfg_attr(target_os = "none", no_std)]
#![warn(missing_docs)]

#[cfg(any(
    all(feature = "kernel-semaphore", feature = "kernel-prio-mutex"),
    all(feature = "kernel-semaphore", feature = "kernel-cmsis"),
    all(feature = "kernel-prio-mutex", feature = "kernel-cmsis"),
))]
compile_error!("at most one of `kernel-semaphore`, `kernel-prio-mutex`, `kernel-cmsis` may be enabled");

pub mod log;
pub mod safety;
pub mod static_assert;

pub mod arch;
pub mod atomic;
pub mod bitops;
pub mod config;
pub mod error;
pub mod kfifo;
pub mod lock;

pub(crate) mod compat;

pub use error::{Error, Result};
