//! Compile-time assertions.
//!
//! Used to pin down `#[repr(C)]` layouts that C consumers depend on and to
//! sanity-check configuration constants.

/// Fails the build if `$cond` is false.
///
/// ```ignore
/// static_assert!(core::mem::size_of::<u32>() == 4);
/// static_assert!(FIFO_MAX_CAPACITY.is_power_of_two(), "capacity ceiling");
/// ```
#[macro_export]
macro_rules! static_assert {
    ($cond:expr $(,)?) => {
        const _: () = assert!($cond);
    };
    ($cond:expr, $msg:expr $(,)?) => {
        const _: () = assert!($cond, $msg);
    };
}
