//! Checked preconditions for `unsafe` entry points.
//!
//! [`assert_unsafe_precondition!`] guards the caller obligations of raw
//! constructors and unlock paths (non-null storage, lock actually held).
//!
//! | Build | Failed check |
//! |-------|--------------|
//! | `debug_assertions` | panics |
//! | release with `--cfg ksync_hardened` | panics |
//! | release | compiled out, condition still type-checked |

/// Checks a caller obligation of an `unsafe` function.
///
/// Violating the condition would be undefined behavior in the code that
/// follows, so debug and hardened builds stop here instead.
#[macro_export]
macro_rules! assert_unsafe_precondition {
    ($cond:expr $(,)?) => {
        $crate::assert_unsafe_precondition!(
            $cond,
            "unsafe precondition violated: {}",
            stringify!($cond)
        )
    };
    ($cond:expr, $($arg:tt)+) => {
        #[cfg(any(debug_assertions, ksync_hardened))]
        {
            if !$cond {
                panic!($($arg)+);
            }
        }
        #[cfg(not(any(debug_assertions, ksync_hardened)))]
        {
            if false {
                let _ = $cond;
            }
        }
    };
}
