//! Normalized status codes.
//!
//! Every fallible operation in this crate returns [`Result`]. The variants
//! line up with a POSIX subset so C-facing shims can hand back the familiar
//! negative errno values via [`Error::to_status`].

use core::fmt;

/// Errors returned by ksync operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A null pointer, a zero element size, or a buffer too small to hold
    /// two elements.
    InvalidArgument,
    /// The kernel backend could not allocate a native handle.
    NoMemory,
    /// A non-blocking acquire found the lock held.
    Busy,
    /// A bounded wait expired before the lock was acquired.
    TimedOut,
    /// The selected backend cannot perform the requested operation.
    Unsupported,
    /// The native kernel call failed for a reason it did not classify.
    Backend,
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    /// Returns the POSIX error number (Linux numbering) for this error.
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::InvalidArgument => 22,
            Self::NoMemory => 12,
            Self::Busy => 16,
            Self::TimedOut => 110,
            Self::Unsupported => 95,
            Self::Backend => 11,
        }
    }

    /// Returns the negated errno, the status convention of C callers.
    #[must_use]
    pub const fn to_status(self) -> i32 {
        -self.errno()
    }

    /// Converts a C-style status (`0` or a negated errno) back into a result.
    ///
    /// # Errors
    ///
    /// Returns the matching [`Error`] for a known negative code, and
    /// [`Error::Backend`] for any other non-zero status.
    pub const fn from_status(status: i32) -> Result<()> {
        match status {
            0 => Ok(()),
            -22 => Err(Self::InvalidArgument),
            -12 => Err(Self::NoMemory),
            -16 => Err(Self::Busy),
            -110 => Err(Self::TimedOut),
            -95 => Err(Self::Unsupported),
            _ => Err(Self::Backend),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => f.write_str("invalid argument"),
            Self::NoMemory => f.write_str("out of kernel resources"),
            Self::Busy => f.write_str("resource busy"),
            Self::TimedOut => f.write_str("timed out"),
            Self::Unsupported => f.write_str("operation not supported"),
            Self::Backend => f.write_str("backend error"),
        }
    }
}
