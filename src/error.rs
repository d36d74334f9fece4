//! # Error — Sieve Configuration and Runtime Errors
//!
//! Every way a sieve call can fail. Configuration errors are raised by
//! [`SieveConfig::validate`](crate::config::SieveConfig::validate) before any
//! sieving state is built, so a failed call never produces partial counts or
//! partial output. The only runtime failures are I/O errors from a print
//! sink and thread-pool construction errors.

use std::fmt;
use std::io;

/// Errors returned by the sieve engine and the public API.
#[derive(Debug)]
pub enum SieveError {
    /// `stop < start`.
    InvalidRange { start: u64, stop: u64 },
    /// Sieve size (KiB) is not a power of two in `[1, 8192]`.
    InvalidSieveSize { kib: u32 },
    /// `start` or `stop` is at or above [`MAX_STOP`](crate::config::MAX_STOP).
    ExceedsMaxStop { value: u64 },
    /// Thread count of zero.
    InvalidThreadCount,
    /// Tuplet index outside `0..7`.
    InvalidTupletIndex { index: usize },
    /// The requested nth prime does not exist inside `[0, MAX_STOP)`.
    NthPrimeOutOfRange { n: i64, start: u64 },
    /// Writing printed primes or tuplets failed.
    Io(io::Error),
    /// The rayon worker pool could not be built.
    ThreadPool(rayon::ThreadPoolBuildError),
}

impl fmt::Display for SieveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SieveError::InvalidRange { start, stop } => {
                write!(f, "STOP must be >= START (start = {}, stop = {})", start, stop)
            }
            SieveError::InvalidSieveSize { kib } => write!(
                f,
                "sieve size must be a power of 2 >= 1 and <= 8192 KiB (got {})",
                kib
            ),
            SieveError::ExceedsMaxStop { value } => write!(
                f,
                "{} exceeds the maximum sieving limit (2^64-1) - (2^32-1) * 10",
                value
            ),
            SieveError::InvalidThreadCount => write!(f, "thread count must be >= 1"),
            SieveError::InvalidTupletIndex { index } => {
                write!(f, "tuplet index {} out of range (0..=6)", index)
            }
            SieveError::NthPrimeOutOfRange { n, start } => {
                write!(f, "nth prime (n = {}, start = {}) is out of range", n, start)
            }
            SieveError::Io(e) => write!(f, "output error: {}", e),
            SieveError::ThreadPool(e) => write!(f, "could not build thread pool: {}", e),
        }
    }
}

impl std::error::Error for SieveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SieveError::Io(e) => Some(e),
            SieveError::ThreadPool(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SieveError {
    fn from(e: io::Error) -> Self {
        SieveError::Io(e)
    }
}

impl From<rayon::ThreadPoolBuildError> for SieveError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        SieveError::ThreadPool(e)
    }
}
