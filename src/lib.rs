//! # primesift — Segmented Prime Sieve
//!
//! Counts, prints and enumerates primes and prime k-tuplets (twins up to
//! septuplets) in any range `[start, stop]` below 2^64 − 2^32·10 with a
//! segmented Sieve of Eratosthenes.
//!
//! ## Pipeline
//!
//! ```text
//! parallel ──► segment ──► finder
//!   chunks      │  wheel (pre-sieved pattern, 7·11·13)
//!               │  erat  (small / medium / large tiers over bucket)
//!               └─ generator (sieving primes up to √stop)
//! ```
//!
//! - [`wheel`]: mod-30 byte layout, the 1001-byte pre-sieve pattern and the
//!   mod-210 wheel that drives every cross-off.
//! - [`bucket`], [`erat`]: sieving primes split into three tiers by size.
//! - [`segment`]: the per-segment state machine and the [`SegmentSink`]
//!   seam.
//! - [`generator`]: bootstraps the sieving primes with a second scanner.
//! - [`finder`]: counts primes and k-tuplets, prints and calls back.
//! - [`parallel`]: splits a range over a rayon pool, reorders output.
//! - [`sieve`], [`api`], [`nth_prime`], [`iterator`]: the public surface.
//!
//! ## Example
//!
//! ```no_run
//! use primesift::{api, Settings};
//!
//! let settings = Settings::new();
//! let pi = api::count_primes(0, 1_000_000, &settings)?;
//! assert_eq!(pi, 78_498);
//! # Ok::<(), primesift::SieveError>(())
//! ```

pub mod api;
pub mod bucket;
pub mod config;
pub mod cpu_info;
pub mod erat;
pub mod error;
pub mod finder;
pub mod generator;
pub mod iterator;
pub mod nth_prime;
pub mod parallel;
pub mod progress;
pub mod segment;
pub mod sieve;
pub mod wheel;

pub use config::{Flags, SieveConfig, Settings, TupletKind, MAX_STOP};
pub use cpu_info::CpuInfo;
pub use error::SieveError;
pub use finder::Counts;
pub use iterator::PrimeIter;
pub use segment::{SegmentSieve, SegmentSink};
pub use sieve::{sieve, Sieve, SieveResult};
