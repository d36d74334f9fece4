//! # Config — Range Descriptor, Flags and Settings
//!
//! [`SieveConfig`] is the immutable description of one sieve call: the range,
//! what to count or print, the sieve size and the thread budget. It is
//! validated once, before any sieving state exists.
//!
//! [`Settings`] holds the caller's optional overrides for sieve size and
//! thread count and resolves them against the detected [`CpuInfo`]. There is
//! no process-wide mutable configuration; callers pass `&Settings` around.
//!
//! ## Limits
//!
//! | Constant | Value | Why |
//! |----------|-------|-----|
//! | `MAX_STOP` | 2^64-1 - (2^32-1)·10 | next-multiple arithmetic of the large tier must not overflow |
//! | `MIN_SIEVE_SIZE_KIB` / `MAX_SIEVE_SIZE_KIB` | 1 / 8192 | segment indices fit in 32 bits |
//! | `MIN_USER_SIEVE_SIZE_KIB` / `MAX_USER_SIEVE_SIZE_KIB` | 8 / 4096 | clamp range for user overrides |

use std::ops::{BitOr, BitOrAssign};

use crate::cpu_info::{self, CpuInfo};
use crate::error::SieveError;

/// Exclusive upper bound for `start` and `stop`.
pub const MAX_STOP: u64 = u64::MAX - (u32::MAX as u64) * 10;

pub const MIN_SIEVE_SIZE_KIB: u32 = 1;
pub const MAX_SIEVE_SIZE_KIB: u32 = 8192;

pub const MIN_USER_SIEVE_SIZE_KIB: u32 = 8;
pub const MAX_USER_SIEVE_SIZE_KIB: u32 = 4096;

/// Used when cache detection reports nothing usable.
pub const DEFAULT_SIEVE_SIZE_KIB: u32 = 32;

/// Number of tuplet counters (primes through septuplets).
pub const COUNTS_SIZE: usize = 7;

/// Bitmask of what a sieve call counts and prints.
///
/// Bit `k` (0..7) counts tuplet kind `k`, bit `7 + k` prints it, bit 14
/// prints a status percentage to stderr.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Flags(u32);

impl Flags {
    pub const NONE: Flags = Flags(0);

    pub const COUNT_PRIMES: Flags = Flags(1 << 0);
    pub const COUNT_TWINS: Flags = Flags(1 << 1);
    pub const COUNT_TRIPLETS: Flags = Flags(1 << 2);
    pub const COUNT_QUADRUPLETS: Flags = Flags(1 << 3);
    pub const COUNT_QUINTUPLETS: Flags = Flags(1 << 4);
    pub const COUNT_SEXTUPLETS: Flags = Flags(1 << 5);
    pub const COUNT_SEPTUPLETS: Flags = Flags(1 << 6);

    pub const PRINT_PRIMES: Flags = Flags(1 << 7);
    pub const PRINT_TWINS: Flags = Flags(1 << 8);
    pub const PRINT_TRIPLETS: Flags = Flags(1 << 9);
    pub const PRINT_QUADRUPLETS: Flags = Flags(1 << 10);
    pub const PRINT_QUINTUPLETS: Flags = Flags(1 << 11);
    pub const PRINT_SEXTUPLETS: Flags = Flags(1 << 12);
    pub const PRINT_SEPTUPLETS: Flags = Flags(1 << 13);

    pub const PRINT_STATUS: Flags = Flags(1 << 14);

    pub const COUNT_ALL: Flags = Flags(0x7f);
    pub const PRINT_ALL: Flags = Flags(0x7f << 7);

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Flags) -> bool {
        self.0 & other.0 != 0
    }

    /// Counting flag for a tuplet kind.
    pub const fn count(kind: TupletKind) -> Flags {
        Flags(1 << kind as u32)
    }

    /// Printing flag for a tuplet kind.
    pub const fn print(kind: TupletKind) -> Flags {
        Flags(1 << (kind as u32 + 7))
    }

    pub fn counts(self, kind: TupletKind) -> bool {
        self.contains(Flags::count(kind))
    }

    pub fn prints(self, kind: TupletKind) -> bool {
        self.contains(Flags::print(kind))
    }

    /// True if any k-tuplet (k >= 2) is counted or printed.
    pub fn wants_tuplets(self) -> bool {
        self.intersects(Flags((0x7e) | (0x7e << 7)))
    }

    /// True if anything is written to an output sink.
    pub fn wants_print(self) -> bool {
        self.intersects(Flags::PRINT_ALL)
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

/// Prime constellations the engine knows how to count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TupletKind {
    Primes = 0,
    Twins = 1,
    Triplets = 2,
    Quadruplets = 3,
    Quintuplets = 4,
    Sextuplets = 5,
    Septuplets = 6,
}

impl TupletKind {
    pub const ALL: [TupletKind; COUNTS_SIZE] = [
        TupletKind::Primes,
        TupletKind::Twins,
        TupletKind::Triplets,
        TupletKind::Quadruplets,
        TupletKind::Quintuplets,
        TupletKind::Sextuplets,
        TupletKind::Septuplets,
    ];

    pub fn from_index(index: usize) -> Result<TupletKind, SieveError> {
        TupletKind::ALL
            .get(index)
            .copied()
            .ok_or(SieveError::InvalidTupletIndex { index })
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Number of primes in one constellation of this kind.
    pub fn size(self) -> usize {
        self as usize + 1
    }

    pub fn name(self) -> &'static str {
        match self {
            TupletKind::Primes => "Primes",
            TupletKind::Twins => "Twin primes",
            TupletKind::Triplets => "Prime triplets",
            TupletKind::Quadruplets => "Prime quadruplets",
            TupletKind::Quintuplets => "Prime quintuplets",
            TupletKind::Sextuplets => "Prime sextuplets",
            TupletKind::Septuplets => "Prime septuplets",
        }
    }

    /// Lower-case key used in JSON output.
    pub fn key(self) -> &'static str {
        match self {
            TupletKind::Primes => "primes",
            TupletKind::Twins => "twins",
            TupletKind::Triplets => "triplets",
            TupletKind::Quadruplets => "quadruplets",
            TupletKind::Quintuplets => "quintuplets",
            TupletKind::Sextuplets => "sextuplets",
            TupletKind::Septuplets => "septuplets",
        }
    }
}

/// Immutable description of one sieve call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SieveConfig {
    pub start: u64,
    pub stop: u64,
    pub flags: Flags,
    /// Segment size in KiB; power of two in `[1, 8192]`.
    pub sieve_size_kib: u32,
    pub threads: usize,
}

impl SieveConfig {
    pub fn new(start: u64, stop: u64, flags: Flags) -> Self {
        SieveConfig {
            start,
            stop,
            flags,
            sieve_size_kib: DEFAULT_SIEVE_SIZE_KIB,
            threads: 1,
        }
    }

    /// Copy sieve size and thread count from resolved settings.
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.sieve_size_kib = settings.sieve_size();
        self.threads = settings.threads();
        self
    }

    pub fn with_sieve_size(mut self, kib: u32) -> Self {
        self.sieve_size_kib = kib;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Check every precondition of the engine. Nothing is allocated or
    /// sieved before this succeeds.
    pub fn validate(&self) -> Result<(), SieveError> {
        if self.start >= MAX_STOP {
            return Err(SieveError::ExceedsMaxStop { value: self.start });
        }
        if self.stop >= MAX_STOP {
            return Err(SieveError::ExceedsMaxStop { value: self.stop });
        }
        if self.stop < self.start {
            return Err(SieveError::InvalidRange {
                start: self.start,
                stop: self.stop,
            });
        }
        let kib = self.sieve_size_kib;
        if !(MIN_SIEVE_SIZE_KIB..=MAX_SIEVE_SIZE_KIB).contains(&kib) || !kib.is_power_of_two() {
            return Err(SieveError::InvalidSieveSize { kib });
        }
        if self.threads == 0 {
            return Err(SieveError::InvalidThreadCount);
        }
        Ok(())
    }

    /// Segment size in bytes.
    pub fn sieve_size_bytes(&self) -> usize {
        self.sieve_size_kib as usize * 1024
    }
}

/// Caller overrides for sieve size and thread count.
///
/// Unset values resolve against the detected CPU: sieve size from the cache
/// sizes, thread count from the logical CPU count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    sieve_size_kib: Option<u32>,
    threads: Option<usize>,
}

impl Settings {
    pub fn new() -> Self {
        Settings::default()
    }

    /// Clamp to `[8, 4096]` KiB and round down to a power of two.
    pub fn with_sieve_size(mut self, kib: u32) -> Self {
        let clamped = kib.clamp(MIN_USER_SIEVE_SIZE_KIB, MAX_USER_SIEVE_SIZE_KIB);
        self.sieve_size_kib = Some(floor_pow2(clamped));
        self
    }

    /// Clamp to `[1, max_threads()]`.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads.clamp(1, max_threads()));
        self
    }

    pub fn sieve_size(&self) -> u32 {
        self.sieve_size_kib
            .unwrap_or_else(|| recommended_sieve_size(cpu_info::cpu_info()))
    }

    pub fn threads(&self) -> usize {
        self.threads.unwrap_or_else(max_threads)
    }
}

/// Largest thread count a caller may request.
pub fn max_threads() -> usize {
    cpu_info::cpu_info().threads().unwrap_or(1).max(1)
}

/// Pick a sieve size (KiB) from the cache hierarchy.
///
/// A private L2 larger than L1 gives the L2 size clamped to `[32, 4096]`;
/// otherwise the L1 size clamped to `[8, 4096]`, or 32 KiB if L1 is unknown.
/// The result is always a power of two.
pub fn recommended_sieve_size(cpu: &CpuInfo) -> u32 {
    let l1 = cpu.l1_cache_size().map(|b| b >> 10);
    let l2 = cpu.l2_cache_size().map(|b| b >> 10);

    if let (Some(l1_kib), Some(l2_kib)) = (l1, l2) {
        if cpu.has_private_l2_cache() && l2_kib > l1_kib {
            let kib = (l2_kib as u64).clamp(32, MAX_USER_SIEVE_SIZE_KIB as u64) as u32;
            return floor_pow2(kib);
        }
    }

    let l1_kib = l1.map(|k| k as u64).unwrap_or(DEFAULT_SIEVE_SIZE_KIB as u64);
    let kib = l1_kib.clamp(MIN_USER_SIEVE_SIZE_KIB as u64, MAX_USER_SIEVE_SIZE_KIB as u64) as u32;
    floor_pow2(kib)
}

/// Largest power of two `<= n` (`n >= 1`).
pub fn floor_pow2(n: u32) -> u32 {
    debug_assert!(n >= 1);
    1 << (31 - n.leading_zeros())
}
