//! # API — Convenience Functions
//!
//! One-call wrappers over [`Sieve`] for the common jobs: count or print
//! primes and constellations over `[start, stop]`, collect primes into a
//! vector, stream them to a closure, and find the n-th prime. Every function
//! takes [`Settings`] so sieve size and thread count are explicit; pass
//! `&Settings::new()` for the detected defaults.
//!
//! Counting uses all configured threads. Printing and callbacks also run in
//! parallel but deliver in ascending order on the calling thread.

use std::io::Write;
use std::ops::ControlFlow;

use crate::config::{Flags, SieveConfig, Settings, TupletKind, MAX_STOP};
use crate::error::SieveError;
use crate::iterator::PrimeIter;
use crate::sieve::Sieve;

fn config(start: u64, stop: u64, flags: Flags, settings: &Settings) -> SieveConfig {
    SieveConfig::new(start, stop, flags).with_settings(settings)
}

/// Count the constellations of `kind` in `[start, stop]`.
pub fn count(kind: TupletKind, start: u64, stop: u64, settings: &Settings) -> Result<u64, SieveError> {
    let result = Sieve::new(config(start, stop, Flags::count(kind), settings))?.run()?;
    Ok(result.counts[kind])
}

pub fn count_primes(start: u64, stop: u64, settings: &Settings) -> Result<u64, SieveError> {
    count(TupletKind::Primes, start, stop, settings)
}

pub fn count_twins(start: u64, stop: u64, settings: &Settings) -> Result<u64, SieveError> {
    count(TupletKind::Twins, start, stop, settings)
}

pub fn count_triplets(start: u64, stop: u64, settings: &Settings) -> Result<u64, SieveError> {
    count(TupletKind::Triplets, start, stop, settings)
}

pub fn count_quadruplets(start: u64, stop: u64, settings: &Settings) -> Result<u64, SieveError> {
    count(TupletKind::Quadruplets, start, stop, settings)
}

pub fn count_quintuplets(start: u64, stop: u64, settings: &Settings) -> Result<u64, SieveError> {
    count(TupletKind::Quintuplets, start, stop, settings)
}

pub fn count_sextuplets(start: u64, stop: u64, settings: &Settings) -> Result<u64, SieveError> {
    count(TupletKind::Sextuplets, start, stop, settings)
}

pub fn count_septuplets(start: u64, stop: u64, settings: &Settings) -> Result<u64, SieveError> {
    count(TupletKind::Septuplets, start, stop, settings)
}

/// Write the constellations of `kind` in `[start, stop]` to `out`, one per
/// line in ascending order. Primes print as `p`, tuplets as `(p1, p2, …)`.
pub fn print(
    kind: TupletKind,
    start: u64,
    stop: u64,
    settings: &Settings,
    out: &mut dyn Write,
) -> Result<(), SieveError> {
    Sieve::new(config(start, stop, Flags::print(kind), settings))?.run_with_output(out)?;
    Ok(())
}

pub fn print_primes(start: u64, stop: u64, settings: &Settings, out: &mut dyn Write) -> Result<(), SieveError> {
    print(TupletKind::Primes, start, stop, settings, out)
}

pub fn print_twins(start: u64, stop: u64, settings: &Settings, out: &mut dyn Write) -> Result<(), SieveError> {
    print(TupletKind::Twins, start, stop, settings, out)
}

pub fn print_triplets(start: u64, stop: u64, settings: &Settings, out: &mut dyn Write) -> Result<(), SieveError> {
    print(TupletKind::Triplets, start, stop, settings, out)
}

pub fn print_quadruplets(
    start: u64,
    stop: u64,
    settings: &Settings,
    out: &mut dyn Write,
) -> Result<(), SieveError> {
    print(TupletKind::Quadruplets, start, stop, settings, out)
}

pub fn print_quintuplets(
    start: u64,
    stop: u64,
    settings: &Settings,
    out: &mut dyn Write,
) -> Result<(), SieveError> {
    print(TupletKind::Quintuplets, start, stop, settings, out)
}

pub fn print_sextuplets(
    start: u64,
    stop: u64,
    settings: &Settings,
    out: &mut dyn Write,
) -> Result<(), SieveError> {
    print(TupletKind::Sextuplets, start, stop, settings, out)
}

pub fn print_septuplets(
    start: u64,
    stop: u64,
    settings: &Settings,
    out: &mut dyn Write,
) -> Result<(), SieveError> {
    print(TupletKind::Septuplets, start, stop, settings, out)
}

/// All primes in `[start, stop]`, ascending.
pub fn generate_primes(start: u64, stop: u64, settings: &Settings) -> Result<Vec<u64>, SieveError> {
    let mut primes = Vec::new();
    callback_primes(start, stop, settings, |p| primes.push(p))?;
    Ok(primes)
}

/// The first `n` primes `>= start`. Fewer are returned only if the range
/// runs into [`MAX_STOP`].
pub fn generate_n_primes(n: usize, start: u64, settings: &Settings) -> Result<Vec<u64>, SieveError> {
    if start >= MAX_STOP {
        return Err(SieveError::ExceedsMaxStop { value: start });
    }
    Ok(PrimeIter::with_settings(start, settings).take(n).collect())
}

/// Call `f` for every prime in `[start, stop]` in ascending order.
pub fn callback_primes(
    start: u64,
    stop: u64,
    settings: &Settings,
    mut f: impl FnMut(u64),
) -> Result<(), SieveError> {
    Sieve::new(config(start, stop, Flags::NONE, settings))?.run_with_callback(&mut |p: u64| {
        f(p);
        ControlFlow::Continue(())
    })?;
    Ok(())
}

/// Like [`callback_primes`], but `f` may return `Break` to stop early.
pub fn try_callback_primes(
    start: u64,
    stop: u64,
    settings: &Settings,
    mut f: impl FnMut(u64) -> ControlFlow<()>,
) -> Result<(), SieveError> {
    Sieve::new(config(start, stop, Flags::NONE, settings))?.run_with_callback(&mut f)?;
    Ok(())
}

/// See [`crate::nth_prime::nth_prime`].
pub fn nth_prime(n: i64, start: u64, settings: &Settings) -> Result<u64, SieveError> {
    crate::nth_prime::nth_prime(n, start, settings)
}

/// Largest valid `stop` is `max_stop() - 1`.
pub fn max_stop() -> u64 {
    MAX_STOP
}

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
