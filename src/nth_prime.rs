//! # Nth Prime — Incremental Windowed Search
//!
//! Finds the n-th prime relative to a starting point without sieving the
//! whole prefix up to it:
//!
//! | `n`   | Result                         |
//! |-------|--------------------------------|
//! | `0`   | first prime `>= start`         |
//! | `> 0` | n-th prime `> start`           |
//! | `< 0` | \|n\|-th prime `< start`       |
//!
//! ## Algorithm
//!
//! While many primes remain, the search counts windows sized at 95% of the
//! prime number theorem's estimate (`remaining · ln x`), so a window almost
//! never contains the answer and is only counted, using every thread. Once
//! at most [`DIRECT_LIMIT`] primes remain, it sieves windows of twice the
//! estimate on one thread and walks the primes until the answer appears.
//! A counting window that does overshoot is walked the same way.

use std::ops::ControlFlow;

use tracing::debug;

use crate::config::{Flags, SieveConfig, Settings, MAX_STOP};
use crate::error::SieveError;
use crate::sieve::Sieve;

/// Remaining-prime count below which windows are walked instead of counted.
pub const DIRECT_LIMIT: u64 = 10_000;

/// Smallest window ever sieved.
const MIN_WINDOW: u64 = 1 << 16;

/// Find the n-th prime relative to `start`.
pub fn nth_prime(n: i64, start: u64, settings: &Settings) -> Result<u64, SieveError> {
    if start >= MAX_STOP {
        return Err(SieveError::ExceedsMaxStop { value: start });
    }
    let out_of_range = || SieveError::NthPrimeOutOfRange { n, start };
    let count = n.unsigned_abs();

    if n < 0 {
        // fewer than `start` numbers lie below it
        if count > start {
            return Err(out_of_range());
        }
        return search_down(count, start - 1, settings)?.ok_or_else(out_of_range);
    }

    if n > 0 {
        // the n-th prime above start is at least start + n and at least p(n) > n·ln n
        let rosser = count as f64 * (count as f64).ln();
        if start.saturating_add(count) >= MAX_STOP || rosser >= MAX_STOP as f64 {
            return Err(out_of_range());
        }
        return search_up(count, start + 1, settings)?.ok_or_else(out_of_range);
    }

    search_up(1, start, settings)?.ok_or_else(out_of_range)
}

/// The `remaining`-th prime `>= low`, or `None` past `MAX_STOP`.
fn search_up(mut remaining: u64, mut low: u64, settings: &Settings) -> Result<Option<u64>, SieveError> {
    while low < MAX_STOP {
        let direct = remaining <= DIRECT_LIMIT;
        let dist = window(remaining, low, direct);
        let high = low.saturating_add(dist - 1).min(MAX_STOP - 1);

        if !direct {
            let counted = count_primes(low, high, settings)?;
            if counted < remaining {
                debug!(low, high, counted, remaining, "nth prime window counted");
                remaining -= counted;
                low = high.saturating_add(1);
                continue;
            }
        }

        let mut seen = 0u64;
        let mut found = None;
        walk(low, high, settings, &mut |p: u64| {
            seen += 1;
            if seen == remaining {
                found = Some(p);
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        if found.is_some() {
            return Ok(found);
        }
        remaining -= seen;
        low = high.saturating_add(1);
    }
    Ok(None)
}

/// The `remaining`-th prime `<= high` counting downwards, or `None` below 2.
fn search_down(mut remaining: u64, mut high: u64, settings: &Settings) -> Result<Option<u64>, SieveError> {
    loop {
        if high < 2 {
            return Ok(None);
        }
        let direct = remaining <= DIRECT_LIMIT;
        let dist = window(remaining, high, direct);
        let low = high.saturating_sub(dist - 1);

        if !direct {
            let counted = count_primes(low, high, settings)?;
            if counted < remaining {
                debug!(low, high, counted, remaining, "nth prime window counted");
                remaining -= counted;
                if low == 0 {
                    return Ok(None);
                }
                high = low - 1;
                continue;
            }
        }

        let mut primes = Vec::new();
        walk(low, high, settings, &mut |p: u64| {
            primes.push(p);
            ControlFlow::Continue(())
        })?;
        let len = primes.len() as u64;
        if len >= remaining {
            return Ok(Some(primes[(len - remaining) as usize]));
        }
        remaining -= len;
        if low == 0 {
            return Ok(None);
        }
        high = low - 1;
    }
}

/// Window length around `x` expected to hold `remaining` primes.
fn window(remaining: u64, x: u64, direct: bool) -> u64 {
    let gap = (x.max(16) as f64).ln();
    let estimate = remaining as f64 * gap;
    let dist = if direct { estimate * 2.0 } else { estimate * 0.95 };
    // saturating float-to-int cast
    (dist as u64).max(MIN_WINDOW)
}

fn count_primes(low: u64, high: u64, settings: &Settings) -> Result<u64, SieveError> {
    let config = SieveConfig::new(low, high, Flags::COUNT_PRIMES).with_settings(settings);
    Ok(Sieve::new(config)?.run()?.counts.primes())
}

fn walk(
    low: u64,
    high: u64,
    settings: &Settings,
    callback: &mut dyn FnMut(u64) -> ControlFlow<()>,
) -> Result<(), SieveError> {
    let config = SieveConfig::new(low, high, Flags::NONE)
        .with_settings(settings)
        .with_threads(1);
    Sieve::new(config)?.run_with_callback(callback)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::new().with_sieve_size(32).with_threads(2)
    }

    fn nth(n: i64, start: u64) -> u64 {
        nth_prime(n, start, &settings()).unwrap()
    }

    // ── Forward ─────────────────────────────────────────────────────

    #[test]
    fn first_primes() {
        assert_eq!(nth(1, 0), 2);
        assert_eq!(nth(2, 0), 3);
        assert_eq!(nth(3, 0), 5);
        assert_eq!(nth(4, 0), 7);
        assert_eq!(nth(25, 0), 97);
    }

    #[test]
    fn zero_means_first_prime_at_or_after_start() {
        assert_eq!(nth(0, 0), 2);
        assert_eq!(nth(0, 97), 97);
        assert_eq!(nth(0, 98), 101);
        assert_eq!(nth(0, 100), 101);
    }

    #[test]
    fn positive_n_excludes_start() {
        assert_eq!(nth(1, 97), 101);
        assert_eq!(nth(1, 2), 3);
    }

    /// Crosses the counting phase: the answer is far beyond one direct window.
    #[test]
    fn millionth_prime() {
        assert_eq!(nth(1_000_000, 0), 15_485_863);
    }

    #[test]
    fn ten_thousandth_prime_is_walked_directly() {
        assert_eq!(nth(10_000, 0), 104_729);
    }

    // ── Backward ────────────────────────────────────────────────────

    #[test]
    fn negative_n_counts_down() {
        assert_eq!(nth(-1, 100), 97);
        assert_eq!(nth(-1, 3), 2);
        assert_eq!(nth(-25, 98), 2);
        assert_eq!(nth(-2, 11), 5);
    }

    #[test]
    fn negative_n_across_counted_windows() {
        assert_eq!(nth(-78_498, 1_000_000), 2);
        assert_eq!(nth(-1_000_000, 15_485_864), 2);
    }

    // ── Out of range ────────────────────────────────────────────────

    #[test]
    fn no_prime_below_two() {
        assert!(matches!(
            nth_prime(-1, 2, &settings()),
            Err(SieveError::NthPrimeOutOfRange { n: -1, start: 2 })
        ));
        assert!(matches!(
            nth_prime(-26, 98, &settings()),
            Err(SieveError::NthPrimeOutOfRange { .. })
        ));
        assert!(nth_prime(-5, 3, &settings()).is_err());
    }

    #[test]
    fn huge_n_is_rejected_without_sieving() {
        assert!(matches!(
            nth_prime(i64::MAX, 0, &settings()),
            Err(SieveError::NthPrimeOutOfRange { .. })
        ));
        assert!(matches!(
            nth_prime(1, MAX_STOP - 1, &settings()),
            Err(SieveError::NthPrimeOutOfRange { .. })
        ));
    }

    #[test]
    fn start_beyond_limit() {
        assert!(matches!(
            nth_prime(1, MAX_STOP, &settings()),
            Err(SieveError::ExceedsMaxStop { .. })
        ));
    }
}
