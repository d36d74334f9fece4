//! # Sieve — Top-Level Sieve Invocation
//!
//! [`Sieve`] validates a [`SieveConfig`] and runs it:
//!
//! 1. Numbers below 7 and the constellations that start below 7 are
//!    enumerated from a fixed table; the segmented engine never looks at
//!    them.
//! 2. `[max(start, 7), stop]` goes to the partitioner, either in counting
//!    mode (no output, any chunk order) or in emission mode (ascending
//!    output through a writer and/or callback).
//!
//! Validation happens before anything is sieved, so a failed call produces
//! no counts and no output.

use std::io::{self, BufWriter, Write};
use std::ops::ControlFlow;

use tracing::debug;

use crate::config::{Flags, SieveConfig, TupletKind};
use crate::error::SieveError;
use crate::finder::{Counts, PrimeCallback};
use crate::parallel;
use crate::progress::Progress;

/// Result of one sieve call.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SieveResult {
    pub counts: Counts,
    /// Wall-clock seconds spent in the call.
    pub seconds: f64,
}

/// A constellation (or single prime) that starts below 7.
struct SmallTuplet {
    low: u64,
    high: u64,
    kind: TupletKind,
    text: &'static str,
}

const SMALL_TUPLETS: [SmallTuplet; 8] = [
    SmallTuplet { low: 2, high: 2, kind: TupletKind::Primes, text: "2" },
    SmallTuplet { low: 3, high: 3, kind: TupletKind::Primes, text: "3" },
    SmallTuplet { low: 5, high: 5, kind: TupletKind::Primes, text: "5" },
    SmallTuplet { low: 3, high: 5, kind: TupletKind::Twins, text: "(3, 5)" },
    SmallTuplet { low: 5, high: 7, kind: TupletKind::Twins, text: "(5, 7)" },
    SmallTuplet { low: 5, high: 11, kind: TupletKind::Triplets, text: "(5, 7, 11)" },
    SmallTuplet { low: 5, high: 13, kind: TupletKind::Quadruplets, text: "(5, 7, 11, 13)" },
    SmallTuplet { low: 5, high: 17, kind: TupletKind::Quintuplets, text: "(5, 7, 11, 13, 17)" },
];

/// Integer square root, `⌊√n⌋`.
pub fn isqrt(n: u64) -> u64 {
    let mut r = (n as f64).sqrt() as u64;
    while r.checked_mul(r).map_or(true, |sq| sq > n) {
        r -= 1;
    }
    while (r + 1).checked_mul(r + 1).is_some_and(|sq| sq <= n) {
        r += 1;
    }
    r
}

/// A validated sieve call.
pub struct Sieve {
    config: SieveConfig,
}

impl Sieve {
    pub fn new(config: SieveConfig) -> Result<Self, SieveError> {
        config.validate()?;
        Ok(Sieve { config })
    }

    /// Count, and print to stdout if any print flag is set.
    pub fn run(&self) -> Result<SieveResult, SieveError> {
        if self.config.flags.wants_print() {
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            let result = self.execute(Some(&mut out), None)?;
            out.flush()?;
            Ok(result)
        } else {
            self.execute(None, None)
        }
    }

    /// Count, and print to `out` if any print flag is set.
    pub fn run_with_output(&self, out: &mut dyn Write) -> Result<SieveResult, SieveError> {
        self.execute(Some(out), None)
    }

    /// Count and call `callback` for every prime in ascending order.
    /// Returning `Break` stops the sieve.
    pub fn run_with_callback(
        &self,
        callback: &mut dyn FnMut(u64) -> ControlFlow<()>,
    ) -> Result<SieveResult, SieveError> {
        self.execute(None, Some(callback))
    }

    fn execute<'a>(
        &self,
        mut out: Option<&'a mut dyn Write>,
        mut callback: Option<PrimeCallback<'a>>,
    ) -> Result<SieveResult, SieveError> {
        let cfg = &self.config;
        let flags = cfg.flags;
        let engine_start = cfg.start.max(7);
        let total = if engine_start <= cfg.stop { cfg.stop - engine_start + 1 } else { 1 };
        let progress = Progress::new(total, flags.contains(Flags::PRINT_STATUS));

        let mut counts = Counts::default();
        if self.small_numbers(&mut counts, out.as_deref_mut(), callback.as_deref_mut())?.is_break() {
            return Ok(SieveResult {
                counts,
                seconds: progress.elapsed().as_secs_f64(),
            });
        }

        if engine_start <= cfg.stop {
            debug!(start = engine_start, stop = cfg.stop, sieve_kib = cfg.sieve_size_kib, threads = cfg.threads, "sieving");
            let engine = if callback.is_some() || (out.is_some() && flags.wants_print()) {
                parallel::emit(
                    engine_start,
                    cfg.stop,
                    cfg.sieve_size_bytes(),
                    flags,
                    cfg.threads,
                    &progress,
                    out,
                    callback,
                )?
            } else {
                parallel::count(engine_start, cfg.stop, cfg.sieve_size_bytes(), flags, cfg.threads, &progress)?
            };
            counts += engine;
        }
        progress.finish();
        progress.log_summary();

        Ok(SieveResult {
            counts,
            seconds: progress.elapsed().as_secs_f64(),
        })
    }

    fn small_numbers<'a>(
        &self,
        counts: &mut Counts,
        mut out: Option<&mut (dyn Write + 'a)>,
        mut callback: Option<&mut (dyn FnMut(u64) -> ControlFlow<()> + 'a)>,
    ) -> Result<ControlFlow<()>, SieveError> {
        let cfg = &self.config;
        for t in SMALL_TUPLETS.iter().filter(|t| cfg.start <= t.low && t.high <= cfg.stop) {
            if cfg.flags.counts(t.kind) {
                counts.bump(t.kind);
            }
            if cfg.flags.prints(t.kind) {
                if let Some(w) = out.as_mut() {
                    writeln!(w, "{}", t.text)?;
                }
            }
            if t.kind == TupletKind::Primes {
                if let Some(cb) = callback.as_mut() {
                    if cb(t.low).is_break() {
                        return Ok(ControlFlow::Break(()));
                    }
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }
}

/// Count with the given flags over `[start, stop]`.
pub fn sieve(start: u64, stop: u64, flags: Flags) -> Result<SieveResult, SieveError> {
    Sieve::new(SieveConfig::new(start, stop, flags))?.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_with(start: u64, stop: u64, flags: Flags, threads: usize) -> Counts {
        Sieve::new(SieveConfig::new(start, stop, flags).with_threads(threads))
            .unwrap()
            .run()
            .unwrap()
            .counts
    }

    fn brute_primes(a: u64, b: u64) -> Vec<u64> {
        (a..=b)
            .filter(|&n| n >= 2 && (2..).take_while(|d| d * d <= n).all(|d| n % d != 0))
            .collect()
    }

    // ── isqrt ───────────────────────────────────────────────────────

    #[test]
    fn isqrt_exact_and_near_squares() {
        for n in [0u64, 1, 2, 3, 4, 15, 16, 17, 99, 100, 101] {
            let r = isqrt(n);
            assert!(r * r <= n && (r + 1) * (r + 1) > n, "n = {}", n);
        }
        assert_eq!(isqrt(u64::MAX), u32::MAX as u64);
        assert_eq!(isqrt((1 << 62) - 1), (1 << 31) - 1);
    }

    // ── Known counts ────────────────────────────────────────────────

    #[test]
    fn tiny_ranges() {
        assert_eq!(count_with(0, 10, Flags::COUNT_PRIMES, 1).primes(), 4);
        assert_eq!(count_with(0, 1, Flags::COUNT_PRIMES, 1).primes(), 0);
        assert_eq!(count_with(2, 2, Flags::COUNT_PRIMES, 1).primes(), 1);
        assert_eq!(count_with(2, 3, Flags::COUNT_PRIMES, 1).primes(), 2);
        assert_eq!(count_with(0, 0, Flags::COUNT_PRIMES, 1).primes(), 0);
        assert_eq!(count_with(7, 7, Flags::COUNT_PRIMES, 1).primes(), 1);
        assert_eq!(count_with(6, 6, Flags::COUNT_PRIMES, 1).primes(), 0);
    }

    #[test]
    fn twins_to_100() {
        assert_eq!(count_with(0, 100, Flags::COUNT_TWINS, 1).twins(), 8);
    }

    /// Counts of each constellation up to 10^6, including the ones that
    /// start below 7.
    #[test]
    fn tuplet_counts_to_one_million() {
        let c = count_with(0, 1_000_000, Flags::COUNT_ALL, 1);
        assert_eq!(c.primes(), 78_498);
        assert_eq!(c.twins(), 8_169);
        assert_eq!(c.triplets(), 2_837);
        assert_eq!(c.quadruplets(), 166);
        assert_eq!(c.quintuplets(), 65);
        assert_eq!(c.sextuplets(), 5);
        assert_eq!(c.septuplets(), 7);
    }

    #[test]
    fn pi_of_10_pow_8() {
        assert_eq!(count_with(0, 100_000_000, Flags::COUNT_PRIMES, 4).primes(), 5_761_455);
    }

    #[test]
    #[ignore = "slow: sieves 10^10"]
    fn pi_of_10_pow_10() {
        assert_eq!(count_with(0, 10_000_000_000, Flags::COUNT_PRIMES, 8).primes(), 455_052_511);
    }

    #[test]
    fn matches_trial_division_on_small_windows() {
        for (a, b) in [(0u64, 2000u64), (1, 30), (5, 17), (4_000, 5_000), (999_900, 1_000_100)] {
            let expect = brute_primes(a, b).len() as u64;
            assert_eq!(count_with(a, b, Flags::COUNT_PRIMES, 1).primes(), expect, "[{}, {}]", a, b);
        }
    }

    #[test]
    fn near_max_stop() {
        let stop = crate::config::MAX_STOP - 1;
        let c = count_with(stop - 1000, stop, Flags::COUNT_PRIMES, 1);
        assert!(c.primes() > 0 && c.primes() < 100);
    }

    // ── Emission ────────────────────────────────────────────────────

    #[test]
    fn print_primes_small_range() {
        let sieve = Sieve::new(SieveConfig::new(0, 30, Flags::PRINT_PRIMES)).unwrap();
        let mut out = Vec::new();
        sieve.run_with_output(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "2\n3\n5\n7\n11\n13\n17\n19\n23\n29\n");
    }

    #[test]
    fn print_quintuplets_includes_small_table() {
        let sieve = Sieve::new(SieveConfig::new(0, 100, Flags::PRINT_QUINTUPLETS)).unwrap();
        let mut out = Vec::new();
        sieve.run_with_output(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "(5, 7, 11, 13, 17)\n(7, 11, 13, 17, 19)\n(11, 13, 17, 19, 23)\n"
        );
    }

    #[test]
    fn callback_matches_trial_division() {
        let sieve = Sieve::new(SieveConfig::new(0, 50_000, Flags::NONE)).unwrap();
        let mut seen = Vec::new();
        let mut cb = |p: u64| {
            seen.push(p);
            ControlFlow::Continue(())
        };
        sieve.run_with_callback(&mut cb).unwrap();
        assert_eq!(seen, brute_primes(0, 50_000));
    }

    #[test]
    fn callback_break_in_small_table() {
        let sieve = Sieve::new(SieveConfig::new(0, 1000, Flags::COUNT_PRIMES)).unwrap();
        let mut seen = Vec::new();
        let mut cb = |p: u64| {
            seen.push(p);
            if p == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };
        sieve.run_with_callback(&mut cb).unwrap();
        assert_eq!(seen, vec![2, 3]);
    }

    // ── Validation ──────────────────────────────────────────────────

    #[test]
    fn invalid_configs_fail_before_sieving() {
        assert!(matches!(sieve(10, 5, Flags::COUNT_PRIMES), Err(SieveError::InvalidRange { .. })));
        let cfg = SieveConfig::new(0, 10, Flags::COUNT_PRIMES).with_sieve_size(48);
        assert!(matches!(Sieve::new(cfg), Err(SieveError::InvalidSieveSize { kib: 48 })));
    }

    #[test]
    fn result_reports_elapsed_seconds() {
        let r = sieve(0, 1_000_000, Flags::COUNT_PRIMES).unwrap();
        assert!(r.seconds >= 0.0);
        assert_eq!(r.counts.primes(), 78_498);
    }
}
