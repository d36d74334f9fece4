//! Property-based tests for the sieve engine.
//!
//! Every property compares the segmented sieve against a trivially correct
//! reference (a plain byte-array sieve or a brute-force pattern match) or
//! against itself under a different configuration. Ranges are kept small enough that the
//! default 256 cases finish in seconds.
//!
//! # How to run
//!
//! ```bash
//! cargo test --test property_tests
//! PROPTEST_CASES=2000 cargo test --test property_tests
//! ```
//!
//! # Testing strategy
//!
//! - **Correctness**: counts and emitted primes match a reference sieve on
//!   random sub-ranges below 10^6.
//! - **Invariance**: thread count and segment size (every legal size from
//!   1 KiB to 8192 KiB) never change results.
//! - **Ordering**: emitted primes are strictly increasing without gaps.
//! - **Tuplets**: k-tuplet counts match a brute-force pattern match.

use std::ops::ControlFlow;
use std::sync::OnceLock;

use primesift::{api, Flags, Settings, Sieve, SieveConfig, TupletKind};
use proptest::prelude::*;

const LIMIT: u64 = 1_000_000;

/// Plain sieve of Eratosthenes up to LIMIT + 64.
fn reference() -> &'static [bool] {
    static TABLE: OnceLock<Vec<bool>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let n = (LIMIT + 64) as usize;
        let mut is_prime = vec![true; n + 1];
        is_prime[0] = false;
        is_prime[1] = false;
        let mut i = 2;
        while i * i <= n {
            if is_prime[i] {
                let mut j = i * i;
                while j <= n {
                    is_prime[j] = false;
                    j += i;
                }
            }
            i += 1;
        }
        is_prime
    })
}

fn reference_primes(a: u64, b: u64) -> Vec<u64> {
    let table = reference();
    (a..=b).filter(|&n| table[n as usize]).collect()
}

/// Offsets of every constellation the engine counts, per kind.
fn patterns(kind: TupletKind) -> &'static [&'static [u64]] {
    match kind {
        TupletKind::Primes => &[&[0]],
        TupletKind::Twins => &[&[0, 2]],
        TupletKind::Triplets => &[&[0, 2, 6], &[0, 4, 6]],
        TupletKind::Quadruplets => &[&[0, 2, 6, 8]],
        TupletKind::Quintuplets => &[&[0, 2, 6, 8, 12], &[0, 4, 6, 10, 12]],
        TupletKind::Sextuplets => &[&[0, 4, 6, 10, 12, 16]],
        TupletKind::Septuplets => &[&[0, 2, 6, 8, 12, 18, 20], &[0, 2, 8, 12, 14, 18, 20]],
    }
}

fn reference_tuplets(kind: TupletKind, a: u64, b: u64) -> u64 {
    let table = reference();
    let mut count = 0;
    for p in a..=b {
        for pattern in patterns(kind) {
            let last = p + pattern[pattern.len() - 1];
            if last <= b && pattern.iter().all(|d| table[(p + d) as usize]) {
                count += 1;
            }
        }
    }
    count
}

fn settings(threads: usize, kib: u32) -> Settings {
    Settings::new().with_threads(threads).with_sieve_size(kib)
}

fn emitted(a: u64, b: u64, threads: usize, kib: u32) -> Vec<u64> {
    api::generate_primes(a, b, &settings(threads, kib)).unwrap()
}

// == Correctness ===============================================================

proptest! {
    /// count_primes(a, b) equals the reference count for any sub-range.
    #[test]
    fn prop_count_matches_reference(a in 0u64..LIMIT, len in 0u64..200_000) {
        let b = (a + len).min(LIMIT);
        let expected = reference_primes(a, b).len() as u64;
        prop_assert_eq!(api::count_primes(a, b, &settings(1, 16)).unwrap(), expected);
    }

    /// Exhaustive tiny ranges around the small-number table and the first
    /// wheel bytes.
    #[test]
    fn prop_tiny_ranges(a in 0u64..300, len in 0u64..300) {
        let b = a + len;
        let expected = reference_primes(a, b);
        prop_assert_eq!(emitted(a, b, 1, 8), expected);
    }

    /// Generated primes equal the reference list, in order.
    #[test]
    fn prop_generate_matches_reference(a in 0u64..LIMIT, len in 0u64..50_000) {
        let b = (a + len).min(LIMIT);
        prop_assert_eq!(emitted(a, b, 2, 32), reference_primes(a, b));
    }
}

// == Invariance ================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Thread count and segment size never change counts.
    #[test]
    fn prop_config_invariance(
        a in 0u64..10_000_000_000,
        len in 0u64..30_000_000,
        threads in 1usize..6,
        size_exp in 3u32..10,
    ) {
        let b = a + len;
        let base = api::count_primes(a, b, &settings(1, 32)).unwrap();
        let other = api::count_primes(a, b, &settings(threads, 1 << size_exp)).unwrap();
        prop_assert_eq!(base, other);
    }

    /// Counting twice gives the same answer.
    #[test]
    fn prop_idempotent(a in 0u64..1_000_000_000, len in 0u64..1_000_000) {
        let s = settings(2, 32);
        let b = a + len;
        prop_assert_eq!(
            api::count_twins(a, b, &s).unwrap(),
            api::count_twins(a, b, &s).unwrap()
        );
    }
}

/// Every legal segment size, 1 KiB through 8192 KiB, gives the reference
/// counts for all kinds, and agrees with 32 KiB far above the reference.
#[test]
fn every_sieve_size_matches_reference() {
    let run = |a: u64, b: u64, kib: u32| {
        let config = SieveConfig::new(a, b, Flags::COUNT_ALL).with_threads(1).with_sieve_size(kib);
        Sieve::new(config).unwrap().run().unwrap().counts
    };
    let high = (1_000_000_000_000u64, 1_000_000_000_000u64 + 200_000);
    let high_base = run(high.0, high.1, 32);
    for k in 0..=13 {
        let kib = 1u32 << k;
        for (a, b) in [(0u64, 200_000u64), (900_001, LIMIT)] {
            let counts = run(a, b, kib);
            for kind in TupletKind::ALL {
                assert_eq!(counts[kind], reference_tuplets(kind, a, b), "{:?} in [{}, {}] at {} KiB", kind, a, b, kib);
            }
        }
        assert_eq!(run(high.0, high.1, kib), high_base, "[1e12, +2e5] at {} KiB", kib);
    }
}

// == Ordering ==================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Parallel emission is strictly increasing and agrees with the count.
    #[test]
    fn prop_emission_strictly_increasing(
        a in 0u64..1_000_000_000,
        len in 20_000_000u64..40_000_000,
        threads in 2usize..5,
    ) {
        let b = a + len;
        let mut last: Option<u64> = None;
        let mut n = 0u64;
        let mut ordered = true;
        let config = SieveConfig::new(a, b, Flags::COUNT_PRIMES).with_threads(threads);
        let result = Sieve::new(config)
            .unwrap()
            .run_with_callback(&mut |p: u64| {
                if last.is_some_and(|l| l >= p) {
                    ordered = false;
                }
                last = Some(p);
                n += 1;
                ControlFlow::Continue(())
            })
            .unwrap();
        prop_assert!(ordered);
        prop_assert_eq!(n, result.counts.primes());
    }
}

// == Tuplets ===================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every k-tuplet count matches a brute-force pattern match.
    #[test]
    fn prop_tuplets_match_reference(
        a in 0u64..LIMIT,
        len in 0u64..100_000,
        kind_index in 1usize..7,
    ) {
        let b = (a + len).min(LIMIT);
        let kind = TupletKind::from_index(kind_index).unwrap();
        let got = api::count(kind, a, b, &settings(1, 8)).unwrap();
        prop_assert_eq!(got, reference_tuplets(kind, a, b));
    }
}
