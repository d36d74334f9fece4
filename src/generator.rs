//! # Generator — Self-Hosted Sieving Prime Bootstrap
//!
//! Sieving `[start, stop]` needs every prime up to `√stop`. Those come from
//! a second [`SegmentSieve`] over `(13, √stop]` whose sink registers each
//! prime it finds with the main scanner. The generator in turn needs the
//! primes up to `stop^¼` (at most 65 535), which trial division supplies.
//!
//! ```text
//! trial division ──► generator scanner ──► main scanner ──► sink
//!   (≤ stop^¼)         (13, √stop]          [start, stop]
//! ```
//!
//! Both scanners only store a prime after sieving every segment below its
//! square, so primes reach each scanner in ascending order and in time.

use std::ops::ControlFlow;

use crate::finder::for_each_prime;
use crate::segment::{SegmentSieve, SegmentSink};
use crate::sieve::isqrt;
use crate::wheel::WHEEL_LIMIT;

/// Segment size of the generator scanner in bytes.
pub const GENERATOR_SIEVE_SIZE: usize = 16 * 1024;

/// Sink that forwards each prime to another scanner's tiers.
pub struct GeneratorSink<'s, T: SegmentSink> {
    target: &'s mut SegmentSieve<T>,
}

impl<T: SegmentSink> SegmentSink for GeneratorSink<'_, T> {
    fn process(&mut self, segment: &[u8], low: u64) -> ControlFlow<()> {
        let target = &mut *self.target;
        for_each_prime(segment, low, |p| {
            target.add_sieving_prime(p);
            if target.is_done() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
    }
}

/// Odd primes up to `limit` by trial division.
pub fn trial_division_primes(limit: u64) -> Vec<u64> {
    let mut primes: Vec<u64> = Vec::new();
    let mut n = 3;
    while n <= limit {
        if primes.iter().take_while(|&&p| p * p <= n).all(|&p| n % p != 0) {
            primes.push(n);
        }
        n += 2;
    }
    primes
}

/// Feed `scanner` every sieving prime up to `√stop`, then sieve its
/// remaining segments.
pub fn run<T: SegmentSink>(scanner: &mut SegmentSieve<T>, stop: u64) {
    let limit = isqrt(stop);
    if limit > WHEEL_LIMIT {
        let bootstrap = trial_division_primes(isqrt(limit));
        let sink = GeneratorSink { target: &mut *scanner };
        let mut generator = SegmentSieve::new(WHEEL_LIMIT + 1, limit, GENERATOR_SIEVE_SIZE, sink);
        for p in bootstrap.into_iter().filter(|&p| p > WHEEL_LIMIT) {
            if generator.is_done() {
                break;
            }
            generator.add_sieving_prime(p);
        }
        generator.finish();
    }
    scanner.finish();
}
