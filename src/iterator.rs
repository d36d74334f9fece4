//! # PrimeIter — Lazily Sieved Prime Iterator
//!
//! Yields primes `>= start` in ascending order. Each refill sieves the next
//! window on the calling thread and buffers its primes; windows start small
//! so a short walk stays cheap and double up to [`MAX_WINDOW`] so a long one
//! amortizes the bootstrap cost of each sieve call.

use std::iter::FusedIterator;
use std::ops::ControlFlow;

use tracing::warn;

use crate::config::{Flags, SieveConfig, Settings, MAX_STOP};
use crate::sieve::Sieve;

pub const MIN_WINDOW: u64 = 1 << 16;
pub const MAX_WINDOW: u64 = 1 << 26;

pub struct PrimeIter {
    low: u64,
    window: u64,
    sieve_size_kib: u32,
    buffer: Vec<u64>,
    pos: usize,
}

impl PrimeIter {
    pub fn new(start: u64) -> Self {
        PrimeIter::with_settings(start, &Settings::new())
    }

    /// Iterate with the sieve size taken from `settings`. Refills always run
    /// on one thread.
    pub fn with_settings(start: u64, settings: &Settings) -> Self {
        PrimeIter {
            low: start,
            window: MIN_WINDOW,
            sieve_size_kib: settings.sieve_size(),
            buffer: Vec::new(),
            pos: 0,
        }
    }

    /// Restart at `start`, dropping buffered primes.
    pub fn skip_to(&mut self, start: u64) {
        self.low = start;
        self.window = MIN_WINDOW;
        self.buffer.clear();
        self.pos = 0;
    }

    fn refill(&mut self) -> bool {
        self.buffer.clear();
        self.pos = 0;
        while self.buffer.is_empty() {
            if self.low >= MAX_STOP {
                return false;
            }
            let high = self.low.saturating_add(self.window - 1).min(MAX_STOP - 1);
            let config = SieveConfig::new(self.low, high, Flags::NONE).with_sieve_size(self.sieve_size_kib);
            let buffer = &mut self.buffer;
            let result = Sieve::new(config).and_then(|s| {
                s.run_with_callback(&mut |p: u64| {
                    buffer.push(p);
                    ControlFlow::Continue(())
                })
            });
            if let Err(e) = result {
                warn!(low = self.low, high, error = %e, "prime iterator stopped");
                self.low = MAX_STOP;
                return false;
            }
            self.low = high.saturating_add(1);
            self.window = (self.window * 2).min(MAX_WINDOW);
        }
        true
    }
}

impl Iterator for PrimeIter {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.pos == self.buffer.len() && !self.refill() {
            return None;
        }
        let p = self.buffer[self.pos];
        self.pos += 1;
        Some(p)
    }
}

impl FusedIterator for PrimeIter {}
