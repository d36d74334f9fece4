//! # Segment — Segmented Sieve Scanner
//!
//! [`SegmentSieve`] walks `[start, stop]` (with `start >= 7`) one segment at
//! a time. Each segment goes through the same steps:
//!
//! 1. **Reset**: copy the wheel pattern for the segment's low value. The
//!    first segment restores 7, 11 and 13 (the pattern clears them) and
//!    clears bits below `start`.
//! 2. **Cross off**: small, medium and large tiers.
//! 3. **Extract**: the last segment is truncated at the byte holding `stop`
//!    and bits above `stop` are cleared; the segment is handed to the sink.
//! 4. **Advance**: `low += 30 · S`.
//!
//! Sieving primes arrive in ascending order through
//! [`SegmentSieve::add_sieving_prime`]. Before storing `p` the scanner
//! processes every segment that lies entirely below `p²`, so each segment is
//! crossed off by exactly the primes up to the square root of its high end.
//!
//! The sink decides what a segment means: the bootstrap generator feeds the
//! primes it finds to another scanner, the prime finder counts and emits.

use std::ops::ControlFlow;
use std::sync::Arc;

use crate::erat::Tiers;
use crate::progress::Progress;
use crate::wheel::{self, SievingPrime, RESIDUES};

/// Consumer of sieved segments.
pub trait SegmentSink {
    /// Called once per segment in ascending order. `segment[i]` bit `b`
    /// represents `low + 30i + RESIDUES[b]`; set bits are primes within the
    /// scanner's range. Returning `Break` stops the scanner.
    fn process(&mut self, segment: &[u8], low: u64) -> ControlFlow<()>;
}

pub struct SegmentSieve<S: SegmentSink> {
    start: u64,
    stop: u64,
    low: u64,
    sieve: Vec<u8>,
    tiers: Tiers,
    sink: S,
    segments: u64,
    done: bool,
    progress: Option<Arc<Progress>>,
}

impl<S: SegmentSink> SegmentSieve<S> {
    /// `start >= 7`, `start <= stop`, `sieve_size` a power of two (bytes).
    pub fn new(start: u64, stop: u64, sieve_size: usize, sink: S) -> Self {
        debug_assert!(start >= 7 && start <= stop);
        debug_assert!(sieve_size.is_power_of_two());
        let low = (start - 7) / 30 * 30;
        SegmentSieve {
            start,
            stop,
            low,
            sieve: vec![0u8; sieve_size],
            tiers: Tiers::new(sieve_size, crate::sieve::isqrt(stop)),
            sink,
            segments: 0,
            done: false,
            progress: None,
        }
    }

    /// Report processed numbers to `progress` and stop when it is cancelled.
    pub fn with_progress(mut self, progress: Arc<Progress>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn segments(&self) -> u64 {
        self.segments
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Highest number held by the current segment.
    fn segment_high(&self) -> u64 {
        self.low + 30 * self.sieve.len() as u64 + 1
    }

    /// Register sieving prime `p > 13`. Primes must arrive in ascending order.
    pub fn add_sieving_prime(&mut self, prime: u64) {
        let square = prime.saturating_mul(prime);
        while !self.done && square > self.segment_high() {
            self.sieve_segment();
        }
        if self.done {
            return;
        }
        if let Some(sp) = SievingPrime::new(prime, self.low, self.stop) {
            self.tiers.add(prime, sp);
        }
    }

    /// Sieve the remaining segments.
    pub fn finish(&mut self) {
        while !self.done {
            self.sieve_segment();
        }
    }

    fn sieve_segment(&mut self) {
        let low = self.low;
        let size = self.sieve.len() as u64;
        let first = self.segments == 0;

        wheel::reset_into(&mut self.sieve, low);
        if first {
            if low == 0 {
                self.sieve[0] |= 0b0000_0111;
            }
            for (bit, &r) in RESIDUES.iter().enumerate() {
                if low + r < self.start {
                    self.sieve[0] &= !(1 << bit);
                }
            }
        }

        self.tiers.cross_off(&mut self.sieve);

        let last = self.stop < low + 30 * size + 7;
        let len = if last {
            let stop_byte = wheel::byte_of(self.stop, low) as usize;
            for (bit, &r) in RESIDUES.iter().enumerate() {
                if low + 30 * stop_byte as u64 + r > self.stop {
                    self.sieve[stop_byte] &= !(1 << bit);
                }
            }
            stop_byte + 1
        } else {
            self.sieve.len()
        };

        let flow = self.sink.process(&self.sieve[..len], low);
        self.segments += 1;

        if let Some(progress) = &self.progress {
            let seg_start = if first { self.start } else { low + 7 };
            let seg_stop = if last { self.stop } else { low + 30 * size + 6 };
            progress.advance(seg_stop - seg_start + 1);
            if progress.is_cancelled() {
                self.done = true;
            }
        }

        if last || flow.is_break() {
            self.done = true;
        } else {
            self.low += 30 * size;
        }
    }
}
