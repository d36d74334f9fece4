//! # Erat — Tiered Cross-off Structures
//!
//! Sieving primes are split into three tiers by how far their multiples
//! travel relative to the segment size `S` (bytes):
//!
//! - **Small** (`p <= S · SMALL_FACTOR`): many multiples per segment. Kept in
//!   a flat `Vec` and walked every segment.
//! - **Medium** (`p <= S · MEDIUM_FACTOR`): a few multiples per segment. Kept
//!   in eight bucket lists, one per wheel row (the prime's residue modulo
//!   30). A prime never changes row, so every segment walks the lists in
//!   place with the row-specialised [`cross_off_row`]; no bucket is freed or
//!   allocated after registration.
//! - **Large**: usually no multiple in a given segment. Kept in a ring of
//!   bucket lists indexed by the segment in which the next multiple lands, so
//!   a segment only touches primes that actually hit it.
//!
//! A prime's tier is fixed when it is registered. The tiers share one
//! [`BucketPool`].

use crate::bucket::{BucketPool, NIL};
use crate::wheel::{cross_off, cross_off_row, wheel_row, SievingPrime};

pub const SMALL_FACTOR: f64 = 0.5;
pub const MEDIUM_FACTOR: f64 = 8.0;

/// Which tier a sieving prime belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    Small,
    Medium,
    Large,
}

struct EratSmall {
    primes: Vec<SievingPrime>,
}

impl EratSmall {
    fn cross_off(&mut self, sieve: &mut [u8]) {
        for sp in self.primes.iter_mut() {
            cross_off(sieve, sp);
        }
    }
}

struct EratMedium {
    lists: [u32; 8],
}

impl EratMedium {
    fn add(&mut self, pool: &mut BucketPool, sp: SievingPrime) {
        pool.push(&mut self.lists[(sp.wheel_index >> 3) as usize], sp);
    }

    fn cross_off(&mut self, pool: &mut BucketPool, sieve: &mut [u8]) {
        for (class, &head) in self.lists.iter().enumerate() {
            let row = wheel_row(class);
            pool.for_each_mut(head, |sp| cross_off_row(sieve, sp, row));
        }
    }
}

struct EratLarge {
    ring: Vec<u32>,
    mask: usize,
    current: usize,
    log2_sieve: u32,
    sieve_mask: u32,
}

impl EratLarge {
    /// `max_step` bounds the byte distance between consecutive multiples of
    /// the largest prime this tier will ever receive.
    fn new(sieve_size: usize, max_step: u64) -> Self {
        let slots = (max_step / sieve_size as u64 + 2).next_power_of_two() as usize;
        EratLarge {
            ring: vec![NIL; slots],
            mask: slots - 1,
            current: 0,
            log2_sieve: sieve_size.trailing_zeros(),
            sieve_mask: (sieve_size - 1) as u32,
        }
    }

    #[inline]
    fn file(&mut self, pool: &mut BucketPool, mut sp: SievingPrime, base: usize) {
        let segment = (sp.multiple_index >> self.log2_sieve) as usize;
        let slot = (base + segment) & self.mask;
        sp.multiple_index &= self.sieve_mask;
        pool.push(&mut self.ring[slot], sp);
    }

    fn add(&mut self, pool: &mut BucketPool, sp: SievingPrime) {
        self.file(pool, sp, self.current);
    }

    fn cross_off(&mut self, pool: &mut BucketPool, scratch: &mut Vec<SievingPrime>, sieve: &mut [u8]) {
        let mut chain = BucketPool::take(&mut self.ring[self.current]);
        let next = self.current + 1;
        while chain != NIL {
            chain = pool.drain_into(chain, scratch);
            for sp in scratch.iter_mut() {
                cross_off(sieve, sp);
                self.file(pool, *sp, next);
            }
        }
        self.current = next & self.mask;
    }
}

/// All sieving primes of one scanner, grouped by tier.
pub struct Tiers {
    sieve_size: usize,
    small_limit: u64,
    medium_limit: u64,
    small: EratSmall,
    medium: EratMedium,
    large: EratLarge,
    pool: BucketPool,
    scratch: Vec<SievingPrime>,
}

impl Tiers {
    /// `sieve_size` must be a power of two; `max_prime` is the largest prime
    /// that will be registered (`⌊√stop⌋`).
    pub fn new(sieve_size: usize, max_prime: u64) -> Self {
        debug_assert!(sieve_size.is_power_of_two());
        let small_limit = (sieve_size as f64 * SMALL_FACTOR) as u64;
        let medium_limit = (sieve_size as f64 * MEDIUM_FACTOR) as u64;
        // consecutive multiples are at most 7·(p/30) + 9 bytes apart
        let max_step = 7 * (max_prime / 30) + 9;
        Tiers {
            sieve_size,
            small_limit,
            medium_limit,
            small: EratSmall { primes: Vec::new() },
            medium: EratMedium { lists: [NIL; 8] },
            large: EratLarge::new(sieve_size, max_step),
            pool: BucketPool::new(),
            scratch: Vec::with_capacity(crate::bucket::BUCKET_CAPACITY),
        }
    }

    pub fn tier_of(&self, prime: u64) -> Tier {
        if prime <= self.small_limit {
            Tier::Small
        } else if prime <= self.medium_limit {
            Tier::Medium
        } else {
            Tier::Large
        }
    }

    /// Register a sieving prime whose state was built for the current segment.
    pub fn add(&mut self, prime: u64, sp: SievingPrime) {
        match self.tier_of(prime) {
            Tier::Small => self.small.primes.push(sp),
            Tier::Medium => self.medium.add(&mut self.pool, sp),
            Tier::Large => self.large.add(&mut self.pool, sp),
        }
    }

    /// Cross off all tiers in `sieve` (a full segment of `sieve_size` bytes)
    /// and advance every prime to the next segment.
    pub fn cross_off(&mut self, sieve: &mut [u8]) {
        debug_assert_eq!(sieve.len(), self.sieve_size);
        self.small.cross_off(sieve);
        self.medium.cross_off(&mut self.pool, sieve);
        self.large.cross_off(&mut self.pool, &mut self.scratch, sieve);
    }

    pub fn small_count(&self) -> usize {
        self.small.primes.len()
    }
}

#[cfg(test)]
mod tests {
    //! Each tier is driven on its own across many segments and compared
    //! against a plain multiple-of-p check, so the carry arithmetic of every
    //! tier is exercised independently of the scanner.

    use super::*;
    use crate::wheel::{number_at, reset_into};

    /// Drive one prime through `segments` segments, registering it only once
    /// its square reaches the current segment as the scanner does.
    fn run_single_prime(prime: u64, sieve_size: usize, segments: usize) {
        let stop = u64::MAX / 4;
        let mut tiers = Tiers::new(sieve_size, prime);
        let mut registered = false;
        let mut sieve = vec![0u8; sieve_size];
        for s in 0..segments {
            let low = (s * sieve_size * 30) as u64;
            if !registered && prime * prime <= low + 30 * sieve_size as u64 + 1 {
                tiers.add(prime, SievingPrime::new(prime, low, stop).unwrap());
                registered = true;
            }
            sieve.fill(0xff);
            tiers.cross_off(&mut sieve);
            for (byte, &v) in sieve.iter().enumerate() {
                for bit in 0..8 {
                    let n = number_at(low, byte, bit);
                    let expect = n % prime == 0 && n >= prime * prime;
                    assert_eq!(v & (1 << bit) == 0, expect, "p = {}, n = {}", prime, n);
                }
            }
        }
        assert!(registered);
    }

    // ── Tier selection ──────────────────────────────────────────────

    #[test]
    fn tier_thresholds() {
        let tiers = Tiers::new(1024, 1 << 20);
        assert_eq!(tiers.tier_of(17), Tier::Small);
        assert_eq!(tiers.tier_of(512), Tier::Small);
        assert_eq!(tiers.tier_of(513), Tier::Medium);
        assert_eq!(tiers.tier_of(8192), Tier::Medium);
        assert_eq!(tiers.tier_of(8193), Tier::Large);
    }

    // ── Per-tier crossing ───────────────────────────────────────────

    #[test]
    fn small_tier_crosses_every_multiple() {
        run_single_prime(17, 64, 20);
        run_single_prime(31, 64, 20);
    }

    #[test]
    fn medium_tier_crosses_every_multiple() {
        run_single_prime(101, 64, 200);
        run_single_prime(509, 64, 400);
    }

    /// Medium primes stay in the buckets they were registered into.
    #[test]
    fn medium_tier_allocates_only_at_registration() {
        let sieve_size = 1024;
        let primes: Vec<u64> = (600..8000u64).filter(|&p| (2..p).all(|d| p % d != 0)).collect();
        let mut tiers = Tiers::new(sieve_size, 8000);
        for &p in &primes {
            assert_eq!(tiers.tier_of(p), Tier::Medium);
            tiers.add(p, SievingPrime::new(p, 0, u64::MAX / 4).unwrap());
        }
        let allocated = tiers.pool.allocated();
        assert!(allocated >= primes.len().div_ceil(crate::bucket::BUCKET_CAPACITY));
        let mut sieve = vec![0xffu8; sieve_size];
        for _ in 0..50 {
            tiers.cross_off(&mut sieve);
        }
        assert_eq!(tiers.pool.allocated(), allocated);
        assert_eq!(tiers.pool.free_count(), 0);
    }

    #[test]
    fn large_tier_crosses_every_multiple() {
        run_single_prime(541, 64, 2000);
        run_single_prime(1031, 16, 4000);
    }

    #[test]
    fn tiers_together_leave_only_primes() {
        let sieve_size = 32;
        let segments = 120;
        let limit = (sieve_size * 30 * segments) as u64;
        let mut tiers = Tiers::new(sieve_size, 340);
        let mut pending: Vec<u64> = (17..=340u64)
            .filter(|&p| (2..p).all(|d| p % d != 0))
            .rev()
            .collect();
        let mut sieve = vec![0u8; sieve_size];
        let mut count = 3; // 2, 3, 5
        for s in 0..segments {
            let low = (s * sieve_size * 30) as u64;
            let high = low + 30 * sieve_size as u64 + 1;
            while let Some(&p) = pending.last() {
                if p * p > high {
                    break;
                }
                pending.pop();
                if let Some(sp) = SievingPrime::new(p, low, limit) {
                    tiers.add(p, sp);
                }
            }
            reset_into(&mut sieve, low);
            if s == 0 {
                sieve[0] |= 0b111;
            }
            tiers.cross_off(&mut sieve);
            count += sieve.iter().map(|b| b.count_ones() as u64).sum::<u64>();
        }
        // numbers up to 30·32·120 + 1 = 115201; π(115201) = 10_889
        assert_eq!(count, 10_889);
        assert!(pending.is_empty());
        assert!(tiers.small_count() > 0);
    }
}
