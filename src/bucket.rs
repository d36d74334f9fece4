//! # Bucket — Arena of Sieving-Prime Buckets
//!
//! The medium and large tiers keep their sieving primes in singly linked
//! lists of fixed-capacity buckets. All buckets of one scanner live in a
//! single `Vec` ([`BucketPool`]) and link to each other by index, with
//! [`NIL`] terminating a list. Emptied buckets go onto a free list and are
//! reused; the arena only grows.
//!
//! A list is represented by the index of its head bucket. New primes are
//! pushed into the head; when the head is full a fresh bucket is linked in
//! front of it. Processing a list either detaches it first
//! ([`BucketPool::take`]) so primes can be re-filed into other lists,
//! including the one being drained, or updates it in place
//! ([`BucketPool::for_each_mut`]) when a prime never changes list.

use crate::wheel::SievingPrime;

/// Sieving primes per bucket.
pub const BUCKET_CAPACITY: usize = 256;

/// End-of-list marker.
pub const NIL: u32 = u32::MAX;

pub struct Bucket {
    primes: [SievingPrime; BUCKET_CAPACITY],
    len: u32,
    next: u32,
}

impl Bucket {
    fn empty() -> Self {
        Bucket {
            primes: [SievingPrime::default(); BUCKET_CAPACITY],
            len: 0,
            next: NIL,
        }
    }

    pub fn primes(&self) -> &[SievingPrime] {
        &self.primes[..self.len as usize]
    }

    fn is_full(&self) -> bool {
        self.len as usize == BUCKET_CAPACITY
    }
}

#[derive(Default)]
pub struct BucketPool {
    buckets: Vec<Bucket>,
    free: Vec<u32>,
}

impl BucketPool {
    pub fn new() -> Self {
        BucketPool::default()
    }

    fn alloc(&mut self, next: u32) -> u32 {
        let index = match self.free.pop() {
            Some(i) => i,
            None => {
                self.buckets.push(Bucket::empty());
                (self.buckets.len() - 1) as u32
            }
        };
        let bucket = &mut self.buckets[index as usize];
        bucket.len = 0;
        bucket.next = next;
        index
    }

    /// Append `sp` to the list whose head index is stored in `head`.
    #[inline]
    pub fn push(&mut self, head: &mut u32, sp: SievingPrime) {
        if *head == NIL || self.buckets[*head as usize].is_full() {
            *head = self.alloc(*head);
        }
        let bucket = &mut self.buckets[*head as usize];
        bucket.primes[bucket.len as usize] = sp;
        bucket.len += 1;
    }

    /// Apply `f` to every prime of the list at `head`, in place.
    pub fn for_each_mut(&mut self, head: u32, mut f: impl FnMut(&mut SievingPrime)) {
        let mut index = head;
        while index != NIL {
            let bucket = &mut self.buckets[index as usize];
            let len = bucket.len as usize;
            for sp in &mut bucket.primes[..len] {
                f(sp);
            }
            index = bucket.next;
        }
    }

    /// Detach the list at `head`, leaving an empty list behind.
    #[inline]
    pub fn take(head: &mut u32) -> u32 {
        std::mem::replace(head, NIL)
    }

    /// Copy the primes of bucket `index` into `out` (cleared first) and
    /// return the bucket to the free list. Returns the next bucket index.
    pub fn drain_into(&mut self, index: u32, out: &mut Vec<SievingPrime>) -> u32 {
        let bucket = &self.buckets[index as usize];
        out.clear();
        out.extend_from_slice(bucket.primes());
        let next = bucket.next;
        self.free.push(index);
        next
    }

    pub fn bucket(&self, index: u32) -> &Bucket {
        &self.buckets[index as usize]
    }

    /// Buckets ever allocated (free or in use).
    pub fn allocated(&self) -> usize {
        self.buckets.len()
    }

    /// Buckets currently on the free list.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp(n: u32) -> SievingPrime {
        SievingPrime {
            sieving_prime: n,
            multiple_index: n * 2,
            wheel_index: n % 64,
        }
    }

    fn collect(pool: &mut BucketPool, mut head: u32) -> Vec<u32> {
        let mut out = Vec::new();
        let mut scratch = Vec::new();
        while head != NIL {
            head = pool.drain_into(head, &mut scratch);
            out.extend(scratch.iter().map(|s| s.sieving_prime));
        }
        out
    }

    // ── Push and drain ──────────────────────────────────────────────

    #[test]
    fn push_spills_into_new_buckets() {
        let mut pool = BucketPool::new();
        let mut head = NIL;
        for i in 0..(BUCKET_CAPACITY as u32 * 2 + 5) {
            pool.push(&mut head, sp(i));
        }
        assert_eq!(pool.allocated(), 3);
        assert_eq!(pool.bucket(head).primes().len(), 5);

        let mut seen = collect(&mut pool, BucketPool::take(&mut head));
        seen.sort_unstable();
        assert_eq!(seen, (0..(BUCKET_CAPACITY as u32 * 2 + 5)).collect::<Vec<_>>());
        assert_eq!(head, NIL);
        assert_eq!(pool.free_count(), 3);
    }

    #[test]
    fn drained_buckets_are_reused() {
        let mut pool = BucketPool::new();
        let mut a = NIL;
        for i in 0..10 {
            pool.push(&mut a, sp(i));
        }
        let list = BucketPool::take(&mut a);
        let _ = collect(&mut pool, list);
        let mut b = NIL;
        for i in 0..10 {
            pool.push(&mut b, sp(i));
        }
        assert_eq!(pool.allocated(), 1);
        assert_eq!(pool.free_count(), 0);
    }

    /// Re-filing into the list being drained must not lose or revisit
    /// primes: the detached chain is independent of the new head.
    #[test]
    fn refile_into_detached_list() {
        let mut pool = BucketPool::new();
        let mut head = NIL;
        for i in 0..300 {
            pool.push(&mut head, sp(i));
        }
        let mut chain = BucketPool::take(&mut head);
        let mut scratch = Vec::new();
        let mut moved = 0;
        while chain != NIL {
            chain = pool.drain_into(chain, &mut scratch);
            for s in scratch.iter() {
                pool.push(&mut head, *s);
                moved += 1;
            }
        }
        assert_eq!(moved, 300);
        assert_eq!(collect(&mut pool, head).len(), 300);
    }

    #[test]
    fn for_each_mut_updates_in_place() {
        let mut pool = BucketPool::new();
        let mut head = NIL;
        for i in 0..600 {
            pool.push(&mut head, sp(i));
        }
        pool.for_each_mut(head, |s| s.multiple_index += 1);
        assert_eq!(pool.allocated(), 3);
        let mut seen = Vec::new();
        pool.for_each_mut(head, |s| seen.push((s.sieving_prime, s.multiple_index)));
        seen.sort_unstable();
        assert_eq!(seen, (0..600).map(|i| (i, i * 2 + 1)).collect::<Vec<_>>());
    }
}
