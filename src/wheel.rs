//! # Wheel — Modulo-30 Layout and Small-Prime Pre-elimination
//!
//! Every segment uses the modulo-30 byte layout: byte `i` of a segment whose
//! low value `L` is a multiple of 30 holds the eight numbers coprime to 30 in
//! `(L + 30i, L + 30i + 31]`, one bit each:
//!
//! | bit | 0 | 1 | 2 | 3 | 4 | 5 | 6 | 7 |
//! |-----|---|---|---|---|---|---|---|---|
//! | offset | 7 | 11 | 13 | 17 | 19 | 23 | 29 | 31 |
//!
//! Multiples of 2, 3 and 5 therefore never occupy a bit. Multiples of 7, 11
//! and 13 are removed by copying a 1001-byte pattern (`7 · 11 · 13` bytes,
//! period 30030) into the segment before any crossing off.
//!
//! ## Wheel Table
//!
//! A sieving prime `p = 30P + pr` crosses off `p · q` for every `q` coprime
//! to 30. Writing `q = 30Q + qr`, the byte holding `p · q` is
//!
//! ```text
//! 30PQ + P·qr + Q·pr + ⌊(pr·qr − 7) / 30⌋
//! ```
//!
//! so stepping `q` to the next residue adds `P · gap(qr)` plus a small
//! correction that depends only on `(pr, qr)`. The 64 combinations are
//! precomputed in [`WHEEL`] at compile time; the hot loop in [`cross_off`]
//! is one table lookup, one AND and one add per multiple.

use std::sync::OnceLock;

/// Offsets of the eight residues held by one byte, in bit order.
pub const RESIDUES: [u64; 8] = [7, 11, 13, 17, 19, 23, 29, 31];

/// Distance from each residue to the next one (31 → 37).
const GAPS: [u8; 8] = [4, 2, 4, 2, 4, 6, 2, 6];

/// Largest prime removed by the pre-elimination pattern.
pub const WHEEL_LIMIT: u64 = 13;

/// Bytes in the pre-elimination pattern (7 · 11 · 13).
pub const PATTERN_LEN: usize = 1001;

const NONE: u8 = 0xff;

/// Bit index of a residue modulo 30 (`1` maps to offset 31), or `NONE`.
const BIT_OF_RESIDUE: [u8; 30] = {
    let mut t = [NONE; 30];
    let mut b = 0;
    while b < 8 {
        t[(RESIDUES[b] % 30) as usize] = b as u8;
        b += 1;
    }
    t
};

/// Distance from `r` (mod 30) up to the nearest residue coprime to 30.
const NEXT_COPRIME: [u8; 30] = {
    let mut t = [0u8; 30];
    let mut r = 0;
    while r < 30 {
        let mut d = 0;
        while BIT_OF_RESIDUE[(r + d) % 30] == NONE {
            d += 1;
        }
        t[r] = d as u8;
        r += 1;
    }
    t
};

/// One step of the wheel for a `(prime residue, multiplier residue)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WheelElement {
    /// AND mask that clears the bit of the current multiple.
    pub unset_bit: u8,
    /// Gap to the next multiplier residue; scaled by `P`.
    pub next_multiple_factor: u8,
    /// Byte correction independent of `P`.
    pub correct: u8,
    /// Wheel index of the following multiple.
    pub next: u8,
}

const fn build_wheel() -> [WheelElement; 64] {
    let mut table = [WheelElement {
        unset_bit: 0,
        next_multiple_factor: 0,
        correct: 0,
        next: 0,
    }; 64];
    let mut a = 0;
    while a < 8 {
        let pr = RESIDUES[a];
        let mut b = 0;
        while b < 8 {
            let qr = RESIDUES[b];
            let gap = GAPS[b] as u64;
            let bit = BIT_OF_RESIDUE[((pr * qr) % 30) as usize];
            let here = (pr * qr - 7) / 30;
            let there = (pr * (qr + gap) - 7) / 30;
            table[a * 8 + b] = WheelElement {
                unset_bit: !(1u8 << bit),
                next_multiple_factor: gap as u8,
                correct: (there - here) as u8,
                next: (a * 8 + (b + 1) % 8) as u8,
            };
            b += 1;
        }
        a += 1;
    }
    table
}

/// Precomputed modulo-30 wheel, indexed by `prime_residue * 8 + multiplier_residue`.
pub static WHEEL: [WheelElement; 64] = build_wheel();

/// Bit index of `n` inside its byte. `n` must be coprime to 30.
#[inline]
pub fn bit_of(n: u64) -> u32 {
    BIT_OF_RESIDUE[(n % 30) as usize] as u32
}

/// Byte index of `n` relative to segment low `low`.
/// `n` must be coprime to 30 and `>= low + 7`.
#[inline]
pub fn byte_of(n: u64, low: u64) -> u64 {
    (n - low - 7) / 30
}

/// Number represented by bit `bit` of byte `byte` in a segment at `low`.
#[inline]
pub fn number_at(low: u64, byte: usize, bit: usize) -> u64 {
    low + 30 * byte as u64 + RESIDUES[bit]
}

/// A prime above [`WHEEL_LIMIT`] together with the position of its next
/// multiple in the current segment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SievingPrime {
    /// `(p − pr) / 30` where `pr` is the prime's residue in `7..=31`.
    pub sieving_prime: u32,
    /// Byte index of the next multiple, relative to the current segment.
    pub multiple_index: u32,
    /// Index into [`WHEEL`].
    pub wheel_index: u32,
}

impl SievingPrime {
    /// Build the sieving state of prime `p` for a segment starting at `low`.
    ///
    /// The first multiple is `p · q` with `q >= p` (smaller multiples were
    /// crossed off by smaller primes) and `p · q >= low + 7`. Returns `None`
    /// when that multiple exceeds `stop` or does not fit in 64 bits.
    pub fn new(prime: u64, low: u64, stop: u64) -> Option<SievingPrime> {
        debug_assert!(prime > WHEEL_LIMIT);
        debug_assert!(low % 30 == 0);
        let a = bit_of(prime) as u64;
        let pr = RESIDUES[a as usize];
        let big_p = (prime - pr) / 30;

        let min_q = (low + 7).div_ceil(prime);
        let q = min_q.max(prime);
        let q = q.checked_add(NEXT_COPRIME[(q % 30) as usize] as u64)?;
        let multiple = prime.checked_mul(q)?;
        if multiple > stop {
            return None;
        }
        let b = bit_of(q) as u64;
        let index = byte_of(multiple, low);
        Some(SievingPrime {
            sieving_prime: u32::try_from(big_p).ok()?,
            multiple_index: u32::try_from(index).ok()?,
            wheel_index: (a * 8 + b) as u32,
        })
    }
}

/// [`cross_off`] for a prime whose wheel row is known: `row` holds the eight
/// entries of [`WHEEL`] for its residue class and the multiplier position
/// wraps modulo 8.
#[inline]
pub fn cross_off_row(sieve: &mut [u8], sp: &mut SievingPrime, row: &[WheelElement; 8]) {
    let len = sieve.len();
    let step = sp.sieving_prime as usize;
    let mut mi = sp.multiple_index as usize;
    let mut b = (sp.wheel_index & 7) as usize;
    while mi < len {
        let w = &row[b];
        sieve[mi] &= w.unset_bit;
        mi += step * w.next_multiple_factor as usize + w.correct as usize;
        b = (b + 1) & 7;
    }
    sp.multiple_index = (mi - len) as u32;
    sp.wheel_index = (sp.wheel_index & !7) | b as u32;
}

/// The eight [`WHEEL`] entries of residue class `class` (`0..8`).
#[inline]
pub fn wheel_row(class: usize) -> &'static [WheelElement; 8] {
    &WHEEL_ROWS[class]
}

static WHEEL_ROWS: [[WheelElement; 8]; 8] = {
    let flat = build_wheel();
    let mut rows = [[flat[0]; 8]; 8];
    let mut i = 0;
    while i < 64 {
        rows[i / 8][i % 8] = flat[i];
        i += 1;
    }
    rows
};

/// Cross off every multiple of `sp` that falls inside `sieve`, then rebase
/// its `multiple_index` onto the following segment.
#[inline]
pub fn cross_off(sieve: &mut [u8], sp: &mut SievingPrime) {
    let len = sieve.len();
    let step = sp.sieving_prime as usize;
    let mut mi = sp.multiple_index as usize;
    let mut wi = sp.wheel_index as usize;
    while mi < len {
        let w = &WHEEL[wi];
        sieve[mi] &= w.unset_bit;
        mi += step * w.next_multiple_factor as usize + w.correct as usize;
        wi = w.next as usize;
    }
    sp.multiple_index = (mi - len) as u32;
    sp.wheel_index = wi as u32;
}

/// The 1001-byte pre-elimination pattern, built on first use.
pub fn pattern() -> &'static [u8; PATTERN_LEN] {
    static PATTERN: OnceLock<[u8; PATTERN_LEN]> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let mut bytes = [0u8; PATTERN_LEN];
        for (j, byte) in bytes.iter_mut().enumerate() {
            for (bit, &r) in RESIDUES.iter().enumerate() {
                let n = 30 * j as u64 + r;
                if n % 7 != 0 && n % 11 != 0 && n % 13 != 0 {
                    *byte |= 1 << bit;
                }
            }
        }
        bytes
    })
}

/// Fill `segment` with the pattern rotated to segment low `low`.
pub fn reset_into(segment: &mut [u8], low: u64) {
    let pattern = pattern();
    let mut pos = ((low / 30) % PATTERN_LEN as u64) as usize;
    let mut filled = 0;
    while filled < segment.len() {
        let n = (PATTERN_LEN - pos).min(segment.len() - filled);
        segment[filled..filled + n].copy_from_slice(&pattern[pos..pos + n]);
        filled += n;
        pos = 0;
    }
}
