//! # Finder — Counting, Tuplet Matching and Emission
//!
//! [`PrimeFinder`] is the sink of the main scanner. For every sieved
//! segment it
//!
//! - counts primes by popcount,
//! - matches prime k-tuplets against 16-bit windows (`byte[i] | byte[i+1] << 8`),
//! - emits primes in ascending order to a callback and/or prints primes and
//!   tuplets to a writer.
//!
//! ## Tuplet Windows
//!
//! Every admissible constellation above 7 fits in the 16 bits of two
//! adjacent bytes, anchored at the byte holding its first member:
//!
//! | Kind | Masks | Example |
//! |------|-------|---------|
//! | twins | `0x06 0x18 0xc0` | (11, 13) |
//! | triplets | `0x07 0x0e 0x1c 0x38` | (7, 11, 13) |
//! | quadruplets | `0x1e` | (11, 13, 17, 19) |
//! | quintuplets | `0x1f 0x3e` | (7, 11, 13, 17, 19) |
//! | sextuplets | `0x3f` | (7, 11, 13, 17, 19, 23) |
//! | septuplets | `0xfe 0x1fc0` | (5639, …, 5659) |
//!
//! Only the second septuplet mask reaches into the next byte. The last byte
//! of a segment is carried into the next segment so its window sees the
//! following byte, and every window is evaluated exactly once.

use std::io::{self, Write};
use std::ops::{AddAssign, ControlFlow, Index};

use crate::config::{Flags, TupletKind, COUNTS_SIZE};
use crate::segment::SegmentSink;
use crate::wheel::{number_at, RESIDUES};

/// Window masks per tuplet kind (index 0, plain primes, has none).
pub const TUPLET_MASKS: [&[u16]; COUNTS_SIZE] = [
    &[],
    &[0x06, 0x18, 0xc0],
    &[0x07, 0x0e, 0x1c, 0x38],
    &[0x1e],
    &[0x1f, 0x3e],
    &[0x3f],
    &[0xfe, 0x1fc0],
];

/// Per-kind totals: primes, twins, triplets, … septuplets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts(pub [u64; COUNTS_SIZE]);

impl Counts {
    pub fn get(&self, kind: TupletKind) -> u64 {
        self.0[kind.index()]
    }

    pub fn primes(&self) -> u64 {
        self.get(TupletKind::Primes)
    }

    pub fn twins(&self) -> u64 {
        self.get(TupletKind::Twins)
    }

    pub fn triplets(&self) -> u64 {
        self.get(TupletKind::Triplets)
    }

    pub fn quadruplets(&self) -> u64 {
        self.get(TupletKind::Quadruplets)
    }

    pub fn quintuplets(&self) -> u64 {
        self.get(TupletKind::Quintuplets)
    }

    pub fn sextuplets(&self) -> u64 {
        self.get(TupletKind::Sextuplets)
    }

    pub fn septuplets(&self) -> u64 {
        self.get(TupletKind::Septuplets)
    }

    pub(crate) fn bump(&mut self, kind: TupletKind) {
        self.0[kind.index()] += 1;
    }
}

impl Index<TupletKind> for Counts {
    type Output = u64;

    fn index(&self, kind: TupletKind) -> &u64 {
        &self.0[kind.index()]
    }
}

impl AddAssign for Counts {
    fn add_assign(&mut self, rhs: Counts) {
        for (a, b) in self.0.iter_mut().zip(rhs.0) {
            *a += b;
        }
    }
}

/// Iterator over set bits within a single u64 word.
pub struct BitIter {
    word: u64,
}

impl BitIter {
    pub fn new(word: u64) -> Self {
        BitIter { word }
    }
}

impl Iterator for BitIter {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.word == 0 {
            return None;
        }
        let tz = self.word.trailing_zeros() as usize;
        self.word &= self.word - 1;
        Some(tz)
    }
}

/// Call `f` for every prime in `segment`, in ascending order.
pub fn for_each_prime(
    segment: &[u8],
    low: u64,
    mut f: impl FnMut(u64) -> ControlFlow<()>,
) -> ControlFlow<()> {
    for (w, chunk) in segment.chunks(8).enumerate() {
        let mut buf = [0u8; 8];
        buf[..chunk.len()].copy_from_slice(chunk);
        for k in BitIter::new(u64::from_le_bytes(buf)) {
            f(number_at(low, w * 8 + k / 8, k % 8))?;
        }
    }
    ControlFlow::Continue(())
}

/// Members of the constellation matched by `mask` at byte base `base`.
pub fn tuplet_members(mask: u16, base: u64) -> impl Iterator<Item = u64> {
    BitIter::new(mask as u64).map(move |k| base + 30 * (k / 8) as u64 + RESIDUES[k % 8])
}

/// Write `(a, b, c)` followed by a newline.
pub fn write_tuplet(out: &mut dyn Write, members: impl Iterator<Item = u64>) -> io::Result<()> {
    let mut sep = "(";
    for p in members {
        write!(out, "{}{}", sep, p)?;
        sep = ", ";
    }
    writeln!(out, ")")
}

/// A byte at the edge of a scanned range: its base value and bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeByte {
    pub base: u64,
    pub bits: u8,
}

/// Prime callback that may stop the sieve early.
pub type PrimeCallback<'a> = &'a mut dyn FnMut(u64) -> ControlFlow<()>;

/// Sink that counts, matches tuplets and emits primes.
pub struct PrimeFinder<'a> {
    flags: Flags,
    counts: Counts,
    carry: Option<EdgeByte>,
    first: Option<EdgeByte>,
    callback: Option<PrimeCallback<'a>>,
    out: Option<&'a mut dyn Write>,
    error: Option<io::Error>,
    stopped: bool,
}

impl<'a> PrimeFinder<'a> {
    pub fn new(flags: Flags) -> Self {
        PrimeFinder {
            flags,
            counts: Counts::default(),
            carry: None,
            first: None,
            callback: None,
            out: None,
            error: None,
            stopped: false,
        }
    }

    pub fn with_callback(mut self, callback: PrimeCallback<'a>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn with_output(mut self, out: &'a mut dyn Write) -> Self {
        self.out = Some(out);
        self
    }

    pub fn counts(&self) -> Counts {
        self.counts
    }

    /// First byte of the first segment seen.
    pub fn first_byte(&self) -> Option<EdgeByte> {
        self.first
    }

    /// Last byte of the last segment seen.
    pub fn last_byte(&self) -> Option<EdgeByte> {
        self.carry
    }

    /// True if a callback or output error stopped the scan.
    pub fn stopped(&self) -> bool {
        self.stopped
    }

    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    /// Evaluate the window of the final byte. The byte after it lies
    /// outside the range and counts as empty.
    pub fn finish(&mut self) {
        if !self.stopped && self.flags.wants_tuplets() {
            if let Some(edge) = self.carry {
                let _ = self.match_window(edge.bits as u16, edge.base, false);
            }
        }
        if let Some(out) = self.out.as_mut() {
            if let Err(e) = out.flush() {
                self.error.get_or_insert(e);
            }
        }
    }

    fn match_window(&mut self, window: u16, base: u64, cross_only: bool) -> ControlFlow<()> {
        if window == 0 {
            return ControlFlow::Continue(());
        }
        for kind in &TupletKind::ALL[1..] {
            let count = self.flags.counts(*kind);
            let print = self.flags.prints(*kind);
            if !count && !print {
                continue;
            }
            for &mask in TUPLET_MASKS[kind.index()] {
                if cross_only && mask >> 8 == 0 {
                    continue;
                }
                if window & mask != mask {
                    continue;
                }
                if count {
                    self.counts.bump(*kind);
                }
                if print {
                    if let Some(out) = self.out.as_mut() {
                        if let Err(e) = write_tuplet(&mut **out, tuplet_members(mask, base)) {
                            self.error = Some(e);
                            self.stopped = true;
                            return ControlFlow::Break(());
                        }
                    }
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn emit_primes(&mut self, segment: &[u8], low: u64) -> ControlFlow<()> {
        let print = self.flags.prints(TupletKind::Primes);
        let callback = &mut self.callback;
        let out = &mut self.out;
        let error = &mut self.error;
        let flow = for_each_prime(segment, low, |p| {
            if let Some(cb) = callback.as_mut() {
                cb(p)?;
            }
            if print {
                if let Some(w) = out.as_mut() {
                    if let Err(e) = writeln!(w, "{}", p) {
                        *error = Some(e);
                        return ControlFlow::Break(());
                    }
                }
            }
            ControlFlow::Continue(())
        });
        if flow.is_break() {
            self.stopped = true;
        }
        flow
    }
}

impl SegmentSink for PrimeFinder<'_> {
    fn process(&mut self, segment: &[u8], low: u64) -> ControlFlow<()> {
        if segment.is_empty() {
            return ControlFlow::Continue(());
        }
        if self.first.is_none() {
            self.first = Some(EdgeByte { base: low, bits: segment[0] });
        }
        if self.flags.counts(TupletKind::Primes) {
            self.counts.0[0] += segment.iter().map(|b| b.count_ones() as u64).sum::<u64>();
        }

        if self.callback.is_some() || self.flags.prints(TupletKind::Primes) {
            self.emit_primes(segment, low)?;
        }

        if self.flags.wants_tuplets() {
            if let Some(edge) = self.carry {
                let window = edge.bits as u16 | (segment[0] as u16) << 8;
                self.match_window(window, edge.base, false)?;
            }
            for i in 0..segment.len() - 1 {
                let window = segment[i] as u16 | (segment[i + 1] as u16) << 8;
                self.match_window(window, low + 30 * i as u64, false)?;
            }
        }
        let last = segment.len() - 1;
        self.carry = Some(EdgeByte {
            base: low + 30 * last as u64,
            bits: segment[last],
        });
        ControlFlow::Continue(())
    }
}

/// Match constellations that straddle two adjacent scanned ranges: `left`
/// is the last byte of the lower range, `right` the first byte of the upper
/// one. Only masks reaching into the second byte can match here; the rest
/// were evaluated by the lower range's [`PrimeFinder::finish`].
pub fn straddling_tuplets(
    flags: Flags,
    left: EdgeByte,
    right: EdgeByte,
    counts: &mut Counts,
    out: Option<&mut dyn Write>,
) -> io::Result<()> {
    if right.base != left.base + 30 {
        return Ok(());
    }
    let mut finder = PrimeFinder::new(flags);
    if let Some(out) = out {
        finder = finder.with_output(out);
    }
    let window = left.bits as u16 | (right.bits as u16) << 8;
    let _ = finder.match_window(window, left.base, true);
    *counts += finder.counts;
    match finder.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    //! Finder tests drive the sink with hand-built segments, so tuplet
    //! matching, carry handling and emission order are checked without a
    //! scanner.

    use super::*;

    /// Segment at `low` with the bits of `numbers` set.
    fn segment_of(low: u64, len: usize, numbers: &[u64]) -> Vec<u8> {
        let mut seg = vec![0u8; len];
        for &n in numbers {
            let byte = ((n - low - 7) / 30) as usize;
            let bit = RESIDUES.iter().position(|&r| (low + 30 * byte as u64 + r) == n).unwrap();
            seg[byte] |= 1 << bit;
        }
        seg
    }

    const PRIMES_TO_200: [u64; 43] = [
        7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
        101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191,
        193, 197, 199,
    ];

    // ── Counting ────────────────────────────────────────────────────

    #[test]
    fn counts_primes_and_twins() {
        let seg = segment_of(0, 7, &PRIMES_TO_200);
        let mut f = PrimeFinder::new(Flags::COUNT_PRIMES | Flags::COUNT_TWINS);
        assert!(f.process(&seg, 0).is_continue());
        f.finish();
        assert_eq!(f.counts().primes(), 43);
        // (11,13) (17,19) (29,31) (41,43) (59,61) (71,73) (101,103) (107,109)
        // (137,139) (149,151) (179,181) (191,193) (197,199)
        assert_eq!(f.counts().twins(), 13);
    }

    #[test]
    fn carry_joins_segments() {
        // 5639..5659 spans two bytes; put the boundary between them.
        let sept = [5639u64, 5641, 5647, 5651, 5653, 5657, 5659];
        let low_a = 5610;
        let a = segment_of(low_a, 1, &sept[..2]);
        let b = segment_of(low_a + 30, 1, &sept[2..]);
        let mut f = PrimeFinder::new(Flags::COUNT_SEPTUPLETS);
        let _ = f.process(&a, low_a);
        let _ = f.process(&b, low_a + 30);
        f.finish();
        assert_eq!(f.counts().septuplets(), 1);
    }

    #[test]
    fn sextuplet_at_seven() {
        let seg = segment_of(0, 2, &[7, 11, 13, 17, 19, 23]);
        let mut f = PrimeFinder::new(Flags::COUNT_ALL);
        let _ = f.process(&seg, 0);
        f.finish();
        let c = f.counts();
        assert_eq!(c.sextuplets(), 1);
        assert_eq!(c.quintuplets(), 2);
        assert_eq!(c.quadruplets(), 1);
        assert_eq!(c.triplets(), 4);
        assert_eq!(c.twins(), 2);
    }

    // ── Emission ────────────────────────────────────────────────────

    #[test]
    fn callback_sees_primes_in_order() {
        let seg = segment_of(0, 7, &PRIMES_TO_200);
        let mut seen = Vec::new();
        let mut cb = |p: u64| {
            seen.push(p);
            ControlFlow::Continue(())
        };
        let mut f = PrimeFinder::new(Flags::NONE).with_callback(&mut cb);
        let _ = f.process(&seg, 0);
        drop(f);
        assert_eq!(seen, PRIMES_TO_200.to_vec());
    }

    #[test]
    fn callback_break_stops_finder() {
        let seg = segment_of(0, 7, &PRIMES_TO_200);
        let mut n = 0;
        let mut cb = |_p: u64| {
            n += 1;
            if n == 5 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };
        let mut f = PrimeFinder::new(Flags::COUNT_PRIMES).with_callback(&mut cb);
        assert!(f.process(&seg, 0).is_break());
        assert!(f.stopped());
        drop(f);
        assert_eq!(n, 5);
    }

    #[test]
    fn prints_triplets_in_parenthesised_form() {
        let seg = segment_of(0, 2, &[7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47]);
        let mut out = Vec::new();
        let mut f = PrimeFinder::new(Flags::PRINT_TRIPLETS).with_output(&mut out);
        let _ = f.process(&seg, 0);
        f.finish();
        drop(f);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "(7, 11, 13)\n(11, 13, 17)\n(13, 17, 19)\n(17, 19, 23)\n(37, 41, 43)\n(41, 43, 47)\n"
        );
    }

    // ── Range boundaries ────────────────────────────────────────────

    #[test]
    fn straddling_septuplet_counted_once() {
        let left = EdgeByte { base: 5610, bits: 0b1100_0000 };
        let right = EdgeByte { base: 5640, bits: 0b0001_1111 };
        let mut counts = Counts::default();
        straddling_tuplets(Flags::COUNT_SEPTUPLETS, left, right, &mut counts, None).unwrap();
        assert_eq!(counts.septuplets(), 1);

        let far = EdgeByte { base: 5670, bits: 0xff };
        let mut counts = Counts::default();
        straddling_tuplets(Flags::COUNT_SEPTUPLETS, left, far, &mut counts, None).unwrap();
        assert_eq!(counts.septuplets(), 0);
    }

    #[test]
    fn bit_iter_yields_ascending_positions() {
        let bits: Vec<usize> = BitIter::new(0b1010_0101).collect();
        assert_eq!(bits, vec![0, 2, 5, 7]);
        assert_eq!(BitIter::new(0).count(), 0);
    }
}
