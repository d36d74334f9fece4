//! # Parallel — Range Partitioning and Ordered Merging
//!
//! Splits the sieving range into contiguous chunks and runs one scanner
//! (with its own bootstrap generator) per chunk on a rayon pool.
//!
//! ## Chunk Layout
//!
//! Every chunk boundary falls between `30k + 6` and `30k + 7`, so each byte
//! of the modulo-30 layout belongs to exactly one chunk. Chunks are at
//! least [`MIN_THREAD_DISTANCE`] numbers long; small ranges run on one chunk
//! without any thread pool.
//!
//! ## Counting
//!
//! Chunk counts are summed. The only constellation that can straddle a
//! boundary is a septuplet whose window spans the last byte of one chunk
//! and the first byte of the next; it is matched during the merge.
//!
//! ## Emission
//!
//! Printing or a prime callback needs global ascending order. The range is
//! cut into more, smaller chunks (at most [`MAX_EMIT_CHUNK`] numbers) that
//! workers claim in ascending order from a shared counter. Each worker
//! buffers its chunk's output and sends it through a bounded channel; the
//! caller's thread reorders and replays the buffers strictly by chunk index.
//!
//! A worker may only start chunk `i` once `i < replayed + workers`
//! ([`EmitWindow`]). A fast worker therefore blocks until the slowest
//! earlier chunk has been replayed, and at most `workers` chunk buffers
//! exist at any time.
//!
//! A callback that breaks, or a failed write, cancels the remaining work;
//! buffers that arrive afterwards are discarded.

use std::collections::BTreeMap;
use std::io::Write;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;

use rayon::prelude::*;
use tracing::debug;

use crate::config::Flags;
use crate::error::SieveError;
use crate::finder::{straddling_tuplets, Counts, EdgeByte, PrimeCallback, PrimeFinder};
use crate::generator;
use crate::progress::Progress;
use crate::segment::SegmentSieve;

/// Smallest chunk handed to a worker.
pub const MIN_THREAD_DISTANCE: u64 = 10_000_000;

/// Largest chunk buffered for ordered emission.
pub const MAX_EMIT_CHUNK: u64 = 50_000_000;

/// A contiguous piece `[start, stop]` of the sieving range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub start: u64,
    pub stop: u64,
}

/// Split `[start, stop]` into chunks of at least `len` numbers, breaking
/// only between `30k + 6` and `30k + 7`.
pub fn split(start: u64, stop: u64, len: u64) -> Vec<Chunk> {
    let len = len.max(30);
    let mut chunks = Vec::new();
    let mut a = start;
    loop {
        let b = a
            .checked_add(len - 1)
            .and_then(|t| t.checked_add((36 - t % 30) % 30))
            .unwrap_or(stop);
        if b >= stop {
            chunks.push(Chunk { start: a, stop });
            return chunks;
        }
        chunks.push(Chunk { start: a, stop: b });
        a = b + 1;
    }
}

/// Chunks for counting: one per thread, each at least `MIN_THREAD_DISTANCE`.
pub fn plan_counting(start: u64, stop: u64, threads: usize) -> Vec<Chunk> {
    let dist = stop - start + 1;
    let n = (dist / MIN_THREAD_DISTANCE).clamp(1, threads.max(1) as u64);
    split(start, stop, dist.div_ceil(n))
}

/// Chunks for ordered emission: `[MIN_THREAD_DISTANCE, MAX_EMIT_CHUNK]` long.
pub fn plan_emission(start: u64, stop: u64, threads: usize) -> Vec<Chunk> {
    let dist = stop - start + 1;
    if threads <= 1 || dist < 2 * MIN_THREAD_DISTANCE {
        return vec![Chunk { start, stop }];
    }
    let len = (dist / threads as u64).clamp(MIN_THREAD_DISTANCE, MAX_EMIT_CHUNK);
    split(start, stop, len)
}

/// Outcome of sieving one chunk.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChunkResult {
    pub counts: Counts,
    pub first: Option<EdgeByte>,
    pub last: Option<EdgeByte>,
    pub stopped: bool,
}

/// Sieve one chunk with a fresh scanner and bootstrap generator.
pub fn run_chunk<'a>(
    chunk: Chunk,
    sieve_size: usize,
    flags: Flags,
    progress: &Arc<Progress>,
    out: Option<&'a mut dyn Write>,
    callback: Option<PrimeCallback<'a>>,
) -> Result<ChunkResult, SieveError> {
    let mut finder = PrimeFinder::new(flags);
    if let Some(out) = out {
        finder = finder.with_output(out);
    }
    if let Some(callback) = callback {
        finder = finder.with_callback(callback);
    }
    let mut scanner = SegmentSieve::new(chunk.start, chunk.stop, sieve_size, finder)
        .with_progress(Arc::clone(progress));
    generator::run(&mut scanner, chunk.stop);

    let mut finder = scanner.into_sink();
    finder.finish();
    if let Some(e) = finder.take_error() {
        return Err(SieveError::Io(e));
    }
    Ok(ChunkResult {
        counts: finder.counts(),
        first: finder.first_byte(),
        last: finder.last_byte(),
        stopped: finder.stopped(),
    })
}

fn build_pool(threads: usize) -> Result<rayon::ThreadPool, SieveError> {
    Ok(rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("primesift-{}", i))
        .build()?)
}

/// Count over `[start, stop]` (`start >= 7`) using up to `threads` workers.
pub fn count(
    start: u64,
    stop: u64,
    sieve_size: usize,
    flags: Flags,
    threads: usize,
    progress: &Arc<Progress>,
) -> Result<Counts, SieveError> {
    let chunks = plan_counting(start, stop, threads);
    debug!(start, stop, chunks = chunks.len(), threads, "planned counting chunks");

    let results: Vec<ChunkResult> = if chunks.len() == 1 {
        vec![run_chunk(chunks[0], sieve_size, flags, progress, None, None)?]
    } else {
        let pool = build_pool(threads.min(chunks.len()))?;
        pool.install(|| {
            chunks
                .par_iter()
                .map(|&chunk| run_chunk(chunk, sieve_size, flags, progress, None, None))
                .collect::<Result<Vec<_>, _>>()
        })?
    };

    let mut counts = Counts::default();
    let mut prev: Option<EdgeByte> = None;
    for r in &results {
        if let (Some(left), Some(right)) = (prev, r.first) {
            straddling_tuplets(flags, left, right, &mut counts, None)?;
        }
        counts += r.counts;
        prev = r.last;
    }
    Ok(counts)
}

/// Buffered output of one emission chunk.
struct ChunkOutput {
    result: Result<ChunkResult, SieveError>,
    text: Vec<u8>,
    primes: Vec<u64>,
}

/// Admission gate for emission workers: chunk `i` may start only while
/// `i < replayed + width`.
pub struct EmitWindow {
    replayed: Mutex<usize>,
    ready: Condvar,
    width: usize,
}

impl EmitWindow {
    pub fn new(width: usize) -> Self {
        EmitWindow {
            replayed: Mutex::new(0),
            ready: Condvar::new(),
            width: width.max(1),
        }
    }

    /// Block until chunk `i` is inside the window. Returns false if the
    /// sieve was cancelled meanwhile.
    pub fn admit(&self, i: usize, progress: &Progress) -> bool {
        let mut replayed = self.replayed.lock().unwrap_or_else(PoisonError::into_inner);
        while i >= *replayed + self.width {
            if progress.is_cancelled() {
                return false;
            }
            replayed = self.ready.wait(replayed).unwrap_or_else(PoisonError::into_inner);
        }
        !progress.is_cancelled()
    }

    /// Chunks `0..replayed` have been handed to the caller.
    pub fn advance(&self, replayed: usize) {
        *self.replayed.lock().unwrap_or_else(PoisonError::into_inner) = replayed;
        self.ready.notify_all();
    }

    /// Cancel the sieve and wake every waiting worker.
    pub fn cancel(&self, progress: &Progress) {
        let _guard = self.replayed.lock().unwrap_or_else(PoisonError::into_inner);
        progress.cancel();
        self.ready.notify_all();
    }
}

/// Sieve `[start, stop]` (`start >= 7`) and replay primes and printed text
/// in ascending order on the calling thread.
#[allow(clippy::too_many_arguments)]
pub fn emit<'a>(
    start: u64,
    stop: u64,
    sieve_size: usize,
    flags: Flags,
    threads: usize,
    progress: &Arc<Progress>,
    out: Option<&'a mut dyn Write>,
    callback: Option<PrimeCallback<'a>>,
) -> Result<Counts, SieveError> {
    let chunks = plan_emission(start, stop, threads);
    debug!(start, stop, chunks = chunks.len(), threads, "planned emission chunks");

    if chunks.len() == 1 {
        let r = run_chunk(chunks[0], sieve_size, flags, progress, out, callback)?;
        if r.stopped {
            progress.cancel();
        }
        return Ok(r.counts);
    }

    let workers = threads.min(chunks.len());
    let emitted = emit_chunks(&chunks, workers, sieve_size, flags, progress, out, callback)?;
    debug!(workers, peak_pending = emitted.peak_pending, "ordered emission finished");
    Ok(emitted.counts)
}

/// Result of [`emit_chunks`].
#[derive(Debug)]
pub struct Emitted {
    pub counts: Counts,
    /// Largest number of chunk buffers held for reordering at once.
    pub peak_pending: usize,
}

/// Sieve `chunks` on `workers` threads and replay them in order.
#[allow(clippy::too_many_arguments)]
pub fn emit_chunks<'a>(
    chunks: &[Chunk],
    workers: usize,
    sieve_size: usize,
    flags: Flags,
    progress: &Arc<Progress>,
    mut out: Option<&'a mut dyn Write>,
    mut callback: Option<PrimeCallback<'a>>,
) -> Result<Emitted, SieveError> {
    let workers = workers.clamp(1, chunks.len().max(1));
    let pool = build_pool(workers)?;
    let collect_primes = callback.is_some();
    let buffer_text = out.is_some() && flags.wants_print();
    let next = AtomicUsize::new(0);
    let window = EmitWindow::new(workers);
    let (tx, rx) = mpsc::sync_channel::<(usize, ChunkOutput)>(workers);

    let mut counts = Counts::default();
    let mut failure: Option<SieveError> = None;
    let mut peak_pending = 0;

    thread::scope(|scope| {
        let next = &next;
        let window = &window;
        let pool = &pool;
        let senders: Vec<_> = (0..workers).map(|_| tx.clone()).collect();
        drop(tx);
        scope.spawn(move || {
            pool.scope(|s| {
                for tx in senders {
                    s.spawn(move |_| loop {
                        let i = next.fetch_add(1, Ordering::Relaxed);
                        if i >= chunks.len() || !window.admit(i, progress) {
                            break;
                        }
                        let output = emit_chunk(chunks[i], sieve_size, flags, progress, buffer_text, collect_primes);
                        if tx.send((i, output)).is_err() {
                            break;
                        }
                    });
                }
            });
        });

        let mut pending: BTreeMap<usize, ChunkOutput> = BTreeMap::new();
        let mut expected = 0;
        let mut prev: Option<EdgeByte> = None;
        for (i, output) in rx.iter() {
            pending.insert(i, output);
            peak_pending = peak_pending.max(pending.len());
            while let Some(output) = pending.remove(&expected) {
                expected += 1;
                if failure.is_some() || progress.is_cancelled() {
                    continue;
                }
                match replay(output, flags, &mut prev, &mut counts, out.as_deref_mut(), callback.as_deref_mut()) {
                    Ok(ControlFlow::Continue(())) => {}
                    Ok(ControlFlow::Break(())) => window.cancel(progress),
                    Err(e) => {
                        failure = Some(e);
                        window.cancel(progress);
                    }
                }
            }
            window.advance(expected);
        }
    });

    match failure {
        Some(e) => Err(e),
        None => Ok(Emitted { counts, peak_pending }),
    }
}

fn emit_chunk(
    chunk: Chunk,
    sieve_size: usize,
    flags: Flags,
    progress: &Arc<Progress>,
    buffer_text: bool,
    collect_primes: bool,
) -> ChunkOutput {
    let mut text = Vec::new();
    let mut primes = Vec::new();
    let mut push = |p: u64| {
        primes.push(p);
        ControlFlow::Continue(())
    };
    let out: Option<&mut dyn Write> = if buffer_text { Some(&mut text) } else { None };
    let callback: Option<PrimeCallback<'_>> = if collect_primes { Some(&mut push) } else { None };
    let result = run_chunk(chunk, sieve_size, flags, progress, out, callback);
    ChunkOutput { result, text, primes }
}

fn replay<'a>(
    output: ChunkOutput,
    flags: Flags,
    prev: &mut Option<EdgeByte>,
    counts: &mut Counts,
    mut out: Option<&mut (dyn Write + 'a)>,
    callback: Option<&mut (dyn FnMut(u64) -> ControlFlow<()> + 'a)>,
) -> Result<ControlFlow<()>, SieveError> {
    let result = output.result?;
    if let (Some(left), Some(right)) = (*prev, result.first) {
        match out.as_mut() {
            Some(w) => straddling_tuplets(flags, left, right, counts, Some(&mut **w))?,
            None => straddling_tuplets(flags, left, right, counts, None)?,
        }
    }
    *counts += result.counts;
    *prev = result.last;

    if let Some(out) = out {
        out.write_all(&output.text)?;
    }
    if let Some(callback) = callback {
        for p in output.primes {
            if callback(p).is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
    }
    Ok(ControlFlow::Continue(()))
}
