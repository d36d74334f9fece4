//! # Progress — Atomic Sieve Progress and Cancellation
//!
//! Thread-safe progress shared by every scanner of one sieve call. Workers
//! add the count of numbers they finished after each segment; the total is
//! known up front, so the completed percentage is monotonically
//! non-decreasing no matter which worker reports.
//!
//! ## Status Output
//!
//! With status printing enabled, `\rNN%` is written to stderr whenever the
//! integer percentage increases. Independently, [`Progress::log_summary`]
//! emits one structured `tracing` event with the rate and elapsed time when
//! a sieve call ends.
//!
//! ## Cancellation
//!
//! The `cancelled` flag is checked by scanners between segments. Setting it
//! (an early-stop callback, an nth-prime search that has found its answer)
//! makes every worker finish its current segment and stop.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub struct Progress {
    processed: AtomicU64,
    total: u64,
    percent: AtomicU64,
    print_status: bool,
    cancelled: AtomicBool,
    start: Instant,
}

impl Progress {
    pub fn new(total: u64, print_status: bool) -> Arc<Self> {
        Arc::new(Progress {
            processed: AtomicU64::new(0),
            total: total.max(1),
            percent: AtomicU64::new(0),
            print_status,
            cancelled: AtomicBool::new(false),
            start: Instant::now(),
        })
    }

    /// Record `numbers` more numbers as sieved.
    pub fn advance(&self, numbers: u64) {
        let done = self.processed.fetch_add(numbers, Ordering::Relaxed) + numbers;
        if self.print_status {
            let pct = percent_of(done, self.total);
            let prev = self.percent.fetch_max(pct, Ordering::Relaxed);
            if pct > prev {
                let mut err = std::io::stderr().lock();
                let _ = write!(err, "\r{}%", pct);
                let _ = err.flush();
            }
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn percent(&self) -> u64 {
        percent_of(self.processed(), self.total)
    }

    /// Print the final `100%` line if status output is on.
    pub fn finish(&self) {
        if self.print_status && !self.is_cancelled() {
            let prev = self.percent.swap(100, Ordering::Relaxed);
            let mut err = std::io::stderr().lock();
            if prev < 100 {
                let _ = write!(err, "\r100%");
            }
            let _ = writeln!(err);
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn log_summary(&self) {
        let elapsed = self.start.elapsed();
        let processed = self.processed();
        let rate = if elapsed.as_secs_f64() > 0.0 {
            processed as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        let h = elapsed.as_secs() / 3600;
        let m = (elapsed.as_secs() % 3600) / 60;
        let s = elapsed.as_secs() % 60;
        debug!(
            processed,
            total = self.total,
            percent = self.percent(),
            rate = format_args!("{:.3e}", rate),
            elapsed = format_args!("{:02}:{:02}:{:02}", h, m, s),
            "sieve finished"
        );
    }
}

fn percent_of(done: u64, total: u64) -> u64 {
    ((done.min(total) as u128 * 100) / total as u128) as u64
}
