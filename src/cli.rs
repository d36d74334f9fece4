//! # CLI Execution Functions
//!
//! Extracted from `main.rs` to keep the entry point slim: number parsing,
//! settings resolution and one `run_*` function per subcommand. Library
//! errors are wrapped with `anyhow` context here and nowhere else.

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use primesift::{cpu_info, nth_prime, Counts, Flags, Settings, Sieve, SieveConfig, TupletKind};
use serde::Serialize;
use tracing::info;

use super::Cli;

// ── Argument Parsing ────────────────────────────────────────────

/// Parse a non-negative number: `1000000`, `1_000_000`, `1e6`, `2^20`.
pub fn parse_number(s: &str) -> Result<u64, String> {
    let t: String = s.trim().chars().filter(|&c| c != '_').collect();
    let invalid = || format!("invalid number '{}'", s);

    if let Some((base, exp)) = t.split_once('^') {
        let base: u64 = base.parse().map_err(|_| invalid())?;
        let exp: u32 = exp.parse().map_err(|_| invalid())?;
        return base.checked_pow(exp).ok_or_else(|| format!("'{}' does not fit in 64 bits", s));
    }
    if let Some((mantissa, exp)) = t.split_once(['e', 'E']) {
        let mantissa: u64 = mantissa.parse().map_err(|_| invalid())?;
        let exp: u32 = exp.parse().map_err(|_| invalid())?;
        return 10u64
            .checked_pow(exp)
            .and_then(|p| p.checked_mul(mantissa))
            .ok_or_else(|| format!("'{}' does not fit in 64 bits", s));
    }
    t.parse().map_err(|_| invalid())
}

/// Parse a possibly negative number in the same notations.
pub fn parse_signed(s: &str) -> Result<i64, String> {
    let (negative, magnitude) = match s.trim().strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.trim()),
    };
    let value = parse_number(magnitude)?;
    let value = i64::try_from(value).map_err(|_| format!("'{}' is out of range", s))?;
    Ok(if negative { -value } else { value })
}

/// `[start, stop]`, or `[0, start]` when only one bound is given.
fn range(start: u64, stop: Option<u64>) -> (u64, u64) {
    match stop {
        Some(stop) => (start, stop),
        None => (0, start),
    }
}

fn settings(cli: &Cli) -> Settings {
    let mut settings = Settings::new();
    if let Some(kib) = cli.sieve_size {
        settings = settings.with_sieve_size(kib);
    }
    if let Some(threads) = cli.threads {
        settings = settings.with_threads(threads);
    }
    settings
}

/// Map 1-based kind numbers (1 = primes … 7 = septuplets) to kinds.
fn tuplet_kinds(numbers: &[usize]) -> Result<Vec<TupletKind>> {
    let mut kinds = Vec::new();
    for &n in numbers {
        let kind = n
            .checked_sub(1)
            .ok_or(primesift::SieveError::InvalidTupletIndex { index: n })
            .and_then(TupletKind::from_index)
            .with_context(|| format!("unknown tuplet kind {} (expected 1..=7)", n))?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

// ── count ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct CountReport {
    start: u64,
    stop: u64,
    counts: Vec<CountEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seconds: Option<f64>,
}

#[derive(Serialize)]
struct CountEntry {
    kind: &'static str,
    count: u64,
}

pub fn run_count(cli: &Cli, start: u64, stop: Option<u64>, tuplets: &[usize]) -> Result<()> {
    let (start, stop) = range(start, stop);
    let kinds = tuplet_kinds(tuplets)?;
    let mut flags = Flags::NONE;
    for &kind in &kinds {
        flags |= Flags::count(kind);
    }
    if cli.status {
        flags |= Flags::PRINT_STATUS;
    }

    let config = SieveConfig::new(start, stop, flags).with_settings(&settings(cli));
    info!(start, stop, sieve_kib = config.sieve_size_kib, threads = config.threads, "counting");
    let result = Sieve::new(config)
        .and_then(|s| s.run())
        .with_context(|| format!("failed to count in [{}, {}]", start, stop))?;

    let mut out = io::stdout().lock();
    if cli.json {
        let report = CountReport {
            start,
            stop,
            counts: entries(&kinds, &result.counts),
            seconds: cli.time.then_some(result.seconds),
        };
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    } else {
        for &kind in &kinds {
            writeln!(out, "{}: {}", kind.name(), result.counts[kind])?;
        }
        if cli.time {
            writeln!(out, "Seconds: {:.3}", result.seconds)?;
        }
    }
    Ok(())
}

fn entries(kinds: &[TupletKind], counts: &Counts) -> Vec<CountEntry> {
    kinds
        .iter()
        .map(|&kind| CountEntry {
            kind: kind.key(),
            count: counts[kind],
        })
        .collect()
}

// ── print ───────────────────────────────────────────────────────

pub fn run_print(cli: &Cli, start: u64, stop: Option<u64>, tuplet: usize) -> Result<()> {
    let (start, stop) = range(start, stop);
    let kind = tuplet_kinds(&[tuplet])?[0];
    let mut flags = Flags::print(kind);
    if cli.status {
        flags |= Flags::PRINT_STATUS;
    }
    if cli.json {
        bail!("--json is not supported by print");
    }

    let config = SieveConfig::new(start, stop, flags).with_settings(&settings(cli));
    let sieve = Sieve::new(config).with_context(|| format!("invalid range [{}, {}]", start, stop))?;
    let result = sieve.run().context("failed to print")?;
    if cli.time {
        eprintln!("Seconds: {:.3}", result.seconds);
    }
    Ok(())
}

// ── nth ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct NthReport {
    n: i64,
    start: u64,
    prime: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    seconds: Option<f64>,
}

pub fn run_nth(cli: &Cli, n: i64, start: u64) -> Result<()> {
    let clock = std::time::Instant::now();
    let prime = nth_prime::nth_prime(n, start, &settings(cli))
        .with_context(|| format!("failed to find nth prime (n = {}, start = {})", n, start))?;
    let seconds = clock.elapsed().as_secs_f64();

    let mut out = io::stdout().lock();
    if cli.json {
        let report = NthReport {
            n,
            start,
            prime,
            seconds: cli.time.then_some(seconds),
        };
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    } else {
        writeln!(out, "Nth prime: {}", prime)?;
        if cli.time {
            writeln!(out, "Seconds: {:.3}", seconds)?;
        }
    }
    Ok(())
}

// ── cpu-info ────────────────────────────────────────────────────

pub fn run_cpu_info(cli: &Cli) -> Result<()> {
    let cpu = cpu_info::cpu_info();
    let mut out = io::stdout().lock();
    if cli.json {
        serde_json::to_writer_pretty(&mut out, cpu)?;
        writeln!(out)?;
        return Ok(());
    }

    let unknown = || "unknown".to_string();
    let kib = |b: Option<u64>| b.map(|b| format!("{} KiB", b >> 10)).unwrap_or_else(unknown);
    let num = |n: Option<usize>| n.map(|n| n.to_string()).unwrap_or_else(unknown);

    writeln!(out, "CPU name: {}", cpu.brand().unwrap_or("unknown"))?;
    writeln!(out, "Logical CPU cores: {}", num(cpu.threads()))?;
    writeln!(out, "Threads per core: {}", num(cpu.threads_per_core()))?;
    writeln!(out, "L1 cache size: {}", kib(cpu.l1_cache_size()))?;
    writeln!(out, "L2 cache size: {}", kib(cpu.l2_cache_size()))?;
    writeln!(out, "L2 cache sharing: {} threads", num(cpu.l2_sharing()))?;
    writeln!(out, "L2 cache private: {}", if cpu.has_private_l2_cache() { "yes" } else { "no" })?;
    writeln!(
        out,
        "Recommended sieve size: {} KiB",
        primesift::config::recommended_sieve_size(cpu)
    )?;
    if let Some(err) = cpu.error() {
        writeln!(out, "Note: {}", err)?;
    }
    Ok(())
}
