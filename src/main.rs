//! # Main — CLI Entry Point
//!
//! Parses arguments, sets up logging and hands each subcommand to the
//! execution functions in `cli.rs`.
//!
//! ## Subcommands
//!
//! - `count`: count primes and/or k-tuplets in a range.
//! - `print`: print primes or one kind of k-tuplet, one per line.
//! - `nth`: find the n-th prime before or after a start value.
//! - `cpu-info`: show the detected cache sizes and thread counts.
//!
//! ## Global Options
//!
//! - `--threads` / `PRIMESIFT_THREADS`: worker threads (default: all CPUs).
//! - `--sieve-size` / `PRIMESIFT_SIEVE_SIZE`: segment size in KiB
//!   (default: chosen from the cache sizes).
//! - `--status`: print the completed percentage to stderr.
//! - `--time`: print the elapsed seconds.
//! - `--json`: machine-readable output for `count`, `nth` and `cpu-info`.
//!
//! Numbers accept `1e10`, `2^32` and `_` separators.

mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "primesift", version, about = "Count and print primes and prime k-tuplets")]
struct Cli {
    /// Number of worker threads (defaults to all logical CPUs)
    #[arg(long, short = 't', global = true, env = "PRIMESIFT_THREADS")]
    threads: Option<usize>,

    /// Segment size in KiB, rounded down to a power of 2 in [8, 4096]
    #[arg(long, short = 's', global = true, env = "PRIMESIFT_SIEVE_SIZE")]
    sieve_size: Option<u32>,

    /// Print the completed percentage to stderr
    #[arg(long, global = true)]
    status: bool,

    /// Print the elapsed time in seconds
    #[arg(long, global = true)]
    time: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count primes and prime k-tuplets in [START, STOP] (or [0, START])
    Count {
        #[arg(value_parser = cli::parse_number)]
        start: u64,
        #[arg(value_parser = cli::parse_number)]
        stop: Option<u64>,
        /// Kinds to count: 1 = primes, 2 = twins, ... 7 = septuplets
        #[arg(long, short = 'c', value_delimiter = ',', default_value = "1")]
        tuplets: Vec<usize>,
    },
    /// Print primes or prime k-tuplets in [START, STOP] (or [0, START])
    Print {
        #[arg(value_parser = cli::parse_number)]
        start: u64,
        #[arg(value_parser = cli::parse_number)]
        stop: Option<u64>,
        /// Kind to print: 1 = primes, 2 = twins, ... 7 = septuplets
        #[arg(long, short = 'p', default_value_t = 1)]
        tuplet: usize,
    },
    /// Find the N-th prime after START (before START if N < 0)
    Nth {
        #[arg(value_parser = cli::parse_signed, allow_hyphen_values = true)]
        n: i64,
        #[arg(value_parser = cli::parse_number, default_value = "0")]
        start: u64,
    },
    /// Show detected CPU cache sizes and thread counts
    CpuInfo,
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // LOG_FORMAT=json for log collectors, human-readable otherwise
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();

    match &cli.command {
        Commands::Count { start, stop, tuplets } => cli::run_count(&cli, *start, *stop, tuplets),
        Commands::Print { start, stop, tuplet } => cli::run_print(&cli, *start, *stop, *tuplet),
        Commands::Nth { n, start } => cli::run_nth(&cli, *n, *start),
        Commands::CpuInfo => cli::run_cpu_info(&cli),
    }
}
