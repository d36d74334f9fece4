//! # CPU Info — Cache and Thread Detection
//!
//! Detected once per process (see [`cpu_info`]) and used to pick a default
//! segment size and thread count. Detection never fails a sieve call: any
//! value that cannot be read stays `None` and the first cause is kept in
//! [`CpuInfo::error`].
//!
//! ## Sources
//!
//! | Value | Source |
//! |-------|--------|
//! | Brand, logical CPUs | `sysinfo::System::cpus()` |
//! | L1d / L2 size | `/sys/devices/system/cpu/cpu0/cache/index*/size` |
//! | L2 sharing | `shared_cpu_list`, else `shared_cpu_map` |
//! | Threads per core | `/sys/devices/system/cpu/cpu0/topology/thread_siblings_list` |
//!
//! Cache sizes other than on Linux are reported as unknown.

use std::sync::OnceLock;

use serde::Serialize;
use sysinfo::System;
use tracing::debug;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CpuInfo {
    brand: Option<String>,
    /// L1 data cache size in bytes.
    l1_cache_size: Option<u64>,
    /// L2 cache size in bytes.
    l2_cache_size: Option<u64>,
    /// Logical CPUs sharing one L2 cache.
    l2_sharing: Option<usize>,
    threads_per_core: Option<usize>,
    threads: Option<usize>,
    error: Option<String>,
}

static CPU_INFO: OnceLock<CpuInfo> = OnceLock::new();

/// The process-wide CPU description, detected on first use.
pub fn cpu_info() -> &'static CpuInfo {
    CPU_INFO.get_or_init(CpuInfo::detect)
}

impl CpuInfo {
    /// Build from known values; cache sizes in bytes.
    pub fn from_parts(
        l1_cache_size: Option<u64>,
        l2_cache_size: Option<u64>,
        l2_sharing: Option<usize>,
        threads_per_core: Option<usize>,
        threads: Option<usize>,
    ) -> Self {
        CpuInfo {
            l1_cache_size,
            l2_cache_size,
            l2_sharing,
            threads_per_core,
            threads,
            ..CpuInfo::default()
        }
    }

    pub fn detect() -> Self {
        let mut info = CpuInfo::default();

        let mut sys = System::new();
        sys.refresh_cpu_all();
        let cpus = sys.cpus();
        if !cpus.is_empty() {
            info.threads = Some(cpus.len());
            let brand = cpus[0].brand().trim();
            if !brand.is_empty() {
                info.brand = Some(brand.to_string());
            }
        } else if let Ok(n) = std::thread::available_parallelism() {
            info.threads = Some(n.get());
        }

        info.detect_caches();

        if let Some(err) = &info.error {
            debug!(error = %err, "cpu detection incomplete");
        }
        debug!(
            brand = info.brand.as_deref().unwrap_or("unknown"),
            l1 = ?info.l1_cache_size,
            l2 = ?info.l2_cache_size,
            l2_sharing = ?info.l2_sharing,
            threads = ?info.threads,
            "cpu detected"
        );
        info
    }

    #[cfg(target_os = "linux")]
    fn detect_caches(&mut self) {
        let base = std::path::Path::new("/sys/devices/system/cpu/cpu0");
        let read = |rel: &str| -> Option<String> {
            std::fs::read_to_string(base.join(rel)).ok().map(|s| s.trim().to_string())
        };

        for index in 0..8 {
            let dir = format!("cache/index{}", index);
            let Some(level) = read(&format!("{}/level", dir)) else {
                break;
            };
            let kind = read(&format!("{}/type", dir)).unwrap_or_default();
            if kind == "Instruction" {
                continue;
            }
            let size = read(&format!("{}/size", dir)).and_then(|s| parse_cache_size(&s));
            match level.as_str() {
                "1" => self.l1_cache_size = size,
                "2" => {
                    self.l2_cache_size = size;
                    self.l2_sharing = read(&format!("{}/shared_cpu_list", dir))
                        .and_then(|s| parse_thread_list(&s))
                        .or_else(|| read(&format!("{}/shared_cpu_map", dir)).and_then(|s| parse_thread_map(&s)));
                }
                _ => {}
            }
        }
        self.threads_per_core = read("topology/thread_siblings_list").and_then(|s| parse_thread_list(&s));

        if self.l1_cache_size.is_none() {
            self.error = Some(format!("no L1 data cache size under {}", base.display()));
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn detect_caches(&mut self) {
        self.error = Some("cache detection is only supported on Linux".to_string());
    }

    pub fn brand(&self) -> Option<&str> {
        self.brand.as_deref()
    }

    pub fn l1_cache_size(&self) -> Option<u64> {
        self.l1_cache_size
    }

    pub fn l2_cache_size(&self) -> Option<u64> {
        self.l2_cache_size
    }

    pub fn l2_sharing(&self) -> Option<usize> {
        self.l2_sharing
    }

    pub fn threads_per_core(&self) -> Option<usize> {
        self.threads_per_core
    }

    pub fn threads(&self) -> Option<usize> {
        self.threads
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True if each physical core has its own L2 cache, i.e. no more
    /// logical CPUs share an L2 than run on one core.
    pub fn has_private_l2_cache(&self) -> bool {
        match (self.l2_sharing, self.threads_per_core) {
            (Some(sharing), Some(per_core)) => (1..=per_core).contains(&sharing),
            (Some(sharing), None) => sharing == 1,
            _ => false,
        }
    }
}

/// Parse a sysfs cache size such as `32K`, `1024K`, `8M` or `512`.
pub fn parse_cache_size(s: &str) -> Option<u64> {
    let s = s.trim();
    let (digits, multiplier) = match s.chars().last()? {
        'K' | 'k' => (&s[..s.len() - 1], 1u64 << 10),
        'M' | 'm' => (&s[..s.len() - 1], 1 << 20),
        'G' | 'g' => (&s[..s.len() - 1], 1 << 30),
        _ => (s, 1),
    };
    digits.trim().parse::<u64>().ok()?.checked_mul(multiplier)
}

/// Count the CPUs in a list such as `0-3,8,10-11`.
pub fn parse_thread_list(s: &str) -> Option<usize> {
    let mut count = 0;
    for part in s.trim().split(',').filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((a, b)) => {
                let a: usize = a.trim().parse().ok()?;
                let b: usize = b.trim().parse().ok()?;
                if b < a {
                    return None;
                }
                count += b - a + 1;
            }
            None => {
                part.trim().parse::<usize>().ok()?;
                count += 1;
            }
        }
    }
    (count > 0).then_some(count)
}

/// Count the set bits in a hex CPU map such as `00000000,000000ff`.
pub fn parse_thread_map(s: &str) -> Option<usize> {
    let mut count = 0;
    for word in s.trim().split(',') {
        count += u32::from_str_radix(word, 16).ok()?.count_ones() as usize;
    }
    (count > 0).then_some(count)
}
