// CPU time buckets, kernel counters, frequency record shapes

use serde::{Deserialize, Serialize};

/// Accumulated time-in-state buckets, seconds since boot. Aggregate or
/// per-CPU depending on the query. Buckets the platform does not report
/// stay at zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuTimesBuckets {
    pub user: f64,
    pub nice: f64,
    pub system: f64,
    pub idle: f64,
    pub iowait: f64,
    pub irq: f64,
    pub softirq: f64,
    pub steal: f64,
    pub guest: f64,
    pub guest_nice: f64,
}

impl CpuTimesBuckets {
    pub fn total(&self) -> f64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }
}

/// Kernel-wide event counters (cumulative since boot).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuCounters {
    pub ctx_switches: u64,
    pub interrupts: u64,
    pub soft_interrupts: u64,
    pub syscalls: u64,
}

/// Frequency in MHz. min/max are zero when cpufreq is not exposed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuFreqStats {
    pub current: f64,
    pub min: f64,
    pub max: f64,
}
