// Virtual memory and swap record shapes

use serde::{Deserialize, Serialize};

/// Fields match the `virtual_memory` query attributes. Cache-like fields
/// (shared/buffers/cached) come from /proc/meminfo and are zero where the
/// platform does not expose them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VirtualMemoryStats {
    pub total: u64,
    pub available: u64,
    pub percent: f64,
    pub used: u64,
    pub free: u64,
    pub shared: u64,
    pub buffers: u64,
    pub cached: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwapStats {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}
