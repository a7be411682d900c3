// Typed record shapes for the OS queries. Each query binds one of these
// and converts to a plain JSON value at the registry boundary, so sampler
// output never carries language-level structured types.

mod cpu;
mod disk;
mod memory;
mod network;

pub use cpu::{CpuCounters, CpuFreqStats, CpuTimesBuckets};
pub use disk::{DiskIoRecord, PartitionRecord, PartitionUsage};
pub use memory::{SwapStats, VirtualMemoryStats};
pub use network::{AddrPort, ConnectionRecord, IfAddrRecord, IfStatsRecord, NetIoRecord};
