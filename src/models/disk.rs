// Partition and disk I/O record shapes

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartitionUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

/// One mounted partition. `usage` is None for pseudo-filesystems where
/// usage cannot be measured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartitionRecord {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
    pub usage: Option<PartitionUsage>,
}

/// Cumulative per-device (or overall) I/O counters since boot.
/// Times are milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskIoRecord {
    pub read_count: u64,
    pub write_count: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_time: u64,
    pub write_time: u64,
    pub busy_time: u64,
    pub read_merged_count: u64,
    pub write_merged_count: u64,
}

impl DiskIoRecord {
    pub fn add(&mut self, other: &DiskIoRecord) {
        self.read_count += other.read_count;
        self.write_count += other.write_count;
        self.read_bytes += other.read_bytes;
        self.write_bytes += other.write_bytes;
        self.read_time += other.read_time;
        self.write_time += other.write_time;
        self.busy_time += other.busy_time;
        self.read_merged_count += other.read_merged_count;
        self.write_merged_count += other.write_merged_count;
    }
}
