// OS telemetry source backed by sysinfo plus procfs/sysfs helpers.

mod linux;
mod registry;

pub use registry::{QueryArgs, QueryFn, QueryRegistry};

use crate::error::SourceQueryError;
use crate::models::*;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysinfo::{Disks, Networks, System};

/// Holds the sysinfo handles behind mutexes; every query is synchronous
/// and runs under spawn_blocking in the workers. Interval-windowed CPU
/// queries block for their window - an intentional, bounded blocking call
/// counted as sampling work. The locks are only held for the reads, never
/// across the window.
pub struct SysinfoSource {
    sys: Mutex<System>,
    disks: Mutex<Disks>,
    networks: Mutex<Networks>,
    cpu_window: Duration,
}

fn to_value<T: serde::Serialize>(query: &str, value: &T) -> Result<Value, SourceQueryError> {
    serde_json::to_value(value).map_err(|e| SourceQueryError::new(query, e.to_string()))
}

fn lock_poisoned(query: &str) -> SourceQueryError {
    SourceQueryError::new(query, "sysinfo lock poisoned")
}

impl SysinfoSource {
    pub fn new(cpu_window: Duration) -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();
        let disks = Disks::new_with_refreshed_list();
        let networks = Networks::new_with_refreshed_list();
        Self {
            sys: Mutex::new(sys),
            disks: Mutex::new(disks),
            networks: Mutex::new(networks),
            cpu_window,
        }
    }

    fn virtual_memory(&self, _args: &QueryArgs) -> Result<Value, SourceQueryError> {
        let mut sys = self.sys.lock().map_err(|_| lock_poisoned("virtual_memory"))?;
        sys.refresh_memory();
        let total = sys.total_memory();
        let available = sys.available_memory();
        let percent = if total > 0 {
            ((total - available.min(total)) as f64 / total as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };
        let (shared, buffers, cached) = linux::meminfo_extras();
        to_value(
            "virtual_memory",
            &VirtualMemoryStats {
                total,
                available,
                percent,
                used: sys.used_memory(),
                free: sys.free_memory(),
                shared,
                buffers,
                cached,
            },
        )
    }

    fn swap_memory(&self, _args: &QueryArgs) -> Result<Value, SourceQueryError> {
        let mut sys = self.sys.lock().map_err(|_| lock_poisoned("swap_memory"))?;
        sys.refresh_memory();
        let total = sys.total_swap();
        let used = sys.used_swap();
        let percent = if total > 0 {
            (used as f64 / total as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };
        to_value(
            "swap_memory",
            &SwapStats {
                total,
                used,
                free: sys.free_swap(),
                percent,
            },
        )
    }

    fn cpu_times(&self, _args: &QueryArgs) -> Result<Value, SourceQueryError> {
        to_value("cpu_times", &linux::cpu_times_aggregate())
    }

    /// Per-bucket percentages over a sampling window: two /proc/stat reads
    /// `interval` seconds apart.
    fn cpu_times_percent(&self, args: &QueryArgs) -> Result<Value, SourceQueryError> {
        let window = self.window_from(args);
        let percpu = args.kwarg_bool("percpu", false);
        let before = linux::cpu_times_percpu();
        std::thread::sleep(window);
        let after = linux::cpu_times_percpu();
        let per_cpu: Vec<CpuTimesBuckets> = after
            .iter()
            .zip(before.iter())
            .map(|(a, b)| bucket_percentages(a, b))
            .collect();
        if percpu {
            to_value("cpu_times_percent", &per_cpu)
        } else {
            let mut aggregate = CpuTimesBuckets::default();
            let n = per_cpu.len().max(1) as f64;
            for cpu in &per_cpu {
                aggregate.user += cpu.user / n;
                aggregate.nice += cpu.nice / n;
                aggregate.system += cpu.system / n;
                aggregate.idle += cpu.idle / n;
                aggregate.iowait += cpu.iowait / n;
                aggregate.irq += cpu.irq / n;
                aggregate.softirq += cpu.softirq / n;
                aggregate.steal += cpu.steal / n;
                aggregate.guest += cpu.guest / n;
                aggregate.guest_nice += cpu.guest_nice / n;
            }
            to_value("cpu_times_percent", &aggregate)
        }
    }

    fn cpu_stats(&self, _args: &QueryArgs) -> Result<Value, SourceQueryError> {
        to_value("cpu_stats", &linux::proc_stat_counters())
    }

    fn cpu_percent(&self, args: &QueryArgs) -> Result<Value, SourceQueryError> {
        let window = self.window_from(args).max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        let percpu = args.kwarg_bool("percpu", false);
        // The lock is released during the window so other queries are not
        // stalled behind the sleep.
        {
            let mut sys = self.sys.lock().map_err(|_| lock_poisoned("cpu_percent"))?;
            sys.refresh_cpu_all();
        }
        std::thread::sleep(window);
        let mut sys = self.sys.lock().map_err(|_| lock_poisoned("cpu_percent"))?;
        sys.refresh_cpu_all();
        if percpu {
            let usage: Vec<f64> = sys
                .cpus()
                .iter()
                .map(|c| (c.cpu_usage() as f64).clamp(0.0, 100.0))
                .collect();
            to_value("cpu_percent", &usage)
        } else {
            to_value(
                "cpu_percent",
                &(sys.global_cpu_usage() as f64).clamp(0.0, 100.0),
            )
        }
    }

    fn cpu_count(&self, args: &QueryArgs) -> Result<Value, SourceQueryError> {
        let logical = args.kwarg_bool("logical", true);
        let count = if logical {
            let sys = self.sys.lock().map_err(|_| lock_poisoned("cpu_count"))?;
            sys.cpus().len()
        } else {
            System::physical_core_count().unwrap_or(0)
        };
        Ok(Value::from(count as u64))
    }

    fn cpu_freq(&self, args: &QueryArgs) -> Result<Value, SourceQueryError> {
        let percpu = args.kwarg_bool("percpu", false);
        let sys = self.sys.lock().map_err(|_| lock_poisoned("cpu_freq"))?;
        let per_cpu: Vec<CpuFreqStats> = sys
            .cpus()
            .iter()
            .enumerate()
            .map(|(i, cpu)| {
                let (min, max) = linux::cpufreq_min_max(i);
                CpuFreqStats {
                    current: cpu.frequency() as f64,
                    min,
                    max,
                }
            })
            .collect();
        if percpu {
            to_value("cpu_freq", &per_cpu)
        } else {
            let n = per_cpu.len().max(1) as f64;
            let current = per_cpu.iter().map(|f| f.current).sum::<f64>() / n;
            let (min, max) = per_cpu
                .first()
                .map(|f| (f.min, f.max))
                .unwrap_or((0.0, 0.0));
            to_value("cpu_freq", &CpuFreqStats { current, min, max })
        }
    }

    fn load_average(&self, _args: &QueryArgs) -> Result<Value, SourceQueryError> {
        let load = System::load_average();
        to_value("load_average", &[load.one, load.five, load.fifteen])
    }

    fn disk_partitions(&self, args: &QueryArgs) -> Result<Value, SourceQueryError> {
        let all = args.kwarg_bool("all", false);
        let mut disks = self
            .disks
            .lock()
            .map_err(|_| lock_poisoned("disk_partitions"))?;
        disks.refresh(false);
        let physical: Vec<PartitionRecord> = disks
            .list()
            .iter()
            .map(|d| PartitionRecord {
                device: d.name().to_string_lossy().into_owned(),
                mountpoint: d.mount_point().to_string_lossy().into_owned(),
                fstype: d.file_system().to_string_lossy().into_owned(),
                usage: Some(disk_usage_of(d)),
            })
            .collect();
        if !all {
            return to_value("disk_partitions", &physical);
        }
        // Every mount, pseudo-filesystems included; usage filled in where a
        // physical partition matches the mountpoint.
        let mut records = linux::mounts_all();
        if records.is_empty() {
            records = physical.clone();
        } else {
            for record in &mut records {
                record.usage = physical
                    .iter()
                    .find(|p| p.mountpoint == record.mountpoint)
                    .and_then(|p| p.usage.clone());
            }
        }
        to_value("disk_partitions", &records)
    }

    fn disk_usage(&self, args: &QueryArgs) -> Result<Value, SourceQueryError> {
        let Some(path) = args.arg_str(0) else {
            return Err(SourceQueryError::new("disk_usage", "missing path argument"));
        };
        let mut disks = self.disks.lock().map_err(|_| lock_poisoned("disk_usage"))?;
        disks.refresh(false);
        let disk = disks
            .list()
            .iter()
            .find(|d| d.mount_point().to_string_lossy() == path)
            .ok_or_else(|| SourceQueryError::new("disk_usage", format!("no partition mounted at '{path}'")))?;
        to_value("disk_usage", &disk_usage_of(disk))
    }

    fn disk_io_counters(&self, args: &QueryArgs) -> Result<Value, SourceQueryError> {
        let perdisk = args.kwarg_bool("perdisk", false);
        let counters = linux::diskstats();
        if perdisk {
            let mut map = Map::new();
            for (device, record) in &counters {
                map.insert(device.clone(), to_value("disk_io_counters", record)?);
            }
            Ok(Value::Object(map))
        } else {
            let mut overall = DiskIoRecord::default();
            for (_, record) in &counters {
                overall.add(record);
            }
            to_value("disk_io_counters", &overall)
        }
    }

    fn net_io_counters(&self, args: &QueryArgs) -> Result<Value, SourceQueryError> {
        let pernic = args.kwarg_bool("pernic", false);
        let mut networks = self
            .networks
            .lock()
            .map_err(|_| lock_poisoned("net_io_counters"))?;
        networks.refresh(true);
        if pernic {
            let mut map = Map::new();
            for (name, data) in networks.list() {
                map.insert(name.clone(), to_value("net_io_counters", &net_io_of(data))?);
            }
            Ok(Value::Object(map))
        } else {
            let mut overall = NetIoRecord::default();
            for (_, data) in networks.list() {
                overall.add(&net_io_of(data));
            }
            to_value("net_io_counters", &overall)
        }
    }

    fn net_if_addrs(&self, _args: &QueryArgs) -> Result<Value, SourceQueryError> {
        let mut networks = self
            .networks
            .lock()
            .map_err(|_| lock_poisoned("net_if_addrs"))?;
        networks.refresh(true);
        let mut map = Map::new();
        for (name, data) in networks.list() {
            let mut addrs = Vec::new();
            let mac = data.mac_address().to_string();
            if mac != "00:00:00:00:00:00" {
                addrs.push(IfAddrRecord {
                    family: "link".into(),
                    address: mac,
                    prefix: None,
                });
            }
            for ip in data.ip_networks() {
                addrs.push(IfAddrRecord {
                    family: if ip.addr.is_ipv4() { "inet" } else { "inet6" }.into(),
                    address: ip.addr.to_string(),
                    prefix: Some(ip.prefix),
                });
            }
            map.insert(name.clone(), to_value("net_if_addrs", &addrs)?);
        }
        Ok(Value::Object(map))
    }

    fn net_if_stats(&self, _args: &QueryArgs) -> Result<Value, SourceQueryError> {
        let mut networks = self
            .networks
            .lock()
            .map_err(|_| lock_poisoned("net_if_stats"))?;
        networks.refresh(true);
        let mut map = Map::new();
        for (name, data) in networks.list() {
            let stats = IfStatsRecord {
                isup: linux::interface_is_up(name),
                speed: linux::interface_speed(name),
                mtu: data.mtu(),
            };
            map.insert(name.clone(), to_value("net_if_stats", &stats)?);
        }
        Ok(Value::Object(map))
    }

    fn net_connections(&self, args: &QueryArgs) -> Result<Value, SourceQueryError> {
        let kind = args.kwarg_str("kind", "inet");
        to_value("net_connections", &linux::net_connections(kind))
    }

    fn window_from(&self, args: &QueryArgs) -> Duration {
        let secs = args.kwarg_u64("interval", 0);
        if secs > 0 {
            Duration::from_secs(secs)
        } else {
            self.cpu_window
        }
    }
}

fn disk_usage_of(disk: &sysinfo::Disk) -> PartitionUsage {
    let total = disk.total_space();
    let free = disk.available_space();
    let used = total.saturating_sub(free);
    PartitionUsage {
        total,
        used,
        free,
        percent: if total > 0 {
            (used as f64 / total as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        },
    }
}

fn net_io_of(data: &sysinfo::NetworkData) -> NetIoRecord {
    NetIoRecord {
        bytes_sent: data.total_transmitted(),
        bytes_recv: data.total_received(),
        packets_sent: data.total_packets_transmitted(),
        packets_recv: data.total_packets_received(),
        errin: data.total_errors_on_received(),
        errout: data.total_errors_on_transmitted(),
        // sysinfo does not expose drop counters.
        dropin: 0,
        dropout: 0,
    }
}

fn bucket_percentages(after: &CpuTimesBuckets, before: &CpuTimesBuckets) -> CpuTimesBuckets {
    let total = (after.total() - before.total()).max(0.0);
    if total <= 0.0 {
        return CpuTimesBuckets::default();
    }
    let pct = |a: f64, b: f64| ((a - b).max(0.0) / total * 1000.0).round() / 10.0;
    CpuTimesBuckets {
        user: pct(after.user, before.user),
        nice: pct(after.nice, before.nice),
        system: pct(after.system, before.system),
        idle: pct(after.idle, before.idle),
        iowait: pct(after.iowait, before.iowait),
        irq: pct(after.irq, before.irq),
        softirq: pct(after.softirq, before.softirq),
        steal: pct(after.steal, before.steal),
        guest: pct(after.guest, before.guest),
        guest_nice: pct(after.guest_nice, before.guest_nice),
    }
}

/// Bind every OS query to its name. Metric specs are validated against
/// this registry before any background task spawns.
pub fn build_registry(source: &Arc<SysinfoSource>) -> QueryRegistry {
    let mut registry = QueryRegistry::new();
    macro_rules! bind {
        ($name:literal, $method:ident) => {{
            let src = Arc::clone(source);
            registry.register($name, move |args| src.$method(args));
        }};
    }
    bind!("virtual_memory", virtual_memory);
    bind!("swap_memory", swap_memory);
    bind!("cpu_times", cpu_times);
    bind!("cpu_times_percent", cpu_times_percent);
    bind!("cpu_stats", cpu_stats);
    bind!("cpu_percent", cpu_percent);
    bind!("cpu_count", cpu_count);
    bind!("cpu_freq", cpu_freq);
    bind!("load_average", load_average);
    bind!("disk_partitions", disk_partitions);
    bind!("disk_usage", disk_usage);
    bind!("disk_io_counters", disk_io_counters);
    bind!("net_io_counters", net_io_counters);
    bind!("net_if_addrs", net_if_addrs);
    bind!("net_if_stats", net_if_stats);
    bind!("net_connections", net_connections);
    registry
}
