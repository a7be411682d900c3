// Linux-specific helpers: /proc/stat, /proc/meminfo, /proc/diskstats,
// /proc/mounts, /proc/net sockets, sysfs link state.
// Non-Linux builds get well-defined empty/default records.

use crate::models::{AddrPort, ConnectionRecord, CpuCounters, CpuTimesBuckets, DiskIoRecord, PartitionRecord};

/// USER_HZ ticks per second; /proc/stat cpu times are reported in ticks.
#[cfg(target_os = "linux")]
const CLOCK_TICKS: f64 = 100.0;

/// shared/buffers/cached bytes from /proc/meminfo (sysinfo does not expose them).
pub(super) fn meminfo_extras() -> (u64, u64, u64) {
    #[cfg(target_os = "linux")]
    {
        let Ok(content) = std::fs::read_to_string("/proc/meminfo") else {
            return (0, 0, 0);
        };
        let mut shared = 0u64;
        let mut buffers = 0u64;
        let mut cached = 0u64;
        for line in content.lines() {
            let kib = |l: &str| {
                l.split_whitespace()
                    .nth(1)
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(|v| v * 1024)
                    .unwrap_or(0)
            };
            if line.starts_with("Shmem:") {
                shared = kib(line);
            } else if line.starts_with("Buffers:") {
                buffers = kib(line);
            } else if line.starts_with("Cached:") {
                cached = kib(line);
            }
        }
        (shared, buffers, cached)
    }
    #[cfg(not(target_os = "linux"))]
    (0, 0, 0)
}

#[cfg(target_os = "linux")]
fn parse_cpu_line(line: &str) -> CpuTimesBuckets {
    let mut fields = line.split_whitespace().skip(1);
    let mut next = || {
        fields
            .next()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0) as f64
            / CLOCK_TICKS
    };
    CpuTimesBuckets {
        user: next(),
        nice: next(),
        system: next(),
        idle: next(),
        iowait: next(),
        irq: next(),
        softirq: next(),
        steal: next(),
        guest: next(),
        guest_nice: next(),
    }
}

/// Aggregate time-in-state buckets from the first "cpu " line of /proc/stat.
pub(super) fn cpu_times_aggregate() -> CpuTimesBuckets {
    #[cfg(target_os = "linux")]
    {
        if let Ok(content) = std::fs::read_to_string("/proc/stat") {
            for line in content.lines() {
                if line.starts_with("cpu ") {
                    return parse_cpu_line(line);
                }
            }
        }
    }
    CpuTimesBuckets::default()
}

/// Per-logical-CPU buckets ("cpu0", "cpu1", ...) in index order.
pub(super) fn cpu_times_percpu() -> Vec<CpuTimesBuckets> {
    #[cfg(target_os = "linux")]
    {
        let Ok(content) = std::fs::read_to_string("/proc/stat") else {
            return Vec::new();
        };
        return content
            .lines()
            .filter(|l| l.starts_with("cpu") && !l.starts_with("cpu "))
            .map(parse_cpu_line)
            .collect();
    }
    #[cfg(not(target_os = "linux"))]
    Vec::new()
}

/// Kernel-wide cumulative counters from /proc/stat. Linux does not report
/// a syscall count there; that field stays at zero.
pub(super) fn proc_stat_counters() -> CpuCounters {
    #[cfg(target_os = "linux")]
    {
        let Ok(content) = std::fs::read_to_string("/proc/stat") else {
            return CpuCounters::default();
        };
        let mut counters = CpuCounters::default();
        for line in content.lines() {
            let value = || {
                line.split_whitespace()
                    .nth(1)
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(0)
            };
            if line.starts_with("ctxt ") {
                counters.ctx_switches = value();
            } else if line.starts_with("intr ") {
                counters.interrupts = value();
            } else if line.starts_with("softirq ") {
                counters.soft_interrupts = value();
            }
        }
        return counters;
    }
    #[cfg(not(target_os = "linux"))]
    CpuCounters::default()
}

/// cpufreq min/max for one logical CPU, in MHz. (0, 0) when not exposed.
pub(super) fn cpufreq_min_max(cpu_index: usize) -> (f64, f64) {
    #[cfg(target_os = "linux")]
    {
        let read_khz = |name: &str| {
            std::fs::read_to_string(format!(
                "/sys/devices/system/cpu/cpu{cpu_index}/cpufreq/{name}"
            ))
            .ok()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .map(|khz| khz / 1000.0)
            .unwrap_or(0.0)
        };
        return (read_khz("cpuinfo_min_freq"), read_khz("cpuinfo_max_freq"));
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = cpu_index;
        (0.0, 0.0)
    }
}

/// Every mount from /proc/mounts, usage unset. Used for the "all
/// partitions" listing that includes pseudo-filesystems.
pub(super) fn mounts_all() -> Vec<PartitionRecord> {
    #[cfg(target_os = "linux")]
    {
        let Ok(content) = std::fs::read_to_string("/proc/mounts") else {
            return Vec::new();
        };
        return content
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let device = fields.next()?;
                let mountpoint = fields.next()?;
                let fstype = fields.next()?;
                Some(PartitionRecord {
                    device: device.to_string(),
                    mountpoint: mountpoint.to_string(),
                    fstype: fstype.to_string(),
                    usage: None,
                })
            })
            .collect();
    }
    #[cfg(not(target_os = "linux"))]
    Vec::new()
}

/// Per-device cumulative I/O counters from /proc/diskstats.
/// Sector counts are converted to bytes (512-byte sectors); loop and ram
/// devices are skipped.
pub(super) fn diskstats() -> Vec<(String, DiskIoRecord)> {
    #[cfg(target_os = "linux")]
    {
        const SECTOR_SIZE: u64 = 512;
        let Ok(content) = std::fs::read_to_string("/proc/diskstats") else {
            return Vec::new();
        };
        return content
            .lines()
            .filter_map(|line| {
                let fields: Vec<&str> = line.split_whitespace().collect();
                if fields.len() < 14 {
                    return None;
                }
                let name = fields[2];
                if name.starts_with("loop") || name.starts_with("ram") {
                    return None;
                }
                let num = |i: usize| fields[i].parse::<u64>().unwrap_or(0);
                Some((
                    name.to_string(),
                    DiskIoRecord {
                        read_count: num(3),
                        read_merged_count: num(4),
                        read_bytes: num(5) * SECTOR_SIZE,
                        read_time: num(6),
                        write_count: num(7),
                        write_merged_count: num(8),
                        write_bytes: num(9) * SECTOR_SIZE,
                        write_time: num(10),
                        busy_time: num(12),
                    },
                ))
            })
            .collect();
    }
    #[cfg(not(target_os = "linux"))]
    Vec::new()
}

/// Read network interface link speed from /sys/class/net/<interface>/speed.
/// Returns bits per second, or 0 if unavailable.
pub(super) fn interface_speed(interface_name: &str) -> u64 {
    #[cfg(target_os = "linux")]
    {
        let path = format!("/sys/class/net/{interface_name}/speed");
        if let Ok(content) = std::fs::read_to_string(&path)
            && let Ok(mbps) = content.trim().parse::<i64>()
            && mbps > 0
        {
            return (mbps as u64) * 1_000_000;
        }
    }
    #[cfg(not(target_os = "linux"))]
    let _ = interface_name;
    0
}

/// Link operational state from /sys/class/net/<interface>/operstate.
/// "unknown" counts as up (loopback reports it).
pub(super) fn interface_is_up(interface_name: &str) -> bool {
    #[cfg(target_os = "linux")]
    {
        let path = format!("/sys/class/net/{interface_name}/operstate");
        if let Ok(state) = std::fs::read_to_string(&path) {
            let state = state.trim();
            return state == "up" || state == "unknown";
        }
    }
    #[cfg(not(target_os = "linux"))]
    let _ = interface_name;
    false
}

#[cfg(target_os = "linux")]
fn tcp_state_name(code: u8) -> &'static str {
    match code {
        0x01 => "ESTABLISHED",
        0x02 => "SYN_SENT",
        0x03 => "SYN_RECV",
        0x04 => "FIN_WAIT1",
        0x05 => "FIN_WAIT2",
        0x06 => "TIME_WAIT",
        0x07 => "CLOSE",
        0x08 => "CLOSE_WAIT",
        0x09 => "LAST_ACK",
        0x0A => "LISTEN",
        0x0B => "CLOSING",
        _ => "NONE",
    }
}

#[cfg(target_os = "linux")]
fn parse_proc_net_addr(hex: &str, ipv6: bool) -> Option<AddrPort> {
    let (addr_hex, port_hex) = hex.split_once(':')?;
    let port = u16::from_str_radix(port_hex, 16).ok()?;
    let ip = if ipv6 {
        if addr_hex.len() != 32 {
            return None;
        }
        // Four little-endian u32 groups.
        let mut bytes = [0u8; 16];
        for (i, chunk) in addr_hex.as_bytes().chunks(8).enumerate() {
            let group = u32::from_str_radix(std::str::from_utf8(chunk).ok()?, 16).ok()?;
            bytes[i * 4..i * 4 + 4].copy_from_slice(&group.swap_bytes().to_be_bytes());
        }
        std::net::Ipv6Addr::from(bytes).to_string()
    } else {
        let v = u32::from_str_radix(addr_hex, 16).ok()?;
        std::net::Ipv4Addr::from(v.swap_bytes()).to_string()
    };
    Some(AddrPort { ip, port })
}

#[cfg(target_os = "linux")]
fn parse_proc_net_file(
    path: &str,
    family: &str,
    kind: &str,
    ipv6: bool,
    out: &mut Vec<ConnectionRecord>,
) {
    let Ok(content) = std::fs::read_to_string(path) else {
        return;
    };
    for line in content.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        let Some(laddr) = parse_proc_net_addr(fields[1], ipv6) else {
            continue;
        };
        let raddr = parse_proc_net_addr(fields[2], ipv6).filter(|a| a.port != 0);
        let status = if kind == "tcp" {
            u8::from_str_radix(fields[3], 16)
                .map(tcp_state_name)
                .unwrap_or("NONE")
        } else {
            "NONE"
        };
        out.push(ConnectionRecord {
            family: family.to_string(),
            kind: kind.to_string(),
            laddr,
            raddr,
            status: status.to_string(),
        });
    }
}

/// Active sockets from /proc/net. `kind` follows the query contract:
/// "inet" or "all" (tcp+udp over v4+v6), "tcp", "udp".
pub(super) fn net_connections(kind: &str) -> Vec<ConnectionRecord> {
    #[cfg(target_os = "linux")]
    {
        let mut out = Vec::new();
        let tcp = matches!(kind, "inet" | "all" | "tcp");
        let udp = matches!(kind, "inet" | "all" | "udp");
        if tcp {
            parse_proc_net_file("/proc/net/tcp", "inet", "tcp", false, &mut out);
            parse_proc_net_file("/proc/net/tcp6", "inet6", "tcp", true, &mut out);
        }
        if udp {
            parse_proc_net_file("/proc/net/udp", "inet", "udp", false, &mut out);
            parse_proc_net_file("/proc/net/udp6", "inet6", "udp", true, &mut out);
        }
        return out;
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = kind;
        Vec::new()
    }
}
