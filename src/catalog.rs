// The built-in metric families and their derive steps.

use crate::source::QueryArgs;
use crate::spec::{AdvancedField, MetricSpec};
use crate::store::{Snapshot, SnapshotStore, delta_key, now_ms};
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// A delta-bearing series: which snapshot field of which family gets
/// interval-differenced. Each entry runs at both configured cadences.
pub struct DeltaSeriesSpec {
    pub model_key: &'static str,
    pub track_field: &'static str,
}

pub const DELTA_SERIES: &[DeltaSeriesSpec] = &[
    DeltaSeriesSpec {
        model_key: "network_general_stats",
        track_field: "net_io_counters_specific",
    },
    DeltaSeriesSpec {
        model_key: "device_defender_data",
        track_field: "network_io_counters",
    },
];

/// All registered metric families. Built once at startup; every spec is
/// validated against the query registry before any task spawns.
/// `fast_delta_secs` is the fast delta cadence; the defender report reads
/// its network delta from the sibling key at that cadence.
pub fn catalog(interval_secs: u64, cpu_window_secs: u64, fast_delta_secs: u64) -> Vec<MetricSpec> {
    let strings = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    let base = MetricSpec {
        background_enabled: true,
        sample_interval_secs: interval_secs,
        ..MetricSpec::default()
    };

    vec![
        MetricSpec {
            model_key: "cpu_times".into(),
            primary_source: Some("cpu_times".into()),
            attributes: strings(&[
                "user",
                "nice",
                "system",
                "idle",
                "iowait",
                "irq",
                "softirq",
                "steal",
                "guest",
                "guest_nice",
            ]),
            advanced_fields: vec![AdvancedField::new(
                "cpu_times_percent",
                "cpu_times_percent",
                QueryArgs::keyword(&[
                    ("interval", json!(cpu_window_secs)),
                    ("percpu", json!(true)),
                ]),
            )],
            ..base.clone()
        },
        MetricSpec {
            model_key: "cpu_stats".into(),
            primary_source: Some("cpu_stats".into()),
            attributes: strings(&[
                "ctx_switches",
                "interrupts",
                "soft_interrupts",
                "syscalls",
            ]),
            ..base.clone()
        },
        MetricSpec {
            model_key: "cpu_mixed_stats".into(),
            advanced_fields: vec![
                AdvancedField::new(
                    "cpu_percent",
                    "cpu_percent",
                    QueryArgs::keyword(&[
                        ("interval", json!(cpu_window_secs)),
                        ("percpu", json!(true)),
                    ]),
                ),
                AdvancedField::new(
                    "cpu_count_physical",
                    "cpu_count",
                    QueryArgs::keyword(&[("logical", json!(false))]),
                ),
                AdvancedField::new(
                    "cpu_count_logical",
                    "cpu_count",
                    QueryArgs::keyword(&[("logical", json!(true))]),
                ),
                AdvancedField::new(
                    "cpu_frequency",
                    "cpu_freq",
                    QueryArgs::keyword(&[("percpu", json!(true))]),
                ),
                AdvancedField::new("load_average", "load_average", QueryArgs::none()),
            ],
            include_fields: strings(&["load_average_percent"]),
            derive: Some(Arc::new(derive_load_average_percent)),
            ..base.clone()
        },
        MetricSpec {
            model_key: "ram_memory".into(),
            primary_source: Some("virtual_memory".into()),
            attributes: strings(&[
                "total",
                "available",
                "percent",
                "used",
                "free",
                "shared",
                "buffers",
                "cached",
            ]),
            ..base.clone()
        },
        MetricSpec {
            model_key: "ram_swap_memory".into(),
            primary_source: Some("swap_memory".into()),
            attributes: strings(&["total", "used", "free", "percent"]),
            ..base.clone()
        },
        MetricSpec {
            model_key: "disk_io_counters".into(),
            primary_source: Some("disk_io_counters".into()),
            attributes: strings(&[
                "read_count",
                "write_count",
                "read_bytes",
                "write_bytes",
                "read_time",
                "write_time",
                "busy_time",
                "read_merged_count",
                "write_merged_count",
            ]),
            ..base.clone()
        },
        MetricSpec {
            model_key: "disk_general_stats".into(),
            advanced_fields: vec![
                AdvancedField::new("disk_partitions_physical", "disk_partitions", QueryArgs::none()),
                AdvancedField::new(
                    "disk_partitions_logical",
                    "disk_partitions",
                    QueryArgs::keyword(&[("all", json!(true))]),
                ),
                AdvancedField::new(
                    "disk_io_counters_overall",
                    "disk_io_counters",
                    QueryArgs::keyword(&[("perdisk", json!(false)), ("nowrap", json!(true))]),
                ),
                AdvancedField::new(
                    "disk_io_counters_specific",
                    "disk_io_counters",
                    QueryArgs::keyword(&[("perdisk", json!(true)), ("nowrap", json!(true))]),
                ),
            ],
            include_fields: strings(&[
                "disk_partitions_logical_stats",
                "disk_partitions_physical_stats",
            ]),
            exclude_fields: strings(&["disk_partitions_logical", "disk_partitions_physical"]),
            derive: Some(Arc::new(derive_disk_partition_stats)),
            ..base.clone()
        },
        MetricSpec {
            model_key: "network_io_counters".into(),
            primary_source: Some("net_io_counters".into()),
            attributes: strings(&[
                "bytes_sent",
                "bytes_recv",
                "packets_sent",
                "packets_recv",
                "errin",
                "errout",
                "dropin",
                "dropout",
            ]),
            advanced_fields: vec![AdvancedField::new(
                "net_io_counters_specific",
                "net_io_counters",
                QueryArgs::keyword(&[("pernic", json!(true)), ("nowrap", json!(true))]),
            )],
            ..base.clone()
        },
        MetricSpec {
            model_key: "network_general_stats".into(),
            advanced_fields: vec![
                AdvancedField::new(
                    "net_io_counters_specific",
                    "net_io_counters",
                    QueryArgs::keyword(&[("pernic", json!(true)), ("nowrap", json!(true))]),
                ),
                AdvancedField::new("net_if_addrs", "net_if_addrs", QueryArgs::none()),
                AdvancedField::new("net_if_stats", "net_if_stats", QueryArgs::none()),
            ],
            include_fields: strings(&["net_aggregated_stats"]),
            derive: Some(Arc::new(derive_net_aggregated)),
            ..base.clone()
        },
        MetricSpec {
            model_key: "device_defender_data".into(),
            advanced_fields: vec![
                AdvancedField::new("network_interfaces_addresses", "net_if_addrs", QueryArgs::none()),
                AdvancedField::new(
                    "network_connections",
                    "net_connections",
                    QueryArgs::keyword(&[("kind", json!("inet"))]),
                ),
                AdvancedField::new(
                    "network_connections_tcp",
                    "net_connections",
                    QueryArgs::keyword(&[("kind", json!("tcp"))]),
                ),
                AdvancedField::new(
                    "network_io_counters",
                    "net_io_counters",
                    QueryArgs::keyword(&[("pernic", json!(false))]),
                ),
            ],
            include_fields: strings(&["device_defender_data"]),
            derive: Some(Arc::new(move |bound, store| {
                derive_defender_report(bound, store, fast_delta_secs)
            })),
            ..base
        },
    ]
}

/// Load average as a percentage of the logical CPU count.
fn derive_load_average_percent(bound: &mut Snapshot, _store: &SnapshotStore) {
    let logical = bound
        .get("cpu_count_logical")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let Some(load) = bound.get("load_average").and_then(Value::as_array) else {
        return;
    };
    if logical <= 0.0 {
        return;
    }
    let percent: Vec<Value> = load
        .iter()
        .filter_map(Value::as_f64)
        .map(|x| Value::from(x / logical * 100.0))
        .collect();
    bound.insert("load_average_percent".into(), Value::Array(percent));
}

/// Reshape the partition listings into per-device maps carrying usage,
/// replacing the raw lists (which the projection excludes).
fn derive_disk_partition_stats(bound: &mut Snapshot, _store: &SnapshotStore) {
    for (list_field, stats_field) in [
        ("disk_partitions_physical", "disk_partitions_physical_stats"),
        ("disk_partitions_logical", "disk_partitions_logical_stats"),
    ] {
        let Some(partitions) = bound.get(list_field).and_then(Value::as_array) else {
            continue;
        };
        let mut by_device = Map::new();
        for partition in partitions {
            let Some(device) = partition.get("device").and_then(Value::as_str) else {
                continue;
            };
            by_device.insert(device.to_string(), partition.clone());
        }
        bound.insert(stats_field.to_string(), Value::Object(by_device));
    }
}

/// Merge per-interface IO counters, link stats, and addresses into one
/// record per interface.
fn derive_net_aggregated(bound: &mut Snapshot, _store: &SnapshotStore) {
    let Some(io) = bound.get("net_io_counters_specific").and_then(Value::as_object) else {
        return;
    };
    let mut aggregated = Map::new();
    for (interface, counters) in io {
        let mut record = Map::new();
        record.insert("io".into(), counters.clone());
        aggregated.insert(interface.clone(), Value::Object(record));
    }
    for (source_field, merged_field) in [("net_if_stats", "if_stats"), ("net_if_addrs", "if_addrs")] {
        let Some(per_interface) = bound.get(source_field).and_then(Value::as_object).cloned()
        else {
            continue;
        };
        for (interface, data) in per_interface {
            let entry = aggregated
                .entry(interface)
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(record) = entry.as_object_mut() {
                record.insert(merged_field.into(), data);
            }
        }
    }
    bound.insert("net_aggregated_stats".into(), Value::Object(aggregated));
}

/// Resolve which interface an address belongs to. Wildcard binds keep the
/// address itself as the name.
fn interface_for_ip(addrs: &Value, ip: &str) -> Option<String> {
    if ip == "0.0.0.0" || ip == "::" {
        return Some(ip.to_string());
    }
    for (interface, list) in addrs.as_object()? {
        let Some(list) = list.as_array() else {
            continue;
        };
        if list
            .iter()
            .any(|rec| rec.get("address").and_then(Value::as_str) == Some(ip))
        {
            return Some(interface.clone());
        }
    }
    None
}

fn listening_ports(connections: &[Value], addrs: &Value, kind: &str) -> Vec<Value> {
    connections
        .iter()
        .filter(|c| {
            let is_kind = c.get("type").and_then(Value::as_str) == Some(kind);
            let listening = kind == "udp"
                || c.get("status").and_then(Value::as_str) == Some("LISTEN");
            is_kind && listening
        })
        .filter_map(|c| {
            let laddr = c.get("laddr")?;
            let port = laddr.get("port")?.clone();
            let mut record = Map::new();
            record.insert("port".into(), port);
            if let Some(ip) = laddr.get("ip").and_then(Value::as_str)
                && let Some(interface) = interface_for_ip(addrs, ip)
            {
                record.insert("interface".into(), Value::String(interface));
            }
            Some(Value::Object(record))
        })
        .collect()
}

fn established_connections(connections: &[Value], addrs: &Value) -> Vec<Value> {
    connections
        .iter()
        .filter(|c| {
            matches!(
                c.get("status").and_then(Value::as_str),
                Some("ESTABLISHED") | Some("BOUND")
            )
        })
        .filter_map(|c| {
            let laddr = c.get("laddr")?;
            let raddr = c.get("raddr")?;
            let remote_ip = raddr.get("ip").and_then(Value::as_str)?;
            let remote_port = raddr.get("port").and_then(Value::as_u64)?;
            let remote_addr = if remote_ip.contains(':') {
                format!("[{remote_ip}]:{remote_port}")
            } else {
                format!("{remote_ip}:{remote_port}")
            };
            let local_interface = laddr
                .get("ip")
                .and_then(Value::as_str)
                .and_then(|ip| interface_for_ip(addrs, ip));
            Some(json!({
                "local_interface": local_interface,
                "local_port": laddr.get("port").cloned().unwrap_or(Value::Null),
                "remote_addr": remote_addr,
            }))
        })
        .collect()
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// CPU custom metrics for the defender report, read from the latest
/// `cpu_mixed_stats` snapshot in the store.
fn defender_custom_metrics(store: &SnapshotStore) -> Value {
    let mut metrics = Map::new();
    let Some(entry) = store.read("cpu_mixed_stats") else {
        return Value::Object(metrics);
    };
    let average_of = |field: &str| {
        let values: Vec<f64> = entry
            .value
            .get(field)?
            .as_array()?
            .iter()
            .filter_map(Value::as_f64)
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    };
    if let Some(avg) = average_of("cpu_percent") {
        metrics.insert("cpu_average".into(), json!([{"number": round3(avg)}]));
    }
    if let Some(avg) = average_of("load_average") {
        metrics.insert("cpu_load_average".into(), json!([{"number": round3(avg)}]));
    }
    Value::Object(metrics)
}

/// Assemble the composite defender record: listening ports, established
/// connections, the network delta at the fast cadence, and custom metrics.
fn derive_defender_report(bound: &mut Snapshot, store: &SnapshotStore, fast_cadence_secs: u64) {
    let addrs = bound
        .get("network_interfaces_addresses")
        .cloned()
        .unwrap_or(Value::Null);
    let empty = Vec::new();
    let inet = bound
        .get("network_connections")
        .and_then(Value::as_array)
        .unwrap_or(&empty);
    let tcp = bound
        .get("network_connections_tcp")
        .and_then(Value::as_array)
        .unwrap_or(&empty);

    let tcp_ports = listening_ports(inet, &addrs, "tcp");
    let udp_ports = listening_ports(inet, &addrs, "udp");
    let established = established_connections(tcp, &addrs);
    let network_stats = store
        .read(&delta_key("device_defender_data", fast_cadence_secs))
        .map(|e| e.value)
        .unwrap_or(Value::Null);
    let custom_metrics = defender_custom_metrics(store);

    let report = json!({
        "header": {
            "report_id": now_ms() / 1000,
            "version": "1.0",
        },
        "metrics": {
            "listening_tcp_ports": {
                "total": tcp_ports.len(),
                "ports": tcp_ports,
            },
            "listening_udp_ports": {
                "total": udp_ports.len(),
                "ports": udp_ports,
            },
            "network_stats": network_stats,
            "tcp_connections": {
                "established_connections": {
                    "total": established.len(),
                    "connections": established,
                },
            },
        },
        "custom_metrics": custom_metrics,
    });
    bound.insert("device_defender_data".into(), report);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_average_percent_scales_by_logical_count() {
        let mut bound = Snapshot::new();
        bound.insert("cpu_count_logical".into(), json!(4));
        bound.insert("load_average".into(), json!([2.0, 1.0, 0.5]));
        let store = SnapshotStore::new();
        derive_load_average_percent(&mut bound, &store);
        assert_eq!(
            bound.get("load_average_percent"),
            Some(&json!([50.0, 25.0, 12.5]))
        );
    }

    #[test]
    fn net_aggregation_merges_io_stats_and_addrs_per_interface() {
        let mut bound = Snapshot::new();
        bound.insert(
            "net_io_counters_specific".into(),
            json!({"eth0": {"bytes_sent": 1}}),
        );
        bound.insert("net_if_stats".into(), json!({"eth0": {"isup": true}}));
        bound.insert(
            "net_if_addrs".into(),
            json!({"eth0": [{"family": "inet", "address": "10.0.0.2"}]}),
        );
        let store = SnapshotStore::new();
        derive_net_aggregated(&mut bound, &store);
        let agg = bound.get("net_aggregated_stats").unwrap();
        assert_eq!(agg["eth0"]["io"]["bytes_sent"], json!(1));
        assert_eq!(agg["eth0"]["if_stats"]["isup"], json!(true));
        assert_eq!(agg["eth0"]["if_addrs"][0]["address"], json!("10.0.0.2"));
    }

    #[test]
    fn defender_report_attributes_listening_ports_to_interfaces() {
        let mut bound = Snapshot::new();
        bound.insert(
            "network_interfaces_addresses".into(),
            json!({"eth0": [{"family": "inet", "address": "10.0.0.2"}]}),
        );
        bound.insert(
            "network_connections".into(),
            json!([
                {"family": "inet", "type": "tcp", "status": "LISTEN",
                 "laddr": {"ip": "10.0.0.2", "port": 22}, "raddr": null},
                {"family": "inet", "type": "udp", "status": "NONE",
                 "laddr": {"ip": "0.0.0.0", "port": 123}, "raddr": null},
            ]),
        );
        bound.insert(
            "network_connections_tcp".into(),
            json!([
                {"family": "inet6", "type": "tcp", "status": "ESTABLISHED",
                 "laddr": {"ip": "10.0.0.2", "port": 51000},
                 "raddr": {"ip": "2001:db8::1", "port": 443}},
            ]),
        );
        let store = SnapshotStore::new();
        derive_defender_report(&mut bound, &store, 1);

        let report = bound.get("device_defender_data").unwrap();
        let metrics = &report["metrics"];
        assert_eq!(metrics["listening_tcp_ports"]["total"], json!(1));
        assert_eq!(
            metrics["listening_tcp_ports"]["ports"][0],
            json!({"port": 22, "interface": "eth0"})
        );
        assert_eq!(metrics["listening_udp_ports"]["total"], json!(1));
        let established = &metrics["tcp_connections"]["established_connections"];
        assert_eq!(established["total"], json!(1));
        assert_eq!(
            established["connections"][0]["remote_addr"],
            json!("[2001:db8::1]:443")
        );
    }

    #[test]
    fn defender_report_reads_the_delta_at_the_configured_fast_cadence() {
        let store = SnapshotStore::new();
        store.write(
            &delta_key("device_defender_data", 2),
            json!({"bytes_sent": 50, "bytes_recv": 60}),
        );
        let specs = catalog(5, 2, 2);
        let spec = specs
            .iter()
            .find(|s| s.model_key == "device_defender_data")
            .unwrap();
        let derive = spec.derive.as_ref().unwrap();
        let mut bound = Snapshot::new();
        derive(&mut bound, &store);
        let report = bound.get("device_defender_data").unwrap();
        assert_eq!(
            report["metrics"]["network_stats"],
            json!({"bytes_sent": 50, "bytes_recv": 60})
        );
    }

    #[test]
    fn defender_custom_metrics_read_cpu_mixed_stats_from_store() {
        let store = SnapshotStore::new();
        store.write(
            "cpu_mixed_stats",
            json!({"cpu_percent": [10.0, 30.0], "load_average": [1.0, 2.0, 3.0]}),
        );
        let metrics = defender_custom_metrics(&store);
        assert_eq!(metrics["cpu_average"], json!([{"number": 20.0}]));
        assert_eq!(metrics["cpu_load_average"], json!([{"number": 2.0}]));
    }
}
