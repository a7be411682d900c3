use device_telemetry::config::AppConfig;
use std::io::Write;

const VALID_CONFIG: &str = r#"
[sampling]
interval_secs = 5
cpu_percent_window_secs = 2

[delta]
fast_interval_secs = 1
slow_interval_secs = 60

[monitoring]
stats_log_interval_secs = 60
"#;

#[test]
fn valid_config_parses() {
    let config = AppConfig::load_from_str(VALID_CONFIG).unwrap();
    assert_eq!(config.sampling.interval_secs, 5);
    assert_eq!(config.sampling.cpu_percent_window_secs, 2);
    assert_eq!(config.delta.fast_interval_secs, 1);
    assert_eq!(config.delta.slow_interval_secs, 60);
    assert_eq!(config.monitoring.stats_log_interval_secs, 60);
}

#[test]
fn zero_sampling_interval_is_rejected() {
    let s = VALID_CONFIG.replace("interval_secs = 5", "interval_secs = 0");
    let err = AppConfig::load_from_str(&s).unwrap_err();
    assert!(err.to_string().contains("sampling.interval_secs"));
}

#[test]
fn zero_cpu_window_is_rejected() {
    let s = VALID_CONFIG.replace(
        "cpu_percent_window_secs = 2",
        "cpu_percent_window_secs = 0",
    );
    let err = AppConfig::load_from_str(&s).unwrap_err();
    assert!(err.to_string().contains("cpu_percent_window_secs"));
}

#[test]
fn zero_fast_delta_interval_is_rejected() {
    let s = VALID_CONFIG.replace("fast_interval_secs = 1", "fast_interval_secs = 0");
    let err = AppConfig::load_from_str(&s).unwrap_err();
    assert!(err.to_string().contains("delta.fast_interval_secs"));
}

#[test]
fn zero_slow_delta_interval_is_rejected() {
    let s = VALID_CONFIG.replace("slow_interval_secs = 60", "slow_interval_secs = 0");
    let err = AppConfig::load_from_str(&s).unwrap_err();
    assert!(err.to_string().contains("delta.slow_interval_secs"));
}

#[test]
fn zero_stats_log_interval_is_rejected() {
    let s = VALID_CONFIG.replace(
        "stats_log_interval_secs = 60",
        "stats_log_interval_secs = 0",
    );
    let err = AppConfig::load_from_str(&s).unwrap_err();
    assert!(err.to_string().contains("stats_log_interval_secs"));
}

#[test]
fn missing_section_is_rejected() {
    let s = VALID_CONFIG.replace("[monitoring]", "[something_else]");
    assert!(AppConfig::load_from_str(&s).is_err());
}

#[test]
fn load_reads_path_from_config_file_env() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(VALID_CONFIG.as_bytes()).unwrap();
    // SAFETY: test-local env mutation; this test is the only reader.
    unsafe { std::env::set_var("CONFIG_FILE", file.path()) };
    let config = AppConfig::load().unwrap();
    unsafe { std::env::remove_var("CONFIG_FILE") };
    assert_eq!(config.sampling.interval_secs, 5);
}
