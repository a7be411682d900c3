use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub sampling: SamplingConfig,
    pub delta: DeltaConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    /// Background cadence for every metric family.
    pub interval_secs: u64,
    /// Window for interval-sampled CPU percent queries (blocks for this
    /// long inside the sample call).
    pub cpu_percent_window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeltaConfig {
    pub fast_interval_secs: u64,
    pub slow_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// How often to log app stats (store keys, samples taken) at INFO level.
    pub stats_log_interval_secs: u64,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.sampling.interval_secs > 0,
            "sampling.interval_secs must be > 0, got {}",
            self.sampling.interval_secs
        );
        anyhow::ensure!(
            self.sampling.cpu_percent_window_secs > 0,
            "sampling.cpu_percent_window_secs must be > 0, got {}",
            self.sampling.cpu_percent_window_secs
        );
        anyhow::ensure!(
            self.delta.fast_interval_secs > 0,
            "delta.fast_interval_secs must be > 0, got {}",
            self.delta.fast_interval_secs
        );
        anyhow::ensure!(
            self.delta.slow_interval_secs > 0,
            "delta.slow_interval_secs must be > 0, got {}",
            self.delta.slow_interval_secs
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        Ok(())
    }
}
