use meter_core::MeterConfig;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub http_bind_addr: String,
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Tick cadence in seconds. Must be fine enough to observe every cycle
    /// boundary; quarter-hourly cycles need at most 60.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

fn default_tick_interval_secs() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub uri: String,
    pub max_connections: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    250
}

fn default_queue_capacity() -> usize {
    1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub store: StoreConfig,
    pub metrics: Option<MetricsConfig>,
    pub meters: Vec<MeterConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("METERING_CONFIG").unwrap_or_else(|_| "metering-config.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;

        anyhow::ensure!(!cfg.meters.is_empty(), "config must declare at least one meter");
        let mut names = HashSet::new();
        for meter in &cfg.meters {
            anyhow::ensure!(!meter.name.is_empty(), "meter name must not be empty");
            anyhow::ensure!(
                names.insert(meter.name.as_str()),
                "duplicate meter name {:?}",
                meter.name
            );
            anyhow::ensure!(
                !meter.source_entity.is_empty(),
                "meter {:?} must name a source entity",
                meter.name
            );
        }
        Ok(cfg)
    }
}
