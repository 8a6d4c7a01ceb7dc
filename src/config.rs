use serde::Deserialize;

use crate::stats::DEFAULT_FLUSH_THRESHOLD;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_pool_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    /// Updates buffered in memory per device before the next one forces a write.
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: u64,
    /// Sessions with unsaved updates also write on this interval (real seconds).
    #[serde(default = "default_save_interval_secs")]
    pub save_interval_secs: u64,
    /// Pending commands per device session before the ingress waits.
    #[serde(default = "default_session_channel_capacity")]
    pub session_channel_capacity: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            flush_threshold: default_flush_threshold(),
            save_interval_secs: default_save_interval_secs(),
            session_channel_capacity: default_session_channel_capacity(),
        }
    }
}

fn default_flush_threshold() -> u64 {
    DEFAULT_FLUSH_THRESHOLD
}

fn default_save_interval_secs() -> u64 {
    300
}

fn default_session_channel_capacity() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// How often to log gateway stats (connected devices, reports processed) at INFO level.
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
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.max_pool_size > 0,
            "database.max_pool_size must be > 0, got {}",
            self.database.max_pool_size
        );
        anyhow::ensure!(
            self.stats.flush_threshold > 0,
            "stats.flush_threshold must be > 0, got {}",
            self.stats.flush_threshold
        );
        anyhow::ensure!(
            self.stats.save_interval_secs > 0,
            "stats.save_interval_secs must be > 0, got {}",
            self.stats.save_interval_secs
        );
        anyhow::ensure!(
            self.stats.session_channel_capacity > 0,
            "stats.session_channel_capacity must be > 0, got {}",
            self.stats.session_channel_capacity
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        Ok(())
    }
}
