//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `guildwarden.toml` in the working directory. Every field has a
//! default so the file is optional. Environment variables take precedence
//! over file values.

use std::time::Duration;

use serde::Deserialize;

use guildwarden_app::executor::{ExecutorConfig, RetryConfig};
use guildwarden_app::rule_engine::RuleEngineConfig;
use guildwarden_app::scheduler::SchedulerConfig;

const CONFIG_FILE: &str = "guildwarden.toml";
const BACKOFF_MULTIPLIER: f64 = 2.0;
const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub scheduler: SchedulerSection,
    pub executor: ExecutorSection,
    pub rules: RulesSection,
    pub events: EventsSection,
}

/// HTTP listener for the diagnostics API.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL.
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub tick_interval_secs: u64,
    pub dispatch_timeout_secs: u64,
    /// Worker permits shared by task dispatch and event routing.
    pub workers: usize,
}

/// Rate limiting and retries of platform calls.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ExecutorSection {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub burst: u32,
    pub refill_per_sec: u32,
    pub call_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RulesSection {
    pub deferral_horizon_hours: u64,
    pub max_chain_depth: usize,
    /// Seconds between two full autorole sweeps of each community.
    pub sweep_interval_secs: u64,
}

/// Platform event bus between the platform and the router.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EventsSection {
    /// Events the router may fall behind by. Past that the oldest unread
    /// events are dropped, so counting and mirroring never see them; the
    /// router logs each loss with a running total. Each slot holds one
    /// event, so memory grows linearly with this value.
    pub capacity: usize,
}

impl Config {
    /// Load configuration from `guildwarden.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file(CONFIG_FILE)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    /// Apply `GUILDWARDEN_*` overrides read through `var`. `RUST_LOG` wins
    /// over `GUILDWARDEN_LOG`.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("GUILDWARDEN_HOST") {
            self.server.host = val;
        }
        if let Some(val) = var("GUILDWARDEN_PORT")
            && let Ok(port) = val.parse()
        {
            self.server.port = port;
        }
        if let Some(val) = var("GUILDWARDEN_BIND")
            && let Some((host, port)) = val.rsplit_once(':')
        {
            self.server.host = host.to_string();
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = var("GUILDWARDEN_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = var("GUILDWARDEN_TICK_INTERVAL_SECS")
            && let Ok(secs) = val.parse()
        {
            self.scheduler.tick_interval_secs = secs;
        }
        if let Some(val) = var("GUILDWARDEN_WORKERS")
            && let Ok(workers) = val.parse()
        {
            self.scheduler.workers = workers;
        }
        if let Some(val) = var("GUILDWARDEN_EVENT_CAPACITY")
            && let Ok(capacity) = val.parse()
        {
            self.events.capacity = capacity;
        }
        if let Some(val) = var("GUILDWARDEN_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.scheduler.workers == 0 {
            return Err(ConfigError::Validation(
                "scheduler.workers must be non-zero".to_string(),
            ));
        }
        if self.scheduler.tick_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "scheduler.tick_interval_secs must be non-zero".to_string(),
            ));
        }
        if self.rules.sweep_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "rules.sweep_interval_secs must be non-zero".to_string(),
            ));
        }
        if self.events.capacity == 0 {
            return Err(ConfigError::Validation(
                "events.capacity must be non-zero".to_string(),
            ));
        }
        if self.executor.burst == 0 || self.executor.refill_per_sec == 0 {
            return Err(ConfigError::Validation(
                "executor.burst and executor.refill_per_sec must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    #[must_use]
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick_interval: Duration::from_secs(self.scheduler.tick_interval_secs),
            dispatch_timeout: Duration::from_secs(self.scheduler.dispatch_timeout_secs),
            workers: self.scheduler.workers,
        }
    }

    #[must_use]
    pub fn executor_config(&self) -> ExecutorConfig {
        let e = &self.executor;
        ExecutorConfig {
            retry: RetryConfig::new(
                e.max_retries,
                Duration::from_millis(e.initial_backoff_ms),
                Duration::from_millis(e.max_backoff_ms),
                BACKOFF_MULTIPLIER,
            ),
            burst: e.burst,
            refill_per_sec: e.refill_per_sec,
            call_timeout: Duration::from_secs(e.call_timeout_secs),
        }
    }

    #[must_use]
    pub fn rule_engine_config(&self) -> RuleEngineConfig {
        RuleEngineConfig {
            deferral_horizon: Duration::from_secs(self.rules.deferral_horizon_hours * 3600),
            max_chain_depth: self.rules.max_chain_depth,
        }
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.rules.sweep_interval_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:guildwarden.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "guildwardend=info,guildwarden=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for SchedulerSection {
    fn default() -> Self {
        let defaults = SchedulerConfig::default();
        Self {
            tick_interval_secs: defaults.tick_interval.as_secs(),
            dispatch_timeout_secs: defaults.dispatch_timeout.as_secs(),
            workers: defaults.workers,
        }
    }
}

impl Default for ExecutorSection {
    fn default() -> Self {
        let defaults = ExecutorConfig::default();
        Self {
            max_retries: defaults.retry.max_retries,
            initial_backoff_ms: u64::try_from(defaults.retry.initial_delay.as_millis())
                .unwrap_or(u64::MAX),
            max_backoff_ms: u64::try_from(defaults.retry.max_delay.as_millis())
                .unwrap_or(u64::MAX),
            burst: defaults.burst,
            refill_per_sec: defaults.refill_per_sec,
            call_timeout_secs: defaults.call_timeout.as_secs(),
        }
    }
}

impl Default for RulesSection {
    fn default() -> Self {
        let defaults = RuleEngineConfig::default();
        Self {
            deferral_horizon_hours: defaults.deferral_horizon.as_secs() / 3600,
            max_chain_depth: defaults.max_chain_depth,
            sweep_interval_secs: 3600,
        }
    }
}

impl Default for EventsSection {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.url, "sqlite:guildwarden.db?mode=rwc");
        assert_eq!(config.scheduler.tick_interval_secs, 5);
        assert_eq!(config.scheduler.workers, 16);
        assert_eq!(config.rules.deferral_horizon_hours, 30 * 24);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_round_trip_engine_defaults() {
        let config = Config::default();
        assert_eq!(config.scheduler_config(), SchedulerConfig::default());
        assert_eq!(config.rule_engine_config(), RuleEngineConfig::default());
        assert_eq!(config.executor_config(), ExecutorConfig::default());
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [server]
            host = '127.0.0.1'
            port = 9090

            [database]
            url = 'sqlite:test.db'

            [logging]
            filter = 'debug'

            [scheduler]
            tick_interval_secs = 2
            dispatch_timeout_secs = 10
            workers = 4

            [executor]
            max_retries = 5
            initial_backoff_ms = 100
            max_backoff_ms = 2000
            burst = 20
            refill_per_sec = 10
            call_timeout_secs = 3

            [rules]
            deferral_horizon_hours = 48
            max_chain_depth = 3
            sweep_interval_secs = 600

            [events]
            capacity = 64
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:9090");
        assert_eq!(config.database.url, "sqlite:test.db");
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.scheduler_config().workers, 4);
        assert_eq!(
            config.scheduler_config().dispatch_timeout,
            Duration::from_secs(10)
        );
        let executor = config.executor_config();
        assert_eq!(executor.retry.max_retries, 5);
        assert_eq!(executor.retry.initial_delay, Duration::from_millis(100));
        assert_eq!(executor.burst, 20);
        assert_eq!(
            config.rule_engine_config().deferral_horizon,
            Duration::from_secs(48 * 3600)
        );
        assert_eq!(config.sweep_interval(), Duration::from_secs(600));
        assert_eq!(config.events.capacity, 64);
    }

    #[test]
    fn should_keep_defaults_when_section_is_partial() {
        let config: Config = toml::from_str("[scheduler]\nworkers = 2").unwrap();
        assert_eq!(config.scheduler.workers, 2);
        assert_eq!(config.scheduler.tick_interval_secs, 5);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_report_parse_error_when_toml_is_invalid() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }

    #[test]
    fn should_override_file_values_when_env_is_set() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("GUILDWARDEN_BIND", "127.0.0.1:8080"),
            ("GUILDWARDEN_DATABASE_URL", "sqlite::memory:"),
            ("GUILDWARDEN_WORKERS", "3"),
            ("GUILDWARDEN_TICK_INTERVAL_SECS", "1"),
            ("GUILDWARDEN_EVENT_CAPACITY", "4096"),
        ]));
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.scheduler.workers, 3);
        assert_eq!(config.scheduler.tick_interval_secs, 1);
        assert_eq!(config.events.capacity, 4096);
    }

    #[test]
    fn should_prefer_rust_log_when_both_filters_are_set() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("GUILDWARDEN_LOG", "warn"), ("RUST_LOG", "trace")]));
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_ignore_unparsable_port_when_overriding() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("GUILDWARDEN_PORT", "http")]));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_reject_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_zero_workers() {
        let mut config = Config::default();
        config.scheduler.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_tick_interval() {
        let mut config = Config::default();
        config.scheduler.tick_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_event_capacity() {
        let mut config = Config::default();
        config.events.capacity = 0;
        assert!(config.validate().is_err());
    }
}
