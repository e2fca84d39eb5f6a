// ABOUTME: Configuration management for the metricfeed application
// ABOUTME: Handles loading the YAML config file and merging environment overrides

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,

    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "crate::engine::http::default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_target_delay_ms")]
    pub target_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("plugins")
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("settings.json")
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_min_interval_ms() -> u64 {
    1000
}

fn default_target_delay_ms() -> u64 {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            templates_dir: default_templates_dir(),
            settings_path: default_settings_path(),
            http: HttpConfig::default(),
            scheduler: SchedulerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: crate::engine::http::default_user_agent(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            target_delay_ms: default_target_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SchedulerConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn target_delay(&self) -> Duration {
        Duration::from_millis(self.target_delay_ms)
    }
}

impl Config {
    /// Load configuration from file path or default locations
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => Self::find_config_file(),
        };

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            serde_yaml::from_str(&contents)
                .with_context(|| format!("Invalid config file {}", config_path.display()))?
        } else {
            Config::default()
        };

        config.merge_env()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let floor = crate::engine::MIN_INTERVAL.as_millis();
        if u128::from(self.scheduler.min_interval_ms) < floor {
            anyhow::bail!(
                "scheduler.min_interval_ms must be at least {}, got {}",
                floor,
                self.scheduler.min_interval_ms
            );
        }
        Ok(())
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> PathBuf {
        let mut candidates = vec![
            PathBuf::from("metricfeed.yaml"),
            PathBuf::from(".metricfeed.yaml"),
        ];

        if let Some(home_dir) = dirs::home_dir() {
            candidates.push(home_dir.join(".metricfeed").join("config.yaml"));
        }

        candidates
            .into_iter()
            .find(|path| path.exists())
            .unwrap_or_else(|| PathBuf::from("metricfeed.yaml"))
    }

    /// Merge environment variables into configuration
    fn merge_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("METRICFEED_TEMPLATES_DIR") {
            self.templates_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("METRICFEED_SETTINGS") {
            self.settings_path = PathBuf::from(path);
        }
        if let Ok(level) = std::env::var("METRICFEED_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("METRICFEED_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(timeout) = std::env::var("METRICFEED_HTTP_TIMEOUT") {
            self.http.timeout_secs = timeout
                .parse()
                .with_context(|| format!("METRICFEED_HTTP_TIMEOUT is not a number: {timeout}"))?;
        }

        Ok(())
    }
}
