//! Configuration system for benchgrid
//!
//! Supports multiple configuration sources with the following precedence
//! (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (BENCHGRID_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::remote::{BatchConfig, RateLimiterConfig, RemoteRunnerConfig};

/// Main runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Result cache settings
    pub cache: CacheSettings,

    /// Local execution settings
    pub local: LocalSettings,

    /// Remote fleet settings
    pub remote: RemoteSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Result cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache directory for result files
    pub dir: String,

    /// Reuse cached results instead of recomputing
    pub use_cache: bool,
}

/// Local execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalSettings {
    /// Number of concurrent local workers (0 = one per CPU)
    pub workers: usize,
}

/// Remote fleet settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Host slots as 'hostname:remote_binary'; a hostname may repeat to
    /// grant it more concurrent slots
    #[serde(default)]
    pub hosts: Vec<String>,

    /// Maximum new connections per host within one rate window
    pub max_connections_per_window: usize,

    /// Rate window length in seconds
    pub rate_window_secs: u64,

    /// Poll interval while waiting for an admission slot, in seconds
    pub rate_poll_interval_secs: u64,

    /// Upper bound of the random pre-connection jitter in seconds
    pub jitter_max_secs: u64,

    /// Timeout for the pre-flight cleanup command per host, in seconds
    pub preflight_timeout_secs: u64,

    /// Timeout for one remote execution in seconds (0 = wait forever)
    pub exec_timeout_secs: u64,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            local: LocalSettings::default(),
            remote: RemoteSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: "~/.benchgrid/cache".to_string(),
            use_cache: true,
        }
    }
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self { workers: 0 }
    }
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            hosts: vec![],
            max_connections_per_window: 5,
            rate_window_secs: 60,
            rate_poll_interval_secs: 5,
            jitter_max_secs: 5,
            preflight_timeout_secs: 15,
            exec_timeout_secs: 3600,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            json_format: false,
        }
    }
}

impl RunnerConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        let config_file = Self::find_config_file(config_path)?;
        if let Some(path) = config_file {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path).map_err(|e| Error::IoRead {
                path: path.clone(),
                source: e,
            })?;
            config = toml::from_str(&content).map_err(|e| Error::ConfigParse {
                message: format!("{}", path.display()),
                source: Some(e),
            })?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // If explicit path provided, use it (error if not found)
        if let Some(path) = explicit_path {
            let expanded = shellexpand::tilde(path);
            let path = PathBuf::from(expanded.as_ref());
            if path.exists() {
                return Ok(Some(path));
            } else {
                return Err(Error::ConfigNotFound { path, source: None });
            }
        }

        // Search in standard locations
        let search_paths = [
            // Current directory
            PathBuf::from("benchgrid.toml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("benchgrid").join("config.toml"))
                .unwrap_or_default(),
            // Home directory
            dirs::home_dir()
                .map(|p| p.join(".benchgrid").join("config.toml"))
                .unwrap_or_default(),
            // System config (Linux)
            PathBuf::from("/etc/benchgrid/config.toml"),
        ];

        for path in &search_paths {
            if path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Cache settings
        if let Ok(val) = std::env::var("BENCHGRID_CACHE_DIR") {
            self.cache.dir = val;
        }
        if let Ok(val) = std::env::var("BENCHGRID_USE_CACHE") {
            self.cache.use_cache = val.to_lowercase() == "true" || val == "1";
        }

        // Local settings
        if let Ok(val) = std::env::var("BENCHGRID_WORKERS") {
            if let Ok(n) = val.parse() {
                self.local.workers = n;
            }
        }

        // Remote settings
        if let Ok(val) = std::env::var("BENCHGRID_HOSTS") {
            self.remote.hosts = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(val) = std::env::var("BENCHGRID_MAX_CONNECTIONS_PER_WINDOW") {
            if let Ok(n) = val.parse() {
                self.remote.max_connections_per_window = n;
            }
        }
        if let Ok(val) = std::env::var("BENCHGRID_RATE_WINDOW_SECS") {
            if let Ok(n) = val.parse() {
                self.remote.rate_window_secs = n;
            }
        }
        if let Ok(val) = std::env::var("BENCHGRID_JITTER_MAX_SECS") {
            if let Ok(n) = val.parse() {
                self.remote.jitter_max_secs = n;
            }
        }
        if let Ok(val) = std::env::var("BENCHGRID_PREFLIGHT_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.remote.preflight_timeout_secs = n;
            }
        }
        if let Ok(val) = std::env::var("BENCHGRID_EXEC_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.remote.exec_timeout_secs = n;
            }
        }

        // Logging settings
        if let Ok(val) = std::env::var("BENCHGRID_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("BENCHGRID_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("BENCHGRID_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        self.cache.dir = expand_path(&self.cache.dir);
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.cache.dir.is_empty() {
            return Err(Error::ConfigValidation {
                message: "cache.dir cannot be empty".to_string(),
                field: Some("cache.dir".to_string()),
            });
        }

        if self.remote.max_connections_per_window == 0 {
            return Err(Error::ConfigValidation {
                message: "remote.max_connections_per_window must be at least 1".to_string(),
                field: Some("remote.max_connections_per_window".to_string()),
            });
        }
        if self.remote.rate_window_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "remote.rate_window_secs must be at least 1".to_string(),
                field: Some("remote.rate_window_secs".to_string()),
            });
        }

        // Host entries must parse; duplicates are deliberate (extra slots).
        for entry in &self.remote.hosts {
            crate::types::HostSlot::parse(entry)?;
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "invalid log level '{}', must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
                field: Some("logging.level".to_string()),
            });
        }

        Ok(())
    }

    /// Get the cache directory as a PathBuf
    pub fn cache_dir(&self) -> PathBuf {
        PathBuf::from(&self.cache.dir)
    }

    /// Effective local worker count (0 resolves to the CPU count)
    pub fn local_workers(&self) -> usize {
        if self.local.workers == 0 {
            num_cpus::get()
        } else {
            self.local.workers
        }
    }

    /// Assemble the batch coordinator settings from the remote section
    pub fn batch_config(&self, show_status: bool) -> BatchConfig {
        BatchConfig {
            preflight_timeout: Duration::from_secs(self.remote.preflight_timeout_secs),
            runner: RemoteRunnerConfig {
                jitter_max: Duration::from_secs(self.remote.jitter_max_secs),
                exec_timeout: match self.remote.exec_timeout_secs {
                    0 => None,
                    secs => Some(Duration::from_secs(secs)),
                },
            },
            limiter: RateLimiterConfig {
                max_per_window: self.remote.max_connections_per_window,
                window: Duration::from_secs(self.remote.rate_window_secs),
                poll_interval: Duration::from_secs(self.remote.rate_poll_interval_secs),
            },
            show_status,
        }
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<()> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".benchgrid")
                .join("config.toml")
        });

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&config_path, default_config_template()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    println!("Configuration file created: {}", config_path.display());
    Ok(())
}

/// Print the effective configuration as TOML
pub fn show_config(config: &RunnerConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config)?;
    println!("{}", rendered);
    Ok(())
}

/// Default configuration content with comments
fn default_config_template() -> &'static str {
    r#"# benchgrid configuration

[cache]
# Directory for cached result files
dir = "~/.benchgrid/cache"

# Reuse cached results instead of recomputing
use_cache = true

[local]
# Concurrent local workers (0 = one per CPU)
workers = 0

[remote]
# Host slots as "hostname:remote_binary". Repeat a hostname to give it
# more concurrent slots.
# hosts = [
#     "machine1:/usr/local/bin/benchgrid",
#     "machine1:/usr/local/bin/benchgrid",
#     "machine2:/opt/benchgrid/benchgrid",
# ]
hosts = []

# Maximum new ssh connections per host within one rate window
max_connections_per_window = 5

# Rate window length in seconds
rate_window_secs = 60

# Poll interval while waiting for an admission slot, in seconds
rate_poll_interval_secs = 5

# Upper bound of the random pre-connection jitter in seconds
jitter_max_secs = 5

# Timeout for the pre-flight cleanup command per host, in seconds
preflight_timeout_secs = 15

# Timeout for one remote execution in seconds (0 = wait forever)
exec_timeout_secs = 3600

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.benchgrid/logs/benchgrid.log"

# Enable JSON formatted logging
json_format = false
"#
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert!(config.cache.use_cache);
        assert_eq!(config.remote.max_connections_per_window, 5);
        assert_eq!(config.remote.rate_window_secs, 60);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("BENCHGRID_LOG_LEVEL", "debug");
        std::env::set_var("BENCHGRID_WORKERS", "3");
        std::env::set_var("BENCHGRID_HOSTS", "m1:/bin/bg, m2:/bin/bg");

        let mut config = RunnerConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.local.workers, 3);
        assert_eq!(config.remote.hosts, vec!["m1:/bin/bg", "m2:/bin/bg"]);

        std::env::remove_var("BENCHGRID_LOG_LEVEL");
        std::env::remove_var("BENCHGRID_WORKERS");
        std::env::remove_var("BENCHGRID_HOSTS");
    }

    #[test]
    fn test_validation_rejects_zero_rate_limit() {
        let mut config = RunnerConfig::default();
        config.remote.max_connections_per_window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_host_entry() {
        let mut config = RunnerConfig::default();
        config.remote.hosts = vec!["nocolon".to_string()];
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidHostSlot { .. })
        ));
    }

    #[test]
    fn test_validation_rejects_bad_log_level() {
        let mut config = RunnerConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_path_expansion() {
        let mut config = RunnerConfig::default();
        config.cache.dir = "~/grid/cache".to_string();
        config.expand_paths();
        assert!(!config.cache.dir.contains('~'));
    }

    #[test]
    fn test_parse_config_file() {
        let config_str = r#"
[cache]
dir = "/data/benchgrid"
use_cache = false

[local]
workers = 4

[remote]
hosts = ["m1:/usr/local/bin/benchgrid", "m1:/usr/local/bin/benchgrid"]
max_connections_per_window = 3
exec_timeout_secs = 0

[logging]
level = "debug"
"#;

        let config: RunnerConfig = toml::from_str(config_str).unwrap();
        assert_eq!(config.cache.dir, "/data/benchgrid");
        assert!(!config.cache.use_cache);
        assert_eq!(config.local.workers, 4);
        assert_eq!(config.remote.hosts.len(), 2);
        assert_eq!(config.remote.max_connections_per_window, 3);
        // Zero means no execution timeout.
        assert!(config.batch_config(false).runner.exec_timeout.is_none());
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_serialize_deserialize() {
        let config = RunnerConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: RunnerConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.cache.dir, parsed.cache.dir);
        assert_eq!(config.remote.rate_window_secs, parsed.remote.rate_window_secs);
    }

    #[test]
    fn test_template_parses_to_defaults() {
        let parsed: RunnerConfig = toml::from_str(default_config_template()).unwrap();
        assert_eq!(parsed.cache.dir, RunnerConfig::default().cache.dir);
        assert!(parsed.remote.hosts.is_empty());
    }
}
