//! cpxstat.toml configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file
//! (optionally one named section of it), then `CPXSTAT_*` environment
//! variables. Command-line flags are applied last by the binary.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::endpoint::RegistryEndpoint;
use crate::error::ConfigError;
use crate::types::InstanceErrorPolicy;

pub const ENV_CONFIG_PATH: &str = "CPXSTAT_CONFIG";
pub const ENV_REGISTRY_URL: &str = "CPXSTAT_REGISTRY_URL";
pub const ENV_REGISTRY_TIMEOUT: &str = "CPXSTAT_REGISTRY_TIMEOUT";
pub const ENV_WATCH_INTERVAL: &str = "CPXSTAT_WATCH_INTERVAL";
pub const ENV_LOG_FILTER: &str = "CPXSTAT_LOG_FILTER";
pub const ENV_LOG_FORMAT: &str = "CPXSTAT_LOG_FORMAT";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CONCURRENCY: usize = 8;
const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_LOG_FILTER: &str = "warn,cpxstat=info";

// ── On-disk layout ────────────────────────────────────────────────

/// The file as written by the user. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub registry: Option<RegistrySection>,
    pub watch: Option<WatchSection>,
    pub logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrySection {
    pub url: Option<String>,
    pub timeout: Option<String>,
    pub concurrency: Option<usize>,
    pub on_instance_error: Option<InstanceErrorPolicy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchSection {
    pub interval: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    pub filter: Option<String>,
    pub format: Option<LogFormat>,
}

impl ConfigFile {
    pub fn from_file(path: &Path, section: Option<&str>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, section)
    }

    /// Parse a config document. With `section`, the named top-level table
    /// holds the settings instead of the document root.
    pub fn from_toml_str(content: &str, section: Option<&str>) -> Result<Self, ConfigError> {
        let Some(section) = section else {
            return Ok(toml::from_str(content)?);
        };

        let mut table: toml::Table = toml::from_str(content)?;
        let value = table
            .remove(section)
            .ok_or_else(|| ConfigError::MissingSection(section.to_string()))?;
        if !value.is_table() {
            return Err(ConfigError::MissingSection(section.to_string()));
        }
        Ok(value.try_into::<ConfigFile>()?)
    }
}

// ── Resolved configuration ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format `{other}` (expected text or json)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    pub endpoint: RegistryEndpoint,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum in-flight instance fetches.
    pub concurrency: usize,
    pub on_instance_error: InstanceErrorPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfig {
    pub interval: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub filter: String,
    pub format: LogFormat,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CpxConfig {
    pub registry: RegistryConfig,
    pub watch: WatchConfig,
    pub logging: LoggingConfig,
}

impl Default for CpxConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig {
                endpoint: RegistryEndpoint::default(),
                timeout: DEFAULT_TIMEOUT,
                concurrency: DEFAULT_CONCURRENCY,
                on_instance_error: InstanceErrorPolicy::Abort,
            },
            watch: WatchConfig {
                interval: DEFAULT_WATCH_INTERVAL,
            },
            logging: LoggingConfig {
                filter: DEFAULT_LOG_FILTER.to_string(),
                format: LogFormat::Text,
            },
        }
    }
}

impl CpxConfig {
    /// Defaults, then `path` (or `$CPXSTAT_CONFIG`), then the process environment.
    pub fn load(path: Option<&Path>, section: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let env_path = std::env::var(ENV_CONFIG_PATH).ok().filter(|p| !p.is_empty());
        let path = path.map(Path::to_path_buf).or_else(|| env_path.map(Into::into));
        if let Some(path) = path {
            config.apply_file(ConfigFile::from_file(&path, section)?)?;
        }

        config.apply_env(std::env::vars())?;
        Ok(config)
    }

    pub fn apply_file(&mut self, file: ConfigFile) -> Result<(), ConfigError> {
        if let Some(registry) = file.registry {
            if let Some(url) = registry.url {
                self.set_registry_url(&url)?;
            }
            if let Some(timeout) = registry.timeout {
                self.registry.timeout = parse_positive_duration("registry.timeout", &timeout)?;
            }
            if let Some(concurrency) = registry.concurrency {
                if concurrency == 0 {
                    return Err(ConfigError::Invalid {
                        field: "registry.concurrency",
                        reason: "must be at least 1".to_string(),
                    });
                }
                self.registry.concurrency = concurrency;
            }
            if let Some(policy) = registry.on_instance_error {
                self.registry.on_instance_error = policy;
            }
        }

        if let Some(interval) = file.watch.and_then(|w| w.interval) {
            self.watch.interval = parse_positive_duration("watch.interval", &interval)?;
        }

        if let Some(logging) = file.logging {
            if let Some(filter) = logging.filter {
                self.logging.filter = filter;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    /// Apply `CPXSTAT_*` overrides from an environment snapshot.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                ENV_REGISTRY_URL => self.set_registry_url(&value)?,
                ENV_REGISTRY_TIMEOUT => {
                    self.registry.timeout = parse_positive_duration("registry.timeout", &value)?;
                }
                ENV_WATCH_INTERVAL => {
                    self.watch.interval = parse_positive_duration("watch.interval", &value)?;
                }
                ENV_LOG_FILTER => self.logging.filter = value,
                ENV_LOG_FORMAT => {
                    self.logging.format = value
                        .parse()
                        .map_err(|reason| ConfigError::Invalid { field: "logging.format", reason })?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn set_registry_url(&mut self, url: &str) -> Result<(), ConfigError> {
        self.registry.endpoint = RegistryEndpoint::parse(url).map_err(|e| ConfigError::Invalid {
            field: "registry.url",
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

fn parse_positive_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match parse_duration(value) {
        Some(d) if !d.is_zero() => Ok(d),
        Some(_) => Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero".to_string(),
        }),
        None => Err(ConfigError::Invalid {
            field,
            reason: format!("cannot parse duration {value:?}"),
        }),
    }
}

/// Parse a duration string like "5s", "500ms", "1m". A bare number is seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
