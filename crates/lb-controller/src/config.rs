//! Configuration loading and validation for the controller.

use balancer::{Backend, VirtualService};
use packet::MacAddr;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

// Re-export Validate trait for derive macro
#[allow(unused_imports)]
use validator::Validate as _;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceSettings,

    /// Ordered backend pool. Order matters: it fixes the round-robin
    /// rotation and the least-connections tie-break.
    #[serde(default)]
    pub backends: Vec<BackendSettings>,

    #[serde(default)]
    pub balancing: BalancingSettings,

    #[serde(default)]
    pub switch: SwitchSettings,

    #[serde(default)]
    pub stats: StatsSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationErrors> {
        self.balancing.validate()?;
        self.stats.validate()?;

        // There is no safe fallback for an empty pool, so this is fatal
        // at startup rather than a degraded mode.
        if self.backends.is_empty() {
            let mut errors = ValidationErrors::new();
            errors.add("backends", ValidationError::new("backend_list_empty"));
            return Err(errors);
        }
        if self.backends.iter().any(|backend| backend.port == 0) {
            let mut errors = ValidationErrors::new();
            errors.add("backends", ValidationError::new("backend_port_zero"));
            return Err(errors);
        }

        Ok(())
    }
}

/// Virtual service address advertised to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
}

/// One backend server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,

    /// Switch port the backend is attached to
    pub port: u16,
}

/// Balancing behaviour
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BalancingSettings {
    /// `round_robin` or `least_connections`
    #[validate(custom = "validate_policy_name")]
    pub policy: String,

    /// Inactivity after which the switch expires a flow rule
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_idle_timeout")]
    pub idle_timeout: Duration,

    /// Absolute rule lifetime; zero disables the hard limit
    #[serde(with = "humantime_serde")]
    pub hard_timeout: Duration,

    /// Priority of installed load-balancing rules
    #[validate(range(min = 1, max = 65535))]
    pub flow_priority: u16,

    /// How often stale connection records are swept
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_sweep_interval")]
    pub sweep_interval: Duration,
}

/// Switch control channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchSettings {
    /// Address the OpenFlow listener binds
    pub listen: SocketAddr,
}

/// Stats reporter settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StatsSettings {
    pub enabled: bool,

    /// Base URL of the dashboard API
    #[validate(length(min = 1))]
    pub endpoint: String,

    /// Bounded event queue between reactor and worker
    #[validate(range(min = 1, max = 100000))]
    pub queue_size: usize,

    /// Interval of the aggregate summary log
    #[serde(with = "humantime_serde")]
    pub report_interval: Duration,

    /// How long shutdown waits for the worker to drain
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
}

// Default implementations mirror the reference topology: one switch,
// three backends on ports 1-3, clients behind the remaining ports.

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            ip: Ipv4Addr::new(10, 0, 0, 100),
            mac: MacAddr::new([0x00, 0x00, 0x00, 0x00, 0x00, 0xff]),
        }
    }
}

impl Default for BalancingSettings {
    fn default() -> Self {
        Self {
            policy: "round_robin".to_string(),
            idle_timeout: Duration::from_secs(10),
            hard_timeout: Duration::from_secs(30),
            flow_priority: 100,
            sweep_interval: Duration::from_secs(5),
        }
    }
}

impl Default for SwitchSettings {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:6633".parse().expect("static listen address"),
        }
    }
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:8080".to_string(),
            queue_size: 1024,
            report_interval: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: None,
            format: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceSettings::default(),
            backends: (1..=3u8)
                .map(|i| BackendSettings {
                    ip: Ipv4Addr::new(10, 0, 0, i),
                    mac: MacAddr::new([0x00, 0x00, 0x00, 0x00, 0x00, i]),
                    port: i as u16,
                })
                .collect(),
            balancing: BalancingSettings::default(),
            switch: SwitchSettings::default(),
            stats: StatsSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

// Custom validators

fn validate_policy_name(name: &str) -> Result<(), ValidationError> {
    if balancer::policy::from_name(name).is_none() {
        return Err(ValidationError::new("unknown_policy"));
    }
    Ok(())
}

fn validate_idle_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    let secs = timeout.as_secs();
    if secs < 1 || secs > 3600 {
        return Err(ValidationError::new("idle_timeout_out_of_range"));
    }
    Ok(())
}

fn validate_sweep_interval(interval: &Duration) -> Result<(), ValidationError> {
    let millis = interval.as_millis();
    if millis < 100 || millis > 60_000 {
        return Err(ValidationError::new("sweep_interval_out_of_range"));
    }
    Ok(())
}

// Configuration loading implementation

impl Config {
    /// Load configuration from default search paths
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(&path)
            }
            None => {
                tracing::info!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/lb-controller/lb-controller.yaml")];

        if let Some(home_path) = Self::home_config_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./lb-controller.yaml"));

        paths.into_iter().find(|p: &PathBuf| p.exists() && p.is_file())
    }

    /// Get home directory config path
    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/lb-controller/lb-controller.yaml"))
    }

    /// The virtual service address as the balancer sees it
    pub fn virtual_service(&self) -> VirtualService {
        VirtualService {
            ip: self.service.ip,
            mac: self.service.mac,
        }
    }

    /// The configured backend pool, counters zeroed
    pub fn backend_pool(&self) -> Vec<Backend> {
        self.backends
            .iter()
            .map(|backend| Backend::new(backend.ip, backend.mac, backend.port))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.backends.len(), 3);
        assert_eq!(config.virtual_service().ip, Ipv4Addr::new(10, 0, 0, 100));
    }

    #[test]
    fn test_valid_yaml_parsing() {
        let yaml = r#"
service:
  ip: "10.0.0.200"
  mac: "00:00:00:00:00:fe"

backends:
  - { ip: "10.0.0.1", mac: "00:00:00:00:00:01", port: 1 }
  - { ip: "10.0.0.2", mac: "00:00:00:00:00:02", port: 2 }

balancing:
  policy: least_connections
  idle_timeout: 10s
  hard_timeout: 30s
  flow_priority: 100
  sweep_interval: 5s
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.service.ip, Ipv4Addr::new(10, 0, 0, 200));
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.balancing.policy, "least_connections");
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let yaml = r#"
backends:
  - { ip: "10.0.0.1", mac: "00:00:00:00:00:01", port: 1 }
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.balancing.policy, "round_robin");
        assert_eq!(config.balancing.idle_timeout, Duration::from_secs(10));
        assert_eq!(config.stats.queue_size, 1024);
        assert!(config.stats.enabled);
    }

    #[test]
    fn test_empty_backend_list_rejected() {
        let yaml = r#"
balancing:
  policy: round_robin
  idle_timeout: 10s
  hard_timeout: 30s
  flow_priority: 100
  sweep_interval: 5s
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let yaml = r#"
backends:
  - { ip: "10.0.0.1", mac: "00:00:00:00:00:01", port: 1 }

balancing:
  policy: weighted  # not a known policy
  idle_timeout: 10s
  hard_timeout: 30s
  flow_priority: 100
  sweep_interval: 5s
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_idle_timeout_rejected() {
        let yaml = r#"
backends:
  - { ip: "10.0.0.1", mac: "00:00:00:00:00:01", port: 1 }

balancing:
  policy: round_robin
  idle_timeout: 0s
  hard_timeout: 30s
  flow_priority: 100
  sweep_interval: 5s
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_mac_rejected() {
        let yaml = r#"
backends:
  - { ip: "10.0.0.1", mac: "not-a-mac", port: 1 }
"#;
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn test_backend_port_zero_rejected() {
        let yaml = r#"
backends:
  - { ip: "10.0.0.1", mac: "00:00:00:00:00:01", port: 0 }
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_humantime_serde_parsing() {
        let yaml = r#"
backends:
  - { ip: "10.0.0.1", mac: "00:00:00:00:00:01", port: 1 }

balancing:
  policy: round_robin
  idle_timeout: 250ms
  hard_timeout: 1m
  flow_priority: 100
  sweep_interval: 2s
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.balancing.idle_timeout, Duration::from_millis(250));
        assert_eq!(config.balancing.hard_timeout, Duration::from_secs(60));
        assert_eq!(config.balancing.sweep_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_backend_pool_conversion() {
        let config = Config::default();
        let pool = config.backend_pool();

        assert_eq!(pool.len(), 3);
        assert_eq!(pool[0].ip, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(pool[0].port, 1);
        assert_eq!(pool[0].active_connections, 0);
        assert_eq!(pool[2].mac, MacAddr::new([0, 0, 0, 0, 0, 3]));
    }

    #[test]
    fn test_invalid_stats_queue_size() {
        let yaml = r#"
backends:
  - { ip: "10.0.0.1", mac: "00:00:00:00:00:01", port: 1 }

stats:
  enabled: true
  endpoint: "http://localhost:8080"
  queue_size: 0
  report_interval: 5s
  shutdown_grace: 2s
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }
}
