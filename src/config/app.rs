//! Prober configuration structures.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::pool::TcpConfig;
use crate::probe::http::HttpConfig;
use crate::probe::ping::{PingConfig, PingProfile};

use super::validation::{
    ConfigError, expand_env_vars, require_non_zero, validate_ping_count, validate_target,
};

/// Number of probes allowed to run at once when not configured.
///
/// Scales with the available parallelism of the host, at least 1.
pub fn default_max_concurrent_probes() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

// =============================================================================
// Execution Configuration
// =============================================================================

/// How the three probes of a run are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Ping, then HTTP, then TCP, logging progress between each.
    #[default]
    Sequential,
    /// All three at once, bounded by `max_concurrent_probes`.
    Concurrent,
}

/// Probe scheduling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Sequential or concurrent (default: sequential).
    pub mode: ExecutionMode,
    /// Probes allowed in flight at once (default: available parallelism).
    pub max_concurrent_probes: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
            max_concurrent_probes: default_max_concurrent_probes(),
        }
    }
}

// =============================================================================
// Prober Configuration
// =============================================================================

/// Top-level prober configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProberConfig {
    /// Target address, `host:port` or bare host. `${VAR:-default}` is expanded.
    #[serde(default)]
    pub target: String,

    /// ICMP probe settings.
    #[serde(default)]
    pub ping: PingConfig,

    /// HTTP probe and transport settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// TCP dialing and connection reuse settings.
    #[serde(default)]
    pub tcp: TcpConfig,

    /// Probe scheduling.
    #[serde(default)]
    pub execution: ExecutionConfig,
}

impl ProberConfig {
    /// Default configuration for `target`.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ping: PingConfig::default(),
            http: HttpConfig::default(),
            tcp: TcpConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }

    /// Load configuration from a YAML file.
    ///
    /// The target may be left empty here and supplied later (e.g. from the
    /// command line); call [`validate`](Self::validate) once it is final.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(content)?;
        config.target = expand_env_vars(config.target.trim());
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_target(&self.target)?;

        if self.ping.enabled {
            validate_ping_count(self.ping.count)?;
            require_non_zero("ping.timeout", self.ping.timeout)?;
        }

        require_non_zero("http.timeout", self.http.timeout)?;
        require_non_zero("tcp.dial_timeout", self.tcp.dial_timeout)?;

        if self.execution.max_concurrent_probes == 0 {
            return Err(ConfigError::ValidationError(
                "execution.max_concurrent_probes must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Switch the ping probe to a preset profile.
    pub fn with_ping_profile(mut self, profile: PingProfile) -> Self {
        self.ping = self.ping.with_profile(profile);
        self
    }

    /// Enable or disable the ping probe.
    pub fn with_ping_enabled(mut self, enabled: bool) -> Self {
        self.ping.enabled = enabled;
        self
    }

    /// Enable or disable TCP connection reuse.
    pub fn with_connection_reuse(mut self, reuse: bool) -> Self {
        self.tcp.reuse_connections = reuse;
        self
    }

    /// Set the execution mode.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution.mode = mode;
        self
    }

    pub fn with_ping(mut self, ping: PingConfig) -> Self {
        self.ping = ping;
        self
    }

    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    pub fn with_tcp(mut self, tcp: TcpConfig) -> Self {
        self.tcp = tcp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_prober_config_defaults() {
        let config = ProberConfig::new("example.com:80");

        assert_eq!(config.target, "example.com:80");
        assert_eq!(config.ping.count, 10);
        assert_eq!(config.ping.timeout, Duration::from_secs(10));
        assert_eq!(config.http.timeout, Duration::from_secs(30));
        assert_eq!(config.tcp.dial_timeout, Duration::from_secs(10));
        assert_eq!(config.tcp.keepalive, Duration::from_secs(90));
        assert!(config.tcp.reuse_connections);
        assert_eq!(config.execution.mode, ExecutionMode::Sequential);
        assert_eq!(
            config.execution.max_concurrent_probes,
            default_max_concurrent_probes()
        );
        assert!(config.execution.max_concurrent_probes >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_prober_config_fast_profile() {
        let config = ProberConfig::new("example.com").with_ping_profile(PingProfile::Fast);
        assert_eq!(config.ping.count, 5);
        assert_eq!(config.ping.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_from_yaml_with_durations() {
        let yaml = r#"
target: "10.0.0.5:8080"
ping:
  count: 3
  timeout: 2s
  interval: 200ms
http:
  timeout: 5s
tcp:
  dial_timeout: 1500ms
  keepalive: 30s
  reuse_connections: false
execution:
  mode: concurrent
  max_concurrent_probes: 2
"#;
        let config = ProberConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.target, "10.0.0.5:8080");
        assert_eq!(config.ping.count, 3);
        assert!(config.ping.enabled);
        assert_eq!(config.ping.timeout, Duration::from_secs(2));
        assert_eq!(config.ping.interval, Duration::from_millis(200));
        assert_eq!(config.http.timeout, Duration::from_secs(5));
        // Unspecified fields keep their defaults.
        assert_eq!(config.http.pool_max_idle_per_host, 5);
        assert_eq!(config.tcp.dial_timeout, Duration::from_millis(1500));
        assert!(!config.tcp.reuse_connections);
        assert_eq!(config.execution.mode, ExecutionMode::Concurrent);
        assert_eq!(config.execution.max_concurrent_probes, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_expands_target_env() {
        let yaml = "target: \"${NONEXISTENT_PROBE_TARGET_987:-probe.local:81}\"\n";
        let config = ProberConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.target, "probe.local:81");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "target: example.org:80\nping:\n  enabled: false").unwrap();

        let config = ProberConfig::load(file.path()).unwrap();
        assert_eq!(config.target, "example.org:80");
        assert!(!config.ping.enabled);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ProberConfig::load("/nonexistent/pathprobe.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    fn test_from_yaml_invalid() {
        let err = ProberConfig::from_yaml("ping: [not, a, map]").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(ProberConfig::new("").validate().is_err());
        assert!(ProberConfig::new("http://example.com").validate().is_err());
        assert!(ProberConfig::new("bad host:80").validate().is_err());
        assert!(ProberConfig::new("example.com:0").validate().is_err());
        assert!(ProberConfig::new("example.com:99999").validate().is_err());

        let mut config = ProberConfig::new("example.com:80");
        config.ping.count = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ping.count"));

        config.ping.count = 70_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ping.count must be between 1 and 65535"));

        // A disabled ping probe is not validated.
        config.ping.enabled = false;
        assert!(config.validate().is_ok());

        let mut config = ProberConfig::new("example.com:80");
        config.execution.max_concurrent_probes = 0;
        assert!(config.validate().is_err());

        let mut config = ProberConfig::new("example.com:80");
        config.tcp.dial_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
