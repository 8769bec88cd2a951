//! Configuration loading and constants.
//!
//! Loads application configuration from TOML files and defines defaults for
//! the HTTP listener, endpoint paths, probe timeouts and logging. `AppConfig`
//! is the root configuration struct containing all settings.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use const_format::formatcp;
use reqwest::Method;
use serde::Deserialize;

use crate::health::url::{DEFAULT_STATUS_CODE, DEFAULT_URL_TIMEOUT};
use crate::health::{Credential, Probe, UrlProbe};

// =============================================================================
// Endpoints
// =============================================================================

/// Aggregated probe report
pub const HEALTHCHECK_PATH: &str = "/healthcheck.json";

/// Build identity report
pub const PING_PATH: &str = "/ping.json";

/// Health and identity responses must never be served from a cache
pub const CACHE_CONTROL_NO_STORE: &str = "no-store";

// =============================================================================
// Probe Defaults
// =============================================================================

/// Default address for the database reachability probe (PostgreSQL port)
pub const DEFAULT_DATABASE_ADDRESS: &str = "127.0.0.1:5432";

/// Connect timeout for the database probe, in seconds
pub const DEFAULT_DATABASE_TIMEOUT_SECS: u64 = 5;

/// Request timeout for URL probes, in seconds
pub const DEFAULT_URL_PROBE_TIMEOUT_SECS: u64 = DEFAULT_URL_TIMEOUT.as_secs();

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Crate name used as the log target prefix
pub const CRATE_NAME: &str = "healthz";

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = formatcp!("config/{}.toml", CRATE_NAME);

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = formatcp!("{}=info,tower_http=info", CRATE_NAME);

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration
    pub http: HttpServerConfig,
    /// Registry behaviour
    #[serde(default)]
    pub health: HealthConfig,
    /// Target of the built-in database probe
    #[serde(default)]
    pub database: DatabaseConfig,
    /// URL probes contributed by configuration
    #[serde(default)]
    pub url_probe: Vec<UrlProbeConfig>,
    /// Build identity endpoint; not served when absent
    pub ping: Option<PingConfig>,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

/// Registry settings
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// Default probe references; `None` means `["database"]`
    pub probes: Option<Vec<String>>,
    /// Whether installed extensions contribute probes (default: true)
    #[serde(default = "HealthConfig::default_autodiscover")]
    pub autodiscover: bool,
    /// Await probes together instead of one by one (default: false)
    #[serde(default)]
    pub concurrent: bool,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probes: None,
            autodiscover: Self::default_autodiscover(),
            concurrent: false,
        }
    }
}

impl HealthConfig {
    fn default_autodiscover() -> bool {
        true
    }
}

/// Database probe target
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// host:port to connect to
    #[serde(default = "DatabaseConfig::default_address")]
    pub address: String,
    #[serde(default = "DatabaseConfig::default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            address: Self::default_address(),
            timeout_seconds: Self::default_timeout(),
        }
    }
}

impl DatabaseConfig {
    fn default_address() -> String {
        DEFAULT_DATABASE_ADDRESS.to_string()
    }

    fn default_timeout() -> u64 {
        DEFAULT_DATABASE_TIMEOUT_SECS
    }
}

/// A URL probe declared in configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UrlProbeConfig {
    pub name: String,
    pub url: String,
    /// HTTP method (default: GET)
    #[serde(default = "UrlProbeConfig::default_method")]
    pub method: String,
    pub body: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Basic auth user name
    pub username: Option<String>,
    pub password: Option<String>,
    pub bearer_token: Option<String>,
    /// Expected status (default: 200)
    #[serde(default = "UrlProbeConfig::default_status_code")]
    pub status_code: u16,
    /// Skip the status code check entirely
    #[serde(default)]
    pub ignore_status: bool,
    #[serde(default = "UrlProbeConfig::default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub allow_redirects: bool,
    pub text_in_response: Option<String>,
    /// Dotted path into the JSON body; requires `json_value`
    pub json_path: Option<String>,
    pub json_value: Option<serde_json::Value>,
    /// Report the parsed JSON body on success
    #[serde(default)]
    pub include_response: bool,
}

impl UrlProbeConfig {
    fn default_method() -> String {
        "GET".to_string()
    }

    fn default_status_code() -> u16 {
        DEFAULT_STATUS_CODE
    }

    fn default_timeout() -> u64 {
        DEFAULT_URL_PROBE_TIMEOUT_SECS
    }

    /// Builds the probe this section describes.
    pub fn build(&self) -> Result<Arc<dyn Probe>, ConfigError> {
        let method = Method::from_bytes(self.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| {
                ConfigError::Validation(format!(
                    "url_probe '{}': invalid method '{}': {}",
                    self.name, self.method, e
                ))
            })?;

        let mut probe = UrlProbe::new(self.name.clone(), self.url.clone())
            .method(method)
            .timeout(Duration::from_secs(self.timeout_seconds))
            .allow_redirects(self.allow_redirects)
            .status_code((!self.ignore_status).then_some(self.status_code));

        if let Some(body) = &self.body {
            probe = probe.body(body.clone());
        }
        for (name, value) in &self.headers {
            probe = probe.header(name.clone(), value.clone());
        }
        match (&self.username, &self.bearer_token) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Validation(format!(
                    "url_probe '{}': username and bearer_token are mutually exclusive",
                    self.name
                )))
            }
            (Some(username), None) => {
                probe = probe.credential(Credential::Basic {
                    username: username.clone(),
                    password: self.password.clone(),
                })
            }
            (None, Some(token)) => probe = probe.credential(Credential::Bearer(token.clone())),
            (None, None) => {}
        }
        if let Some(text) = &self.text_in_response {
            probe = probe.text_in_response(text.clone());
        }
        match (&self.json_path, &self.json_value) {
            (Some(path), Some(value)) => {
                probe = probe.value_at_json_path(value.clone(), path.clone())
            }
            (None, None) => {}
            _ => {
                return Err(ConfigError::Validation(format!(
                    "url_probe '{}': json_path and json_value must be set together",
                    self.name
                )))
            }
        }

        let probe: Arc<dyn Probe> = if self.include_response {
            Arc::new(probe.include_response())
        } else {
            Arc::new(probe)
        };
        Ok(probe)
    }
}

/// Environment variable names for the build identity endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PingConfig {
    /// Container/image build date (mandatory)
    pub build_date_key: Option<String>,
    /// Git SHA the build came from (mandatory)
    pub commit_id_key: Option<String>,
    /// Image tag
    pub version_number_key: Option<String>,
    /// CI job name and id
    pub build_tag_key: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;

        if !matches!(config.logging.format.to_ascii_lowercase().as_str(), "text" | "json") {
            return Err(ConfigError::Validation(format!(
                "logging.format must be \"text\" or \"json\", got \"{}\"",
                config.logging.format
            )));
        }

        Ok(config)
    }

    /// Builds every configured URL probe, failing on the first invalid section.
    pub fn url_probes(&self) -> Result<Vec<Arc<dyn Probe>>, ConfigError> {
        self.url_probe.iter().map(UrlProbeConfig::build).collect()
    }

    /// True when `[[url_probe]]` sections exist but autodiscovery will never register them.
    pub fn url_probes_ignored(&self) -> bool {
        !self.url_probe.is_empty() && !self.health.autodiscover
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}
