//! Configuration loading, validation, and management for AgentWeave.
//!
//! Loads configuration from `~/.agentweave/config.toml` with environment
//! variable overrides. Validates all settings at startup.

pub mod logging;

use agentweave_core::UnitPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use logging::init_tracing;

/// The root configuration structure.
///
/// Maps directly to `~/.agentweave/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default model provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Ordered provider fallback chain
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-unit call policy overrides
    #[serde(default)]
    pub units: HashMap<String, UnitPolicyConfig>,

    /// External tool servers speaking JSON-RPC over stdio
    #[serde(default)]
    pub mcp_servers: HashMap<String, McpServerConfig>,

    /// Remote agents reached over server-sent events
    #[serde(default)]
    pub remote_agents: Vec<RemoteAgentConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("providers", &self.providers)
            .field("fallback", &self.fallback)
            .field("logging", &self.logging)
            .field("units", &self.units)
            .field("mcp_servers", &self.mcp_servers)
            .field("remote_agents", &self.remote_agents)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Provider names tried in order after the default provider.
    #[serde(default)]
    pub chain: Vec<String>,

    #[serde(default = "default_fallback_timeout")]
    pub timeout_secs: u64,
}

fn default_fallback_timeout() -> u64 {
    120
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            chain: vec![],
            timeout_secs: default_fallback_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Call policy of one unit as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitPolicyConfig {
    /// 0 = unbounded
    #[serde(default)]
    pub timeout_secs: f64,

    #[serde(default)]
    pub retries: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: f64,

    #[serde(default)]
    pub permission_required: bool,

    #[serde(default)]
    pub permitted_names: Vec<String>,
}

fn default_retry_delay() -> f64 {
    1.0
}

impl Default for UnitPolicyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 0.0,
            retries: 0,
            retry_delay_secs: default_retry_delay(),
            permission_required: false,
            permitted_names: vec![],
        }
    }
}

impl From<&UnitPolicyConfig> for UnitPolicy {
    fn from(config: &UnitPolicyConfig) -> Self {
        UnitPolicy {
            permission_required: config.permission_required,
            permitted_names: config.permitted_names.clone(),
            timeout: None,
            retries: config.retries,
            retry_delay: Duration::try_from_secs_f64(config.retry_delay_secs.max(0.0))
                .unwrap_or_default(),
        }
        .with_timeout_secs(config.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_mcp_timeout")]
    pub request_timeout_secs: u64,
}

fn default_mcp_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteAgentConfig {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub server_url: String,

    /// Forward the local call stack instead of presenting as "user"
    #[serde(default)]
    pub share_call_stack: bool,
}

impl AppConfig {
    /// Load configuration from the default path (~/.agentweave/config.toml).
    ///
    /// Also checks environment variables:
    /// - `AGENTWEAVE_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `AGENTWEAVE_PROVIDER`
    /// - `AGENTWEAVE_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("AGENTWEAVE_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("AGENTWEAVE_PROVIDER") {
            self.default_provider = provider;
        }

        if let Ok(model) = std::env::var("AGENTWEAVE_MODEL") {
            self.default_model = model;
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".agentweave")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        for (name, unit) in &self.units {
            for (field, secs) in [
                ("timeout_secs", unit.timeout_secs),
                ("retry_delay_secs", unit.retry_delay_secs),
            ] {
                if secs < 0.0 || Duration::try_from_secs_f64(secs).is_err() {
                    return Err(ConfigError::ValidationError(format!(
                        "unit '{name}': {field} must be a finite number of seconds >= 0, got {secs}"
                    )));
                }
            }
        }

        for (name, server) in &self.mcp_servers {
            if server.command.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "mcp server '{name}': command must not be empty"
                )));
            }
        }

        for remote in &self.remote_agents {
            if !remote.server_url.starts_with("http://") && !remote.server_url.starts_with("https://")
            {
                return Err(ConfigError::ValidationError(format!(
                    "remote agent '{}': server_url must start with http:// or https://",
                    remote.name
                )));
            }
        }

        for name in &self.fallback.chain {
            if !self.providers.contains_key(name) && name != &self.default_provider {
                return Err(ConfigError::ValidationError(format!(
                    "fallback chain references unknown provider '{name}'"
                )));
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The configured call policy for `unit`, or the default policy.
    pub fn policy_for(&self, unit: &str) -> UnitPolicy {
        self.units.get(unit).map(UnitPolicy::from).unwrap_or_default()
    }

    /// Enabled tool servers.
    pub fn enabled_mcp_servers(&self) -> impl Iterator<Item = (&String, &McpServerConfig)> {
        self.mcp_servers.iter().filter(|(_, server)| server.enabled)
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            providers: HashMap::new(),
            fallback: FallbackConfig::default(),
            logging: LoggingConfig::default(),
            units: HashMap::new(),
            mcp_servers: HashMap::new(),
            remote_agents: vec![],
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.fallback.timeout_secs, config.fallback.timeout_secs);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        let config = result.unwrap();
        assert_eq!(config.default_provider, "openai");
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-secret"));
    }

    #[test]
    fn load_from_file_parses_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_provider = "deepseek"
default_model = "deepseek-chat"

[providers.deepseek]
api_url = "https://api.deepseek.com/v1"

[logging]
level = "debug"
json = true

[units.researcher]
timeout_secs = 30
retries = 2
retry_delay_secs = 0.5
permission_required = true
permitted_names = ["web_search"]

[mcp_servers.files]
command = "npx"
args = ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]

[[remote_agents]]
name = "weather"
server_url = "http://localhost:8081"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_provider, "deepseek");
        assert!(config.logging.json);
        assert_eq!(config.mcp_servers["files"].args.len(), 3);
        assert!(config.mcp_servers["files"].enabled);
        assert_eq!(config.remote_agents[0].name, "weather");

        let policy = config.policy_for("researcher");
        assert!(policy.permission_required);
        assert_eq!(policy.permitted_names, vec!["web_search"]);
        assert_eq!(policy.timeout, Some(Duration::from_secs(30)));
        assert_eq!(policy.retries, 2);
        assert_eq!(policy.retry_delay, Duration::from_millis(500));
    }

    #[test]
    fn unknown_unit_gets_default_policy() {
        let config = AppConfig::default();
        assert_eq!(config.policy_for("anyone"), UnitPolicy::default());
    }

    #[test]
    fn remote_agent_url_must_be_http() {
        let config = AppConfig {
            remote_agents: vec![RemoteAgentConfig {
                name: "r".into(),
                description: String::new(),
                server_url: "ftp://example.com".into(),
                share_call_stack: false,
            }],
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn unrepresentable_durations_are_rejected() {
        for body in [
            "[units.w]\ntimeout_secs = inf\n",
            "[units.w]\ntimeout_secs = 1e300\n",
            "[units.w]\nretry_delay_secs = inf\n",
            "[units.w]\nretry_delay_secs = nan\n",
        ] {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            write!(file, "{body}").unwrap();
            let err = AppConfig::load_from(file.path()).unwrap_err();
            assert!(matches!(err, ConfigError::ValidationError(_)), "accepted: {body}");
        }
    }

    #[test]
    fn policy_conversion_tolerates_unvalidated_values() {
        let config = UnitPolicyConfig {
            timeout_secs: f64::INFINITY,
            retry_delay_secs: f64::NAN,
            ..UnitPolicyConfig::default()
        };
        let policy = UnitPolicy::from(&config);
        assert_eq!(policy.timeout, None);
        assert_eq!(policy.retry_delay, Duration::ZERO);
    }

    #[test]
    fn parse_error_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_temperature = \"hot\"").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("openai"));
        assert!(toml_str.contains("gpt-4o-mini"));
    }
}
