//! Wizard Configuration
//!
//! Settings for the worker connection, event handling and step gates. An
//! optional `~/.config/asset-wizard/wizard.toml` is read first.
//!
//! # Layering
//!
//! Later layers win:
//! 1. Built-in defaults
//! 2. `wizard.toml`
//! 3. `ASSET_WIZARD_*` environment variables
//! 4. Command-line flags, through [`ConfigOverrides`]
//!
//! Every layer ends in [`WizardConfig::validate`].
//!
//! # Example
//!
//! ```toml
//! [worker]
//! socket_path = "/run/user/1000/asset-wizard/worker.sock"
//! connect_timeout_ms = 5000
//! command_timeout_ms = 0
//! event_buffer = 256
//!
//! [events]
//! log_flush_interval_ms = 500
//! log_separator = "\n"
//! completion_threshold = 99.9
//!
//! [gates]
//! require_key = true
//! key_required_extensions = [".xci", ".nsp"]
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregator::EventConfig;
use crate::gates::{normalize_extension, GatePolicy};
use crate::worker::config::APP_DIR;
use crate::worker::WorkerConfig;

/// Config file name inside the application config directory
pub const CONFIG_FILE: &str = "wizard.toml";

const ENV_SOCKET: &str = "ASSET_WIZARD_SOCKET";
const ENV_CONNECT_TIMEOUT: &str = "ASSET_WIZARD_CONNECT_TIMEOUT";
const ENV_COMMAND_TIMEOUT: &str = "ASSET_WIZARD_COMMAND_TIMEOUT";
const ENV_LOG_FLUSH_MS: &str = "ASSET_WIZARD_LOG_FLUSH_MS";
const ENV_COMPLETION_THRESHOLD: &str = "ASSET_WIZARD_COMPLETION_THRESHOLD";
const ENV_REQUIRE_KEY: &str = "ASSET_WIZARD_REQUIRE_KEY";

// =============================================================================
// Errors
// =============================================================================

/// Why a configuration could not be produced
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but is unreadable
    #[error("cannot read {path}: {source}")]
    ReadError {
        /// Config file
        path: PathBuf,
        /// Cause
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`WizardToml`]
    #[error("malformed config file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid setting: {0}")]
    ValidationError(String),
}

// =============================================================================
// Provenance
// =============================================================================

/// The highest layer that changed any value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Command-line flag
    Cli,
    /// `ASSET_WIZARD_*` variable
    Env,
    /// `wizard.toml`
    File,
    /// Nothing was overridden
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => f.write_str("command line"),
            Self::Env => f.write_str("environment"),
            Self::File => f.write_str("wizard.toml"),
            Self::Default => f.write_str("defaults"),
        }
    }
}

// =============================================================================
// File Schema
// =============================================================================

/// Worker section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerToml {
    /// Unix socket path of the worker
    pub socket_path: Option<String>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Per-command timeout in milliseconds (0 = no timeout)
    pub command_timeout_ms: Option<u64>,

    /// Queue capacity per event channel
    pub event_buffer: Option<usize>,
}

/// Events section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsToml {
    /// Minimum time between log publications, in milliseconds
    pub log_flush_interval_ms: Option<u64>,

    /// Appended after every log fragment
    pub log_separator: Option<String>,

    /// Progress at which the bundle counts as ready
    pub completion_threshold: Option<f64>,
}

/// Gates section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatesToml {
    /// Enforce the key rule
    pub require_key: Option<bool>,

    /// Extensions that need a key
    pub key_required_extensions: Option<Vec<String>>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardToml {
    /// Worker connection section
    pub worker: WorkerToml,

    /// Event handling section
    pub events: EventsToml,

    /// Step gate section
    pub gates: GatesToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved wizard configuration
///
/// Built by [`load_config`] from every layer, then validated.
#[derive(Clone, Debug, PartialEq)]
pub struct WizardConfig {
    /// Worker connection
    pub worker: WorkerConfig,

    /// Event handling
    pub events: EventConfig,

    /// Step gates
    pub gates: GatePolicy,

    /// `wizard.toml` that was read, if one existed
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            worker: WorkerConfig::default(),
            events: EventConfig::default(),
            gates: GatePolicy::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl WizardConfig {
    /// Built-in defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest layer that set a value
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check value ranges and normalize extensions
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the offending value.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.events.log_flush_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "log flush interval must be greater than zero".to_string(),
            ));
        }
        let threshold = self.events.completion_threshold;
        if !(threshold > 0.0 && threshold <= 100.0) {
            return Err(ConfigError::ValidationError(format!(
                "completion threshold must be in (0, 100], got {threshold}"
            )));
        }
        if self.worker.event_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "event buffer must be at least 1".to_string(),
            ));
        }

        let mut extensions: Vec<String> = Vec::new();
        for ext in self.gates.key_required_extensions.iter().map(|e| normalize_extension(e)) {
            if ext.len() > 1 && !extensions.contains(&ext) {
                extensions.push(ext);
            }
        }
        self.gates.key_required_extensions = extensions;
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/asset-wizard/wizard.toml` or
/// `~/.config/asset-wizard/wizard.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR).join(CONFIG_FILE))
}

/// Load configuration from all sources with proper priority
///
/// CLI overrides are not handled here; apply [`ConfigOverrides`] after.
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the result fails validation. A missing config file is not an error.
pub fn load_config() -> Result<WizardConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// With `None`, only defaults and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if the result fails validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<WizardConfig, ConfigError> {
    load_layered(path, |name| std::env::var(name).ok())
}

/// Defaults, then the file at `path`, then variables from `env`
fn load_layered<E>(path: Option<PathBuf>, env: E) -> Result<WizardConfig, ConfigError>
where
    E: Fn(&str) -> Option<String>,
{
    let mut config = WizardConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: WizardToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, &env);
    config.validate()?;

    Ok(config)
}

fn apply_toml_config(config: &mut WizardConfig, toml: &WizardToml) {
    // Worker
    if let Some(ref path) = toml.worker.socket_path {
        config.worker.socket_path = Some(PathBuf::from(path));
    }
    if let Some(timeout) = toml.worker.connect_timeout_ms {
        config.worker.connect_timeout_ms = timeout;
    }
    if let Some(timeout) = toml.worker.command_timeout_ms {
        config.worker.command_timeout_ms = timeout;
    }
    if let Some(buffer) = toml.worker.event_buffer {
        config.worker.event_buffer = buffer;
    }

    // Events
    if let Some(ms) = toml.events.log_flush_interval_ms {
        config.events.log_flush_interval = Duration::from_millis(ms);
    }
    if let Some(ref separator) = toml.events.log_separator {
        config.events.log_separator.clone_from(separator);
    }
    if let Some(threshold) = toml.events.completion_threshold {
        config.events.completion_threshold = threshold;
    }

    // Gates
    if let Some(required) = toml.gates.require_key {
        config.gates.require_key = required;
    }
    if let Some(ref extensions) = toml.gates.key_required_extensions {
        config.gates.key_required_extensions.clone_from(extensions);
    }
}

fn apply_env_config<E>(config: &mut WizardConfig, env: &E)
where
    E: Fn(&str) -> Option<String>,
{
    if let Some(path) = env(ENV_SOCKET).filter(|p| !p.is_empty()) {
        config.worker.socket_path = Some(PathBuf::from(path));
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = env(ENV_CONNECT_TIMEOUT).and_then(|v| v.parse::<u64>().ok()) {
        config.worker.connect_timeout_ms = ms;
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = env(ENV_COMMAND_TIMEOUT).and_then(|v| v.parse::<u64>().ok()) {
        config.worker.command_timeout_ms = ms;
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = env(ENV_LOG_FLUSH_MS).and_then(|v| v.parse::<u64>().ok()) {
        config.events.log_flush_interval = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(t) = env(ENV_COMPLETION_THRESHOLD).and_then(|v| v.parse::<f64>().ok()) {
        config.events.completion_threshold = t;
        config.source = ConfigSource::Env;
    }
    if let Some(required) = env(ENV_REQUIRE_KEY) {
        config.gates.require_key = required != "0" && required.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Socket path override
    pub socket_path: Option<PathBuf>,

    /// Log flush interval override (milliseconds)
    pub log_flush_ms: Option<u64>,

    /// Connect timeout override (milliseconds)
    pub connect_timeout_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set socket path override
    #[must_use]
    pub fn with_socket_path(mut self, path: PathBuf) -> Self {
        self.socket_path = Some(path);
        self
    }

    /// Set log flush interval override
    #[must_use]
    pub fn with_log_flush_ms(mut self, ms: u64) -> Self {
        self.log_flush_ms = Some(ms);
        self
    }

    /// Set connect timeout override
    #[must_use]
    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = Some(ms);
        self
    }

    /// Whether any override is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.socket_path.is_none() && self.log_flush_ms.is_none() && self.connect_timeout_ms.is_none()
    }

    /// Apply overrides to a configuration and re-validate it
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] when an override is out of range.
    pub fn apply(&self, config: &mut WizardConfig) -> Result<(), ConfigError> {
        if self.is_empty() {
            return Ok(());
        }
        config.source = ConfigSource::Cli;

        if let Some(ref path) = self.socket_path {
            config.worker.socket_path = Some(path.clone());
        }
        if let Some(ms) = self.log_flush_ms {
            config.events.log_flush_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.worker.connect_timeout_ms = ms;
        }
        config.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
