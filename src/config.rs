//! Configuration types for the bouncer.
//!
//! Configuration is loaded from a YAML file, by default
//! `<home>/.bounce/bounce.yaml`, and validated before use. A [`Config`]
//! value is built once at startup and handed to the components that need
//! it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Convenience type alias for configuration results.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Directory under the home directory holding configuration files.
pub const CONFIG_DIR: &str = ".bounce";

/// Default configuration name, resolved to `<name>.yaml`.
pub const DEFAULT_NAME: &str = "bounce";

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Configuration format version.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Name of this bouncer instance.
    #[serde(default = "default_name")]
    pub name: String,

    /// Upstream networks, one network-facing connection each.
    #[serde(default)]
    pub networks: Vec<NetworkConfig>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// An upstream IRC network.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Short name used in logs and to tell networks apart.
    pub name: String,

    /// Server hostname.
    pub host: String,

    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Nickname to register with.
    pub nick: String,

    /// Username (ident). Defaults to the nickname.
    #[serde(default)]
    pub username: String,

    /// Real name / GECOS. Defaults to the nickname.
    #[serde(default)]
    pub realname: String,

    /// Address downstream clients connect to for this network.
    /// When unset the network is dialled but nothing listens for it.
    #[serde(default)]
    pub listen: Option<String>,

    /// Lines buffered per client before fan-out starts dropping lines
    /// for that client.
    #[serde(default = "default_client_buffer")]
    pub client_buffer: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_version() -> u32 {
    1
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_port() -> u16 {
    6667
}

fn default_client_buffer() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Default configuration path, `<home>/.bounce/<name>.yaml`.
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDirectory`] if no home directory (or
/// Windows profile directory) can be found.
pub fn default_path(name: &str) -> ConfigResult<PathBuf> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
    Ok(home.join(CONFIG_DIR).join(format!("{}.yaml", name)))
}

/// Pick the explicit override if given, otherwise the default path.
pub fn resolve_path(explicit: Option<&Path>) -> ConfigResult<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_path(DEFAULT_NAME),
    }
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// validation fails.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    /// Load configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    pub fn from_yaml(content: &str) -> ConfigResult<Self> {
        let mut config: Self = serde_yaml::from_str(content)?;
        for network in &mut config.networks {
            network.fill_defaults();
        }
        config.validate()?;
        Ok(config)
    }

    /// Serialize back to YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no networks are configured, a network is
    /// invalid, or two networks share a name.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.networks.is_empty() {
            return Err(ConfigError::NoNetworks);
        }

        let mut seen = HashSet::new();
        for network in &self.networks {
            network.validate()?;
            if !seen.insert(network.name.as_str()) {
                return Err(ConfigError::DuplicateNetwork(network.name.clone()));
            }
        }
        Ok(())
    }

    /// Look up a network by name.
    pub fn network(&self, name: &str) -> Option<&NetworkConfig> {
        self.networks.iter().find(|network| network.name == name)
    }
}

impl NetworkConfig {
    /// Create a network definition with username and realname defaulted
    /// to the nickname.
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        nick: impl Into<String>,
    ) -> Self {
        let mut network = Self {
            name: name.into(),
            host: host.into(),
            port,
            nick: nick.into(),
            username: String::new(),
            realname: String::new(),
            listen: None,
            client_buffer: default_client_buffer(),
        };
        network.fill_defaults();
        network
    }

    fn fill_defaults(&mut self) {
        if self.username.is_empty() {
            self.username = self.nick.clone();
        }
        if self.realname.is_empty() {
            self.realname = self.nick.clone();
        }
        if self.client_buffer == 0 {
            self.client_buffer = 1;
        }
    }

    /// `host:port` to dial.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate a single network definition.
    ///
    /// # Errors
    ///
    /// Returns an error if name, host or nick is empty, or the port is 0.
    pub fn validate(&self) -> ConfigResult<()> {
        let required = [
            ("name", &self.name),
            ("host", &self.host),
            ("nick", &self.nick),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyField {
                    network: self.name.clone(),
                    field,
                });
            }
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.name.clone()));
        }
        Ok(())
    }
}
