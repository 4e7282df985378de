//! Configuration management module

mod connection;

pub use connection::{ConfigError, ConnectionConfig, REQUIRED_KEYS};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::client::http::ReqwestHttpClient;
use crate::client::{self, BackendKind, SessionMode, TorrentClient};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub backends: Vec<BackendSettings>,

    #[serde(skip)]
    config_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// One torrent daemon the gateway talks to
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    pub name: String,
    pub kind: BackendKind,
    pub host: String,
    pub port: u16,
    pub credential: String,

    /// Transmission only; enables HTTP Basic auth
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub session: SessionMode,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl std::fmt::Debug for BackendSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSettings")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("credential", &"<redacted>")
            .field("username", &self.username)
            .field("session", &self.session)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl BackendSettings {
    /// Raw parameter set, as fed to [`ConnectionConfig::build`]
    pub fn connection_params(&self) -> HashMap<String, String> {
        let mut params = HashMap::from([
            ("host".to_string(), self.host.clone()),
            ("port".to_string(), self.port.to_string()),
            ("credential".to_string(), self.credential.clone()),
        ]);
        if let Some(username) = &self.username {
            params.insert("username".to_string(), username.clone());
        }
        params
    }

    pub fn connection(&self) -> Result<ConnectionConfig, ConfigError> {
        ConnectionConfig::build(&self.connection_params())
    }

    /// Build a client backed by a real HTTP connection
    pub fn create_client(&self) -> Result<Arc<dyn TorrentClient>, ConfigError> {
        let http = ReqwestHttpClient::new(Duration::from_secs(self.timeout_secs))?;
        Ok(client::create_client(
            self.name.clone(),
            self.kind,
            self.connection()?,
            Arc::new(http),
            self.session,
        ))
    }
}

impl Settings {
    /// Load settings from environment and config file
    pub fn load() -> Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let mut config_paths = Vec::new();
        if let Ok(path) = std::env::var("TORRENT_BRIDGE_CONFIG") {
            config_paths.push(PathBuf::from(path));
        }
        config_paths.push(PathBuf::from("config.toml"));
        config_paths.push(PathBuf::from("./data/config.toml"));
        if let Some(path) = dirs_config_path() {
            config_paths.push(path);
        }

        let mut settings = Settings::default();

        for path in config_paths.iter() {
            if path.exists() {
                settings = Self::load_from_file(path)?;
                settings.config_file = Some(path.clone());
                break;
            }
        }

        settings.apply_env_overrides();
        settings.validate()?;

        Ok(settings)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::parse(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Parse settings from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("TORRENT_BRIDGE_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("TORRENT_BRIDGE_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
    }

    /// Reject duplicate backend names and unusable connection parameters
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for backend in &self.backends {
            if !seen.insert(backend.name.as_str()) {
                anyhow::bail!("Duplicate backend name: {}", backend.name);
            }
            backend
                .connection()
                .with_context(|| format!("Invalid connection for backend `{}`", backend.name))?;
        }
        Ok(())
    }

    pub fn backend(&self, name: &str) -> Option<&BackendSettings> {
        self.backends.iter().find(|b| b.name == name)
    }

    /// Get the path to the config file (if loaded from file)
    pub fn config_path(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }
}

/// Get platform-specific config directory
fn dirs_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
            .map(|p| p.join("torrent-bridge/config.toml"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME").ok().map(|h| {
            PathBuf::from(h).join("Library/Application Support/torrent-bridge/config.toml")
        })
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA")
            .ok()
            .map(|p| PathBuf::from(p).join("torrent-bridge/config.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        None
    }
}
