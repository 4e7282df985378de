//! Validated connection parameters for one backend instance

use std::collections::HashMap;
use std::fmt;

use url::Url;

/// Keys every connection parameter set must carry
pub const REQUIRED_KEYS: [&str; 3] = ["host", "port", "credential"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("connection args require the keys {required:?}, but {given:?} given")]
    MissingKeys {
        required: [&'static str; 3],
        given: Vec<String>,
    },

    #[error("invalid port: {0}")]
    InvalidPort(String),

    #[error("invalid host `{host}`: {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Immutable connection parameters: host (with scheme), port and credential
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    host: String,
    port: u16,
    credential: String,
    username: Option<String>,
}

impl ConnectionConfig {
    /// Validate and normalize a parameter mapping
    ///
    /// `host`, `port` and `credential` are required; `username` is optional
    /// and only used by backends that authenticate with HTTP Basic auth.
    pub fn build(params: &HashMap<String, String>) -> Result<Self, ConfigError> {
        if !REQUIRED_KEYS.iter().all(|key| params.contains_key(*key)) {
            let mut given: Vec<String> = params.keys().cloned().collect();
            given.sort();
            return Err(ConfigError::MissingKeys {
                required: REQUIRED_KEYS,
                given,
            });
        }

        let mut host = params["host"].trim().to_lowercase();
        if !host.starts_with("http://") && !host.starts_with("https://") {
            host = format!("http://{}", host);
        }
        let host = host.trim_end_matches('/').to_string();

        let port: u16 = params["port"]
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidPort(params["port"].clone()))?;

        Url::parse(&format!("{}:{}", host, port)).map_err(|e| ConfigError::InvalidHost {
            host: host.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            host,
            port,
            credential: params["credential"].clone(),
            username: params.get("username").filter(|u| !u.is_empty()).cloned(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// `<scheme>://<host>:<port>`, the prefix of every RPC URL
    pub fn base_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The normalized parameters as a mapping
    pub fn args(&self) -> HashMap<&'static str, String> {
        let mut args = HashMap::from([
            ("host", self.host.clone()),
            ("port", self.port.to_string()),
            ("credential", self.credential.clone()),
        ]);
        if let Some(ref username) = self.username {
            args.insert("username", username.clone());
        }
        args
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("credential", &"***")
            .field("username", &self.username)
            .finish()
    }
}
