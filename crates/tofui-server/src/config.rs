use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tofui_api::{ApiConfig, DEFAULT_API_BASE_URL};
use tofui_core::SessionIdentity;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_SSH_PORT: u16 = 4649;
const DEFAULT_HTTP_PORT: u16 = 4200;
const DEFAULT_TIMEOUT_SECS: u64 = 5;

#[derive(Parser, Debug)]
#[command(name = "tofui", about = "Terminal client for Farcaster")]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, env = "TOFUI_CONFIG")]
    pub config: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    pub debug: bool,
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Serve sessions over SSH together with the sign-in callback server.
    Serve,
    /// Run a single session on this terminal.
    Local {
        /// Open the composer as soon as the session starts.
        #[arg(long, default_value_t = false)]
        compose: bool,
    },
    /// Write a default configuration file.
    Init,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("config already exists at {0}")]
    AlreadyExists(PathBuf),
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log: LogConfig,
    pub db: DbConfig,
    pub server: ServerConfig,
    pub api: ApiSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub path: Option<PathBuf>,
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: None,
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub ssh_port: u16,
    pub http_port: u16,
    pub host_key_path: Option<PathBuf>,
    /// Externally reachable base URL for the sign-in page, when it differs
    /// from the listen address.
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            ssh_port: DEFAULT_SSH_PORT,
            http_port: DEFAULT_HTTP_PORT,
            host_key_path: None,
            public_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub api_key: String,
    pub client_id: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            client_id: String::new(),
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

pub fn tofui_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tofui")
}

pub fn default_config_path() -> PathBuf {
    tofui_home().join("config.yaml")
}

impl Config {
    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overrides file values with non-empty environment variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(value) = lookup("TOFUI_API_KEY") {
            self.api.api_key = value;
        }
        if let Some(value) = lookup("TOFUI_CLIENT_ID") {
            self.api.client_id = value;
        }
        if let Some(value) = lookup("TOFUI_LOG") {
            self.log.level = value;
        }
    }

    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }
        let contents = serde_yaml::to_string(&Self::default())?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn db_dir(&self) -> PathBuf {
        self.db
            .dir
            .clone()
            .unwrap_or_else(|| tofui_home().join("db"))
    }

    pub fn log_path(&self) -> PathBuf {
        self.log
            .path
            .clone()
            .unwrap_or_else(|| tofui_home().join("tofui.log"))
    }

    pub fn host_key_path(&self) -> PathBuf {
        self.server
            .host_key_path
            .clone()
            .unwrap_or_else(|| tofui_home().join("ssh_host_ed25519"))
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.api.base_url.trim_end_matches('/').to_string(),
            api_key: self.api.api_key.clone(),
            timeout: Duration::from_secs(self.api.timeout_secs.max(1)),
        }
    }

    pub fn signin_base_url(&self) -> String {
        if let Some(url) = self
            .server
            .public_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
        {
            return url.trim_end_matches('/').to_string();
        }
        if self.server.http_port == 443 {
            format!("https://{}", self.server.host)
        } else {
            format!("http://{}:{}", self.server.host, self.server.http_port)
        }
    }

    pub fn signin_url(&self, identity: &SessionIdentity) -> String {
        signin_url(&self.signin_base_url(), identity)
    }
}

pub fn signin_url(base_url: &str, identity: &SessionIdentity) -> String {
    format!("{base_url}/signin?id={identity}")
}
