// Copyright 2025 DTC Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// DTC Gateway Configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: HttpServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    /// Interface to bind (e.g., "0.0.0.0")
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// HTTP port for the web UI and API
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Largest request or backend body accepted, in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Enable permissive CORS (UI served from another origin)
    #[serde(default)]
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Host of the image generation backend
    #[serde(default = "default_backend_host")]
    pub host: String,

    /// Port of the image generation backend
    #[serde(default = "default_backend_port")]
    pub port: u16,

    /// Path of the generation endpoint on the backend
    #[serde(default = "default_generate_path")]
    pub generate_path: String,

    /// Upper bound for one backend call, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory holding settings, ledgers and generated images
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Directory with the bundled web UI
    #[serde(default = "default_web_dir")]
    pub web_dir: PathBuf,

    /// Template for the settings document (default: `<web_dir>/defaults.json`)
    #[serde(default)]
    pub defaults_file: Option<PathBuf>,
}

// Default values
fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_backend_host() -> String {
    "127.0.0.1".to_string()
}

fn default_backend_port() -> u16 {
    7860
}

fn default_generate_path() -> String {
    "/sdapi/v1/txt2img".to_string()
}

fn default_request_timeout() -> u64 {
    600
}

fn default_results_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("DTC")
}

/// The web UI ships next to the binary, in `../Resources` of an app bundle.
fn default_web_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("..").join("Resources")))
        .unwrap_or_else(|| PathBuf::from("./public"))
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            port: default_server_port(),
            max_body_bytes: default_max_body_bytes(),
            enable_cors: false,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: default_backend_host(),
            port: default_backend_port(),
            generate_path: default_generate_path(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            web_dir: default_web_dir(),
            defaults_file: None,
        }
    }
}

impl BackendConfig {
    /// Root URL of the backend; `/parameters` is relayed here.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn generate_url(&self) -> String {
        format!("{}{}", self.base_url(), self.generate_path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl StorageConfig {
    pub fn defaults_path(&self) -> PathBuf {
        self.defaults_file
            .clone()
            .unwrap_or_else(|| self.web_dir.join("defaults.json"))
    }
}

impl GatewayConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with priority: env > file > defaults
    ///
    /// Supported environment variables:
    /// - DTC_SERVER_PORT: HTTP port (default: 8080)
    /// - DTC_BIND_HOST: bind interface (default: 0.0.0.0)
    /// - DTC_TARGET_PORT: backend port (default: 7860)
    /// - DTC_TARGET_HOST: backend host (default: 127.0.0.1)
    /// - DTC_BACKEND_TIMEOUT: backend call timeout in seconds (default: 600)
    /// - DTC_RESULTS_DIR: results directory (default: ~/DTC)
    /// - DTC_WEB_DIR: web UI directory (default: <exe>/../Resources)
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };

        Ok(Self::merge_with_env(config))
    }

    /// Override fields whose environment variable is set and parses.
    fn merge_with_env(config: Self) -> Self {
        Self::merge_with(config, |name| std::env::var(name).ok())
    }

    fn merge_with<F>(mut config: Self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = parse_var(&lookup, "DTC_SERVER_PORT") {
            config.server.port = port;
        }
        if let Some(host) = lookup("DTC_BIND_HOST") {
            config.server.bind_host = host;
        }
        if let Some(port) = parse_var(&lookup, "DTC_TARGET_PORT") {
            config.backend.port = port;
        }
        if let Some(host) = lookup("DTC_TARGET_HOST") {
            config.backend.host = host;
        }
        if let Some(secs) = parse_var(&lookup, "DTC_BACKEND_TIMEOUT") {
            config.backend.request_timeout_secs = secs;
        }
        if let Some(dir) = lookup("DTC_RESULTS_DIR") {
            config.storage.results_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("DTC_WEB_DIR") {
            config.storage.web_dir = PathBuf::from(dir);
        }
        config
    }

    /// Parse listen address as SocketAddr
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.server.bind_host, self.server.port).parse()?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.backend.request_timeout_secs == 0 {
            anyhow::bail!("backend.request_timeout_secs must be greater than zero");
        }
        if !self.backend.generate_path.starts_with('/') {
            anyhow::bail!(
                "backend.generate_path must start with '/': {:?}",
                self.backend.generate_path
            );
        }
        if self.server.max_body_bytes == 0 {
            anyhow::bail!("server.max_body_bytes must be greater than zero");
        }

        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a valid value", name, raw);
            None
        }
    }
}
