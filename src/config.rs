//! Runtime configuration.
//!
//! Loaded from a YAML file (path in `RAWHTTP_CONFIG`, default `rawhttp.yaml`).
//! Every section and field is optional; a missing file means all defaults.
//! `PORT` overrides `server.port`.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

pub const CONFIG_PATH_ENV: &str = "RAWHTTP_CONFIG";
pub const PORT_ENV: &str = "PORT";
const DEFAULT_CONFIG_PATH: &str = "rawhttp.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub response: ResponseConfig,
    pub relay: RelayConfig,
    pub assets: AssetsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 42069,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Bounds on what one request may cost the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Size of the first read buffer; it doubles when full.
    pub initial_buffer_size: usize,
    /// Total bytes one request may occupy (request-line, headers and body).
    pub max_request_bytes: usize,
    /// Deadline for receiving the whole request. `None` waits forever.
    ///
    /// On expiry the connection is closed without any response and the
    /// handler is never called.
    pub read_timeout_ms: Option<u64>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            initial_buffer_size: 8,
            max_request_bytes: 1024 * 1024,
            read_timeout_ms: Some(30_000),
        }
    }
}

impl LimitsConfig {
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Append CRLF after fixed-length bodies.
    pub body_trailing_crlf: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub origin: String,
    pub connect_timeout_ms: u64,
    pub chunk_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            origin: "http://httpbin.org".to_string(),
            connect_timeout_ms: 5_000,
            chunk_size: 1024,
        }
    }
}

impl RelayConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub video_path: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            video_path: "./assets/vim.mp4".to_string(),
        }
    }
}

impl Config {
    /// Loads the file named by `RAWHTTP_CONFIG` and applies env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut cfg = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            tracing::debug!(path = %path, "config file not found, using defaults");
            Self::default()
        };

        if let Ok(port) = std::env::var(PORT_ENV) {
            cfg.server.port = port
                .parse()
                .with_context(|| format!("invalid {PORT_ENV} value {port:?}"))?;
        }

        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }
}
