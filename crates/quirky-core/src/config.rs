use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{QuirkyError, Result};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
pub const OVERFLOW_POLL_MS: u64 = 1; // drop-oldest check cadence
pub const STALENESS_POLL_MS: u64 = 5_000; // drop-all check cadence
pub const PUSH_TIMEOUT_MS: u64 = 5_000; // per-viewer write bound
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024; // 2 MB captured body cap

/// Top-level config (quirky.toml + QUIRKY_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuirkyConfig {
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public host[:port] advertised to the viewer page.
    /// Falls back to `localhost:<port>` when unset.
    #[serde(default)]
    pub fqdn: Option<String>,
    /// Advertise the stream endpoint as `wss://` instead of `ws://`.
    #[serde(default)]
    pub ws_secure: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: DEFAULT_PORT,
            fqdn: None,
            ws_secure: false,
        }
    }
}

impl ServerConfig {
    pub fn public_host(&self) -> String {
        match &self.fqdn {
            Some(fqdn) if !fqdn.is_empty() => fqdn.clone(),
            _ => format!("localhost:{}", self.port),
        }
    }

    pub fn ws_scheme(&self) -> &'static str {
        if self.ws_secure {
            "wss"
        } else {
            "ws"
        }
    }
}

/// Event queue sizing and background task cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_overflow_poll_ms")]
    pub overflow_poll_ms: u64,
    #[serde(default = "default_staleness_poll_ms")]
    pub staleness_poll_ms: u64,
    #[serde(default = "default_push_timeout_ms")]
    pub push_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_poll_ms: OVERFLOW_POLL_MS,
            staleness_poll_ms: STALENESS_POLL_MS,
            push_timeout_ms: PUSH_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Request paths that never produce an event.
    #[serde(default = "default_ignored_paths")]
    pub ignored_paths: Vec<String>,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ignored_paths: default_ignored_paths(),
            max_body_bytes: MAX_BODY_BYTES,
        }
    }
}

impl CaptureConfig {
    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignored_paths.iter().any(|p| p == path)
    }
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}
fn default_overflow_poll_ms() -> u64 {
    OVERFLOW_POLL_MS
}
fn default_staleness_poll_ms() -> u64 {
    STALENESS_POLL_MS
}
fn default_push_timeout_ms() -> u64 {
    PUSH_TIMEOUT_MS
}
fn default_max_body_bytes() -> usize {
    MAX_BODY_BYTES
}
fn default_ignored_paths() -> Vec<String> {
    ["/favicon.ico", "/robots.txt", "/stream"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl QuirkyConfig {
    /// Load config: defaults, then the TOML file, then `QUIRKY_*` env vars
    /// (`__` separates nesting, e.g. `QUIRKY_PIPELINE__CAPACITY`), then the
    /// plain `FQDN` / `WS_SECURE` variables.
    ///
    /// The file is optional; a missing file just yields the defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::from_figment(
            Figment::from(Serialized::defaults(QuirkyConfig::default()))
                .merge(Toml::file(&path))
                .merge(Env::prefixed("QUIRKY_").split("__")),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let mut config: QuirkyConfig = figment
            .extract()
            .map_err(|e| QuirkyError::Config(e.to_string()))?;

        if let Ok(fqdn) = std::env::var("FQDN") {
            if !fqdn.is_empty() {
                config.server.fqdn = Some(fqdn);
            }
        }
        if let Ok(secure) = std::env::var("WS_SECURE") {
            config.server.ws_secure = parse_ws_secure(&secure);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.capacity == 0 {
            return Err(QuirkyError::InvalidValue {
                field: "pipeline.capacity",
                reason: "must be at least 1".into(),
            });
        }
        if self.pipeline.overflow_poll_ms == 0 {
            return Err(QuirkyError::InvalidValue {
                field: "pipeline.overflow_poll_ms",
                reason: "must be at least 1".into(),
            });
        }
        if self.pipeline.staleness_poll_ms == 0 {
            return Err(QuirkyError::InvalidValue {
                field: "pipeline.staleness_poll_ms",
                reason: "must be at least 1".into(),
            });
        }
        if self.pipeline.push_timeout_ms == 0 {
            return Err(QuirkyError::InvalidValue {
                field: "pipeline.push_timeout_ms",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// `WS_SECURE` is off when empty or `false` (any case), on otherwise.
pub fn parse_ws_secure(value: &str) -> bool {
    !(value.is_empty() || value.eq_ignore_ascii_case("false"))
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.quirky/quirky.toml", home)
}
