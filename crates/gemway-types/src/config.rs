//! Runtime configuration loaded from `gemway.toml`.
//!
//! Every field has a default so an empty file (or no file at all) yields
//! a working proxy. The security lists are plain data so deployments can
//! extend them without code changes.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GemwayError, Result};
use crate::url::GeminiUrl;

/// Entry URL used by `home()` and for a fresh session.
pub const DEFAULT_HOME_URL: &str = "gemini://geminiprotocol.net/";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GemwayConfig {
    pub browser: BrowserConfig,
    pub client: ClientConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
    pub server: ServerConfig,
}

/// Navigation behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Home page and initial session URL.
    pub home_url: GeminiUrl,
    /// Redirect hops followed before giving up.
    pub max_redirects: u8,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            home_url: default_home_url(),
            max_redirects: 5,
        }
    }
}

/// Wire client limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub connect_timeout_ms: u64,
    pub header_timeout_ms: u64,
    /// Budget for the whole request, connect through end of body.
    pub overall_timeout_ms: u64,
    pub max_body_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            header_timeout_ms: 5_000,
            overall_timeout_ms: 10_000,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn header_timeout(&self) -> Duration {
        Duration::from_millis(self.header_timeout_ms)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_millis(self.overall_timeout_ms)
    }
}

/// Host and port denylists consulted by the security gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Case-insensitive substrings; a host containing any of them is denied.
    pub blocked_hosts: Vec<String>,
    pub blocked_ports: Vec<u16>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        let hosts = [
            "localhost",
            "127.0.0.1",
            "0.0.0.0",
            "::1",
            "169.254.", // link-local
            "10.",
            "172.16.",
            "192.168.",
            "fc00::",
            "fe80::",
        ];
        Self {
            blocked_hosts: hosts.iter().map(|h| h.to_string()).collect(),
            // SSH, Telnet, SMTP, SMB, MySQL, RDP
            blocked_ports: vec![22, 23, 25, 445, 3306, 3389],
        }
    }
}

/// Fixed-window request quota per client identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
    /// How often stale windows are swept from the store.
    pub prune_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 15 * 60,
            max_requests: 100,
            prune_interval_secs: 5 * 60,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs)
    }
}

/// Fetch boundary HTTP listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

fn default_home_url() -> GeminiUrl {
    GeminiUrl::parse(DEFAULT_HOME_URL).expect("DEFAULT_HOME_URL is a valid gemini URL")
}

impl GemwayConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file on disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)
            .map_err(|e| GemwayError::Config(format!("{}: {e}", path.display())))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject values that would make the proxy unusable.
    pub fn validate(&self) -> Result<()> {
        let c = &self.client;
        if c.connect_timeout_ms == 0 || c.header_timeout_ms == 0 || c.overall_timeout_ms == 0 {
            return Err(GemwayError::Config("timeouts must be non-zero".into()));
        }
        if c.max_body_bytes == 0 {
            return Err(GemwayError::Config("max_body_bytes must be non-zero".into()));
        }
        let r = &self.rate_limit;
        if r.window_secs == 0 || r.max_requests == 0 || r.prune_interval_secs == 0 {
            return Err(GemwayError::Config(
                "rate limit window, max_requests and prune interval must be non-zero".into(),
            ));
        }
        if self.security.blocked_hosts.iter().any(|h| h.trim().is_empty()) {
            return Err(GemwayError::Config(
                "blocked_hosts entries must not be empty (an empty pattern denies everything)"
                    .into(),
            ));
        }
        Ok(())
    }
}
