//! Security gate: which URLs the proxy may contact, and how often a
//! client may ask.
//!
//! The host check is substring containment against a configured
//! denylist, not CIDR matching.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use gemway_types::config::{RateLimitConfig, SecurityConfig};
use gemway_types::{GeminiUrl, GemwayError, Result};

/// URL allow/deny predicate built from [`SecurityConfig`].
#[derive(Debug, Clone)]
pub struct SecurityGate {
    blocked_hosts: Vec<String>,
    blocked_ports: Vec<u16>,
}

impl Default for SecurityGate {
    fn default() -> Self {
        Self::new(&SecurityConfig::default())
    }
}

impl SecurityGate {
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            blocked_hosts: config
                .blocked_hosts
                .iter()
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
            blocked_ports: config.blocked_ports.clone(),
        }
    }

    /// `true` when `url` is an absolute gemini URL the proxy may contact.
    pub fn is_allowed(&self, url: &str) -> bool {
        self.check(url).is_ok()
    }

    /// Parse and vet an absolute URL string.
    pub fn check(&self, url: &str) -> Result<GeminiUrl> {
        let parsed = GeminiUrl::parse(url).map_err(|_| {
            GemwayError::Forbidden(format!("only gemini:// URLs may be fetched: {url}"))
        })?;
        self.check_url(&parsed)?;
        Ok(parsed)
    }

    /// Vet an already-parsed URL against the host and port denylists.
    pub fn check_url(&self, url: &GeminiUrl) -> Result<()> {
        let host = url.host().to_ascii_lowercase();
        if let Some(pattern) = self.blocked_hosts.iter().find(|p| host.contains(p.as_str())) {
            log::warn!("security gate: host {host} matches blocked pattern {pattern:?}");
            return Err(GemwayError::Forbidden(format!("host {host} is not allowed")));
        }
        if self.blocked_ports.contains(&url.port()) {
            log::warn!("security gate: port {} is blocked", url.port());
            return Err(GemwayError::Forbidden(format!(
                "port {} is not allowed",
                url.port()
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Quota
// ---------------------------------------------------------------------------

/// Request quota keyed by client identity.
///
/// Implementations must serialize updates: the same store is shared by
/// every session and request handler for a client.
pub trait QuotaStore: Send + Sync {
    /// Count one request for `client_id`. Returns `false` once the client
    /// is over its allowance for the current window.
    fn check_quota(&self, client_id: &str) -> bool;
}

/// Tracks requests in the current window for one client.
#[derive(Debug, Clone, Copy)]
struct WindowRecord {
    count: u32,
    window_start: Instant,
}

/// Fixed-window counter: at most `max_requests` per `window`, with the
/// window restarting lazily on the first check after it expires.
#[derive(Debug)]
pub struct FixedWindowQuota {
    window: Duration,
    max_requests: u32,
    records: Mutex<HashMap<String, WindowRecord>>,
}

impl FixedWindowQuota {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_limits(config.window(), config.max_requests)
    }

    pub fn with_limits(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// [`QuotaStore::check_quota`] with an explicit clock.
    pub fn check_at(&self, client_id: &str, now: Instant) -> bool {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let record = records
            .entry(client_id.to_string())
            .and_modify(|r| {
                if now.duration_since(r.window_start) > self.window {
                    *r = WindowRecord {
                        count: 1,
                        window_start: now,
                    };
                } else {
                    r.count = r.count.saturating_add(1);
                }
            })
            .or_insert(WindowRecord {
                count: 1,
                window_start: now,
            });

        let allowed = record.count <= self.max_requests;
        if !allowed {
            log::warn!(
                "rate limit: {client_id} made {} requests this window (max {})",
                record.count,
                self.max_requests
            );
        }
        allowed
    }

    /// Drop records whose window has expired. Returns how many went.
    pub fn prune_at(&self, now: Instant) -> usize {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let before = records.len();
        records.retain(|_, r| now.duration_since(r.window_start) <= self.window);
        before - records.len()
    }

    pub fn prune(&self) -> usize {
        self.prune_at(Instant::now())
    }

    /// Number of clients with a live record.
    pub fn tracked_clients(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl QuotaStore for FixedWindowQuota {
    fn check_quota(&self, client_id: &str) -> bool {
        self.check_at(client_id, Instant::now())
    }
}
