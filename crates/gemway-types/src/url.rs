//! Gemini URL parsing and relative-reference resolution.
//!
//! Only the subset of RFC 3986 a Gemini client needs is implemented:
//! absolute `gemini://` URLs, root-relative paths, and path-relative
//! references. No dot-segment normalization is performed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GemwayError, Result};

/// Default Gemini port.
pub const DEFAULT_PORT: u16 = 1965;

/// The only scheme a [`GeminiUrl`] can carry.
pub const SCHEME: &str = "gemini";

const SCHEME_PREFIX: &str = "gemini://";

/// An absolute Gemini URL.
///
/// The scheme is always `gemini`. Fragments are dropped on parse and
/// never reach the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GeminiUrl {
    host: String,
    port: u16,
    path: String,
    query: Option<String>,
}

impl GeminiUrl {
    /// Parse an absolute `gemini://host[:port][/path][?query]` URL.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let rest = strip_scheme(trimmed)
            .ok_or_else(|| GemwayError::InvalidReference(format!("not a gemini URL: {trimmed}")))?;

        let rest = match rest.find('#') {
            Some(i) => &rest[..i],
            None => rest,
        };
        let (rest, query) = match rest.find('?') {
            Some(i) => (&rest[..i], Some(rest[i + 1..].to_string())),
            None => (rest, None),
        };
        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, "/"),
        };

        let (host, port) = split_authority(authority)
            .ok_or_else(|| GemwayError::InvalidReference(format!("bad authority in {trimmed}")))?;
        if host.is_empty() {
            return Err(GemwayError::InvalidReference(format!(
                "missing host in {trimmed}"
            )));
        }
        if path.chars().any(char::is_whitespace) {
            return Err(GemwayError::InvalidReference(format!(
                "whitespace in path of {trimmed}"
            )));
        }

        Ok(Self {
            host: host.to_ascii_lowercase(),
            port,
            path: path.to_string(),
            query,
        })
    }

    /// Always `"gemini"`.
    pub fn scheme(&self) -> &'static str {
        SCHEME
    }

    /// Host name or IP literal (IPv6 literals without brackets).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Effective port (1965 when the URL did not name one).
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path component, always starting with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query string without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// `host:port` in a form `ToSocketAddrs` accepts.
    pub fn socket_authority(&self) -> String {
        format!("{}:{}", self.bracketed_host(), self.port)
    }

    /// Everything up to and including the last `/` of the path.
    pub fn directory(&self) -> &str {
        match self.path.rfind('/') {
            Some(i) => &self.path[..=i],
            None => "/",
        }
    }

    /// The bytes of a Gemini request line: the URL followed by CRLF.
    pub fn request_line(&self) -> Vec<u8> {
        format!("{self}\r\n").into_bytes()
    }

    /// Same host and port, with a new `path[?query]` (fragment dropped).
    fn with_path_and_query(&self, reference: &str) -> Self {
        let reference = match reference.find('#') {
            Some(i) => &reference[..i],
            None => reference,
        };
        let (path, query) = match reference.find('?') {
            Some(i) => (&reference[..i], Some(reference[i + 1..].to_string())),
            None => (reference, None),
        };
        Self {
            host: self.host.clone(),
            port: self.port,
            path: if path.is_empty() {
                "/".to_string()
            } else {
                path.to_string()
            },
            query,
        }
    }

    fn bracketed_host(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }
}

impl fmt::Display for GeminiUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME_PREFIX}{}", self.bracketed_host())?;
        if self.port != DEFAULT_PORT {
            write!(f, ":{}", self.port)?;
        }
        write!(f, "{}", self.path)?;
        if let Some(q) = &self.query {
            write!(f, "?{q}")?;
        }
        Ok(())
    }
}

impl FromStr for GeminiUrl {
    type Err = GemwayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for GeminiUrl {
    type Error = GemwayError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<GeminiUrl> for String {
    fn from(url: GeminiUrl) -> Self {
        url.to_string()
    }
}

/// The result of resolving a reference against a base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// An absolute Gemini URL.
    Gemini(GeminiUrl),
    /// An absolute reference with some other scheme (`https://...`),
    /// passed through untouched.
    Opaque(String),
}

impl Resolved {
    /// The Gemini URL, if this is one.
    pub fn as_gemini(&self) -> Option<&GeminiUrl> {
        match self {
            Resolved::Gemini(url) => Some(url),
            Resolved::Opaque(_) => None,
        }
    }

    /// Consume into the Gemini URL, if this is one.
    pub fn into_gemini(self) -> Option<GeminiUrl> {
        match self {
            Resolved::Gemini(url) => Some(url),
            Resolved::Opaque(_) => None,
        }
    }
}

impl fmt::Display for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Gemini(url) => url.fmt(f),
            Resolved::Opaque(s) => f.write_str(s),
        }
    }
}

/// Resolve `reference` against `base`.
///
/// Rules, first match wins:
/// 1. `gemini://...` is parsed on its own and `base` is ignored.
/// 2. `/path` keeps the base host and port and takes the path verbatim.
/// 3. Anything without `://` is appended to the base directory.
/// 4. Any other absolute reference is returned as [`Resolved::Opaque`].
pub fn resolve(reference: &str, base: &GeminiUrl) -> Result<Resolved> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(GemwayError::InvalidReference("empty reference".to_string()));
    }

    if strip_scheme(reference).is_some() {
        return GeminiUrl::parse(reference).map(Resolved::Gemini);
    }

    if reference.starts_with('/') {
        return Ok(Resolved::Gemini(base.with_path_and_query(reference)));
    }

    if !reference.contains("://") {
        let joined = format!("{}{}", base.directory(), reference);
        return Ok(Resolved::Gemini(base.with_path_and_query(&joined)));
    }

    Ok(Resolved::Opaque(reference.to_string()))
}

/// Strip a case-insensitive `gemini://` prefix.
fn strip_scheme(s: &str) -> Option<&str> {
    let prefix = s.get(..SCHEME_PREFIX.len())?;
    if prefix.eq_ignore_ascii_case(SCHEME_PREFIX) {
        Some(&s[SCHEME_PREFIX.len()..])
    } else {
        None
    }
}

/// Split `host[:port]` or `[v6]:port`. Returns `None` for userinfo,
/// unbracketed IPv6, or an unparseable port.
fn split_authority(authority: &str) -> Option<(&str, u16)> {
    if authority.contains('@') || authority.chars().any(char::is_whitespace) {
        return None;
    }

    if let Some(rest) = authority.strip_prefix('[') {
        let end = rest.find(']')?;
        let host = &rest[..end];
        let port = match &rest[end + 1..] {
            "" => DEFAULT_PORT,
            after => parse_port(after.strip_prefix(':')?)?,
        };
        return Some((host, port));
    }

    match authority.split_once(':') {
        Some((_, port)) if port.contains(':') => None,
        Some((host, port)) => Some((host, parse_port(port)?)),
        None => Some((authority, DEFAULT_PORT)),
    }
}

fn parse_port(port: &str) -> Option<u16> {
    if port.is_empty() {
        return Some(DEFAULT_PORT);
    }
    port.parse::<u16>().ok().filter(|p| *p != 0)
}
