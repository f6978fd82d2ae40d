//! Gemini response status codes and header parsing.
//!
//! A response starts with `<STATUS><SPACE><META>\r\n` where STATUS is
//! two ASCII digits. The tens digit selects the class.

/// Longest META the protocol allows, in bytes.
pub const MAX_META_LEN: usize = 1024;

/// Longest header line including status, separator and CRLF.
pub const MAX_HEADER_LEN: usize = 2 + 1 + MAX_META_LEN + 2;

/// MIME type assumed when a success response carries an empty META.
pub const DEFAULT_MIME: &str = "text/gemini; charset=utf-8";

/// Gemini response status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeminiStatus {
    /// 10-19: request input from user.
    Input(u8),
    /// 20-29: success, body follows.
    Success(u8),
    /// 30-39: redirect to new URL.
    Redirect(u8),
    /// 40-49: temporary failure.
    TemporaryFailure(u8),
    /// 50-59: permanent failure.
    PermanentFailure(u8),
    /// 60-69: client certificate required.
    ClientCert(u8),
    /// Anything outside the defined classes.
    Unknown(u8),
}

impl GeminiStatus {
    /// Classify a numeric status code into the appropriate variant.
    pub fn from_code(code: u8) -> Self {
        match code {
            10..=19 => GeminiStatus::Input(code),
            20..=29 => GeminiStatus::Success(code),
            30..=39 => GeminiStatus::Redirect(code),
            40..=49 => GeminiStatus::TemporaryFailure(code),
            50..=59 => GeminiStatus::PermanentFailure(code),
            60..=69 => GeminiStatus::ClientCert(code),
            _ => GeminiStatus::Unknown(code),
        }
    }

    /// The raw two-digit code.
    pub fn code(&self) -> u8 {
        match *self {
            GeminiStatus::Input(c)
            | GeminiStatus::Success(c)
            | GeminiStatus::Redirect(c)
            | GeminiStatus::TemporaryFailure(c)
            | GeminiStatus::PermanentFailure(c)
            | GeminiStatus::ClientCert(c)
            | GeminiStatus::Unknown(c) => c,
        }
    }

    /// Returns `true` for status codes in the 20-29 (success) range.
    pub fn is_success(&self) -> bool {
        matches!(self, GeminiStatus::Success(_))
    }

    /// Returns `true` for status codes in the 30-39 (redirect) range.
    pub fn is_redirect(&self) -> bool {
        matches!(self, GeminiStatus::Redirect(_))
    }

    /// Canonical upper-case name, falling back to the class name for
    /// codes the protocol does not define individually.
    pub fn description(&self) -> &'static str {
        match self.code() {
            10 => "INPUT",
            11 => "SENSITIVE INPUT",
            20 => "SUCCESS",
            30 => "TEMPORARY REDIRECT",
            31 => "PERMANENT REDIRECT",
            40 => "TEMPORARY FAILURE",
            41 => "SERVER UNAVAILABLE",
            42 => "CGI ERROR",
            43 => "PROXY ERROR",
            44 => "SLOW DOWN",
            50 => "PERMANENT FAILURE",
            51 => "NOT FOUND",
            52 => "GONE",
            53 => "PROXY REQUEST REFUSED",
            59 => "BAD REQUEST",
            60 => "CLIENT CERTIFICATE REQUIRED",
            61 => "CERTIFICATE NOT AUTHORISED",
            62 => "CERTIFICATE NOT VALID",
            _ => match self {
                GeminiStatus::Input(_) => "INPUT",
                GeminiStatus::Success(_) => "SUCCESS",
                GeminiStatus::Redirect(_) => "REDIRECT",
                GeminiStatus::TemporaryFailure(_) => "TEMPORARY FAILURE",
                GeminiStatus::PermanentFailure(_) => "PERMANENT FAILURE",
                GeminiStatus::ClientCert(_) => "CLIENT CERTIFICATE REQUIRED",
                GeminiStatus::Unknown(_) => "UNKNOWN STATUS",
            },
        }
    }
}

/// A parsed response header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHeader {
    pub status: GeminiStatus,
    /// MIME type for success, target for redirect, reason for errors.
    pub meta: String,
}

/// Parse a response header line.
///
/// Accepts the line with or without its trailing CRLF. Returns `None`
/// for anything that is not two ASCII digits followed by end of line or
/// a space and at most [`MAX_META_LEN`] bytes of UTF-8.
pub fn parse_header(line: &[u8]) -> Option<ResponseHeader> {
    let line = line
        .strip_suffix(b"\r\n")
        .or_else(|| line.strip_suffix(b"\n"))
        .unwrap_or(line);
    let text = std::str::from_utf8(line).ok()?;

    let digits = text.get(..2)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let code: u8 = digits.parse().ok()?;

    let meta = match &text[2..] {
        "" => "",
        rest => rest.strip_prefix(' ')?,
    };
    if meta.len() > MAX_META_LEN {
        return None;
    }

    Some(ResponseHeader {
        status: GeminiStatus::from_code(code),
        meta: meta.to_string(),
    })
}
