//! Gemini protocol network client.
//!
//! Gemini mandates TLS on every connection (default port 1965).
//! The request is a single URL terminated by CRLF; the response
//! starts with a status line followed by an optional body.
//!
//! One [`GeminiClient::fetch`] call performs exactly one request.
//! Redirects are reported to the caller, never followed here.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use gemway_types::config::ClientConfig;
use gemway_types::{GeminiUrl, GemwayError, Result};

use crate::status::{DEFAULT_MIME, GeminiStatus, MAX_HEADER_LEN, parse_header};
use crate::tls::TlsProvider;

/// The result of one Gemini request. Exactly one variant per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// 2x: the body ran until the server closed the stream.
    Success {
        status: u8,
        mime_type: String,
        body: String,
    },
    /// 3x: `target` is the raw META, absolute or relative.
    Redirect { status: u8, target: String },
    /// The server answered with a non-success, non-redirect status.
    Failure { status: u8, message: String },
    /// We could not complete the exchange at all.
    TransportError { message: String },
}

impl FetchOutcome {
    /// Gemini status code, if the server produced one.
    pub fn status(&self) -> Option<u8> {
        match self {
            FetchOutcome::Success { status, .. }
            | FetchOutcome::Redirect { status, .. }
            | FetchOutcome::Failure { status, .. } => Some(*status),
            FetchOutcome::TransportError { .. } => None,
        }
    }

    /// Canonical status name (`NOT FOUND`, ...), if the server answered.
    pub fn status_message(&self) -> Option<&'static str> {
        self.status()
            .map(|code| GeminiStatus::from_code(code).description())
    }
}

/// Anything that can perform a single Gemini request.
///
/// The navigation engine and the fetch boundary depend on this rather
/// than on [`GeminiClient`] so tests can script responses.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &GeminiUrl) -> FetchOutcome;
}

/// Timeouts and limits for the wire client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    /// Longest wait for the response header once the request is sent.
    pub header_timeout: Duration,
    /// Budget for the whole exchange, connect through end of body.
    pub overall_timeout: Duration,
    pub max_body_bytes: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for ClientOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            header_timeout: config.header_timeout(),
            overall_timeout: config.overall_timeout(),
            max_body_bytes: config.max_body_bytes,
        }
    }
}

/// Blocking Gemini client.
pub struct GeminiClient {
    tls: Arc<dyn TlsProvider>,
    options: ClientOptions,
}

impl GeminiClient {
    pub fn new(tls: Arc<dyn TlsProvider>, options: ClientOptions) -> Self {
        Self { tls, options }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Perform one request. Transport-level problems (DNS, connect,
    /// timeouts, resets, malformed headers) become
    /// [`FetchOutcome::TransportError`].
    pub fn fetch(&self, url: &GeminiUrl) -> FetchOutcome {
        let started = Instant::now();
        match self.exchange(url) {
            Ok(outcome) => {
                log::debug!(
                    "gemini {url} -> {:?} in {:?}",
                    outcome.status(),
                    started.elapsed()
                );
                outcome
            },
            Err(e) => {
                log::warn!("gemini {url} failed: {e}");
                FetchOutcome::TransportError {
                    message: match e {
                        GemwayError::Transport(msg) => msg,
                        other => other.to_string(),
                    },
                }
            },
        }
    }

    fn exchange(&self, url: &GeminiUrl) -> Result<FetchOutcome> {
        let deadline = Instant::now() + self.options.overall_timeout;

        let stream = tcp_connect(url, self.options.connect_timeout, deadline)?;
        // A second handle onto the same socket: lets us retune timeouts
        // after the TLS layer owns the stream, and shuts the socket down
        // on every exit path.
        let socket = SocketGuard(
            stream
                .try_clone()
                .map_err(|e| transport("clone socket", &e))?,
        );

        // Handshake, request and header share the header budget.
        let header_deadline = (Instant::now() + self.options.header_timeout).min(deadline);
        let watchdog = Watchdog::arm(
            stream
                .try_clone()
                .map_err(|e| transport("clone socket", &e))?,
            header_deadline,
        )?;

        let outcome = self.converse(stream, url, &socket, &watchdog, header_deadline, deadline);
        if watchdog.fired() {
            return Err(GemwayError::Transport(
                "timed out: connection closed at deadline".to_string(),
            ));
        }
        outcome
    }

    fn converse(
        &self,
        stream: TcpStream,
        url: &GeminiUrl,
        socket: &SocketGuard,
        watchdog: &Watchdog,
        header_deadline: Instant,
        deadline: Instant,
    ) -> Result<FetchOutcome> {
        socket.set_timeouts(remaining(header_deadline)?)?;
        let transport_stream = self.tls.connect_tls(stream, url.host())?;
        let mut reader = BufReader::new(transport_stream);

        let request = url.request_line();
        let writer = reader.get_mut();
        writer
            .write_all(&request)
            .and_then(|()| writer.flush())
            .map_err(|e| classify_io("send request", &e))?;

        // -- header ------------------------------------------------------
        let line = read_header(&mut reader, socket, header_deadline)?;
        if line.is_empty() {
            return Err(GemwayError::Transport(
                "connection closed before response header".to_string(),
            ));
        }
        if !line.ends_with(b"\n") {
            return Err(GemwayError::Transport(
                "response header too long or unterminated".to_string(),
            ));
        }
        let header = parse_header(&line)
            .ok_or_else(|| GemwayError::Transport("malformed response header".to_string()))?;
        let status = header.status.code();

        if header.status.is_redirect() {
            return Ok(FetchOutcome::Redirect {
                status,
                target: header.meta,
            });
        }
        if !header.status.is_success() {
            return Ok(FetchOutcome::Failure {
                status,
                message: header.meta,
            });
        }

        // -- body --------------------------------------------------------
        watchdog.rearm(deadline);
        let body = read_body(&mut reader, socket, deadline, self.options.max_body_bytes)?;
        let mime_type = if header.meta.is_empty() {
            DEFAULT_MIME.to_string()
        } else {
            header.meta
        };

        Ok(FetchOutcome::Success {
            status,
            mime_type,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

impl Fetcher for GeminiClient {
    fn fetch(&self, url: &GeminiUrl) -> FetchOutcome {
        GeminiClient::fetch(self, url)
    }
}

/// Read the status line, at most [`MAX_HEADER_LEN`] bytes through the
/// first `\n`. The socket timeout is re-derived from `limit` before every
/// read, so a server trickling bytes cannot stretch the wait.
fn read_header<R: BufRead>(
    reader: &mut R,
    socket: &SocketGuard,
    limit: Instant,
) -> Result<Vec<u8>> {
    let mut line = Vec::with_capacity(64);
    while line.len() < MAX_HEADER_LEN {
        let left = limit
            .checked_duration_since(Instant::now())
            .filter(|d| !d.is_zero())
            .ok_or_else(|| {
                GemwayError::Transport("timed out waiting for response header".to_string())
            })?;
        socket.set_timeouts(left)?;

        let available = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(classify_io("read header", &e)),
        };
        if available.is_empty() {
            break;
        }
        let window = &available[..available.len().min(MAX_HEADER_LEN - line.len())];
        let (taken, done) = match window.iter().position(|&b| b == b'\n') {
            Some(i) => (i + 1, true),
            None => (window.len(), false),
        };
        line.extend_from_slice(&window[..taken]);
        reader.consume(taken);
        if done {
            break;
        }
    }
    Ok(line)
}

/// Read until the server closes the stream.
fn read_body<R: Read>(
    reader: &mut R,
    socket: &SocketGuard,
    deadline: Instant,
    max_bytes: usize,
) -> Result<Vec<u8>> {
    let mut body = Vec::with_capacity(8192);
    let mut chunk = [0u8; 8192];
    loop {
        socket.set_timeouts(remaining(deadline)?)?;
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                if body.len() + n > max_bytes {
                    return Err(GemwayError::Transport(format!(
                        "response body exceeds {max_bytes} bytes"
                    )));
                }
                body.extend_from_slice(&chunk[..n]);
            },
            // A TLS peer that drops the socket without close_notify.
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(classify_io("read body", &e)),
        }
    }
    Ok(body)
}

/// Resolve and connect, trying each address in turn.
fn tcp_connect(url: &GeminiUrl, connect_timeout: Duration, deadline: Instant) -> Result<TcpStream> {
    let authority = url.socket_authority();
    let addrs = authority
        .to_socket_addrs()
        .map_err(|e| GemwayError::Transport(format!("DNS resolution failed for {authority}: {e}")))?;

    let mut last_err = None;
    for addr in addrs {
        let timeout = bounded(connect_timeout, deadline)?;
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                return Ok(stream);
            },
            Err(e) => last_err = Some(e),
        }
    }

    Err(match last_err {
        Some(e) => classify_io(&format!("connect to {authority}"), &e),
        None => GemwayError::Transport(format!("no addresses for {authority}")),
    })
}

/// Owns a clone of the connection's socket for option changes and
/// shuts the connection down when dropped.
struct SocketGuard(TcpStream);

impl SocketGuard {
    fn set_timeouts(&self, timeout: Duration) -> Result<()> {
        self.0
            .set_read_timeout(Some(timeout))
            .and_then(|()| self.0.set_write_timeout(Some(timeout)))
            .map_err(|e| transport("set socket timeout", &e))
    }
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        let _ = self.0.shutdown(Shutdown::Both);
    }
}

/// Shuts the connection down when the current phase deadline passes.
///
/// Socket timeouts bound each read; this bounds the phase, including the
/// TLS handshake, which reads and writes inside the provider.
struct Watchdog {
    rearm: Option<mpsc::Sender<Instant>>,
    fired: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Watchdog {
    fn arm(socket: TcpStream, deadline: Instant) -> Result<Self> {
        let (rearm, deadlines) = mpsc::channel::<Instant>();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let thread = std::thread::Builder::new()
            .name("gemini-deadline".to_string())
            .spawn(move || {
                let mut deadline = deadline;
                loop {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    match deadlines.recv_timeout(wait) {
                        Ok(next) => deadline = next,
                        Err(RecvTimeoutError::Timeout) => {
                            flag.store(true, Ordering::SeqCst);
                            let _ = socket.shutdown(Shutdown::Both);
                            return;
                        },
                        Err(RecvTimeoutError::Disconnected) => return,
                    }
                }
            })
            .map_err(|e| transport("spawn deadline watchdog", &e))?;
        Ok(Self {
            rearm: Some(rearm),
            fired,
            thread: Some(thread),
        })
    }

    /// Move the deadline for the next phase.
    fn rearm(&self, deadline: Instant) {
        if let Some(tx) = &self.rearm {
            let _ = tx.send(deadline);
        }
    }

    fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.rearm.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Time left before `deadline`, or a timeout error once it has passed.
fn remaining(deadline: Instant) -> Result<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|d| !d.is_zero())
        .ok_or_else(|| GemwayError::Transport("overall timeout elapsed".to_string()))
}

/// `limit`, shortened to whatever is left of the overall budget.
fn bounded(limit: Duration, deadline: Instant) -> Result<Duration> {
    Ok(limit.min(remaining(deadline)?))
}

fn classify_io(context: &str, e: &io::Error) -> GemwayError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
            GemwayError::Transport(format!("{context}: timed out"))
        },
        _ => transport(context, e),
    }
}

fn transport(context: &str, e: &io::Error) -> GemwayError {
    GemwayError::Transport(format!("{context}: {e}"))
}
