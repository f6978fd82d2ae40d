//! Networking for gemway: the Gemini wire client, the TLS provider
//! abstraction, response status classification, and the security gate
//! that decides which URLs the proxy may contact.

pub mod client;
pub mod security;
pub mod status;
pub mod tls;
#[cfg(feature = "tls-rustls")]
pub mod tls_rustls;

pub use client::{ClientOptions, FetchOutcome, Fetcher, GeminiClient};
pub use security::{FixedWindowQuota, QuotaStore, SecurityGate};
pub use status::{GeminiStatus, ResponseHeader, parse_header};
pub use tls::{TlsProvider, Transport};
#[cfg(feature = "tls-rustls")]
pub use tls_rustls::RustlsTlsProvider;
