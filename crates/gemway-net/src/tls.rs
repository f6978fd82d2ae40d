//! TLS provider abstraction.
//!
//! The wire client hands a connected [`TcpStream`] to a [`TlsProvider`]
//! and gets back an encrypted [`Transport`]. Tests plug in a passthrough
//! provider and speak plain Gemini over loopback.

use std::io::{Read, Write};
use std::net::TcpStream;

use gemway_types::Result;

/// A bidirectional byte stream carrying one Gemini exchange.
pub trait Transport: Read + Write + Send {}

impl<T: Read + Write + Send> Transport for T {}

/// Provides TLS client connections.
pub trait TlsProvider: Send + Sync {
    /// Wrap `stream` in a TLS client session.
    ///
    /// `server_name` is used for SNI. Gemini servers commonly present
    /// self-signed certificates, so implementations are not expected to
    /// validate the chain.
    fn connect_tls(&self, stream: TcpStream, server_name: &str) -> Result<Box<dyn Transport>>;
}
