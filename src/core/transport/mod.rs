//! Transport layer between a session and its host
//!
//! Supports:
//! - TN5250 over telnet (TCP)
//! - An in-memory host for tests and demonstrations
//!
//! A [`Connector`] opens a connection and hands back a reader and a writer
//! half, so the receive loop and the automation caller never share a lock.

mod memory;
mod telnet;

pub use memory::{memory_pair, MemoryConnector, MemoryHost};
pub use telnet::{TelnetCodec, TelnetConfig, TelnetConnector, TelnetFrame};

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::core::screen::Dimensions;

/// Transport type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportType {
    /// TN5250 telnet
    Telnet,
    /// In-process channels
    Memory,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Telnet => write!(f, "Telnet"),
            Self::Memory => write!(f, "Memory"),
        }
    }
}

/// Host address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host name or address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connect or handshake took too long
    #[error("Connection timeout after {0:?}")]
    Timeout(Duration),

    /// Telnet option negotiation went wrong
    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Peer is gone
    #[error("Disconnected")]
    Disconnected,

    /// Send error
    #[error("Send error: {0}")]
    SendError(String),
}

/// Receiving half of a connection
#[async_trait]
pub trait HostReader: Send {
    /// Next complete host record. `Ok(None)` means the host closed the
    /// connection.
    async fn receive(&mut self) -> Result<Option<Bytes>, TransportError>;
}

/// Sending half of a connection
#[async_trait]
pub trait HostWriter: Send {
    /// Send one record; returns the payload length
    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Close the connection
    async fn shutdown(&mut self) -> Result<(), TransportError>;
}

/// An open, negotiated connection
pub struct TransportPair {
    /// Receiving half
    pub reader: Box<dyn HostReader>,
    /// Sending half
    pub writer: Box<dyn HostWriter>,
    /// Connection description for logs
    pub info: String,
}

impl fmt::Debug for TransportPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportPair").field("info", &self.info).finish_non_exhaustive()
    }
}

/// Opens connections to hosts
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect and negotiate. `dims` selects the terminal model announced.
    async fn connect(&self, endpoint: &Endpoint, dims: Dimensions) -> Result<TransportPair, TransportError>;

    /// Get transport type
    fn transport_type(&self) -> TransportType;
}
