//! Best-effort datagram transport to the drone
//!
//! Sending is fire-and-forget: one payload, one datagram, no acknowledgement and no
//! retry. Every failure is classified into a [`TransportError`] and handed back to
//! the caller, which logs it and carries on; the next tick or button press is the
//! retry.
//!
//! ```text
//! payload ──► resolve(host) ──► bind ephemeral socket ──► send_to ──► drop socket
//!              ResolutionFailed   SocketError               SendFailed
//! ```

pub mod listener;
#[cfg(test)]
pub(crate) mod testing;
pub mod udp;

pub use listener::CommandListener;
pub use udp::UdpTransport;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

/// Fixed drone address, set once at startup
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: "192.168.4.1".to_string(),
            port: 5005,
        }
    }
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Resolves the endpoint to a socket address
    ///
    /// IP literals are used as-is; names go through the system resolver and the first
    /// address wins.
    pub async fn resolve(&self) -> Result<SocketAddr, TransportError> {
        if let Ok(ip) = self.host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.port));
        }

        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| TransportError::ResolutionFailed {
                endpoint: self.to_string(),
                reason: e.to_string(),
            })?;

        addrs.next().ok_or_else(|| TransportError::ResolutionFailed {
            endpoint: self.to_string(),
            reason: "no addresses found".to_string(),
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Classification of a failed send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    ResolutionFailed,
    SocketError,
    SendFailed,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Could not resolve {endpoint}: {reason}")]
    ResolutionFailed { endpoint: String, reason: String },

    #[error("Socket error: {reason}")]
    SocketError { reason: String },

    #[error("Sending to {endpoint} failed: {reason}")]
    SendFailed { endpoint: String, reason: String },
}

impl TransportError {
    pub fn kind(&self) -> TransportErrorKind {
        match self {
            TransportError::ResolutionFailed { .. } => TransportErrorKind::ResolutionFailed,
            TransportError::SocketError { .. } => TransportErrorKind::SocketError,
            TransportError::SendFailed { .. } => TransportErrorKind::SendFailed,
        }
    }
}

/// A connectionless sender bound to one endpoint
///
/// Implementations must never panic on network failure and must leave no state
/// behind that could affect the next send.
pub trait Transport: Send + Sync + 'static {
    /// Pushes one payload as a single datagram
    fn send(&self, payload: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Endpoint this transport delivers to
    fn endpoint(&self) -> &Endpoint;
}
