//! Bench-side receiver for command datagrams
//!
//! Mirrors what the flight controller does with incoming traffic: read one datagram
//! of at most 1024 bytes, decode the JSON object and act on it. Used by the `listen`
//! subcommand to check a link without a drone, and by the end-to-end tests.

use super::TransportError;
use crate::command::Command;
use std::net::SocketAddr;
use tokio::net::{ToSocketAddrs, UdpSocket};
use tracing::{debug, warn};

/// Receive buffer size used by the drone firmware
pub const RECV_BUFFER_SIZE: usize = 1024;

pub struct CommandListener {
    socket: UdpSocket,
}

impl CommandListener {
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| TransportError::SocketError {
                reason: format!("bind failed: {}", e),
            })?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket
            .local_addr()
            .map_err(|e| TransportError::SocketError {
                reason: e.to_string(),
            })
    }

    /// Waits for the next datagram that decodes into a command
    ///
    /// Undecodable datagrams are logged and skipped.
    pub async fn recv(&self) -> Result<(Command, SocketAddr), TransportError> {
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        loop {
            let (len, from) =
                self.socket
                    .recv_from(&mut buf)
                    .await
                    .map_err(|e| TransportError::SocketError {
                        reason: format!("receive failed: {}", e),
                    })?;

            match Command::from_payload(&buf[..len]) {
                Ok(command) => {
                    debug!("Received {} from {}", command, from);
                    return Ok((command, from));
                }
                Err(e) => {
                    warn!(
                        "Dropping {} byte datagram from {}: {}",
                        len, from, e
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn garbage_is_skipped_and_commands_come_through() {
        let listener = CommandListener::bind("127.0.0.1:0").await.unwrap();
        let target = listener.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"hello drone", target).await.unwrap();
        sender.send_to(br#"{"cmd":"emergency"}"#, target).await.unwrap();

        let (command, from) = timeout(Duration::from_secs(1), listener.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(command, Command::Emergency);
        assert_eq!(from, sender.local_addr().unwrap());
    }

    #[tokio::test]
    async fn binding_a_taken_port_is_a_socket_error() {
        let first = CommandListener::bind("127.0.0.1:0").await.unwrap();
        let taken = first.local_addr().unwrap();
        let err = CommandListener::bind(taken).await.err().unwrap();
        assert_eq!(err.kind(), crate::transport::TransportErrorKind::SocketError);
    }
}
