use super::{Endpoint, Transport, TransportError};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, trace};

/// Default cap on how long a single resolve or send may block
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(100);

/// UDP transport that opens a fresh socket for every datagram
///
/// The socket is bound to an ephemeral port of the target's address family, used for
/// exactly one `send_to`, and dropped again. Nothing survives between calls, so a
/// failed send cannot poison the next one.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    endpoint: Endpoint,
    send_timeout: Duration,
}

impl UdpTransport {
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_timeout(endpoint, DEFAULT_SEND_TIMEOUT)
    }

    pub fn with_timeout(endpoint: Endpoint, send_timeout: Duration) -> Self {
        Self {
            endpoint,
            send_timeout,
        }
    }

    /// Sends one datagram to an arbitrary endpoint
    pub async fn send_to(&self, payload: &[u8], endpoint: &Endpoint) -> Result<(), TransportError> {
        let target = timeout(self.send_timeout, endpoint.resolve())
            .await
            .map_err(|_| TransportError::ResolutionFailed {
                endpoint: endpoint.to_string(),
                reason: format!("timed out after {}ms", self.send_timeout.as_millis()),
            })??;

        let socket = UdpSocket::bind(unspecified_for(&target))
            .await
            .map_err(|e| TransportError::SocketError {
                reason: e.to_string(),
            })?;

        let written = timeout(self.send_timeout, socket.send_to(payload, target))
            .await
            .map_err(|_| TransportError::SendFailed {
                endpoint: endpoint.to_string(),
                reason: format!("timed out after {}ms", self.send_timeout.as_millis()),
            })?
            .map_err(|e| TransportError::SendFailed {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        if written != payload.len() {
            return Err(TransportError::SendFailed {
                endpoint: endpoint.to_string(),
                reason: format!("short write: {} of {} bytes", written, payload.len()),
            });
        }

        trace!("Sent {} bytes to {}", written, target);
        Ok(())
    }
}

impl Transport for UdpTransport {
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        debug!("Sending datagram to {}", self.endpoint);
        self.send_to(payload, &self.endpoint).await
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

fn unspecified_for(target: &SocketAddr) -> SocketAddr {
    match target {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportErrorKind;

    async fn receiver() -> (UdpSocket, Endpoint) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        (socket, Endpoint::new("127.0.0.1", port))
    }

    #[tokio::test]
    async fn one_payload_one_datagram() {
        let (socket, endpoint) = receiver().await;
        let transport = UdpTransport::new(endpoint);

        transport.send(br#"{"cmd":"up"}"#).await.unwrap();

        let mut buf = [0u8; 1024];
        let (len, _) = timeout(Duration::from_secs(1), socket.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], br#"{"cmd":"up"}"#);
    }

    #[tokio::test]
    async fn unresolvable_host_is_classified_and_does_not_poison_later_sends() {
        let transport = UdpTransport::with_timeout(
            Endpoint::new("drone.invalid", 5005),
            Duration::from_secs(2),
        );
        let err = transport.send(b"{}").await.unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::ResolutionFailed);

        let (socket, endpoint) = receiver().await;
        transport
            .send_to(br#"{"cmd":"down"}"#, &endpoint)
            .await
            .unwrap();

        let mut buf = [0u8; 1024];
        let (len, _) = timeout(Duration::from_secs(1), socket.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], br#"{"cmd":"down"}"#);
    }

    #[tokio::test]
    async fn oversized_payload_is_a_send_failure() {
        let (_socket, endpoint) = receiver().await;
        let transport = UdpTransport::new(endpoint);
        let payload = vec![b'x'; 70_000];

        let err = transport.send(&payload).await.unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::SendFailed);
    }

    #[test]
    fn bind_address_matches_family() {
        let v4: SocketAddr = "10.0.0.1:1".parse().unwrap();
        let v6: SocketAddr = "[::1]:1".parse().unwrap();
        assert!(unspecified_for(&v4).is_ipv4());
        assert!(unspecified_for(&v6).is_ipv6());
        assert_eq!(unspecified_for(&v6).port(), 0);
    }
}
