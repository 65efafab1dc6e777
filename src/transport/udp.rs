//! UDP sockets for clients and upstream name servers.
//!
//! Upstream exchanges are strictly one at a time: a query is sent and the
//! socket is read until the matching response arrives or the deadline passes.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout_at};
use tracing::debug;

use crate::dns::Message;
use crate::resolver::{Exchange, ResolveError};

use super::MAX_DNS_PACKET_SIZE;

/// Client-facing socket bound to the service port.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind the listening socket.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;

        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Wait for the next client datagram.
    pub async fn receive(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }

    pub async fn send(&self, bytes: &[u8], dest: SocketAddr) -> io::Result<()> {
        self.socket.send_to(bytes, dest).await?;
        Ok(())
    }
}

/// Longest upstream wait accepted; longer timeouts are cut to this.
pub const MAX_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(600);

/// Socket used for the resolver's own queries.
pub struct UdpUpstream {
    socket: UdpSocket,
    port: u16,
    timeout: Duration,
}

impl UdpUpstream {
    /// Bind an ephemeral socket that talks to name servers on `port`.
    pub async fn bind(port: u16, timeout: Duration) -> io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;

        Ok(Self {
            socket,
            port,
            timeout: timeout.min(MAX_UPSTREAM_TIMEOUT),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Exchange for UdpUpstream {
    async fn exchange(&self, query: &Message, server: Ipv4Addr) -> Result<Message, ResolveError> {
        let dest = SocketAddr::new(server.into(), self.port);
        let bytes = query.encode()?;
        self.socket.send_to(&bytes, dest).await?;

        let deadline = Instant::now() + self.timeout;
        let mut buf = [0u8; MAX_DNS_PACKET_SIZE];

        loop {
            let (len, from) = match timeout_at(deadline, self.socket.recv_from(&mut buf)).await {
                Ok(received) => received?,
                Err(_) => return Err(ResolveError::Timeout { server: dest }),
            };

            // Late answers to earlier queries and strays from other hosts.
            if from != dest || len < 2 {
                debug!(%from, "ignoring unexpected datagram");
                continue;
            }
            let id = u16::from_be_bytes([buf[0], buf[1]]);
            if id != query.header.id {
                debug!(%from, id, "ignoring response with stale id");
                continue;
            }

            return Ok(Message::decode(&buf[..len])?);
        }
    }
}
