//! One-shot DNS exchanges over UDP or TCP.

use crate::config::Protocol;
use crate::error::Error;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::{timeout, Instant};
use trust_dns_proto::op::Message;

const MAX_UDP_PAYLOAD: usize = 65_535;

/// A reply and the time it took to arrive.
#[derive(Debug, Clone)]
pub struct Reply {
    pub message: Message,
    pub rtt: Duration,
}

/// `DynExchange` is a type alias for an [`Exchange`] shared by every concurrent lookup and probe.
pub type DynExchange = Arc<dyn Exchange + Send + Sync>;

/// Sends one question to one server and waits for one reply.
///
/// Implementations must not retry: a reply carrying an error status is still a successful
/// exchange, and a timeout is reported as [`Error::Timeout`] so callers can apply their own
/// fallback policy.
#[async_trait::async_trait]
pub trait Exchange {
    async fn exchange(
        &self,
        query: &Message,
        server: SocketAddr,
        protocol: Protocol,
    ) -> Result<Reply, Error>;
}

/// The [`Exchange`] used outside of tests: real sockets, one per exchange.
#[derive(Debug, Clone, Copy)]
pub struct NetworkExchange {
    timeout: Duration,
}

impl NetworkExchange {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        NetworkExchange { timeout }
    }

    async fn exchange_udp(&self, wire: &[u8], id: u16, server: SocketAddr) -> Result<Reply, Error> {
        let local: SocketAddr = match server {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).await?;
        socket
            .connect(server)
            .await
            .map_err(|source| Error::Exchange { server, source })?;

        let start = Instant::now();
        socket
            .send(wire)
            .await
            .map_err(|source| Error::Exchange { server, source })?;

        let mut buf = vec![0u8; MAX_UDP_PAYLOAD];
        loop {
            let remaining = self.timeout.saturating_sub(start.elapsed());
            let len = match timeout(remaining, socket.recv(&mut buf)).await {
                Ok(res) => res.map_err(|source| Error::Exchange { server, source })?,
                Err(_) => return Err(self.timed_out(server)),
            };
            let rtt = start.elapsed();
            let message = match Message::from_vec(&buf[..len]) {
                Ok(message) => message,
                Err(err) => {
                    tracing::debug!("discarding undecodable datagram from {server}: {err}");
                    continue;
                }
            };
            if message.id() != id {
                tracing::debug!(
                    "discarding reply from {server} with id {} (expected {id})",
                    message.id()
                );
                continue;
            }
            return Ok(Reply { message, rtt });
        }
    }

    async fn exchange_tcp(&self, wire: &[u8], server: SocketAddr) -> Result<Reply, Error> {
        let len = u16::try_from(wire.len()).map_err(|_| Error::Exchange {
            server,
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "query too large"),
        })?;

        let start = Instant::now();
        let io = async {
            let mut stream = TcpStream::connect(server).await?;
            let mut framed = Vec::with_capacity(wire.len() + 2);
            framed.extend_from_slice(&len.to_be_bytes());
            framed.extend_from_slice(wire);
            stream.write_all(&framed).await?;
            stream.flush().await?;

            let reply_len = stream.read_u16().await?;
            let mut buf = vec![0u8; usize::from(reply_len)];
            stream.read_exact(&mut buf).await?;
            Ok::<_, std::io::Error>(buf)
        };
        let buf = match timeout(self.timeout, io).await {
            Ok(res) => res.map_err(|source| Error::Exchange { server, source })?,
            Err(_) => return Err(self.timed_out(server)),
        };
        let rtt = start.elapsed();
        Ok(Reply {
            message: Message::from_vec(&buf)?,
            rtt,
        })
    }

    fn timed_out(&self, server: SocketAddr) -> Error {
        Error::Timeout {
            server,
            timeout: self.timeout,
        }
    }
}

#[async_trait::async_trait]
impl Exchange for NetworkExchange {
    async fn exchange(
        &self,
        query: &Message,
        server: SocketAddr,
        protocol: Protocol,
    ) -> Result<Reply, Error> {
        let wire = query.to_vec()?;
        tracing::trace!("sending {} bytes to {server} over {protocol:?}", wire.len());
        match protocol {
            Protocol::Udp => self.exchange_udp(&wire, query.id(), server).await,
            Protocol::Tcp => self.exchange_tcp(&wire, server).await,
        }
    }
}
