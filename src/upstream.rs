use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use byteorder::{BigEndian, ByteOrder};
use log::{trace, warn};
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::address_family::{AddressFamily, Inet, Inet6};
use crate::RECV_BUFFER_SIZE;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_ATTEMPTS: u32 = 2;

/// One round trip to a DNS server
pub trait Upstream {
    /// Sends `query` to `server` and returns the reply carrying the same
    /// transaction id
    fn exchange(
        &mut self,
        query: &[u8],
        server: SocketAddr,
    ) -> impl Future<Output = io::Result<Vec<u8>>>;
}

/// Upstream transport over UDP
///
/// Sockets are bound on first use, one per address family.
pub struct UdpUpstream {
    v4: Option<UdpSocket>,
    v6: Option<UdpSocket>,
    timeout: Duration,
    attempts: u32,
    recv_buf: Vec<u8>,
}

impl UdpUpstream {
    pub fn new(timeout: Duration, attempts: u32) -> UdpUpstream {
        UdpUpstream {
            v4: None,
            v6: None,
            timeout: timeout,
            attempts: attempts.max(1),
            recv_buf: vec![0u8; RECV_BUFFER_SIZE],
        }
    }

    // Must be called from within a runtime
    fn socket<AF: AddressFamily>(slot: &mut Option<UdpSocket>) -> io::Result<&UdpSocket> {
        let socket = match slot.take() {
            Some(socket) => socket,
            None => UdpSocket::from_std(AF::bind()?)?,
        };
        Ok(slot.insert(socket))
    }
}

impl Default for UdpUpstream {
    fn default() -> UdpUpstream {
        UdpUpstream::new(DEFAULT_TIMEOUT, DEFAULT_ATTEMPTS)
    }
}

impl Upstream for UdpUpstream {
    async fn exchange(&mut self, query: &[u8], server: SocketAddr) -> io::Result<Vec<u8>> {
        if query.len() < 2 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "query is too short to carry an id",
            ));
        }
        let id = BigEndian::read_u16(&query[..2]);
        let socket = match server {
            SocketAddr::V4(_) => UdpUpstream::socket::<Inet>(&mut self.v4)?,
            SocketAddr::V6(_) => UdpUpstream::socket::<Inet6>(&mut self.v6)?,
        };

        for attempt in 1..=self.attempts {
            trace!("sending query {} to {} (attempt {})", id, server, attempt);
            socket.send_to(query, server).await?;
            match timeout(self.timeout, recv_reply(socket, &mut self.recv_buf, server, id)).await {
                Ok(reply) => return reply,
                Err(_) => warn!("no reply from {} within {:?}", server, self.timeout),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("{} did not answer query {}", server, id),
        ))
    }
}

async fn recv_reply(
    socket: &UdpSocket,
    buf: &mut [u8],
    server: SocketAddr,
    id: u16,
) -> io::Result<Vec<u8>> {
    loop {
        let (len, addr) = socket.recv_from(buf).await?;
        if addr != server {
            trace!("ignoring packet from unexpected peer {:?}", addr);
            continue;
        }
        if len < 2 || BigEndian::read_u16(&buf[..2]) != id {
            trace!("ignoring stale reply from {:?}", addr);
            continue;
        }
        return Ok(buf[..len].to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns_parser::{Builder, Class, Name, Question, Type};

    fn query(id: u16) -> Vec<u8> {
        Builder::new_query(id, true)
            .add_question(&Question {
                qname: Name::from_str("example.com").unwrap(),
                qtype: Type::A,
                qclass: Class::IN,
            })
            .unwrap()
            .build()
    }

    #[tokio::test]
    async fn skips_replies_with_other_ids() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();

        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (len, client) = server.recv_from(&mut buf).await.unwrap();
            let mut stale = buf[..len].to_vec();
            stale[0] ^= 0xff;
            server.send_to(&stale, client).await.unwrap();
            server.send_to(&buf[..len], client).await.unwrap();
        });

        let mut upstream = UdpUpstream::default();
        let sent = query(0x1234);
        let reply = upstream.exchange(&sent, server_addr).await.unwrap();
        assert_eq!(reply, sent);
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn gives_up_after_all_attempts() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();

        let mut upstream = UdpUpstream::new(Duration::from_millis(50), 2);
        let err = upstream
            .exchange(&query(7), server_addr)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);

        // both attempts reached the server
        let mut buf = [0u8; 512];
        for _ in 0..2 {
            let (len, _) = server.recv_from(&mut buf).await.unwrap();
            assert_eq!(&buf[..len], &query(7)[..]);
        }
    }

    #[tokio::test]
    async fn rejects_short_queries() {
        let mut upstream = UdpUpstream::default();
        let err = upstream
            .exchange(b"\x00", "127.0.0.1:53".parse().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
