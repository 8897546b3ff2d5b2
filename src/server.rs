use std::io;
use std::net::SocketAddr;

use log::{debug, trace, warn};
use tokio::net::UdpSocket;

use crate::dns_parser::{Opcode, Packet};
use crate::resolver::{Error, Resolver};
use crate::upstream::Upstream;
use crate::RECV_BUFFER_SIZE;

/// Answers client queries one datagram at a time
pub struct Server<U> {
    socket: UdpSocket,
    resolver: Resolver<U>,
}

impl<U: Upstream> Server<U> {
    pub fn new(socket: UdpSocket, resolver: Resolver<U>) -> Server<U> {
        Server {
            socket: socket,
            resolver: resolver,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Serves until the task is dropped
    pub async fn run(mut self) {
        let mut recv_buf = vec![0u8; RECV_BUFFER_SIZE];
        loop {
            let (len, addr) = match self.socket.recv_from(&mut recv_buf).await {
                Ok(received) => received,
                Err(err) => {
                    warn!("error receiving packet: {}", err);
                    continue;
                }
            };

            let reply = match self.handle_packet(&recv_buf[..len], addr).await {
                Some(reply) => reply,
                None => continue,
            };
            if let Err(err) = self.socket.send_to(&reply, addr).await {
                warn!("error sending reply to {:?}: {}", addr, err);
            }
        }
    }

    /// Returns the bytes to send back, or `None` if the client gets no reply
    async fn handle_packet(&mut self, buffer: &[u8], addr: SocketAddr) -> Option<Vec<u8>> {
        trace!("received packet from {:?}", addr);

        let packet = match Packet::parse(buffer) {
            Ok(packet) => packet,
            Err(error) => {
                warn!("couldn't parse packet from {:?}: {}", addr, error);
                return None;
            }
        };

        if !packet.header.query {
            trace!("received packet from {:?} with no query", addr);
            return None;
        }

        let question = match packet.questions.first() {
            Some(question) => question,
            None => {
                warn!("dropping packet from {:?} without a question", addr);
                return None;
            }
        };

        if packet.header.opcode != Opcode::StandardQuery {
            warn!(
                "treating {:?} from {:?} as a standard query",
                packet.header.opcode, addr
            );
        }

        debug!(
            "received question: {} {} (rd={})",
            question.qtype, question.qname, packet.header.recursion_desired
        );

        let result = if packet.header.recursion_desired {
            self.resolver
                .resolve(&packet)
                .await
                .and_then(|reply| reply.to_vec().map_err(Error::from))
        } else {
            self.resolver.forward(buffer).await
        };

        match result {
            Ok(reply) => Some(reply),
            Err(error) => {
                warn!(
                    "failed to answer {} {} for {:?}: {}",
                    question.qtype, question.qname, addr, error
                );
                None
            }
        }
    }
}
