//! Recursive DNS resolver that tags A answers with the zone of their address
//!
//! Queries are resolved iteratively from a configured root server. Every A
//! record in a final answer whose address falls inside a prefix of the
//! [`ZoneTable`] is followed by a TXT record `"<zone>-<address>"`.

pub mod address_family;
pub mod dns_parser;
pub mod resolver;
pub mod server;
pub mod upstream;
pub mod zones;

pub use crate::resolver::{Resolver, ResolverConfig};
pub use crate::server::Server;
pub use crate::upstream::{Upstream, UdpUpstream};
pub use crate::zones::{MatchPolicy, ZoneEntry, ZoneTable};

pub const DEFAULT_LISTEN_PORT: u16 = 8053;
pub const DNS_PORT: u16 = 53;
pub const RECV_BUFFER_SIZE: usize = 4096;
