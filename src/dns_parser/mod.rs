//! Encoding and decoding of DNS messages in the RFC 1035 wire format

mod builder;
mod enums;
mod error;
mod header;
mod name;
mod parser;
mod rrdata;
mod structs;

pub use self::builder::{Additional, Answers, Builder, MoveTo, Nameservers, Questions};
pub use self::enums::{Class, Opcode, ResponseCode, Type};
pub use self::error::Error;
pub use self::header::Header;
pub use self::name::{Labels, Name};
pub use self::rrdata::{RRData, TxtStrings};
pub use self::structs::{Packet, Question, ResourceRecord, Soa};
