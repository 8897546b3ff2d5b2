use super::{Class, Header, Name, RRData, Type};

/// Parsed DNS packet
///
/// The header counts reflect the packet as it was parsed; when a packet is
/// written back with [`Packet::to_vec`] they are recomputed from the sections.
#[derive(Debug, Clone)]
pub struct Packet<'a> {
    pub header: Header,
    pub questions: Vec<Question<'a>>,
    pub answers: Vec<ResourceRecord<'a>>,
    /// The authority section
    pub nameservers: Vec<ResourceRecord<'a>>,
    pub additional: Vec<ResourceRecord<'a>>,
}

/// A parsed chunk of data in the Query section of the packet
#[derive(Debug, Clone, PartialEq)]
pub struct Question<'a> {
    pub qname: Name<'a>,
    pub qtype: Type,
    pub qclass: Class,
}

/// A single DNS record
///
/// We aim to provide whole range of DNS records available. But as time is
/// limited we have some types of packets which are parsed and other provided
/// as unparsed slice of bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord<'a> {
    pub name: Name<'a>,
    pub cls: Class,
    pub ttl: u32,
    pub data: RRData<'a>,
}

/// Start of authority record
#[derive(Debug, Clone, PartialEq)]
pub struct Soa<'a> {
    pub primary_ns: Name<'a>,
    pub mailbox: Name<'a>,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum_ttl: u32,
}

impl<'a> Packet<'a> {
    /// Copies every name and payload out of the buffer the packet was
    /// parsed from
    pub fn into_owned(self) -> Packet<'static> {
        Packet {
            header: self.header,
            questions: self
                .questions
                .into_iter()
                .map(Question::into_owned)
                .collect(),
            answers: owned_records(self.answers),
            nameservers: owned_records(self.nameservers),
            additional: owned_records(self.additional),
        }
    }
}

fn owned_records(records: Vec<ResourceRecord>) -> Vec<ResourceRecord<'static>> {
    records.into_iter().map(ResourceRecord::into_owned).collect()
}

impl<'a> Question<'a> {
    pub fn into_owned(self) -> Question<'static> {
        Question {
            qname: self.qname.into_owned(),
            qtype: self.qtype,
            qclass: self.qclass,
        }
    }
}

impl<'a> ResourceRecord<'a> {
    pub fn typ(&self) -> Type {
        self.data.typ()
    }

    pub fn into_owned(self) -> ResourceRecord<'static> {
        ResourceRecord {
            name: self.name.into_owned(),
            cls: self.cls,
            ttl: self.ttl,
            data: self.data.into_owned(),
        }
    }
}

impl<'a> Soa<'a> {
    pub fn into_owned(self) -> Soa<'static> {
        Soa {
            primary_ns: self.primary_ns.into_owned(),
            mailbox: self.mailbox.into_owned(),
            serial: self.serial,
            refresh: self.refresh,
            retry: self.retry,
            expire: self.expire,
            minimum_ttl: self.minimum_ttl,
        }
    }
}
