use std::marker::PhantomData;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use super::{Error, Header, Opcode, Packet, Question, ResourceRecord, ResponseCode};

pub enum Questions {}
pub enum Answers {}
pub enum Nameservers {}
pub enum Additional {}

pub trait MoveTo<T> {}
impl<T> MoveTo<T> for T {}

impl MoveTo<Answers> for Questions {}

impl MoveTo<Nameservers> for Questions {}
impl MoveTo<Nameservers> for Answers {}

impl MoveTo<Additional> for Questions {}
impl MoveTo<Additional> for Answers {}
impl MoveTo<Additional> for Nameservers {}

/// Allows to build a DNS packet
///
/// Sections can only be written in wire order; the type parameter tracks the
/// section being filled. Every record added bumps the matching count in the
/// header, so the counts always agree with what was written.
///
/// Names are always written uncompressed.
pub struct Builder<S> {
    buf: Vec<u8>,
    _state: PhantomData<S>,
}

impl Builder<Questions> {
    /// Creates a new query
    ///
    /// Initially all sections are empty. You're expected to fill
    /// the questions section with `add_question`
    pub fn new_query(id: u16, recursion: bool) -> Builder<Questions> {
        Builder::with_header(&Header {
            id: id,
            query: true,
            opcode: Opcode::StandardQuery,
            authoritative: false,
            truncated: false,
            recursion_desired: recursion,
            recursion_available: false,
            authenticated_data: false,
            checking_disabled: false,
            response_code: ResponseCode::NoError,
            questions: 0,
            answers: 0,
            nameservers: 0,
            additional: 0,
        })
    }

    /// Starts a packet with the flags and id of `header`; its section counts
    /// are ignored
    pub fn with_header(header: &Header) -> Builder<Questions> {
        let mut buf = Vec::with_capacity(512);
        let head = Header {
            questions: 0,
            answers: 0,
            nameservers: 0,
            additional: 0,
            ..*header
        };
        buf.extend([0u8; 12].iter());
        head.write(&mut buf[..12]);
        Builder {
            buf: buf,
            _state: PhantomData,
        }
    }
}

impl<T> Builder<T> {
    fn write_rr(&mut self, rr: &ResourceRecord) -> Result<(), Error> {
        rr.name.write_to(&mut self.buf)?;
        self.buf.write_u16::<BigEndian>(rr.typ().into())?;
        self.buf.write_u16::<BigEndian>(rr.cls.into())?;
        self.buf.write_u32::<BigEndian>(rr.ttl)?;

        let size_offset = self.buf.len();
        self.buf.write_u16::<BigEndian>(0)?;

        let data_offset = self.buf.len();
        rr.data.write_to(&mut self.buf)?;
        let data_size = self.buf.len() - data_offset;
        if data_size > u16::MAX as usize {
            return Err(Error::RdataTooLong(data_size));
        }

        BigEndian::write_u16(
            &mut self.buf[size_offset..size_offset + 2],
            data_size as u16,
        );
        Ok(())
    }

    /// Returns the final packet
    pub fn build(self) -> Vec<u8> {
        self.buf
    }

    pub fn move_to<U>(self) -> Builder<U>
    where
        T: MoveTo<U>,
    {
        Builder {
            buf: self.buf,
            _state: PhantomData,
        }
    }
}

impl<T: MoveTo<Questions>> Builder<T> {
    /// Adds a question to the packet
    pub fn add_question(self, question: &Question) -> Result<Builder<Questions>, Error> {
        let mut builder = self.move_to::<Questions>();

        question.qname.write_to(&mut builder.buf)?;
        builder.buf.write_u16::<BigEndian>(question.qtype.into())?;
        builder.buf.write_u16::<BigEndian>(question.qclass.into())?;
        Header::inc_questions(&mut builder.buf).ok_or(Error::TooManyRecords)?;
        Ok(builder)
    }
}

impl<T: MoveTo<Answers>> Builder<T> {
    pub fn add_answer(self, rr: &ResourceRecord) -> Result<Builder<Answers>, Error> {
        let mut builder = self.move_to::<Answers>();

        builder.write_rr(rr)?;
        Header::inc_answers(&mut builder.buf).ok_or(Error::TooManyRecords)?;

        Ok(builder)
    }
}

impl<T: MoveTo<Nameservers>> Builder<T> {
    pub fn add_nameserver(self, rr: &ResourceRecord) -> Result<Builder<Nameservers>, Error> {
        let mut builder = self.move_to::<Nameservers>();

        builder.write_rr(rr)?;
        Header::inc_nameservers(&mut builder.buf).ok_or(Error::TooManyRecords)?;

        Ok(builder)
    }
}

impl<T: MoveTo<Additional>> Builder<T> {
    pub fn add_additional(self, rr: &ResourceRecord) -> Result<Builder<Additional>, Error> {
        let mut builder = self.move_to::<Additional>();

        builder.write_rr(rr)?;
        Header::inc_additional(&mut builder.buf).ok_or(Error::TooManyRecords)?;

        Ok(builder)
    }
}

impl<'a> Packet<'a> {
    /// Serializes the packet; header counts are taken from the sections
    pub fn to_vec(&self) -> Result<Vec<u8>, Error> {
        let mut builder = Builder::with_header(&self.header);
        for question in &self.questions {
            builder = builder.add_question(question)?;
        }
        let mut builder = builder.move_to::<Answers>();
        for rr in &self.answers {
            builder = builder.add_answer(rr)?;
        }
        let mut builder = builder.move_to::<Nameservers>();
        for rr in &self.nameservers {
            builder = builder.add_nameserver(rr)?;
        }
        let mut builder = builder.move_to::<Additional>();
        for rr in &self.additional {
            builder = builder.add_additional(rr)?;
        }
        Ok(builder.build())
    }
}

#[cfg(test)]
mod test {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::*;
    use crate::dns_parser::{Class, Name, RRData, Soa, Type};

    fn question(name: &'static str, qtype: Type) -> Question<'static> {
        Question {
            qname: Name::from_str(name).unwrap(),
            qtype: qtype,
            qclass: Class::IN,
        }
    }

    fn record(name: &'static str, data: RRData<'static>) -> ResourceRecord<'static> {
        ResourceRecord {
            name: Name::from_str(name).unwrap(),
            cls: Class::IN,
            ttl: 300,
            data: data,
        }
    }

    #[test]
    fn build_query() {
        let bld = Builder::new_query(1573, true)
            .add_question(&question("example.com", Type::A))
            .unwrap();
        let result = b"\x06%\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00\
                      \x07example\x03com\x00\x00\x01\x00\x01";
        assert_eq!(&bld.build()[..], &result[..]);
    }

    #[test]
    fn build_srv_query() {
        let bld = Builder::new_query(23513, true)
            .add_question(&question("_xmpp-server._tcp.gmail.com", Type::SRV))
            .unwrap();
        let result = b"[\xd9\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00\
            \x0c_xmpp-server\x04_tcp\x05gmail\x03com\x00\x00!\x00\x01";
        assert_eq!(&bld.build()[..], &result[..]);
    }

    #[test]
    fn counts_follow_sections() {
        let bld = Builder::new_query(1, false)
            .move_to::<Nameservers>()
            .add_nameserver(&record("com", RRData::NS(Name::from_str("a.gtld-servers.net").unwrap())))
            .unwrap()
            .add_additional(&record("a.gtld-servers.net", RRData::A(Ipv4Addr::new(192, 5, 6, 30))))
            .unwrap();
        let header = Header::parse(&bld.build()).unwrap();
        assert_eq!(header.questions, 0);
        assert_eq!(header.answers, 0);
        assert_eq!(header.nameservers, 1);
        assert_eq!(header.additional, 1);
    }

    #[test]
    fn every_record_type_round_trips() {
        let records = vec![
            record("example.com", RRData::A(Ipv4Addr::new(93, 184, 216, 34))),
            record("example.com", RRData::AAAA(Ipv6Addr::new(0x2606, 0x2800, 0x220, 1, 0x248, 0x1893, 0x25c8, 0x1946))),
            record("example.com", RRData::NS(Name::from_str("a.iana-servers.net").unwrap())),
            record("www.example.com", RRData::CNAME(Name::from_str("example.com").unwrap())),
            record("example.com", RRData::txt("v=spf1 -all")),
            record("example.com", RRData::MX {
                preference: 10,
                exchange: Name::from_str("mail.example.com").unwrap(),
            }),
            record("_sip._udp.example.com", RRData::SRV {
                priority: 1,
                weight: 2,
                port: 5060,
                target: Name::from_str("sip.example.com").unwrap(),
            }),
            record("34.216.184.93.in-addr.arpa", RRData::PTR(Name::from_str("example.com").unwrap())),
        ];
        let soa = record(
            "example.com",
            RRData::SOA(Soa {
                primary_ns: Name::from_str("ns.icann.org").unwrap(),
                mailbox: Name::from_str("noc.dns.icann.org").unwrap(),
                serial: 2024081500,
                refresh: 7200,
                retry: 3600,
                expire: 1209600,
                minimum_ttl: 3600,
            }),
        );

        let mut packet = Packet::parse(
            &Builder::new_query(7, true)
                .add_question(&question("example.com", Type::All))
                .unwrap()
                .build(),
        )
        .unwrap()
        .into_owned();
        packet.answers = records.clone();
        packet.nameservers = vec![soa.clone()];
        packet.additional = vec![record("a.iana-servers.net", RRData::A(Ipv4Addr::new(199, 43, 135, 53)))];

        let bytes = packet.to_vec().unwrap();
        let parsed = Packet::parse(&bytes).unwrap();
        assert_eq!(parsed.header.id, 7);
        assert_eq!(parsed.header.answers as usize, records.len());
        assert_eq!(parsed.answers, records);
        assert_eq!(parsed.nameservers, vec![soa]);
        assert_eq!(parsed.additional, packet.additional);
        assert_eq!(parsed.questions, packet.questions);
    }

    #[test]
    fn long_label_fails_to_encode() {
        let name = Name::FromStr(format!("{}.com", "a".repeat(64)).into());
        let result = Builder::new_query(1, true).add_question(&Question {
            qname: name,
            qtype: Type::A,
            qclass: Class::IN,
        });
        assert!(matches!(result, Err(Error::LabelTooLong(_))));
    }
}
