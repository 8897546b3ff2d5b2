use std::borrow::Cow;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use super::{Error, Name, Soa, Type};

/// The enumeration that represents known types of DNS resource records data
#[derive(Debug, Clone, PartialEq)]
pub enum RRData<'a> {
    CNAME(Name<'a>),
    NS(Name<'a>),
    PTR(Name<'a>),
    A(Ipv4Addr),
    AAAA(Ipv6Addr),
    SRV {
        priority: u16,
        weight: u16,
        port: u16,
        target: Name<'a>,
    },
    MX {
        preference: u16,
        exchange: Name<'a>,
    },
    SOA(Soa<'a>),
    /// Raw RDATA: one or more length-prefixed character strings
    TXT(Cow<'a, [u8]>),
    // Anything that can't be parsed yet
    Unknown {
        typ: Type,
        data: Cow<'a, [u8]>,
    },
}

impl<'a> RRData<'a> {
    /// Builds TXT data holding `text`, split in 255 byte character strings
    pub fn txt(text: &str) -> RRData<'static> {
        let mut data = Vec::with_capacity(text.len() + 1);
        if text.is_empty() {
            data.push(0);
        }
        for chunk in text.as_bytes().chunks(255) {
            data.push(chunk.len() as u8);
            data.extend_from_slice(chunk);
        }
        RRData::TXT(Cow::Owned(data))
    }

    pub fn typ(&self) -> Type {
        match *self {
            RRData::CNAME(..) => Type::CNAME,
            RRData::NS(..) => Type::NS,
            RRData::PTR(..) => Type::PTR,
            RRData::A(..) => Type::A,
            RRData::AAAA(..) => Type::AAAA,
            RRData::SRV { .. } => Type::SRV,
            RRData::MX { .. } => Type::MX,
            RRData::SOA(..) => Type::SOA,
            RRData::TXT(..) => Type::TXT,
            RRData::Unknown { typ, .. } => typ,
        }
    }

    /// Character strings of a TXT record, empty for other types
    pub fn txt_strings(&self) -> TxtStrings<'_> {
        match *self {
            RRData::TXT(ref data) => TxtStrings { data: &data[..] },
            _ => TxtStrings { data: &[] },
        }
    }

    pub fn write_to<T: io::Write>(&self, writer: &mut T) -> Result<(), Error> {
        match *self {
            RRData::CNAME(ref name) | RRData::NS(ref name) | RRData::PTR(ref name) => {
                name.write_to(writer)?
            }

            RRData::A(ip) => writer.write_u32::<BigEndian>(ip.into())?,

            RRData::AAAA(ip) => {
                for segment in ip.segments().iter() {
                    writer.write_u16::<BigEndian>(*segment)?;
                }
            }
            RRData::SRV {
                priority,
                weight,
                port,
                ref target,
            } => {
                writer.write_u16::<BigEndian>(priority)?;
                writer.write_u16::<BigEndian>(weight)?;
                writer.write_u16::<BigEndian>(port)?;
                target.write_to(writer)?
            }
            RRData::MX {
                preference,
                ref exchange,
            } => {
                writer.write_u16::<BigEndian>(preference)?;
                exchange.write_to(writer)?
            }
            RRData::SOA(ref soa) => {
                soa.primary_ns.write_to(writer)?;
                soa.mailbox.write_to(writer)?;
                writer.write_u32::<BigEndian>(soa.serial)?;
                writer.write_u32::<BigEndian>(soa.refresh)?;
                writer.write_u32::<BigEndian>(soa.retry)?;
                writer.write_u32::<BigEndian>(soa.expire)?;
                writer.write_u32::<BigEndian>(soa.minimum_ttl)?;
            }
            RRData::TXT(ref data) => writer.write_all(data)?,
            RRData::Unknown { ref data, .. } => writer.write_all(data)?,
        }
        Ok(())
    }

    pub fn parse(typ: Type, rdata: &'a [u8], original: &'a [u8]) -> Result<RRData<'a>, Error> {
        match typ {
            Type::A => {
                if rdata.len() != 4 {
                    return Err(Error::WrongRdataLength);
                }
                Ok(RRData::A(Ipv4Addr::from(BigEndian::read_u32(rdata))))
            }
            Type::AAAA => {
                if rdata.len() != 16 {
                    return Err(Error::WrongRdataLength);
                }
                let mut octets = [0u8; 16];
                octets.copy_from_slice(rdata);
                Ok(RRData::AAAA(Ipv6Addr::from(octets)))
            }
            Type::CNAME => Ok(RRData::CNAME(Name::scan(rdata, original)?.0)),
            Type::NS => Ok(RRData::NS(Name::scan(rdata, original)?.0)),
            Type::PTR => Ok(RRData::PTR(Name::scan(rdata, original)?.0)),
            Type::MX => {
                if rdata.len() < 3 {
                    return Err(Error::WrongRdataLength);
                }
                Ok(RRData::MX {
                    preference: BigEndian::read_u16(&rdata[..2]),
                    exchange: Name::scan(&rdata[2..], original)?.0,
                })
            }
            Type::SRV => {
                if rdata.len() < 7 {
                    return Err(Error::WrongRdataLength);
                }
                Ok(RRData::SRV {
                    priority: BigEndian::read_u16(&rdata[..2]),
                    weight: BigEndian::read_u16(&rdata[2..4]),
                    port: BigEndian::read_u16(&rdata[4..6]),
                    target: Name::scan(&rdata[6..], original)?.0,
                })
            }
            Type::SOA => {
                let (primary_ns, ns_size) = Name::scan(rdata, original)?;
                let (mailbox, mb_size) = Name::scan(&rdata[ns_size..], original)?;
                let pos = ns_size + mb_size;
                if rdata.len() != pos + 20 {
                    return Err(Error::WrongRdataLength);
                }
                Ok(RRData::SOA(Soa {
                    primary_ns: primary_ns,
                    mailbox: mailbox,
                    serial: BigEndian::read_u32(&rdata[pos..pos + 4]),
                    refresh: BigEndian::read_u32(&rdata[pos + 4..pos + 8]),
                    retry: BigEndian::read_u32(&rdata[pos + 8..pos + 12]),
                    expire: BigEndian::read_u32(&rdata[pos + 12..pos + 16]),
                    minimum_ttl: BigEndian::read_u32(&rdata[pos + 16..pos + 20]),
                }))
            }
            Type::TXT => {
                let mut pos = 0;
                while pos < rdata.len() {
                    pos += rdata[pos] as usize + 1;
                }
                if pos != rdata.len() {
                    return Err(Error::WrongRdataLength);
                }
                Ok(RRData::TXT(Cow::Borrowed(rdata)))
            }
            typ => Ok(RRData::Unknown {
                typ: typ,
                data: Cow::Borrowed(rdata),
            }),
        }
    }

    pub fn into_owned(self) -> RRData<'static> {
        match self {
            RRData::CNAME(name) => RRData::CNAME(name.into_owned()),
            RRData::NS(name) => RRData::NS(name.into_owned()),
            RRData::PTR(name) => RRData::PTR(name.into_owned()),
            RRData::A(ip) => RRData::A(ip),
            RRData::AAAA(ip) => RRData::AAAA(ip),
            RRData::SRV {
                priority,
                weight,
                port,
                target,
            } => RRData::SRV {
                priority: priority,
                weight: weight,
                port: port,
                target: target.into_owned(),
            },
            RRData::MX {
                preference,
                exchange,
            } => RRData::MX {
                preference: preference,
                exchange: exchange.into_owned(),
            },
            RRData::SOA(soa) => RRData::SOA(soa.into_owned()),
            RRData::TXT(data) => RRData::TXT(Cow::Owned(data.into_owned())),
            RRData::Unknown { typ, data } => RRData::Unknown {
                typ: typ,
                data: Cow::Owned(data.into_owned()),
            },
        }
    }
}

/// Returned by [`RRData::txt_strings`]
pub struct TxtStrings<'d> {
    data: &'d [u8],
}

impl<'d> Iterator for TxtStrings<'d> {
    type Item = &'d [u8];

    fn next(&mut self) -> Option<&'d [u8]> {
        let (&len, rest) = self.data.split_first()?;
        let len = (len as usize).min(rest.len());
        let (string, rest) = rest.split_at(len);
        self.data = rest;
        Some(string)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn encode(data: &RRData) -> Vec<u8> {
        let mut buf = Vec::new();
        data.write_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn address_lengths() {
        assert_eq!(encode(&RRData::A(Ipv4Addr::new(93, 184, 216, 34))).len(), 4);
        assert_eq!(encode(&RRData::AAAA(Ipv6Addr::LOCALHOST)).len(), 16);
        assert!(matches!(
            RRData::parse(Type::A, b"\x01\x02\x03", b""),
            Err(Error::WrongRdataLength)
        ));
        assert!(matches!(
            RRData::parse(Type::AAAA, b"\x01\x02\x03\x04", b""),
            Err(Error::WrongRdataLength)
        ));
    }

    #[test]
    fn txt_text() {
        let data = RRData::txt("AWS-US-18.2.3.4");
        assert_eq!(encode(&data), b"\x0fAWS-US-18.2.3.4");
        let strings: Vec<_> = data.txt_strings().collect();
        assert_eq!(strings, vec![&b"AWS-US-18.2.3.4"[..]]);
    }

    #[test]
    fn long_txt_is_split() {
        let text = "x".repeat(300);
        let data = RRData::txt(&text);
        let strings: Vec<_> = data.txt_strings().map(|s| s.len()).collect();
        assert_eq!(strings, vec![255, 45]);
        assert_eq!(encode(&data).len(), 302);
    }

    #[test]
    fn malformed_txt_is_rejected() {
        assert!(matches!(
            RRData::parse(Type::TXT, b"\x05abc", b""),
            Err(Error::WrongRdataLength)
        ));
    }

    #[test]
    fn soa_round_trip() {
        let rdata = b"\x01a\x00\x01b\x00\
            \x00\x00\x00\x01\x00\x00\x00\x02\x00\x00\x00\x03\x00\x00\x00\x04\x00\x00\x00\x05";
        let parsed = RRData::parse(Type::SOA, rdata, rdata).unwrap();
        match parsed {
            RRData::SOA(ref soa) => {
                assert_eq!(soa.primary_ns.to_string(), "a");
                assert_eq!(soa.serial, 1);
                assert_eq!(soa.minimum_ttl, 5);
            }
            ref other => panic!("Unexpected RR data type: {:?}", other),
        }
        assert_eq!(encode(&parsed), &rdata[..]);
    }

    #[test]
    fn unknown_type_is_kept_verbatim() {
        let parsed = RRData::parse(Type::Unknown(99), b"\xde\xad", b"").unwrap();
        assert_eq!(parsed.typ(), Type::Unknown(99));
        assert_eq!(encode(&parsed.into_owned()), b"\xde\xad");
    }
}
