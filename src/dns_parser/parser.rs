use byteorder::{BigEndian, ByteOrder};

use super::{Class, Error, Header, Name, Packet, Question, RRData, ResourceRecord, Type};

impl<'a> Packet<'a> {
    /// Parse a full DNS Packet and return a structure that has all the
    /// data borrowed from the passed buffer.
    pub fn parse(data: &'a [u8]) -> Result<Packet<'a>, Error> {
        let header = Header::parse(data)?;
        let mut offset = Header::size();

        let mut questions = Vec::new();
        for _ in 0..header.questions {
            let (qname, name_size) = Name::scan(&data[offset..], data)?;
            offset += name_size;
            if offset + 4 > data.len() {
                return Err(Error::UnexpectedEOF);
            }
            let qtype = Type::from(BigEndian::read_u16(&data[offset..offset + 2]));
            let qclass = Class::from(BigEndian::read_u16(&data[offset + 2..offset + 4]));
            offset += 4;
            questions.push(Question {
                qname: qname,
                qtype: qtype,
                qclass: qclass,
            });
        }

        let answers = parse_records(data, &mut offset, header.answers)?;
        let nameservers = parse_records(data, &mut offset, header.nameservers)?;
        let additional = parse_records(data, &mut offset, header.additional)?;

        Ok(Packet {
            header: header,
            questions: questions,
            answers: answers,
            nameservers: nameservers,
            additional: additional,
        })
    }
}

fn parse_records<'a>(
    data: &'a [u8],
    offset: &mut usize,
    count: u16,
) -> Result<Vec<ResourceRecord<'a>>, Error> {
    let mut records = Vec::new();
    for _ in 0..count {
        records.push(parse_record(data, offset)?);
    }
    Ok(records)
}

// Generic function to parse answer, nameservers, and additional records.
fn parse_record<'a>(data: &'a [u8], offset: &mut usize) -> Result<ResourceRecord<'a>, Error> {
    let (name, name_size) = Name::scan(&data[*offset..], data)?;
    *offset += name_size;
    if *offset + 10 > data.len() {
        return Err(Error::UnexpectedEOF);
    }
    let typ = Type::from(BigEndian::read_u16(&data[*offset..*offset + 2]));
    let cls = Class::from(BigEndian::read_u16(&data[*offset + 2..*offset + 4]));
    let ttl = BigEndian::read_u32(&data[*offset + 4..*offset + 8]);
    let rdlen = BigEndian::read_u16(&data[*offset + 8..*offset + 10]) as usize;
    *offset += 10;
    if *offset + rdlen > data.len() {
        return Err(Error::UnexpectedEOF);
    }
    let rdata = &data[*offset..*offset + rdlen];
    *offset += rdlen;
    Ok(ResourceRecord {
        name: name,
        cls: cls,
        ttl: ttl,
        data: RRData::parse(typ, rdata, data)?,
    })
}
