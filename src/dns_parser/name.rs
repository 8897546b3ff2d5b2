use std::borrow::Cow;
use std::fmt;
use std::fmt::Write;
use std::hash;
use std::io;
use std::slice;
use std::str;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use super::Error;

/// Longest name allowed on the wire, including length octets
const MAX_NAME_LENGTH: usize = 255;
/// A name of 255 bytes holds at most 127 labels, so a longer pointer chain
/// can only be a loop
const MAX_POINTER_HOPS: usize = 127;
const MAX_LABEL_LENGTH: usize = 63;

/// The DNS name as stored in the original packet
///
/// This is contains just a reference to a slice that contains the data.
/// You may turn this into a string using `.to_string()`, or detach it from
/// the packet with [`Name::into_owned`].
///
/// Names compare and hash case-insensitively.
#[derive(Debug, Clone)]
pub enum Name<'a> {
    FromPacket {
        labels: &'a [u8],
        /// This is the original buffer size. The compressed names in original
        /// are calculated in this buffer
        original: &'a [u8],
    },

    FromStr(Cow<'a, str>),

    /// Labels copied out of a packet; a label may hold any byte, dots included
    Owned(Vec<Vec<u8>>),
}

impl<'a> Name<'a> {
    pub fn scan(data: &'a [u8], original: &'a [u8]) -> Result<(Name<'a>, usize), Error> {
        let mut pos = 0;
        let mut length = 1;
        loop {
            if data.len() <= pos {
                return Err(Error::UnexpectedEOF);
            }
            let byte = data[pos];
            if byte == 0 {
                return Ok((
                    Name::FromPacket {
                        labels: &data[..pos + 1],
                        original: original,
                    },
                    pos + 1,
                ));
            } else if byte & 0b1100_0000 == 0b1100_0000 {
                if data.len() < pos + 2 {
                    return Err(Error::UnexpectedEOF);
                }
                let off =
                    (BigEndian::read_u16(&data[pos..pos + 2]) & !0b1100_0000_0000_0000) as usize;
                // Validate referred to location
                Name::follow(original, off, length)?;
                return Ok((
                    Name::FromPacket {
                        labels: &data[..pos + 2],
                        original: original,
                    },
                    pos + 2,
                ));
            } else if byte & 0b1100_0000 == 0 {
                let end = pos + byte as usize + 1;
                if end >= data.len() {
                    return Err(Error::UnexpectedEOF);
                }
                length += byte as usize + 1;
                if length > MAX_NAME_LENGTH {
                    return Err(Error::NameTooLong);
                }
                pos = end;
                continue;
            } else {
                return Err(Error::UnknownLabelFormat);
            }
        }
    }

    /// Checks the labels behind a compression pointer, following further
    /// pointers until the terminating zero
    fn follow(original: &[u8], mut pos: usize, mut length: usize) -> Result<(), Error> {
        let mut hops = 1;
        loop {
            if original.len() <= pos {
                return Err(Error::UnexpectedEOF);
            }
            let byte = original[pos];
            if byte == 0 {
                return Ok(());
            } else if byte & 0b1100_0000 == 0b1100_0000 {
                if original.len() < pos + 2 {
                    return Err(Error::UnexpectedEOF);
                }
                hops += 1;
                if hops > MAX_POINTER_HOPS {
                    return Err(Error::PointerLoop);
                }
                pos = (BigEndian::read_u16(&original[pos..pos + 2]) & !0b1100_0000_0000_0000)
                    as usize;
            } else if byte & 0b1100_0000 == 0 {
                let end = pos + byte as usize + 1;
                if end >= original.len() {
                    return Err(Error::UnexpectedEOF);
                }
                length += byte as usize + 1;
                if length > MAX_NAME_LENGTH {
                    return Err(Error::NameTooLong);
                }
                pos = end;
            } else {
                return Err(Error::UnknownLabelFormat);
            }
        }
    }

    /// Creates a name from its dotted form; a trailing dot is optional and
    /// both `""` and `"."` denote the root
    pub fn from_str<T: Into<Cow<'a, str>>>(name: T) -> Result<Name<'a>, Error> {
        let name = Name::FromStr(name.into());
        if let Some(label) = name.labels().find(|l| l.len() > MAX_LABEL_LENGTH) {
            return Err(Error::LabelTooLong(
                String::from_utf8_lossy(label).into_owned(),
            ));
        }
        Ok(name)
    }

    /// Iterates over the labels of the name with compression pointers expanded
    pub fn labels(&self) -> Labels<'_> {
        match *self {
            Name::FromPacket { labels, original } => Labels::Packet {
                data: labels,
                original: original,
                pos: 0,
                hops: 0,
            },
            Name::FromStr(ref name) => Labels::Str(name.split('.')),
            Name::Owned(ref labels) => Labels::Owned(labels.iter()),
        }
    }

    pub fn is_root(&self) -> bool {
        self.labels().next().is_none()
    }

    pub fn write_to<T: io::Write>(&self, writer: &mut T) -> Result<(), Error> {
        for label in self.labels() {
            if label.len() > MAX_LABEL_LENGTH {
                return Err(Error::LabelTooLong(
                    String::from_utf8_lossy(label).into_owned(),
                ));
            }
            writer.write_u8(label.len() as u8)?;
            writer.write_all(label)?;
        }
        writer.write_u8(0)?;
        Ok(())
    }

    /// Copies the name out of the packet it was read from
    pub fn into_owned(self) -> Name<'static> {
        match self {
            Name::FromStr(name) => Name::FromStr(Cow::Owned(name.into_owned())),
            Name::Owned(labels) => Name::Owned(labels),
            name => Name::Owned(name.labels().map(|label| label.to_vec()).collect()),
        }
    }
}

/// Iterator returned by [`Name::labels`]
pub enum Labels<'n> {
    Packet {
        data: &'n [u8],
        original: &'n [u8],
        pos: usize,
        hops: usize,
    },
    Str(str::Split<'n, char>),
    Owned(slice::Iter<'n, Vec<u8>>),
}

impl<'n> Iterator for Labels<'n> {
    type Item = &'n [u8];

    fn next(&mut self) -> Option<&'n [u8]> {
        match *self {
            Labels::Packet {
                ref mut data,
                original,
                ref mut pos,
                ref mut hops,
            } => loop {
                let bytes: &'n [u8] = *data;
                let byte = *bytes.get(*pos)?;
                if byte == 0 {
                    return None;
                } else if byte & 0b1100_0000 == 0b1100_0000 {
                    let off = BigEndian::read_u16(bytes.get(*pos..*pos + 2)?)
                        & !0b1100_0000_0000_0000;
                    *hops += 1;
                    if *hops > MAX_POINTER_HOPS {
                        return None;
                    }
                    *data = original;
                    *pos = off as usize;
                } else if byte & 0b1100_0000 == 0 {
                    let end = *pos + byte as usize + 1;
                    let label = bytes.get(*pos + 1..end)?;
                    *pos = end;
                    return Some(label);
                } else {
                    return None;
                }
            },
            Labels::Str(ref mut parts) => parts
                .find(|part| !part.is_empty())
                .map(|part| part.as_bytes()),
            Labels::Owned(ref mut labels) => labels.next().map(|label| label.as_slice()),
        }
    }
}

impl<'a> fmt::Display for Name<'a> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let mut labels = self.labels();
        match labels.next() {
            None => fmt.write_char('.'),
            Some(first) => {
                fmt.write_str(&String::from_utf8_lossy(first))?;
                for label in labels {
                    fmt.write_char('.')?;
                    fmt.write_str(&String::from_utf8_lossy(label))?;
                }
                Ok(())
            }
        }
    }
}

impl<'a> hash::Hash for Name<'a> {
    fn hash<H>(&self, state: &mut H)
    where
        H: hash::Hasher,
    {
        for label in self.labels() {
            state.write_u8(label.len() as u8);
            for byte in label {
                state.write_u8(byte.to_ascii_lowercase());
            }
        }
        state.write_u8(0);
    }
}

impl<'a, 'b> PartialEq<Name<'b>> for Name<'a> {
    fn eq(&self, other: &Name<'b>) -> bool {
        let mut ours = self.labels();
        let mut theirs = other.labels();
        loop {
            match (ours.next(), theirs.next()) {
                (None, None) => return true,
                (Some(a), Some(b)) if a.eq_ignore_ascii_case(b) => continue,
                _ => return false,
            }
        }
    }
}

impl<'a> Eq for Name<'a> {}

#[cfg(test)]
mod test {
    use super::*;

    fn encode(name: &Name) -> Vec<u8> {
        let mut buf = Vec::new();
        name.write_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn scan_plain_name() {
        let data = b"\x07example\x03com\x00rest";
        let (name, size) = Name::scan(data, data).unwrap();
        assert_eq!(size, 13);
        assert_eq!(name.to_string(), "example.com");
    }

    #[test]
    fn scan_expands_backward_pointer() {
        // "example.com" at offset 0, "www" + pointer to it at offset 13
        let data = b"\x07example\x03com\x00\x03www\xc0\x00";
        let (name, size) = Name::scan(&data[13..], data).unwrap();
        assert_eq!(size, 6);
        assert_eq!(name.to_string(), "www.example.com");
        assert_eq!(name, Name::from_str("www.example.com").unwrap());
        assert_eq!(encode(&name), b"\x03www\x07example\x03com\x00");
    }

    #[test]
    fn scan_follows_pointer_chains() {
        let data = b"\x03com\x00\x07example\xc0\x00\x03www\xc0\x05";
        let (name, _) = Name::scan(&data[15..], data).unwrap();
        assert_eq!(name.to_string(), "www.example.com");
    }

    #[test]
    fn self_referential_pointer_is_rejected() {
        let data = b"\xc0\x00";
        assert!(matches!(
            Name::scan(data, data),
            Err(Error::PointerLoop)
        ));
    }

    #[test]
    fn pointer_cycle_is_rejected() {
        let data = b"\x01a\xc0\x04\x01b\xc0\x00";
        assert!(Name::scan(data, data).is_err());
    }

    #[test]
    fn pointer_past_end_is_rejected() {
        let data = b"\x03www\xc0\x40";
        assert!(matches!(
            Name::scan(data, data),
            Err(Error::UnexpectedEOF)
        ));
    }

    #[test]
    fn truncated_label_is_rejected() {
        let data = b"\x07exam";
        assert!(matches!(
            Name::scan(data, data),
            Err(Error::UnexpectedEOF)
        ));
    }

    #[test]
    fn reserved_label_format_is_rejected() {
        let data = b"\x40abc\x00";
        assert!(matches!(
            Name::scan(data, data),
            Err(Error::UnknownLabelFormat)
        ));
    }

    #[test]
    fn root_name() {
        let data = b"\x00";
        let (name, size) = Name::scan(data, data).unwrap();
        assert_eq!(size, 1);
        assert!(name.is_root());
        assert_eq!(name.to_string(), ".");
        assert_eq!(encode(&Name::from_str(".").unwrap()), b"\x00");
        assert_eq!(encode(&Name::from_str("").unwrap()), b"\x00");
    }

    #[test]
    fn trailing_dot_is_ignored() {
        assert_eq!(
            encode(&Name::from_str("example.com.").unwrap()),
            b"\x07example\x03com\x00"
        );
    }

    #[test]
    fn label_length_limit() {
        let ok = format!("{}.com", "a".repeat(63));
        assert!(Name::from_str(ok).is_ok());

        let long = format!("{}.com", "a".repeat(64));
        assert!(matches!(
            Name::from_str(long.clone()),
            Err(Error::LabelTooLong(_))
        ));
        let unchecked = Name::FromStr(long.into());
        assert!(matches!(
            unchecked.write_to(&mut Vec::new()),
            Err(Error::LabelTooLong(_))
        ));
    }

    #[test]
    fn case_insensitive_equality() {
        use std::collections::HashSet;

        let lower = Name::from_str("ns1.example.com").unwrap();
        let upper = Name::from_str("NS1.Example.COM.").unwrap();
        assert_eq!(lower, upper);

        let mut set = HashSet::new();
        set.insert(lower);
        assert!(set.contains(&upper));
    }

    #[test]
    fn into_owned_detaches_from_packet() {
        let owned = {
            let data = b"\x07example\x03com\x00\x03www\xc0\x00".to_vec();
            let (name, _) = Name::scan(&data[13..], &data).unwrap();
            name.into_owned()
        };
        assert_eq!(owned.to_string(), "www.example.com");
    }

    #[test]
    fn dotted_label_survives_into_owned() {
        let data = b"\x08john.doe\x07example\x03com\x00";
        let (name, _) = Name::scan(data, data).unwrap();
        let owned = name.into_owned();
        assert_eq!(owned.labels().count(), 3);
        assert_eq!(owned.labels().next(), Some(&b"john.doe"[..]));
        assert_eq!(encode(&owned), &data[..]);
    }

    #[test]
    fn binary_labels_are_accepted() {
        let data = b"\x02\xff\xfe\x03com\x00";
        let (name, size) = Name::scan(data, data).unwrap();
        assert_eq!(size, data.len());
        assert_eq!(encode(&name.into_owned()), &data[..]);
    }
}
