//! Mapping of network prefixes to zone labels
//!
//! The table is read once at startup from lines of the form
//! `<prefix-address>/<prefix-length>,<zone-label>` and never changes
//! afterwards.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::net::{AddrParseError, IpAddr};
use std::num::ParseIntError;
use std::path::Path;
use std::str::FromStr;

use log::debug;
use thiserror::Error;

/// Error loading a zone file
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not read zone file: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: EntryError,
    },
}

/// Error parsing a single zone entry
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("missing ',' before the zone label")]
    MissingLabel,
    #[error("zone label is empty")]
    EmptyLabel,
    #[error("missing '/' before the prefix length")]
    MissingPrefixLength,
    #[error("invalid network address: {0}")]
    InvalidAddress(#[from] AddrParseError),
    #[error("invalid prefix length: {0}")]
    InvalidPrefixLength(#[from] ParseIntError),
    #[error("prefix length {len} exceeds the {max} bits of the address")]
    PrefixTooLong { len: u8, max: u8 },
}

/// How [`ZoneTable::lookup`] picks among several matching entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// The earliest entry in load order wins, even if a later one is more
    /// specific
    #[default]
    FirstMatch,
    /// The entry with the longest prefix wins; ties go to the earliest one
    LongestPrefix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneEntry {
    pub network: IpAddr,
    pub prefix_len: u8,
    pub zone: String,
}

impl ZoneEntry {
    pub fn new(network: IpAddr, prefix_len: u8, zone: String) -> Result<ZoneEntry, EntryError> {
        let max = address_bits(&network);
        if prefix_len > max {
            return Err(EntryError::PrefixTooLong {
                len: prefix_len,
                max: max,
            });
        }
        if zone.is_empty() {
            return Err(EntryError::EmptyLabel);
        }
        Ok(ZoneEntry {
            network: network,
            prefix_len: prefix_len,
            zone: zone,
        })
    }

    /// Whether the top `prefix_len` bits of `addr` equal those of the network
    ///
    /// Addresses of the other family never match.
    pub fn contains(&self, addr: &IpAddr) -> bool {
        match (self.network, addr) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                prefix_matches(&net.octets(), &addr.octets(), self.prefix_len)
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                prefix_matches(&net.octets(), &addr.octets(), self.prefix_len)
            }
            _ => false,
        }
    }
}

impl FromStr for ZoneEntry {
    type Err = EntryError;

    fn from_str(line: &str) -> Result<ZoneEntry, EntryError> {
        let (prefix, zone) = line.split_once(',').ok_or(EntryError::MissingLabel)?;
        let (network, len) = prefix
            .trim()
            .split_once('/')
            .ok_or(EntryError::MissingPrefixLength)?;
        ZoneEntry::new(
            network.parse()?,
            len.parse()?,
            zone.trim().to_owned(),
        )
    }
}

fn address_bits(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// Compares whole bytes first, then the leading bits of the last partial byte
fn prefix_matches(network: &[u8], addr: &[u8], prefix_len: u8) -> bool {
    let full = prefix_len as usize / 8;
    let rest = prefix_len % 8;
    if network[..full] != addr[..full] {
        return false;
    }
    if rest == 0 {
        return true;
    }
    let mask = 0xffu8 << (8 - rest);
    network[full] & mask == addr[full] & mask
}

/// Ordered list of zone entries
#[derive(Debug, Clone, Default)]
pub struct ZoneTable {
    entries: Vec<ZoneEntry>,
    policy: MatchPolicy,
}

impl ZoneTable {
    pub fn new(entries: Vec<ZoneEntry>) -> ZoneTable {
        ZoneTable {
            entries: entries,
            policy: MatchPolicy::FirstMatch,
        }
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> ZoneTable {
        self.policy = policy;
        self
    }

    /// Reads one entry per line, keeping file order; blank lines are skipped
    pub fn from_reader<R: BufRead>(reader: R) -> Result<ZoneTable, Error> {
        let mut entries = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = line.parse().map_err(|source| Error::Line {
                line: index + 1,
                source: source,
            })?;
            entries.push(entry);
        }
        Ok(ZoneTable::new(entries))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<ZoneTable, Error> {
        let file = File::open(path.as_ref())?;
        let table = ZoneTable::from_reader(BufReader::new(file))?;
        debug!(
            "loaded {} zone entries from {}",
            table.len(),
            path.as_ref().display()
        );
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Zone label of the entry covering `addr`, if any
    pub fn lookup(&self, addr: IpAddr) -> Option<&str> {
        let mut matching = self.entries.iter().filter(|entry| entry.contains(&addr));
        let entry = match self.policy {
            MatchPolicy::FirstMatch => matching.next(),
            MatchPolicy::LongestPrefix => matching.fold(None, |best: Option<&ZoneEntry>, entry| {
                match best {
                    Some(best) if best.prefix_len >= entry.prefix_len => Some(best),
                    _ => Some(entry),
                }
            }),
        };
        entry.map(|entry| entry.zone.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn table(lines: &str) -> ZoneTable {
        ZoneTable::from_reader(lines.as_bytes()).unwrap()
    }

    fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn parse_entry() {
        let entry: ZoneEntry = "18.0.0.0/8,AWS-US".parse().unwrap();
        assert_eq!(entry.network, v4(18, 0, 0, 0));
        assert_eq!(entry.prefix_len, 8);
        assert_eq!(entry.zone, "AWS-US");
    }

    #[test]
    fn byte_aligned_prefix() {
        let zones = table("18.0.0.0/8,AWS-US\n");
        assert_eq!(zones.lookup(v4(18, 2, 3, 4)), Some("AWS-US"));
        assert_eq!(zones.lookup(v4(19, 2, 3, 4)), None);
    }

    #[test]
    fn partial_byte_prefix() {
        let zones = table("54.240.0.0/12,AWS-EU\n");
        assert_eq!(zones.lookup(v4(54, 255, 1, 1)), Some("AWS-EU"));
        assert_eq!(zones.lookup(v4(54, 224, 1, 1)), None);
    }

    #[test]
    fn full_length_and_zero_length_prefixes() {
        let zones = table("10.1.2.3/32,HOST\n0.0.0.0/0,EVERYWHERE\n");
        assert_eq!(zones.lookup(v4(10, 1, 2, 3)), Some("HOST"));
        assert_eq!(zones.lookup(v4(10, 1, 2, 4)), Some("EVERYWHERE"));
    }

    #[test]
    fn first_match_wins_over_longer_prefix() {
        let zones = table("10.0.0.0/8,A\n10.1.0.0/16,B\n");
        assert_eq!(zones.policy(), MatchPolicy::FirstMatch);
        assert_eq!(zones.lookup(v4(10, 1, 2, 3)), Some("A"));
    }

    #[test]
    fn longest_prefix_policy() {
        let zones = table("10.0.0.0/8,A\n10.1.0.0/16,B\n10.1.0.0/16,C\n")
            .with_policy(MatchPolicy::LongestPrefix);
        assert_eq!(zones.lookup(v4(10, 1, 2, 3)), Some("B"));
        assert_eq!(zones.lookup(v4(10, 2, 2, 3)), Some("A"));
    }

    #[test]
    fn families_never_mix() {
        let zones = table("0.0.0.0/0,V4\n");
        assert_eq!(zones.lookup(IpAddr::V6(Ipv6Addr::LOCALHOST)), None);

        let zones = table("2600:1f00::/24,AWS-V6\n");
        assert_eq!(zones.lookup(v4(38, 0, 31, 0)), None);
        assert_eq!(
            zones.lookup("2600:1f18::1".parse().unwrap()),
            Some("AWS-V6")
        );
    }

    #[test]
    fn blank_lines_and_whitespace() {
        let zones = table("\n 18.0.0.0/8 , AWS-US \r\n\n");
        assert_eq!(zones.len(), 1);
        assert_eq!(zones.lookup(v4(18, 0, 0, 1)), Some("AWS-US"));
    }

    #[test]
    fn malformed_lines_report_line_number() {
        let err = ZoneTable::from_reader("18.0.0.0/8,AWS-US\n18.0.0.0,AWS\n".as_bytes())
            .unwrap_err();
        match err {
            Error::Line {
                line: 2,
                source: EntryError::MissingPrefixLength,
            } => (),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn malformed_entries() {
        assert!(matches!(
            "18.0.0.0/8".parse::<ZoneEntry>(),
            Err(EntryError::MissingLabel)
        ));
        assert!(matches!(
            "18.0.0/8,X".parse::<ZoneEntry>(),
            Err(EntryError::InvalidAddress(_))
        ));
        assert!(matches!(
            "18.0.0.0/x,X".parse::<ZoneEntry>(),
            Err(EntryError::InvalidPrefixLength(_))
        ));
        assert!(matches!(
            "18.0.0.0/33,X".parse::<ZoneEntry>(),
            Err(EntryError::PrefixTooLong { len: 33, max: 32 })
        ));
        assert!(matches!(
            "18.0.0.0/8,".parse::<ZoneEntry>(),
            Err(EntryError::EmptyLabel)
        ));
    }

    #[test]
    fn load_missing_file() {
        assert!(matches!(
            ZoneTable::load("/nonexistent/zones.csv"),
            Err(Error::Io(_))
        ));
    }
}
