use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::name::Name;
use super::wire::{Reader, put_u16, put_u32};
use super::{CLASS_IN, WireError};

/// Record and query types.
///
/// Types the resolver does not interpret are kept as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    Ns,
    Cname,
    /// Text record, used for the synthetic region annotation.
    Txt,
    Aaaa,
    Unknown(u16),
}

impl RecordType {
    /// Whether a question of this type asks for addresses.
    pub fn is_address(self) -> bool {
        matches!(self, RecordType::A | RecordType::Aaaa)
    }
}

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordType::A,
            2 => RecordType::Ns,
            5 => RecordType::Cname,
            16 => RecordType::Txt,
            28 => RecordType::Aaaa,
            other => RecordType::Unknown(other),
        }
    }
}

impl From<RecordType> for u16 {
    fn from(value: RecordType) -> Self {
        match value {
            RecordType::A => 1,
            RecordType::Ns => 2,
            RecordType::Cname => 5,
            RecordType::Txt => 16,
            RecordType::Aaaa => 28,
            RecordType::Unknown(other) => other,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => f.write_str("A"),
            RecordType::Ns => f.write_str("NS"),
            RecordType::Cname => f.write_str("CNAME"),
            RecordType::Txt => f.write_str("TXT"),
            RecordType::Aaaa => f.write_str("AAAA"),
            RecordType::Unknown(code) => write!(f, "TYPE{}", code),
        }
    }
}

/// Type-specific record payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    /// A (4 bytes) or AAAA (16 bytes).
    Address(IpAddr),
    /// NS and CNAME targets.
    Name(Name),
    /// A single character-string.
    Text(String),
    /// Anything else, carried verbatim.
    Opaque(Vec<u8>),
}

/// A resource record from the answer, authority or additional section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: Name,
    pub rtype: RecordType,
    pub class: u16,
    pub ttl: u32,
    pub rdata: RData,
}

impl ResourceRecord {
    pub fn new(name: Name, rtype: RecordType, ttl: u32, rdata: RData) -> Self {
        Self {
            name,
            rtype,
            class: CLASS_IN,
            ttl,
            rdata,
        }
    }

    pub fn a(name: impl Into<Name>, ttl: u32, addr: Ipv4Addr) -> Self {
        Self::new(name.into(), RecordType::A, ttl, RData::Address(addr.into()))
    }

    pub fn aaaa(name: impl Into<Name>, ttl: u32, addr: Ipv6Addr) -> Self {
        Self::new(name.into(), RecordType::Aaaa, ttl, RData::Address(addr.into()))
    }

    pub fn ns(name: impl Into<Name>, ttl: u32, target: impl Into<Name>) -> Self {
        Self::new(name.into(), RecordType::Ns, ttl, RData::Name(target.into()))
    }

    pub fn cname(name: impl Into<Name>, ttl: u32, target: impl Into<Name>) -> Self {
        Self::new(name.into(), RecordType::Cname, ttl, RData::Name(target.into()))
    }

    pub fn txt(name: impl Into<Name>, ttl: u32, text: impl Into<String>) -> Self {
        Self::new(name.into(), RecordType::Txt, ttl, RData::Text(text.into()))
    }

    /// The IPv4 address of an A record.
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        match (self.rtype, &self.rdata) {
            (RecordType::A, RData::Address(IpAddr::V4(addr))) => Some(*addr),
            _ => None,
        }
    }

    /// The target of an NS record.
    pub fn ns_target(&self) -> Option<&Name> {
        match (self.rtype, &self.rdata) {
            (RecordType::Ns, RData::Name(target)) => Some(target),
            _ => None,
        }
    }

    /// The target of a CNAME record.
    pub fn cname_target(&self) -> Option<&Name> {
        match (self.rtype, &self.rdata) {
            (RecordType::Cname, RData::Name(target)) => Some(target),
            _ => None,
        }
    }

    pub(crate) fn decode(reader: &mut Reader<'_>) -> Result<Self, WireError> {
        let name = reader.name()?;
        let rtype = RecordType::from(reader.u16()?);
        let class = reader.u16()?;
        let ttl = reader.u32()?;
        let rdlength = usize::from(reader.u16()?);
        let rdata_start = reader.position();
        let raw = reader.take(rdlength)?;

        let bad_rdata = || WireError::BadRdata {
            rtype: rtype.into(),
            len: rdlength,
        };

        let rdata = match rtype {
            RecordType::A => {
                let octets: [u8; 4] = raw.try_into().map_err(|_| bad_rdata())?;
                RData::Address(IpAddr::from(octets))
            }
            RecordType::Aaaa => {
                let octets: [u8; 16] = raw.try_into().map_err(|_| bad_rdata())?;
                RData::Address(IpAddr::from(octets))
            }
            RecordType::Ns | RecordType::Cname => {
                let mut inner = reader.at(rdata_start);
                let target = inner.name()?;
                if inner.position() != rdata_start + rdlength {
                    return Err(bad_rdata());
                }
                RData::Name(target)
            }
            RecordType::Txt => match raw.split_first() {
                Some((&len, text)) if usize::from(len) == text.len() => {
                    match std::str::from_utf8(text) {
                        Ok(text) => RData::Text(text.to_string()),
                        Err(_) => RData::Opaque(raw.to_vec()),
                    }
                }
                _ => RData::Opaque(raw.to_vec()),
            },
            RecordType::Unknown(_) => RData::Opaque(raw.to_vec()),
        };

        Ok(Self {
            name,
            rtype,
            class,
            ttl,
            rdata,
        })
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) -> Result<(), WireError> {
        self.name.encode(buf)?;
        put_u16(buf, self.rtype.into());
        put_u16(buf, self.class);
        put_u32(buf, self.ttl);

        let mut rdata = Vec::new();
        match &self.rdata {
            RData::Address(IpAddr::V4(addr)) => rdata.extend_from_slice(&addr.octets()),
            RData::Address(IpAddr::V6(addr)) => rdata.extend_from_slice(&addr.octets()),
            RData::Name(target) => target.encode(&mut rdata)?,
            RData::Text(text) => {
                let len = u8::try_from(text.len()).map_err(|_| WireError::TextTooLong)?;
                rdata.push(len);
                rdata.extend_from_slice(text.as_bytes());
            }
            RData::Opaque(bytes) => rdata.extend_from_slice(bytes),
        }

        let rdlength = u16::try_from(rdata.len()).map_err(|_| WireError::BadRdata {
            rtype: self.rtype.into(),
            len: rdata.len(),
        })?;
        put_u16(buf, rdlength);
        buf.extend_from_slice(&rdata);
        Ok(())
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} ", self.name, self.ttl, self.rtype)?;
        match &self.rdata {
            RData::Address(addr) => write!(f, "{}", addr),
            RData::Name(target) => write!(f, "{}", target),
            RData::Text(text) => write!(f, "{:?}", text),
            RData::Opaque(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(buf: &[u8]) -> Result<ResourceRecord, WireError> {
        ResourceRecord::decode(&mut Reader::new(buf))
    }

    #[test]
    fn record_type_codes() {
        assert_eq!(RecordType::from(1), RecordType::A);
        assert_eq!(RecordType::from(28), RecordType::Aaaa);
        assert_eq!(RecordType::from(15), RecordType::Unknown(15));
        assert_eq!(u16::from(RecordType::Txt), 16);
        assert_eq!(u16::from(RecordType::Unknown(99)), 99);
    }

    #[test]
    fn decodes_a_record() {
        let buf = [
            1, b'a', 0, // name
            0, 1, 0, 1, // type A, class IN
            0, 0, 0x0e, 0x10, // ttl 3600
            0, 4, 1, 2, 3, 4,
        ];

        let record = decode(&buf).unwrap();

        assert_eq!(record, ResourceRecord::a("a", 3600, Ipv4Addr::new(1, 2, 3, 4)));
        assert_eq!(record.ipv4(), Some(Ipv4Addr::new(1, 2, 3, 4)));
    }

    #[test]
    fn a_record_with_wrong_length_is_rejected() {
        let buf = [0, 0, 1, 0, 1, 0, 0, 0, 0, 0, 3, 1, 2, 3];

        assert_eq!(decode(&buf), Err(WireError::BadRdata { rtype: 1, len: 3 }));
    }

    #[test]
    fn rdlength_beyond_buffer_is_truncated() {
        let buf = [0, 0, 99, 0, 1, 0, 0, 0, 0, 0, 10, 1, 2];

        assert_eq!(decode(&buf), Err(WireError::Truncated));
    }

    #[test]
    fn unknown_type_is_opaque() {
        let buf = [0, 0, 99, 0, 1, 0, 0, 0, 0, 0, 3, 7, 8, 9];

        let record = decode(&buf).unwrap();

        assert_eq!(record.rtype, RecordType::Unknown(99));
        assert_eq!(record.rdata, RData::Opaque(vec![7, 8, 9]));
    }

    #[test]
    fn multi_string_txt_is_opaque() {
        let buf = [0, 0, 16, 0, 1, 0, 0, 0, 0, 0, 4, 1, b'a', 1, b'b'];

        let record = decode(&buf).unwrap();

        assert_eq!(record.rdata, RData::Opaque(vec![1, b'a', 1, b'b']));
    }

    #[test]
    fn cname_target_must_fill_rdata() {
        // Target "b" takes 3 bytes but rdlength says 4.
        let buf = [0, 0, 5, 0, 1, 0, 0, 0, 0, 0, 4, 1, b'b', 0, 0];

        assert_eq!(decode(&buf), Err(WireError::BadRdata { rtype: 5, len: 4 }));
    }

    #[test]
    fn encodes_text_as_character_string() {
        let mut buf = Vec::new();
        ResourceRecord::txt("a", 0, "us-east").encode(&mut buf).unwrap();

        let rdata = &buf[buf.len() - 8..];
        assert_eq!(rdata[0], 7);
        assert_eq!(&rdata[1..], b"us-east");
        assert_eq!(&buf[buf.len() - 10..buf.len() - 8], &[0, 8]);
    }

    #[test]
    fn encode_rejects_long_text() {
        let record = ResourceRecord::txt("a", 0, "x".repeat(256));

        assert_eq!(record.encode(&mut Vec::new()), Err(WireError::TextTooLong));
    }

    #[test]
    fn display_is_zone_file_like() {
        let record = ResourceRecord::cname("foo.example", 60, "bar.example");

        assert_eq!(record.to_string(), "foo.example 60 CNAME bar.example");
    }
}
