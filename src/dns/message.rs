use super::name::Name;
use super::record::{RecordType, ResourceRecord};
use super::wire::{Reader, put_count, put_u16};
use super::{CLASS_IN, HEADER_LEN, WireError};

/// Kind of query carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Opcode {
    #[default]
    Query,
    InverseQuery,
    Status,
    Other(u8),
}

impl From<u8> for Opcode {
    fn from(value: u8) -> Self {
        match value & 0x0F {
            0 => Opcode::Query,
            1 => Opcode::InverseQuery,
            2 => Opcode::Status,
            other => Opcode::Other(other),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        match value {
            Opcode::Query => 0,
            Opcode::InverseQuery => 1,
            Opcode::Status => 2,
            Opcode::Other(other) => other & 0x0F,
        }
    }
}

/// Response status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseCode {
    #[default]
    NoError,
    FormatError,
    ServerFailure,
    NameError,
    NotImplemented,
    Refused,
    Other(u8),
}

impl From<u8> for ResponseCode {
    fn from(value: u8) -> Self {
        match value & 0x0F {
            0 => ResponseCode::NoError,
            1 => ResponseCode::FormatError,
            2 => ResponseCode::ServerFailure,
            3 => ResponseCode::NameError,
            4 => ResponseCode::NotImplemented,
            5 => ResponseCode::Refused,
            other => ResponseCode::Other(other),
        }
    }
}

impl From<ResponseCode> for u8 {
    fn from(value: ResponseCode) -> Self {
        match value {
            ResponseCode::NoError => 0,
            ResponseCode::FormatError => 1,
            ResponseCode::ServerFailure => 2,
            ResponseCode::NameError => 3,
            ResponseCode::NotImplemented => 4,
            ResponseCode::Refused => 5,
            ResponseCode::Other(other) => other & 0x0F,
        }
    }
}

/// Message header without the section counts.
///
/// ```text
///   0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                      ID                       |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |QR|   Opcode  |AA|TC|RD|RA|   Z    |   RCODE   |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// Counts are derived from the sections when encoding and only used to
/// drive parsing when decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub id: u16,
    pub is_response: bool,
    pub opcode: Opcode,
    pub authoritative: bool,
    pub truncated: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub rcode: ResponseCode,
}

impl Header {
    fn flags(&self) -> u16 {
        (u16::from(self.is_response) << 15)
            | (u16::from(u8::from(self.opcode)) << 11)
            | (u16::from(self.authoritative) << 10)
            | (u16::from(self.truncated) << 9)
            | (u16::from(self.recursion_desired) << 8)
            | (u16::from(self.recursion_available) << 7)
            | u16::from(u8::from(self.rcode))
    }

    fn from_parts(id: u16, flags: u16) -> Self {
        Self {
            id,
            is_response: flags & 0x8000 != 0,
            opcode: Opcode::from((flags >> 11) as u8),
            authoritative: flags & 0x0400 != 0,
            truncated: flags & 0x0200 != 0,
            recursion_desired: flags & 0x0100 != 0,
            recursion_available: flags & 0x0080 != 0,
            rcode: ResponseCode::from((flags & 0x000F) as u8),
        }
    }
}

/// A question section entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: Name,
    pub qtype: RecordType,
    pub qclass: u16,
}

impl Question {
    /// A question in the Internet class.
    pub fn new(name: impl Into<Name>, qtype: RecordType) -> Self {
        Self {
            name: name.into(),
            qtype,
            qclass: CLASS_IN,
        }
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            name: reader.name()?,
            qtype: RecordType::from(reader.u16()?),
            qclass: reader.u16()?,
        })
    }

    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), WireError> {
        self.name.encode(buf)?;
        put_u16(buf, self.qtype.into());
        put_u16(buf, self.qclass);
        Ok(())
    }
}

/// A complete DNS message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
}

impl Message {
    /// A standard query for a single question.
    pub fn query(id: u16, question: Question, recursion_desired: bool) -> Self {
        Self {
            header: Header {
                id,
                recursion_desired,
                ..Header::default()
            },
            questions: vec![question],
            ..Self::default()
        }
    }

    /// An empty reply to `request` carrying `rcode`.
    pub fn error_reply(request: &Message, rcode: ResponseCode) -> Self {
        Self {
            header: Header {
                id: request.header.id,
                is_response: true,
                opcode: request.header.opcode,
                recursion_desired: request.header.recursion_desired,
                recursion_available: true,
                rcode,
                ..Header::default()
            },
            questions: request.questions.clone(),
            ..Self::default()
        }
    }

    /// Decode a message from raw bytes.
    ///
    /// The header counts decide how many entries are read from each section;
    /// anything after the last counted record is ignored.
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(data);
        if data.len() < HEADER_LEN {
            return Err(WireError::Truncated);
        }

        let id = reader.u16()?;
        let flags = reader.u16()?;
        let qdcount = reader.u16()?;
        let ancount = reader.u16()?;
        let nscount = reader.u16()?;
        let arcount = reader.u16()?;

        let questions = (0..qdcount)
            .map(|_| Question::decode(&mut reader))
            .collect::<Result<Vec<_>, _>>()?;
        let answers = decode_section(&mut reader, ancount)?;
        let authorities = decode_section(&mut reader, nscount)?;
        let additionals = decode_section(&mut reader, arcount)?;

        Ok(Self {
            header: Header::from_parts(id, flags),
            questions,
            answers,
            authorities,
            additionals,
        })
    }

    /// Encode to wire format without name compression.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut buf = Vec::with_capacity(512);

        put_u16(&mut buf, self.header.id);
        put_u16(&mut buf, self.header.flags());
        put_count(&mut buf, self.questions.len())?;
        put_count(&mut buf, self.answers.len())?;
        put_count(&mut buf, self.authorities.len())?;
        put_count(&mut buf, self.additionals.len())?;

        for question in &self.questions {
            question.encode(&mut buf)?;
        }
        for record in self
            .answers
            .iter()
            .chain(&self.authorities)
            .chain(&self.additionals)
        {
            record.encode(&mut buf)?;
        }

        Ok(buf)
    }

    /// Whether this is a standard query (not a response).
    pub fn is_standard_query(&self) -> bool {
        !self.header.is_response && self.header.opcode == Opcode::Query
    }
}

fn decode_section(reader: &mut Reader<'_>, count: u16) -> Result<Vec<ResourceRecord>, WireError> {
    (0..count)
        .map(|_| ResourceRecord::decode(reader))
        .collect()
}
