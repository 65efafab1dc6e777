//! DNS message parsing and construction.
//!
//! Implements the RFC 1035 wire format for the subset of record types the
//! resolver understands. Decoding follows compression pointers; encoding
//! always writes names in full.

mod message;
mod name;
mod record;
mod wire;

pub use message::{Header, Message, Opcode, Question, ResponseCode};
pub use name::Name;
pub use record::{RData, RecordType, ResourceRecord};

use thiserror::Error;

/// Length of the fixed message header.
pub const HEADER_LEN: usize = 12;

/// The Internet class.
pub const CLASS_IN: u16 = 1;

/// Errors produced while decoding or encoding wire-format messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("message truncated")]
    Truncated,

    #[error("invalid label length byte {0:#04x}")]
    BadLabel(u8),

    #[error("compression pointer at offset {at} does not point backwards (target {target})")]
    BadPointer { at: usize, target: usize },

    #[error("empty label in name")]
    EmptyLabel,

    #[error("label longer than 63 bytes")]
    LabelTooLong,

    #[error("name longer than 255 bytes")]
    NameTooLong,

    #[error("rdata of length {len} is invalid for type {rtype}")]
    BadRdata { rtype: u16, len: usize },

    #[error("text longer than 255 bytes")]
    TextTooLong,

    #[error("section has more than 65535 entries")]
    SectionTooLarge,
}
