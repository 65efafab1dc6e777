//! Low-level cursor over a received message.

use super::WireError;
use super::name::{MAX_NAME_LEN, Name};

const POINTER_MASK: u8 = 0xC0;

/// Big-endian reader that keeps the whole buffer around so compression
/// pointers can be followed.
#[derive(Clone)]
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    /// A reader over the same buffer starting at `pos`.
    pub(crate) fn at(&self, pos: usize) -> Self {
        Self { buf: self.buf, pos }
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let end = self.pos.checked_add(len).ok_or(WireError::Truncated)?;
        let bytes = self.buf.get(self.pos..end).ok_or(WireError::Truncated)?;
        self.pos = end;
        Ok(bytes)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, WireError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, WireError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a possibly compressed name.
    ///
    /// Every pointer must jump strictly before the start of the run of labels
    /// it terminates, so a chain of pointers always makes progress towards the
    /// start of the buffer and cannot loop.
    pub(crate) fn name(&mut self) -> Result<Name, WireError> {
        let mut labels = Vec::new();
        let mut wire_len = 1;
        let mut cursor = self.pos;
        let mut run_start = self.pos;
        let mut resume_at = None;

        loop {
            let len = *self.buf.get(cursor).ok_or(WireError::Truncated)?;
            match len & POINTER_MASK {
                0x00 if len == 0 => {
                    cursor += 1;
                    break;
                }
                0x00 => {
                    let start = cursor + 1;
                    let end = start + len as usize;
                    let label = self.buf.get(start..end).ok_or(WireError::Truncated)?;
                    wire_len += 1 + label.len();
                    if wire_len > MAX_NAME_LEN {
                        return Err(WireError::NameTooLong);
                    }
                    labels.push(Box::from(label));
                    cursor = end;
                }
                POINTER_MASK => {
                    let low = *self.buf.get(cursor + 1).ok_or(WireError::Truncated)?;
                    let target = (usize::from(len & !POINTER_MASK) << 8) | usize::from(low);
                    if target >= run_start {
                        return Err(WireError::BadPointer { at: cursor, target });
                    }
                    resume_at.get_or_insert(cursor + 2);
                    cursor = target;
                    run_start = target;
                }
                _ => return Err(WireError::BadLabel(len)),
            }
        }

        self.pos = resume_at.unwrap_or(cursor);
        Ok(Name::from_labels(labels))
    }
}

pub(crate) fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// Write a section count, failing when the section cannot be represented.
pub(crate) fn put_count(buf: &mut Vec<u8>, len: usize) -> Result<(), WireError> {
    let count = u16::try_from(len).map_err(|_| WireError::SectionTooLarge)?;
    put_u16(buf, count);
    Ok(())
}
