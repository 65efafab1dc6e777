use std::fmt;

use super::WireError;

pub(crate) const MAX_LABEL_LEN: usize = 63;
pub(crate) const MAX_NAME_LEN: usize = 255;

/// A domain name as a sequence of raw labels, without the empty root label.
///
/// Labels are arbitrary bytes, so a name read off the wire encodes back to
/// the same bytes. Case is preserved as received. Use
/// [`Name::eq_ignore_case`] when comparing names the way DNS does.
///
/// The text form is the usual presentation format: labels joined by `.`,
/// with `\.`, `\\` and `\DDD` escapes for bytes that would be ambiguous or
/// unprintable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Name {
    labels: Vec<Box<[u8]>>,
}

impl Name {
    /// Parse a name from its text form. A trailing dot is optional.
    ///
    /// Empty labels (as in `a..b`) are kept and rejected when encoding.
    pub fn new(name: impl AsRef<str>) -> Self {
        let text = name.as_ref().as_bytes();
        let text = match text.strip_suffix(b".") {
            Some(stripped) if !stripped.ends_with(b"\\") => stripped,
            _ => text,
        };
        if text.is_empty() {
            return Self::root();
        }

        let mut labels = Vec::new();
        let mut label = Vec::new();
        let mut i = 0;
        while i < text.len() {
            match text[i] {
                b'.' => labels.push(std::mem::take(&mut label).into_boxed_slice()),
                b'\\' => {
                    let digits = text
                        .get(i + 1..i + 4)
                        .filter(|digits| digits.iter().all(u8::is_ascii_digit));
                    let decimal = digits.and_then(|digits| {
                        let value = digits
                            .iter()
                            .fold(0u16, |acc, digit| acc * 10 + u16::from(digit - b'0'));
                        u8::try_from(value).ok()
                    });
                    match (decimal, text.get(i + 1)) {
                        (Some(byte), _) => {
                            label.push(byte);
                            i += 3;
                        }
                        (None, Some(&escaped)) => {
                            label.push(escaped);
                            i += 1;
                        }
                        (None, None) => label.push(b'\\'),
                    }
                }
                byte => label.push(byte),
            }
            i += 1;
        }
        labels.push(label.into_boxed_slice());

        Self { labels }
    }

    /// The root name.
    pub fn root() -> Self {
        Self { labels: Vec::new() }
    }

    pub(crate) fn from_labels(labels: Vec<Box<[u8]>>) -> Self {
        Self { labels }
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &[u8]> {
        self.labels.iter().map(|label| &**label)
    }

    pub fn eq_ignore_case(&self, other: &Name) -> bool {
        self.labels.len() == other.labels.len()
            && self
                .labels()
                .zip(other.labels())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }

    /// Lowercased text form, used as a lookup key.
    pub fn to_key(&self) -> String {
        self.to_string().to_ascii_lowercase()
    }

    /// Append the uncompressed wire form of this name to `buf`.
    pub(crate) fn encode(&self, buf: &mut Vec<u8>) -> Result<(), WireError> {
        let mut wire_len = 1;
        for label in self.labels() {
            if label.is_empty() {
                return Err(WireError::EmptyLabel);
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(WireError::LabelTooLong);
            }
            wire_len += 1 + label.len();
            if wire_len > MAX_NAME_LEN {
                return Err(WireError::NameTooLong);
            }
            buf.push(label.len() as u8);
            buf.extend_from_slice(label);
        }
        buf.push(0);
        Ok(())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        for (i, label) in self.labels().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            for &byte in label {
                match byte {
                    b'.' | b'\\' => write!(f, "\\{}", byte as char)?,
                    0x21..=0x7e => write!(f, "{}", byte as char)?,
                    _ => write!(f, "\\{:03}", byte)?,
                }
            }
        }
        Ok(())
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
