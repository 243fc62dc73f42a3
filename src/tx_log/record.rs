use std::{fmt, str};

use crate::utils::{checksum, from_hex, to_hex, HEX_LEN};

/// kind(1) + checksum(8) + key size(8) + value size(8)
const HEADER_LEN: usize = 1 + 3 * HEX_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Insert,
    Update,
    Del,
    Commit,
}

impl LogKind {
    pub fn to_byte(self) -> u8 {
        match self {
            LogKind::Insert => b'i',
            LogKind::Update => b'u',
            LogKind::Del => b'd',
            LogKind::Commit => b'c',
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'i' => Some(LogKind::Insert),
            b'u' => Some(LogKind::Update),
            b'd' => Some(LogKind::Del),
            b'c' => Some(LogKind::Commit),
            _ => None,
        }
    }
}

/// One entry of the write-ahead log.
///
/// Layout, with no delimiter between records:
///
/// ```text
/// | kind | checksum | key size | value size | key | value |
/// |  1   |    8     |    8     |     8      | ... |  ...  |
/// ```
///
/// The checksum covers the two size fields (as hex text), the key
/// and the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub kind: LogKind,
    pub key: String,
    pub value: String,
}

impl LogRecord {
    pub fn new(kind: LogKind, key: &str, value: &str) -> Self {
        Self {
            kind,
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    pub fn commit() -> Self {
        Self::new(LogKind::Commit, "", "")
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut body = to_hex(self.key.len() as u32).into_bytes();
        body.extend_from_slice(to_hex(self.value.len() as u32).as_bytes());
        body.extend_from_slice(self.key.as_bytes());
        body.extend_from_slice(self.value.as_bytes());

        let mut buf = Vec::with_capacity(1 + HEX_LEN + body.len());
        buf.push(self.kind.to_byte());
        buf.extend_from_slice(to_hex(checksum(&body)).as_bytes());
        buf.extend_from_slice(&body);
        buf
    }

    /// Decode the record starting at `*idx` and move `idx` past it.
    ///
    /// Return `None` (and leave `idx` untouched) if the bytes from
    /// `*idx` don't hold a complete and valid record, which is where
    /// the valid part of the log ends.
    pub fn decode(buf: &[u8], idx: &mut usize) -> Option<Self> {
        let start = *idx;
        if start + HEADER_LEN > buf.len() {
            return None;
        }

        let kind = LogKind::from_byte(buf[start])?;
        let stored_checksum = from_hex(&buf[start + 1..start + 1 + HEX_LEN]).ok()?;
        let sizes = &buf[start + 1 + HEX_LEN..start + HEADER_LEN];
        let key_size = from_hex(&sizes[..HEX_LEN]).ok()? as usize;
        let value_size = from_hex(&sizes[HEX_LEN..]).ok()? as usize;

        let end = start + HEADER_LEN + key_size + value_size;
        if end > buf.len() {
            return None;
        }
        if checksum(&buf[start + 1 + HEX_LEN..end]) != stored_checksum {
            return None;
        }

        let key_end = start + HEADER_LEN + key_size;
        let key = str::from_utf8(&buf[start + HEADER_LEN..key_end]).ok()?;
        let value = str::from_utf8(&buf[key_end..end]).ok()?;

        *idx = end;
        Some(Self::new(kind, key, value))
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            LogKind::Commit => write!(f, "{:?}", self.kind),
            LogKind::Del => write!(f, "{:?} {}", self.kind, self.key),
            _ => write!(f, "{:?} {} {}", self.kind, self.key, self.value),
        }
    }
}
