use hex::FromHex;

use crate::{error::KvError, types::KvResult};

/// Every integer stored in a page or a log record is written as this
/// many ascii hex digits.
pub const HEX_LEN: usize = 8;

/// CRC-32 (IEEE) of the given bytes.
pub fn checksum(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

/// Encode a number as 8 lowercase, zero padded hex digits.
pub fn to_hex(number: u32) -> String {
    hex::encode(number.to_be_bytes())
}

pub fn from_hex(bytes: &[u8]) -> KvResult<u32> {
    if bytes.len() != HEX_LEN {
        return Err(KvError::new(&format!(
            "invalid hex field length: {}",
            bytes.len()
        )));
    }

    let raw = <[u8; 4]>::from_hex(bytes).map_err(|e| {
        KvError::new(&format!(
            "invalid hex field {:?}: {}",
            String::from_utf8_lossy(bytes),
            e
        ))
    })?;
    Ok(u32::from_be_bytes(raw))
}
