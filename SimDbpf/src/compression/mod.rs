//! Compression utilities

use crate::error::Result;

pub mod qfs;

/// Whether a raw DBPF record payload is QFS compressed.
///
/// Compressed records start with a 4 byte size followed by the `0x10FB` magic.
#[must_use]
pub fn is_compressed(raw: &[u8]) -> bool {
    raw.len() >= 9 && raw[4] & 0xFE == 0x10 && raw[5] == 0xFB
}

/// Decompress a raw record payload, including its 4 byte size prefix.
///
/// # Errors
/// Returns an error if the QFS stream is malformed.
pub fn decompress(raw: &[u8]) -> Result<Vec<u8>> {
    qfs::decompress(raw.get(4..).unwrap_or_default())
}

/// Compress a payload into a raw record, prefixed with its compressed size.
///
/// # Errors
/// Returns an error if the payload does not fit the QFS size field.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let stream = qfs::compress(data)?;
    let total = (stream.len() + 4) as u32;
    let mut out = Vec::with_capacity(stream.len() + 4);
    out.extend_from_slice(&total.to_le_bytes());
    out.extend_from_slice(&stream);
    Ok(out)
}
