//! QFS (`RefPack`) decompression, plus a literal-only encoder

use crate::error::{Error, Result};

/// Largest size that fits the 24-bit header field.
const MAX_SIZE: usize = 0xFF_FFFF;

/// Longest literal run a single `0xE0..=0xFB` control code can carry.
const MAX_LITERAL_RUN: usize = 112;

fn byte(input: &[u8], pos: usize) -> Result<usize> {
    input
        .get(pos)
        .map(|b| *b as usize)
        .ok_or(Error::QfsTruncated(pos))
}

fn copy_literal(out: &mut Vec<u8>, input: &[u8], pos: usize, len: usize) -> Result<()> {
    let bytes = input
        .get(pos..pos + len)
        .ok_or(Error::QfsTruncated(pos))?;
    out.extend_from_slice(bytes);
    Ok(())
}

/// Decompress a QFS stream starting at its `0x10FB` magic.
///
/// # Errors
/// Returns an error if the stream is truncated, references data before the
/// start of the output, or does not produce the declared size.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    if input.len() < 5 {
        return Err(Error::QfsTruncated(input.len()));
    }
    if input[0] & 0xFE != 0x10 || input[1] != 0xFB {
        return Err(Error::InvalidQfsMagic(u16::from_be_bytes([input[0], input[1]])));
    }
    let size = (input[2] as usize) << 16 | (input[3] as usize) << 8 | input[4] as usize;
    let mut out = Vec::with_capacity(size);

    // Bit 0 of the flags byte means a compressed size follows the header.
    let mut pos = if input[0] & 0x01 != 0 { 8 } else { 5 };

    while pos < input.len() && input[pos] < 0xFC {
        let code = input[pos] as usize;
        let (header, literal, copy_len, offset) = if code & 0x80 == 0 {
            let a = byte(input, pos + 1)?;
            (2, code & 0x03, ((code & 0x1C) >> 2) + 3, ((code >> 5) << 8) + a + 1)
        } else if code & 0x40 == 0 {
            let a = byte(input, pos + 1)?;
            let b = byte(input, pos + 2)?;
            (3, (a >> 6) & 0x03, (code & 0x3F) + 4, (a & 0x3F) * 256 + b + 1)
        } else if code & 0x20 == 0 {
            let a = byte(input, pos + 1)?;
            let b = byte(input, pos + 2)?;
            let c = byte(input, pos + 3)?;
            (
                4,
                code & 0x03,
                ((code >> 2) & 0x03) * 256 + c + 5,
                ((code & 0x10) << 12) + 256 * a + b + 1,
            )
        } else {
            (1, (code & 0x1F) * 4 + 4, 0, 0)
        };

        pos += header;
        copy_literal(&mut out, input, pos, literal)?;
        pos += literal;

        if copy_len > 0 {
            if offset > out.len() {
                return Err(Error::QfsBadReference(out.len()));
            }
            // Byte by byte: the source range may overlap the bytes being written.
            let start = out.len() - offset;
            for i in 0..copy_len {
                let b = out[start + i];
                out.push(b);
            }
        }
    }

    // 0xFC..=0xFF carries up to three trailing literal bytes.
    if pos < input.len() && out.len() < size {
        let len = input[pos] as usize & 0x03;
        copy_literal(&mut out, input, pos + 1, len)?;
    }

    if out.len() != size {
        return Err(Error::QfsSizeMismatch {
            expected: size,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// Encode `data` as a valid QFS stream made only of literal runs.
///
/// The output is larger than the input. It exists so archives with
/// compressed records can be produced without a full match finder.
///
/// # Errors
/// Returns an error if `data` is larger than the 24-bit size field allows.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() > MAX_SIZE {
        return Err(Error::QfsTooLarge(data.len()));
    }
    let size = data.len();
    let mut out = Vec::with_capacity(size + size / MAX_LITERAL_RUN + 8);
    out.extend_from_slice(&[0x10, 0xFB, (size >> 16) as u8, (size >> 8) as u8, size as u8]);

    let mut rest = data;
    while rest.len() >= 4 {
        let run = (rest.len() & !0x03).min(MAX_LITERAL_RUN);
        out.push(0xE0 | ((run - 4) / 4) as u8);
        out.extend_from_slice(&rest[..run]);
        rest = &rest[run..];
    }
    out.push(0xFC | rest.len() as u8);
    out.extend_from_slice(rest);
    Ok(out)
}
