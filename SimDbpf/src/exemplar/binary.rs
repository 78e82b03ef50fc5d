//! Binary exemplar encoding (`EQZB1###` / `CQZB1###`)

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::tgi::Tgi;

use super::{Property, Value, ValueType};

const KEY_SINGLE: u16 = 0x00;
const KEY_ARRAY: u16 = 0x80;

/// Parse everything after the 8 byte signature.
pub(super) fn parse(body: &[u8]) -> Result<(Tgi, Vec<Property>)> {
    let mut cursor = Cursor::new(body);
    let parent = read_tgi(&mut cursor).map_err(|_| Error::ExemplarTruncated)?;
    let count = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::ExemplarTruncated)?;

    // Some exemplars declare more properties than they contain.
    let mut properties = Vec::with_capacity(count.min(1024) as usize);
    for i in 0..count {
        if remaining(&cursor) < 4 {
            tracing::warn!(
                "Corrupt exemplar: property count {count} but only {i} properties present"
            );
            break;
        }
        properties.push(read_property(&mut cursor)?);
    }

    Ok((parent, properties))
}

fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    cursor.get_ref().len().saturating_sub(cursor.position() as usize)
}

fn read_tgi<R: Read>(reader: &mut R) -> std::io::Result<Tgi> {
    let kind = reader.read_u32::<LittleEndian>()?;
    let group = reader.read_u32::<LittleEndian>()?;
    let instance = reader.read_u32::<LittleEndian>()?;
    Ok(Tgi::new(kind, group, instance))
}

fn read_property(cursor: &mut Cursor<&[u8]>) -> Result<Property> {
    let id = cursor.read_u32::<LittleEndian>()?;
    let value_type = ValueType::from_code(cursor.read_u16::<LittleEndian>()?)?;
    let key_type = cursor.read_u16::<LittleEndian>()?;
    let _unused = cursor.read_u8()?;

    let (reps, multiple) = match key_type {
        KEY_SINGLE => (1, false),
        KEY_ARRAY => (cursor.read_u32::<LittleEndian>()? as usize, true),
        other => return Err(Error::UnknownKeyType(other)),
    };

    // A bogus repetition count must not allocate more than the record holds.
    let cap = reps.min(remaining(cursor));
    let value = match value_type {
        ValueType::String => {
            let len = if multiple { reps } else { 0 };
            let mut buf = vec![0u8; len.min(remaining(cursor))];
            cursor.read_exact(&mut buf)?;
            if buf.len() < len {
                return Err(Error::ExemplarTruncated);
            }
            Value::String(String::from_utf8_lossy(&buf).into_owned())
        }
        ValueType::Uint8 => Value::Uint8(read_n(cursor, reps, cap, |c| c.read_u8())?),
        ValueType::Uint16 => {
            Value::Uint16(read_n(cursor, reps, cap, |c| c.read_u16::<LittleEndian>())?)
        }
        ValueType::Uint32 => {
            Value::Uint32(read_n(cursor, reps, cap, |c| c.read_u32::<LittleEndian>())?)
        }
        ValueType::Sint32 => {
            Value::Sint32(read_n(cursor, reps, cap, |c| c.read_i32::<LittleEndian>())?)
        }
        ValueType::Sint64 => {
            Value::Sint64(read_n(cursor, reps, cap, |c| c.read_i64::<LittleEndian>())?)
        }
        ValueType::Float32 => {
            Value::Float32(read_n(cursor, reps, cap, |c| c.read_f32::<LittleEndian>())?)
        }
        ValueType::Bool => Value::Bool(read_n(cursor, reps, cap, |c| c.read_u8().map(|b| b != 0))?),
    };

    Ok(Property {
        id,
        value,
        multiple,
    })
}

fn read_n<T>(
    cursor: &mut Cursor<&[u8]>,
    reps: usize,
    cap: usize,
    read: impl Fn(&mut Cursor<&[u8]>) -> std::io::Result<T>,
) -> Result<Vec<T>> {
    let mut out = Vec::with_capacity(cap);
    for _ in 0..reps {
        out.push(read(cursor)?);
    }
    Ok(out)
}

/// Encode an exemplar including its signature.
pub(super) fn write(cohort: bool, parent: Tgi, properties: &[Property]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.write_all(if cohort { b"CQZB1###" } else { b"EQZB1###" })?;
    out.write_u32::<LittleEndian>(parent.kind)?;
    out.write_u32::<LittleEndian>(parent.group)?;
    out.write_u32::<LittleEndian>(parent.instance)?;
    out.write_u32::<LittleEndian>(properties.len() as u32)?;

    for property in properties {
        let value = &property.value;
        let multiple = property.multiple || matches!(value, Value::String(_));
        out.write_u32::<LittleEndian>(property.id)?;
        out.write_u16::<LittleEndian>(value.value_type().code())?;
        out.write_u16::<LittleEndian>(if multiple { KEY_ARRAY } else { KEY_SINGLE })?;
        out.write_u8(0)?;
        if multiple {
            out.write_u32::<LittleEndian>(value.len() as u32)?;
        }
        write_values(&mut out, value)?;
    }

    Ok(out)
}

fn write_values<W: Write>(out: &mut W, value: &Value) -> Result<()> {
    match value {
        Value::Uint8(v) => v.iter().try_for_each(|x| out.write_u8(*x))?,
        Value::Uint16(v) => v.iter().try_for_each(|x| out.write_u16::<LittleEndian>(*x))?,
        Value::Uint32(v) => v.iter().try_for_each(|x| out.write_u32::<LittleEndian>(*x))?,
        Value::Sint32(v) => v.iter().try_for_each(|x| out.write_i32::<LittleEndian>(*x))?,
        Value::Sint64(v) => v.iter().try_for_each(|x| out.write_i64::<LittleEndian>(*x))?,
        Value::Float32(v) => v.iter().try_for_each(|x| out.write_f32::<LittleEndian>(*x))?,
        Value::Bool(v) => v.iter().try_for_each(|x| out.write_u8(u8::from(*x)))?,
        Value::String(s) => out.write_all(s.as_bytes())?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overstated_property_count_is_tolerated() {
        let mut bytes = write(false, Tgi::default(), &[Property {
            id: 0x10,
            value: Value::Uint32(vec![0x1E]),
            multiple: false,
        }])
        .unwrap();
        // Claim three properties while only one is present.
        bytes[20..24].copy_from_slice(&3u32.to_le_bytes());

        let (_, properties) = parse(&bytes[8..]).unwrap();
        assert_eq!(properties.len(), 1);
        assert_eq!(properties[0].value, Value::Uint32(vec![0x1E]));
    }

    #[test]
    fn test_array_layout() {
        let bytes = write(false, Tgi::default(), &[Property {
            id: 0xAABBCCDD,
            value: Value::Uint32(vec![1, 2, 3]),
            multiple: true,
        }])
        .unwrap();
        // signature + parent + count
        let prop = &bytes[24..];
        assert_eq!(&prop[0..4], &0xAABBCCDDu32.to_le_bytes());
        assert_eq!(&prop[4..6], &0x0300u16.to_le_bytes());
        assert_eq!(&prop[6..8], &0x0080u16.to_le_bytes());
        assert_eq!(prop[8], 0);
        assert_eq!(&prop[9..13], &3u32.to_le_bytes());
        assert_eq!(prop.len(), 13 + 12);
    }

    #[test]
    fn test_unknown_value_type() {
        let mut bytes = write(false, Tgi::default(), &[Property {
            id: 1,
            value: Value::Uint8(vec![1]),
            multiple: false,
        }])
        .unwrap();
        bytes[28..30].copy_from_slice(&0x0500u16.to_le_bytes());
        assert!(matches!(parse(&bytes[8..]), Err(Error::UnknownValueType(0x0500))));
    }
}
