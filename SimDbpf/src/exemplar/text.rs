//! Text exemplar encoding (`EQZT1###` / `CQZT1###`)
//!
//! ```text
//! ParentCohort=Key:{0x05342861,0x8A3F2E50,0x00000001}
//! PropCount=0x00000002
//! 0x00000010:{"Exemplar Type"}=Uint32:0:{0x00000002}
//! 0x00000020:{"Exemplar Name"}=String:1:{"Name"}
//! ```
//!
//! A repetition count of 0 marks a single value.

use crate::error::{Error, Result};
use crate::tgi::Tgi;

use super::{Property, Value, ValueType};

fn err(msg: impl Into<String>) -> Error {
    Error::TextExemplar(msg.into())
}

fn parse_hex(token: &str) -> Option<u32> {
    let token = token.trim();
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))?;
    u32::from_str_radix(digits, 16).ok()
}

/// Content between the first `{` and the last `}`.
fn braced(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start + 1..end])
}

pub(super) fn parse(body: &[u8]) -> Result<(Tgi, Vec<Property>)> {
    let text = String::from_utf8_lossy(body);
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    let parent_line = lines
        .find(|l| l.starts_with("ParentCohort"))
        .ok_or_else(|| err("missing ParentCohort"))?;
    let parent_values = braced(parent_line)
        .map(|inner| inner.split(',').filter_map(parse_hex).collect::<Vec<_>>())
        .unwrap_or_default();
    let parent = Tgi::from_slice(&parent_values).ok_or_else(|| err("malformed ParentCohort"))?;

    let count_line = lines.next().ok_or_else(|| err("missing PropCount"))?;
    let count = count_line
        .split_once('=')
        .and_then(|(_, v)| parse_hex(v))
        .ok_or_else(|| err(format!("malformed PropCount line: {count_line}")))?;

    let mut properties = Vec::with_capacity(count.min(1024) as usize);
    for line in lines.take(count as usize) {
        properties.push(parse_property(line)?);
    }
    if properties.len() < count as usize {
        tracing::warn!(
            "Corrupt text exemplar: property count {count} but only {} properties present",
            properties.len()
        );
    }

    Ok((parent, properties))
}

fn parse_property(line: &str) -> Result<Property> {
    let (key, rest) = line
        .split_once(':')
        .ok_or_else(|| err(format!("malformed property line: {line}")))?;
    let id = parse_hex(key).ok_or_else(|| err(format!("malformed property id: {key}")))?;

    // The name comment may contain ':' but never '=' before the type.
    let (_, value_part) = rest
        .split_once('=')
        .ok_or_else(|| err(format!("missing '=' in property {id:#010X}")))?;
    let mut parts = value_part.splitn(3, ':');
    let type_name = parts.next().unwrap_or_default().trim();
    let reps: usize = parts
        .next()
        .and_then(|r| r.trim().parse().ok())
        .ok_or_else(|| err(format!("malformed repetition count in {id:#010X}")))?;
    let values = parts.next().unwrap_or_default();

    let value_type = ValueType::from_name(type_name)
        .ok_or_else(|| err(format!("unknown value type {type_name}")))?;
    let multiple = reps > 0;

    let value = if value_type == ValueType::String {
        let inner = braced(values).unwrap_or_default();
        let inner = inner
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(inner);
        Value::String(inner.to_string())
    } else {
        let tokens: Vec<&str> = braced(values)
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        parse_numbers(value_type, &tokens)?
    };

    Ok(Property {
        id,
        value,
        multiple: multiple || value_type == ValueType::String,
    })
}

fn parse_numbers(value_type: ValueType, tokens: &[&str]) -> Result<Value> {
    let hex = |t: &&str| parse_hex(t).ok_or_else(|| err(format!("invalid hex value {t}")));
    Ok(match value_type {
        ValueType::Uint8 => Value::Uint8(
            tokens.iter().map(|t| hex(t).map(|v| v as u8)).collect::<Result<_>>()?,
        ),
        ValueType::Uint16 => Value::Uint16(
            tokens.iter().map(|t| hex(t).map(|v| v as u16)).collect::<Result<_>>()?,
        ),
        ValueType::Uint32 => Value::Uint32(tokens.iter().map(hex).collect::<Result<_>>()?),
        ValueType::Sint32 => Value::Sint32(
            tokens.iter().map(|t| hex(t).map(|v| v as i32)).collect::<Result<_>>()?,
        ),
        ValueType::Sint64 => Value::Sint64(
            tokens
                .iter()
                .map(|t| {
                    let digits = t.trim_start_matches("0x").trim_start_matches("0X");
                    u64::from_str_radix(digits, 16)
                        .map(|v| v as i64)
                        .map_err(|_| err(format!("invalid Sint64 value {t}")))
                })
                .collect::<Result<_>>()?,
        ),
        ValueType::Float32 => Value::Float32(
            tokens
                .iter()
                .map(|t| t.parse::<f32>().map_err(|_| err(format!("invalid float {t}"))))
                .collect::<Result<_>>()?,
        ),
        ValueType::Bool => Value::Bool(
            tokens.iter().map(|t| t.eq_ignore_ascii_case("true")).collect(),
        ),
        ValueType::String => Value::String(tokens.join(",")),
    })
}

#[cfg(test)]
mod tests {
    use super::super::Exemplar;
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "EQZT1###\r\n\
        ParentCohort=Key:{0x05342861,0x8A3F2E50,0x00000001}\r\n\
        PropCount=0x00000004\r\n\
        0x00000010:{\"Exemplar Type\"}=Uint32:0:{0x0000001E}\r\n\
        0x00000020:{\"Exemplar Name\"}=String:1:{\"Prop: Bench\"}\r\n\
        0x27812870:{\"BuildingpropFamily\"}=Uint32:2:{0x10001234,0x10001235}\r\n\
        0x4A0A1E87:{\"Night light\"}=Bool:0:{True}\r\n";

    #[test]
    fn test_parse_text_exemplar() {
        let exemplar = Exemplar::parse(SAMPLE.as_bytes()).unwrap();
        assert!(exemplar.is_text());
        assert_eq!(exemplar.parent(), Some(Tgi::new(0x05342861, 0x8A3F2E50, 1)));
        assert_eq!(exemplar.get_u32(0x10), Some(0x1E));
        assert_eq!(exemplar.get_str(0x20), Some("Prop: Bench"));
        assert_eq!(
            exemplar.get(0x27812870),
            Some(&Value::Uint32(vec![0x10001234, 0x10001235]))
        );
        assert_eq!(exemplar.get(0x4A0A1E87), Some(&Value::Bool(vec![true])));
    }

    #[test]
    fn test_missing_parent_line() {
        let bytes = b"EQZT1###\nPropCount=0x00000000\n";
        assert!(matches!(Exemplar::parse(bytes), Err(Error::TextExemplar(_))));
    }
}
