//! Exemplar and cohort records
//!
//! Exemplars are property bags keyed by 32-bit property ids. They come in a
//! binary (`EQZB1###`) and a text (`EQZT1###`) flavour; cohorts use a `C`
//! in place of the `E`. Each exemplar may name a parent cohort whose
//! properties it inherits.

mod binary;
mod lot_object;
pub mod props;
mod text;

pub use lot_object::{LotObject, LotObjectKind};

use crate::error::{Error, Result};
use crate::tgi::Tgi;

/// Signature length shared by both encodings.
pub const SIGNATURE_LEN: usize = 8;

/// Byte 3 of the signature is `T` for text exemplars.
#[must_use]
pub fn is_text(bytes: &[u8]) -> bool {
    bytes.get(3) == Some(&b'T')
}

/// Property value type codes as stored in binary exemplars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Uint8,
    Uint16,
    Uint32,
    Sint32,
    Sint64,
    Float32,
    Bool,
    String,
}

impl ValueType {
    pub fn from_code(code: u16) -> Result<Self> {
        Ok(match code {
            0x0100 => Self::Uint8,
            0x0200 => Self::Uint16,
            0x0300 => Self::Uint32,
            0x0700 => Self::Sint32,
            0x0800 => Self::Sint64,
            0x0900 => Self::Float32,
            0x0B00 => Self::Bool,
            0x0C00 => Self::String,
            other => return Err(Error::UnknownValueType(other)),
        })
    }

    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::Uint8 => 0x0100,
            Self::Uint16 => 0x0200,
            Self::Uint32 => 0x0300,
            Self::Sint32 => 0x0700,
            Self::Sint64 => 0x0800,
            Self::Float32 => 0x0900,
            Self::Bool => 0x0B00,
            Self::String => 0x0C00,
        }
    }

    /// Name used by the text encoding.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Uint8 => "Uint8",
            Self::Uint16 => "Uint16",
            Self::Uint32 => "Uint32",
            Self::Sint32 => "Sint32",
            Self::Sint64 => "Sint64",
            Self::Float32 => "Float32",
            Self::Bool => "Bool",
            Self::String => "String",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Uint8" => Self::Uint8,
            "Uint16" => Self::Uint16,
            "Uint32" => Self::Uint32,
            "Sint32" => Self::Sint32,
            "Sint64" => Self::Sint64,
            "Float32" => Self::Float32,
            "Bool" => Self::Bool,
            "String" => Self::String,
            _ => return None,
        })
    }
}

/// A property value. Numeric values are always stored as a list; a single
/// (non-array) value is a list of one.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Uint8(Vec<u8>),
    Uint16(Vec<u16>),
    Uint32(Vec<u32>),
    Sint32(Vec<i32>),
    Sint64(Vec<i64>),
    Float32(Vec<f32>),
    Bool(Vec<bool>),
    String(String),
}

impl Value {
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Uint8(_) => ValueType::Uint8,
            Value::Uint16(_) => ValueType::Uint16,
            Value::Uint32(_) => ValueType::Uint32,
            Value::Sint32(_) => ValueType::Sint32,
            Value::Sint64(_) => ValueType::Sint64,
            Value::Float32(_) => ValueType::Float32,
            Value::Bool(_) => ValueType::Bool,
            Value::String(_) => ValueType::String,
        }
    }

    /// Number of values, or the string length.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Value::Uint8(v) => v.len(),
            Value::Uint16(v) => v.len(),
            Value::Uint32(v) => v.len(),
            Value::Sint32(v) => v.len(),
            Value::Sint64(v) => v.len(),
            Value::Float32(v) => v.len(),
            Value::Bool(v) => v.len(),
            Value::String(s) => s.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Integer values as `u32`, wrapping signed values. `None` for strings
    /// and floats.
    #[must_use]
    pub fn to_u32s(&self) -> Option<Vec<u32>> {
        Some(match self {
            Value::Uint8(v) => v.iter().map(|x| u32::from(*x)).collect(),
            Value::Uint16(v) => v.iter().map(|x| u32::from(*x)).collect(),
            Value::Uint32(v) => v.clone(),
            Value::Sint32(v) => v.iter().map(|x| *x as u32).collect(),
            Value::Sint64(v) => v.iter().map(|x| *x as u32).collect(),
            Value::Bool(v) => v.iter().map(|x| u32::from(*x)).collect(),
            Value::Float32(_) | Value::String(_) => return None,
        })
    }

    /// First integer value.
    #[must_use]
    pub fn first_u32(&self) -> Option<u32> {
        self.to_u32s()?.first().copied()
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// One exemplar property.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub id: u32,
    pub value: Value,
    /// Stored with the array key type (`0x80`).
    pub multiple: bool,
}

/// A decoded exemplar or cohort.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Exemplar {
    cohort: bool,
    text: bool,
    parent: Tgi,
    properties: Vec<Property>,
}

impl Exemplar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new_cohort() -> Self {
        Self {
            cohort: true,
            ..Self::default()
        }
    }

    /// Decode either encoding, picked from the signature.
    ///
    /// # Errors
    /// Returns an error if the signature is unknown or the record is malformed.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let signature = bytes.get(..SIGNATURE_LEN).ok_or(Error::ExemplarTruncated)?;
        let cohort = match signature[0] {
            b'E' => false,
            b'C' => true,
            _ => return Err(invalid_signature(signature)),
        };
        if &signature[1..3] != b"QZ" || !matches!(signature[3], b'B' | b'T') {
            return Err(invalid_signature(signature));
        }

        let (parent, properties) = if is_text(bytes) {
            text::parse(&bytes[SIGNATURE_LEN..])?
        } else {
            binary::parse(&bytes[SIGNATURE_LEN..])?
        };

        Ok(Self {
            cohort,
            text: is_text(bytes),
            parent,
            properties,
        })
    }

    /// Encode in the binary format.
    ///
    /// # Errors
    /// Returns an error if writing to the buffer fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        binary::write(self.cohort, self.parent, &self.properties)
    }

    #[must_use]
    pub fn is_cohort(&self) -> bool {
        self.cohort
    }

    /// Whether the record was decoded from the text encoding.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.text
    }

    /// The parent cohort, or `None` when it is all zeroes.
    #[must_use]
    pub fn parent(&self) -> Option<Tgi> {
        (!self.parent.is_null()).then_some(self.parent)
    }

    pub fn set_parent(&mut self, parent: Tgi) {
        self.parent = parent;
    }

    #[must_use]
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    #[must_use]
    pub fn get(&self, id: u32) -> Option<&Value> {
        self.properties
            .iter()
            .find(|p| p.id == id)
            .map(|p| &p.value)
    }

    /// First integer value of a property.
    #[must_use]
    pub fn get_u32(&self, id: u32) -> Option<u32> {
        self.get(id)?.first_u32()
    }

    #[must_use]
    pub fn get_str(&self, id: u32) -> Option<&str> {
        self.get(id)?.as_str()
    }

    /// Set a property, replacing an existing one with the same id.
    pub fn set(&mut self, id: u32, value: Value) {
        let multiple = value.len() != 1 || matches!(value, Value::String(_));
        let property = Property {
            id,
            value,
            multiple,
        };
        match self.properties.iter_mut().find(|p| p.id == id) {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
    }

    /// Lot objects, read from consecutive ids starting at
    /// [`props::LOT_CONFIG_OBJECT`] until the first gap.
    #[must_use]
    pub fn lot_objects(&self) -> Vec<LotObject> {
        let mut out = Vec::new();
        let mut id = props::LOT_CONFIG_OBJECT;
        while let Some(value) = self.get(id) {
            if let Some(object) = value.to_u32s().and_then(|v| LotObject::from_values(&v)) {
                out.push(object);
            }
            id += 1;
        }
        out
    }
}

fn invalid_signature(signature: &[u8]) -> Error {
    Error::InvalidExemplarSignature(String::from_utf8_lossy(signature).into_owned())
}
