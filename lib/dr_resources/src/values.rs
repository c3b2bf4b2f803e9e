//! Typed resource values.

use crate::errors::{ResourcesError, ResourcesResult};
use crate::strings::{StringPool, StringPoolIndex};
use serde::Serialize;
use std::fmt;

/// A raw typed value as encoded in binary XML attributes and resource
/// table entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Null,
    Reference(u32),
    Attribute(u32),
    String(StringPoolIndex),
    Float(f32),
    Dimension(u32),
    Fraction(u32),
    IntDec(u32),
    IntHex(u32),
    IntBoolean(bool),
    IntColorArgb8(u32),
    IntColorRgb8(u32),
    IntColorArgb4(u32),
    IntColorRgb4(u32),
}

impl Value {
    /// Decodes a `(type, data)` pair from the wire.
    pub(crate) fn from_wire(vtyp: u8, data: u32) -> ResourcesResult<Self> {
        let value = match vtyp {
            0x00 => {
                if data != 0 {
                    log::warn!("null value carries data {data:#x}");
                }
                Self::Null
            }
            0x01 => Self::Reference(data),
            0x02 => Self::Attribute(data),
            0x03 => Self::String(StringPoolIndex::new(data as usize)),
            0x04 => Self::Float(f32::from_bits(data)),
            0x05 => Self::Dimension(data),
            0x06 => Self::Fraction(data),
            0x10 => Self::IntDec(data),
            0x11 => Self::IntHex(data),
            0x12 => Self::IntBoolean(data != 0),
            0x1c => Self::IntColorArgb8(data),
            0x1d => Self::IntColorRgb8(data),
            0x1e => Self::IntColorArgb4(data),
            0x1f => Self::IntColorRgb4(data),
            _ => {
                return Err(ResourcesError::ValueType(format!(
                    "unknown value type {vtyp:#04x}"
                )))
            }
        };
        Ok(value)
    }

    /// Resolves the value against a string pool. References are returned
    /// as [`ResolvedValue::Reference`]; following them requires the
    /// resources table (see `ResourceTable::resolve`).
    pub fn resolve(&self, string_pool: &StringPool) -> ResourcesResult<ResolvedValue> {
        let resolved = match self {
            Self::Null => ResolvedValue::Null,
            Self::Reference(r) => ResolvedValue::Reference(*r),
            Self::Attribute(a) => ResolvedValue::Attribute(*a),
            Self::String(idx) => ResolvedValue::String(string_pool.get(*idx)?.to_string()),
            Self::Float(f) => ResolvedValue::Float(*f),
            Self::Dimension(d) => ResolvedValue::Dimension(decode_complex(*d)),
            Self::Fraction(f) => ResolvedValue::Fraction(decode_complex(*f)),
            Self::IntDec(i) | Self::IntHex(i) => ResolvedValue::Int(*i),
            Self::IntBoolean(b) => ResolvedValue::Bool(*b),
            Self::IntColorArgb8(c) => ResolvedValue::Color(*c),
            Self::IntColorRgb8(c) => ResolvedValue::Color(0xff00_0000 | c),
            Self::IntColorArgb4(c) => {
                let a = expand_nibble(((c >> 12) & 0xf) as u8);
                let r = expand_nibble(((c >> 8) & 0xf) as u8);
                let g = expand_nibble(((c >> 4) & 0xf) as u8);
                let b = expand_nibble((c & 0xf) as u8);
                ResolvedValue::Color(
                    (u32::from(a) << 24) | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b),
                )
            }
            Self::IntColorRgb4(c) => {
                let r = expand_nibble(((c >> 8) & 0xf) as u8);
                let g = expand_nibble(((c >> 4) & 0xf) as u8);
                let b = expand_nibble((c & 0xf) as u8);
                ResolvedValue::Color(
                    0xff00_0000 | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b),
                )
            }
        };
        Ok(resolved)
    }
}

const fn expand_nibble(n: u8) -> u8 {
    n | (n << 4)
}

// Complex (dimension/fraction) values store a sign-extended 24-bit
// mantissa with a 2-bit radix selector; the unit nibble is dropped here.
fn decode_complex(data: u32) -> f32 {
    const RADIX_MULTS: [f32; 4] = [1.0, 1.0 / 128.0, 1.0 / 32768.0, 1.0 / 8_388_608.0];
    let mantissa = ((data & 0xffff_ff00) as i32) >> 8;
    mantissa as f32 * RADIX_MULTS[((data >> 4) & 0x3) as usize]
}

/// A fully decoded resource value, ready for the shim layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolvedValue {
    Null,
    Reference(u32),
    Attribute(u32),
    String(String),
    Float(f32),
    Dimension(f32),
    Fraction(f32),
    Int(u32),
    Bool(bool),
    /// Color in ARGB8888 form.
    Color(u32),
    /// A complex entry (style or array): attribute-id/value pairs in
    /// declaration order.
    Bag(Vec<(u32, ResolvedValue)>),
}

impl ResolvedValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<u32> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Null => write!(f, "@null"),
            Self::Reference(r) => write!(f, "@{r:#010x}"),
            Self::Attribute(a) => write!(f, "?{a:#010x}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Dimension(v) => write!(f, "{v}px"),
            Self::Fraction(v) => write!(f, "{v}%"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Color(c) => write!(f, "#{c:08x}"),
            Self::Bag(items) => {
                write!(f, "{{")?;
                for (i, (id, value)) in items.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{id:#010x}={value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
