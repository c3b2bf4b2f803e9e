//! Dalvik typing informations data structures.

use crate::errors::{DexError, DexResult};
use crate::strings::StringIdItem;
use crate::{Dex, DexCollection, DexIndex, Index};
use serde::Serialize;
use std::convert::TryFrom;
use std::fmt;

/// The Dalvik type descriptor to be used for referencing it from other
/// Dex data items.
#[derive(Debug)]
pub struct TypeIdItem {
    pub(crate) index: Index<TypeIdItem>,
    pub(crate) descriptor_idx: Index<StringIdItem>,
}

impl DexIndex for Index<TypeIdItem> {
    type T = TypeIdItem;

    fn get(self, dex: &Dex) -> DexResult<&Self::T> {
        dex.type_id_items
            .get(self.as_usize())
            .ok_or_else(|| DexError::ResNotFound("TypeIdItem".to_string()))
    }
}

impl DexCollection for TypeIdItem {
    type Idx = Index<Self>;

    fn index(&self) -> Self::Idx {
        self.index
    }
}

impl TypeIdItem {
    /// Returns the raw type descriptor string (e.g. `Lcom/foo/Bar;`).
    pub fn descriptor<'a>(&self, dex: &'a Dex) -> DexResult<&'a str> {
        Ok(self.descriptor_idx.get(dex)?.value())
    }

    /// Returns the concrete Dalvik [`Type`] designated by the descriptor.
    pub fn to_type(&self, dex: &Dex) -> DexResult<Type> {
        Type::try_from(self.descriptor(dex)?)
    }
}

/// The Dalvik prototype descriptor: parameter types and return type.
#[derive(Debug)]
pub struct ProtoIdItem {
    pub(crate) index: Index<ProtoIdItem>,
    pub(crate) shorty_idx: Index<StringIdItem>,
    pub(crate) return_type_idx: Index<TypeIdItem>,
    pub(crate) parameters: Vec<Index<TypeIdItem>>,
}

impl DexIndex for Index<ProtoIdItem> {
    type T = ProtoIdItem;

    fn get(self, dex: &Dex) -> DexResult<&Self::T> {
        dex.proto_id_items
            .get(self.as_usize())
            .ok_or_else(|| DexError::ResNotFound("ProtoIdItem".to_string()))
    }
}

impl DexCollection for ProtoIdItem {
    type Idx = Index<Self>;

    fn index(&self) -> Self::Idx {
        self.index
    }
}

impl ProtoIdItem {
    pub fn shorty<'a>(&self, dex: &'a Dex) -> DexResult<&'a str> {
        Ok(self.shorty_idx.get(dex)?.value())
    }

    pub fn return_type<'a>(&self, dex: &'a Dex) -> DexResult<&'a str> {
        self.return_type_idx.get(dex)?.descriptor(dex)
    }

    #[inline]
    pub fn iter_parameters(&self) -> impl Iterator<Item = Index<TypeIdItem>> + '_ {
        self.parameters.iter().copied()
    }

    /// Builds the method descriptor string, e.g. `(ILjava/lang/String;)V`.
    pub fn descriptor(&self, dex: &Dex) -> DexResult<String> {
        let mut out = String::from("(");
        for param in &self.parameters {
            out.push_str(param.get(dex)?.descriptor(dex)?);
        }
        out.push(')');
        out.push_str(self.return_type(dex)?);
        Ok(out)
    }
}

/// A decoded Dalvik type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Type {
    Void,
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    Array(Box<Type>),
    Class(String),
}

impl TryFrom<&str> for Type {
    type Error = DexError;

    fn try_from(descriptor: &str) -> Result<Self, Self::Error> {
        let mut chars = descriptor.chars();
        let t = match chars.next() {
            Some('V') => Self::Void,
            Some('Z') => Self::Boolean,
            Some('B') => Self::Byte,
            Some('S') => Self::Short,
            Some('C') => Self::Char,
            Some('I') => Self::Int,
            Some('J') => Self::Long,
            Some('F') => Self::Float,
            Some('D') => Self::Double,
            Some('[') => Self::Array(Box::new(Self::try_from(chars.as_str())?)),
            Some('L') => {
                let rest = chars.as_str();
                if let Some(name) = rest.strip_suffix(';') {
                    Self::Class(name.to_string())
                } else {
                    return Err(DexError::InvalidType(descriptor.to_string()));
                }
            }
            _ => return Err(DexError::InvalidType(descriptor.to_string())),
        };
        Ok(t)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Void => write!(f, "V"),
            Self::Boolean => write!(f, "Z"),
            Self::Byte => write!(f, "B"),
            Self::Short => write!(f, "S"),
            Self::Char => write!(f, "C"),
            Self::Int => write!(f, "I"),
            Self::Long => write!(f, "J"),
            Self::Float => write!(f, "F"),
            Self::Double => write!(f, "D"),
            Self::Array(inner) => write!(f, "[{inner}"),
            Self::Class(name) => write!(f, "L{name};"),
        }
    }
}

impl Type {
    /// Whether values of this type occupy a Dalvik register pair.
    #[inline]
    #[must_use]
    pub const fn is_wide(&self) -> bool {
        matches!(self, Self::Long | Self::Double)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_roundtrip() {
        for desc in ["V", "Z", "I", "J", "Lcom/foo/Bar;", "[I", "[[Ljava/lang/String;"] {
            let t = Type::try_from(desc).unwrap();
            assert_eq!(t.to_string(), desc);
        }
    }

    #[test]
    fn bad_descriptors() {
        assert!(Type::try_from("Lcom/foo/Bar").is_err());
        assert!(Type::try_from("Q").is_err());
        assert!(Type::try_from("").is_err());
    }
}
