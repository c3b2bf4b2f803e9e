//! Dex field-related structures.

use crate::classes::AccessFlags;
use crate::errors::{DexError, DexResult};
use crate::strings::StringIdItem;
use crate::types::TypeIdItem;
use crate::{Dex, DexCollection, DexIndex, Index};

/// A field reference from the dex field identifiers pool.
#[derive(Debug)]
pub struct FieldIdItem {
    pub(crate) index: Index<FieldIdItem>,
    pub(crate) class_idx: Index<TypeIdItem>,
    pub(crate) type_idx: Index<TypeIdItem>,
    pub(crate) name_idx: Index<StringIdItem>,
}

impl DexIndex for Index<FieldIdItem> {
    type T = FieldIdItem;

    fn get(self, dex: &Dex) -> DexResult<&Self::T> {
        dex.field_id_items
            .get(self.as_usize())
            .ok_or_else(|| DexError::ResNotFound("FieldIdItem".to_string()))
    }
}

impl DexCollection for FieldIdItem {
    type Idx = Index<Self>;

    fn index(&self) -> Self::Idx {
        self.index
    }
}

impl FieldIdItem {
    pub fn class_descriptor<'a>(&self, dex: &'a Dex) -> DexResult<&'a str> {
        self.class_idx.get(dex)?.descriptor(dex)
    }

    pub fn type_descriptor<'a>(&self, dex: &'a Dex) -> DexResult<&'a str> {
        self.type_idx.get(dex)?.descriptor(dex)
    }

    pub fn name<'a>(&self, dex: &'a Dex) -> DexResult<&'a str> {
        Ok(self.name_idx.get(dex)?.value())
    }
}

/// A field declared by a class, together with its access flags.
#[derive(Debug)]
pub struct EncodedField {
    pub(crate) field_idx: Index<FieldIdItem>,
    pub(crate) access_flags: AccessFlags,
}

impl EncodedField {
    #[inline]
    #[must_use]
    pub const fn access_flags(&self) -> AccessFlags {
        self.access_flags
    }

    pub fn id<'a>(&self, dex: &'a Dex) -> DexResult<&'a FieldIdItem> {
        self.field_idx.get(dex)
    }
}
