//! Dex method-related structures.

use crate::classes::AccessFlags;
use crate::code::CodeItem;
use crate::errors::{DexError, DexResult};
use crate::strings::StringIdItem;
use crate::types::{ProtoIdItem, TypeIdItem};
use crate::{Dex, DexCollection, DexIndex, Index};

/// A method reference from the dex method identifiers pool.
#[derive(Debug)]
pub struct MethodIdItem {
    pub(crate) index: Index<MethodIdItem>,
    pub(crate) class_idx: Index<TypeIdItem>,
    pub(crate) proto_idx: Index<ProtoIdItem>,
    pub(crate) name_idx: Index<StringIdItem>,
}

impl DexIndex for Index<MethodIdItem> {
    type T = MethodIdItem;

    fn get(self, dex: &Dex) -> DexResult<&Self::T> {
        dex.method_id_items
            .get(self.as_usize())
            .ok_or_else(|| DexError::ResNotFound("MethodIdItem".to_string()))
    }
}

impl DexCollection for MethodIdItem {
    type Idx = Index<Self>;

    fn index(&self) -> Self::Idx {
        self.index
    }
}

impl MethodIdItem {
    pub fn class_descriptor<'a>(&self, dex: &'a Dex) -> DexResult<&'a str> {
        self.class_idx.get(dex)?.descriptor(dex)
    }

    pub fn name<'a>(&self, dex: &'a Dex) -> DexResult<&'a str> {
        Ok(self.name_idx.get(dex)?.value())
    }

    /// Builds the full method descriptor, e.g. `(I)V`.
    pub fn descriptor(&self, dex: &Dex) -> DexResult<String> {
        self.proto_idx.get(dex)?.descriptor(dex)
    }

    pub fn proto<'a>(&self, dex: &'a Dex) -> DexResult<&'a ProtoIdItem> {
        self.proto_idx.get(dex)
    }
}

/// A method declared by a class: access flags plus, for non-native
/// non-abstract methods, the decoded code item.
#[derive(Debug)]
pub struct EncodedMethod {
    pub(crate) method_idx: Index<MethodIdItem>,
    pub(crate) access_flags: AccessFlags,
    pub(crate) code: Option<CodeItem>,
}

impl EncodedMethod {
    #[inline]
    #[must_use]
    pub const fn access_flags(&self) -> AccessFlags {
        self.access_flags
    }

    #[inline]
    #[must_use]
    pub const fn code(&self) -> Option<&CodeItem> {
        self.code.as_ref()
    }

    pub fn id<'a>(&self, dex: &'a Dex) -> DexResult<&'a MethodIdItem> {
        self.method_idx.get(dex)
    }
}
