//! Dex class definitions.

use crate::errors::{DexError, DexResult};
use crate::fields::EncodedField;
use crate::methods::EncodedMethod;
use crate::strings::StringIdItem;
use crate::types::TypeIdItem;
use crate::{Dex, DexCollection, DexIndex, Index};
use bitflags::bitflags;

bitflags! {
    /// Dalvik access flags, shared by classes, fields and methods.
    pub struct AccessFlags: u32 {
        const PUBLIC = 0x1;
        const PRIVATE = 0x2;
        const PROTECTED = 0x4;
        const STATIC = 0x8;
        const FINAL = 0x10;
        const SYNCHRONIZED = 0x20;
        const VOLATILE_OR_BRIDGE = 0x40;
        const TRANSIENT_OR_VARARGS = 0x80;
        const NATIVE = 0x100;
        const INTERFACE = 0x200;
        const ABSTRACT = 0x400;
        const STRICT = 0x800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const CONSTRUCTOR = 0x1_0000;
        const DECLARED_SYNCHRONIZED = 0x2_0000;
    }
}

/// A class definition, with its class-data (declared fields and methods)
/// folded in at parse time.
#[derive(Debug)]
pub struct ClassDefItem {
    pub(crate) index: Index<ClassDefItem>,
    pub(crate) class_idx: Index<TypeIdItem>,
    pub(crate) access_flags: AccessFlags,
    pub(crate) superclass_idx: Option<Index<TypeIdItem>>,
    pub(crate) interfaces: Vec<Index<TypeIdItem>>,
    pub(crate) source_file_idx: Option<Index<StringIdItem>>,
    pub(crate) static_fields: Vec<EncodedField>,
    pub(crate) instance_fields: Vec<EncodedField>,
    pub(crate) direct_methods: Vec<EncodedMethod>,
    pub(crate) virtual_methods: Vec<EncodedMethod>,
}

impl DexIndex for Index<ClassDefItem> {
    type T = ClassDefItem;

    fn get(self, dex: &Dex) -> DexResult<&Self::T> {
        dex.class_def_items
            .get(self.as_usize())
            .ok_or_else(|| DexError::ResNotFound("ClassDefItem".to_string()))
    }
}

impl DexCollection for ClassDefItem {
    type Idx = Index<Self>;

    fn index(&self) -> Self::Idx {
        self.index
    }
}

impl ClassDefItem {
    /// Returns the class type descriptor (e.g. `Lcom/foo/Bar;`).
    pub fn descriptor<'a>(&self, dex: &'a Dex) -> DexResult<&'a str> {
        self.class_idx.get(dex)?.descriptor(dex)
    }

    /// Returns the superclass type descriptor, if any (only
    /// `Ljava/lang/Object;` has none).
    pub fn superclass_descriptor<'a>(&self, dex: &'a Dex) -> DexResult<Option<&'a str>> {
        self.superclass_idx
            .map(|idx| idx.get(dex)?.descriptor(dex))
            .transpose()
    }

    #[inline]
    #[must_use]
    pub const fn access_flags(&self) -> AccessFlags {
        self.access_flags
    }

    pub fn source_file<'a>(&self, dex: &'a Dex) -> DexResult<Option<&'a str>> {
        self.source_file_idx
            .map(|idx| Ok(idx.get(dex)?.value()))
            .transpose()
    }

    #[inline]
    pub fn iter_interfaces(&self) -> impl Iterator<Item = Index<TypeIdItem>> + '_ {
        self.interfaces.iter().copied()
    }

    #[inline]
    pub fn iter_fields(&self) -> impl Iterator<Item = &EncodedField> {
        self.static_fields.iter().chain(self.instance_fields.iter())
    }

    #[inline]
    pub fn iter_methods(&self) -> impl Iterator<Item = &EncodedMethod> {
        self.direct_methods.iter().chain(self.virtual_methods.iter())
    }
}
