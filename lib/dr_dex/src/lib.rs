//! Android Dex data structures definitions.
//!
//! This crate decodes the Dalvik executable container: header, shared
//! pools (strings, types, prototypes, fields, methods), class definitions
//! and per-method code items with their instruction streams. Every
//! cross-reference is kept as a typed [`Index`] that resolves against the
//! owning [`Dex`].

mod addr;
mod mutf8;
mod parsers;

pub mod classes;
pub mod code;
pub mod errors;
pub mod fields;
pub mod instrs;
pub mod methods;
pub mod registers;
pub mod strings;
pub mod types;

pub use crate::addr::Addr;
pub use crate::parsers::parse_dex as parse;

use crate::classes::ClassDefItem;
use crate::errors::DexResult;
use crate::fields::FieldIdItem;
use crate::methods::MethodIdItem;
use crate::strings::StringIdItem;
use crate::types::{ProtoIdItem, TypeIdItem};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::marker::PhantomData;
use std::path::Path;

#[derive(Debug)]
pub(crate) struct HeaderItem {
    pub(crate) version: u32,
    pub(crate) checksum: u32,
    pub(crate) signature: Vec<u8>,
    pub(crate) file_size: usize,
    pub(crate) string_ids_size: usize,
    pub(crate) string_ids_off: usize,
    pub(crate) type_ids_size: usize,
    pub(crate) type_ids_off: usize,
    pub(crate) proto_ids_size: usize,
    pub(crate) proto_ids_off: usize,
    pub(crate) field_ids_size: usize,
    pub(crate) field_ids_off: usize,
    pub(crate) method_ids_size: usize,
    pub(crate) method_ids_off: usize,
    pub(crate) class_defs_size: usize,
    pub(crate) class_defs_off: usize,
    pub(crate) data_size: usize,
    pub(crate) data_off: usize,
}

/// A typed index into one of the [`Dex`] pools.
#[derive(Debug)]
pub struct Index<T: ?Sized> {
    value: usize,
    marker: PhantomData<T>,
}

impl<T> Clone for Index<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Index<T> {}

impl<T> Index<T> {
    pub(crate) const fn new(idx: usize) -> Self {
        Self {
            value: idx,
            marker: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(&self) -> usize {
        self.value
    }
}

impl<T> fmt::Display for Index<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.value)
    }
}

impl<T> serde::Serialize for Index<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.value as u64)
    }
}

/// Resolution of a typed index against a [`Dex`].
pub trait DexIndex: Sized {
    type T;

    fn get(self, dex: &Dex) -> DexResult<&Self::T>;
}

/// Items that know their own pool index.
pub trait DexCollection {
    type Idx;

    fn index(&self) -> Self::Idx;
}

/// The top-level Dex data structure.
#[derive(Debug)]
pub struct Dex {
    pub(crate) header_item: HeaderItem,
    pub(crate) string_id_items: Vec<StringIdItem>,
    pub(crate) type_id_items: Vec<TypeIdItem>,
    pub(crate) proto_id_items: Vec<ProtoIdItem>,
    pub(crate) field_id_items: Vec<FieldIdItem>,
    pub(crate) method_id_items: Vec<MethodIdItem>,
    pub(crate) class_def_items: Vec<ClassDefItem>,
}

impl Dex {
    #[inline]
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.header_item.version
    }

    #[inline]
    #[must_use]
    pub const fn checksum(&self) -> u32 {
        self.header_item.checksum
    }

    #[inline]
    pub fn iter_string_ids(&self) -> impl Iterator<Item = &StringIdItem> {
        self.string_id_items.iter()
    }

    #[inline]
    pub fn iter_type_ids(&self) -> impl Iterator<Item = &TypeIdItem> {
        self.type_id_items.iter()
    }

    #[inline]
    pub fn iter_proto_ids(&self) -> impl Iterator<Item = &ProtoIdItem> {
        self.proto_id_items.iter()
    }

    #[inline]
    pub fn iter_field_ids(&self) -> impl Iterator<Item = &FieldIdItem> {
        self.field_id_items.iter()
    }

    #[inline]
    pub fn iter_method_ids(&self) -> impl Iterator<Item = &MethodIdItem> {
        self.method_id_items.iter()
    }

    #[inline]
    pub fn iter_class_defs(&self) -> impl Iterator<Item = &ClassDefItem> {
        self.class_def_items.iter()
    }

    #[inline]
    #[must_use]
    pub fn nb_classes(&self) -> usize {
        self.class_def_items.len()
    }
}

/// Open and parses the given dex file path.
pub fn open<P: AsRef<Path>>(path: P) -> DexResult<Dex> {
    let mut file = File::open(path)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    parse(&contents)
}
