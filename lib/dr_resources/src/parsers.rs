//! Binary parsers for the XML and resources-table chunk streams.
//!
//! Both formats are length-prefixed chunk sequences. The chunk walkers
//! advance strictly by each chunk's declared `chunk_size` and key every
//! read off the declared `header_size`/`config_size`, so fields added by
//! later schema revisions are skipped (or defaulted) instead of breaking
//! the decode.

use crate::chunk::{ChunkHeader, ChunkType};
use crate::config::Config;
use crate::errors::{ResourcesError, ResourcesResult};
use crate::strings::{StringPool, StringPoolIndex};
use crate::tables::{EntryContent, ResourceTable, TableEntry, TablePackage, TypeChunk, TypeSpec};
use crate::values::Value;
use crate::xml::{Document, XmlAttribute, XmlEvent};
use nom::bytes::complete::take;
use nom::combinator::{complete, map};
use nom::error::{ErrorKind, ParseError};
use nom::multi::count;
use nom::number::complete::{le_u16, le_u32, le_u8};
use nom::Err::Error;
use nom::{Finish, IResult, Offset};
use std::collections::BTreeMap;

const NO_ENTRY: u32 = 0xffff_ffff;
const ENTRY_FLAG_COMPLEX: u16 = 0x0001;
const TYPE_FLAG_SPARSE: u8 = 0x01;

/// Parses a binary XML document (manifest or compiled layout).
pub fn parse_xml(input: &[u8]) -> ResourcesResult<Document> {
    let (_, document) = complete(xml_parser)(input).finish()?;
    Ok(document)
}

/// Parses a `resources.arsc` table.
pub fn parse_table(input: &[u8]) -> ResourcesResult<ResourceTable> {
    let (_, table) = complete(resources_parser)(input).finish()?;
    Ok(table)
}

// -- chunk plumbing ------------------------------------------------------

fn chunk_header_parser(input: &[u8]) -> IResult<&[u8], ChunkHeader, ResourcesError> {
    log::debug!(">> chunk_header_parser");
    let (input, typ_tag) = le_u16(input)?;
    let typ = ChunkType::from(typ_tag);
    let (input, header_size) = le_u16(input)?;
    let (input, chunk_size) = le_u32(input)?;
    log::debug!("chunk::type_tag = {typ_tag:#06x} = {typ}");
    log::debug!("chunk::header_size = {header_size}");
    log::debug!("chunk::chunk_size = {chunk_size}");
    if header_size < 8 || (chunk_size as usize) < header_size as usize {
        log::error!("chunk declares inconsistent sizes {header_size}/{chunk_size}");
        return Err(Error(ResourcesError::from_error_kind(
            input,
            ErrorKind::Verify,
        )));
    }
    log::debug!("<< chunk_header_parser");

    Ok((
        input,
        ChunkHeader {
            typ,
            header_size: header_size as usize,
            chunk_size: chunk_size as usize,
        },
    ))
}

// Re-slices the whole buffer from an absolute offset (string pools and
// table entries are reached through declared offsets, not sequentially).
fn slice_from(input: &[u8], offset: usize) -> Result<&[u8], nom::Err<ResourcesError>> {
    input
        .get(offset..)
        .ok_or_else(|| Error(ResourcesError::from_error_kind(input, ErrorKind::Eof)))
}

fn opt_value<T>(default: T) -> impl FnMut(T) -> Option<T>
where
    T: 'static + Eq,
{
    move |value: T| -> Option<T> {
        if value != default {
            return Some(value);
        }
        None
    }
}

// -- xml -----------------------------------------------------------------

fn xml_parser(input: &[u8]) -> IResult<&[u8], Document, ResourcesError> {
    let input_size = input.len();

    log::debug!(">> xml_parser");

    let (input, chunk_header) = chunk_header_parser(input)?;
    if chunk_header.typ != ChunkType::Xml || chunk_header.chunk_size != input_size {
        log::error!(
            "unexpected chunk header {} {} {}",
            chunk_header.typ,
            chunk_header.header_size,
            chunk_header.chunk_size
        );
        return Err(Error(ResourcesError::from_error_kind(
            input,
            ErrorKind::Verify,
        )));
    }
    let (input, _) = take(chunk_header.header_size - 8)(input)?;

    let mut string_pool = None;
    let mut resource_ids = Vec::new();
    let mut events = Vec::new();

    let mut input_mut = input;
    while !input_mut.is_empty() {
        let (_, next_chunk_header) = chunk_header_parser(input_mut)?;
        match next_chunk_header.typ {
            ChunkType::StringPool => {
                let (_, pool) = string_pool_parser(input_mut)?;
                string_pool = Some(pool);
            }
            ChunkType::XmlResourceMap => {
                let (_, ids) = xml_resource_map_parser(input_mut)?;
                resource_ids = ids;
            }
            ChunkType::XmlStartNamespace => {
                let (_, event) = xml_namespace_parser(input_mut, |prefix, uri| {
                    XmlEvent::StartNamespace { prefix, uri }
                })?;
                events.push(event);
            }
            ChunkType::XmlEndNamespace => {
                let (_, event) = xml_namespace_parser(input_mut, |prefix, uri| {
                    XmlEvent::EndNamespace { prefix, uri }
                })?;
                events.push(event);
            }
            ChunkType::XmlStartElement => {
                let (_, event) = xml_start_element_parser(input_mut)?;
                events.push(event);
            }
            ChunkType::XmlEndElement => {
                let (_, event) = xml_end_element_parser(input_mut)?;
                events.push(event);
            }
            ChunkType::XmlCdata => {
                let (_, event) = xml_cdata_parser(input_mut)?;
                events.push(event);
            }
            other => {
                log::warn!("skipping unexpected chunk {other} in xml stream");
            }
        }
        // Every chunk advances by its declared size, whatever the
        // parser consumed.
        let (input, _) = take(next_chunk_header.chunk_size)(input_mut)?;
        input_mut = input;
    }

    log::debug!("<< xml_parser");

    match string_pool {
        Some(string_pool) => Ok((
            input_mut,
            Document {
                string_pool,
                resource_ids,
                events,
            },
        )),
        None => {
            log::error!("xml stream has no string pool");
            Err(Error(ResourcesError::Structure(
                "xml stream has no string pool".to_string(),
            )))
        }
    }
}

fn xml_resource_map_parser(input: &[u8]) -> IResult<&[u8], Vec<u32>, ResourcesError> {
    log::debug!(">> xml_resource_map_parser");

    let (input, chunk_header) = chunk_header_parser(input)?;
    let (input, _) = take(chunk_header.header_size - 8)(input)?;
    let (input, resource_ids) = count(
        le_u32,
        (chunk_header.chunk_size - chunk_header.header_size) / 4,
    )(input)?;

    log::debug!("<< xml_resource_map_parser");

    Ok((input, resource_ids))
}

fn xml_metadata_parser(input: &[u8]) -> IResult<&[u8], (u32, u32), ResourcesError> {
    let (input, line_number) = le_u32(input)?;
    let (input, comment) = le_u32(input)?;

    Ok((input, (line_number, comment)))
}

fn xml_namespace_parser<C>(input: &[u8], constructor: C) -> IResult<&[u8], XmlEvent, ResourcesError>
where
    C: FnOnce(StringPoolIndex, StringPoolIndex) -> XmlEvent,
{
    log::debug!(">> xml_namespace_parser");

    let (input, chunk_header) = chunk_header_parser(input)?;
    let (input, _metadata) = xml_metadata_parser(input)?;
    let (input, _) = take(chunk_header.header_size.saturating_sub(16))(input)?;
    let (input, prefix) = le_u32(input)?;
    let (input, uri) = le_u32(input)?;

    log::debug!("<< xml_namespace_parser");

    Ok((
        input,
        constructor(
            StringPoolIndex::new(prefix as usize),
            StringPoolIndex::new(uri as usize),
        ),
    ))
}

fn xml_start_element_parser(input: &[u8]) -> IResult<&[u8], XmlEvent, ResourcesError> {
    log::debug!(">> xml_start_element_parser");

    let (input, chunk_header) = chunk_header_parser(input)?;
    let (input, _metadata) = xml_metadata_parser(input)?;
    let (input, _) = take(chunk_header.header_size.saturating_sub(16))(input)?;

    // Attribute records are reached through offsets relative to this
    // point (the attribute-extension struct).
    let body = input;
    let (input, ns) = le_u32(input)?;
    let (input, name) = le_u32(input)?;
    let (input, attr_start) = le_u16(input)?;
    let (input, attr_size) = le_u16(input)?;
    let (input, attr_count) = le_u16(input)?;
    let (input, _id_index) = le_u16(input)?;
    let (input, _class_index) = le_u16(input)?;
    let (input, _style_index) = le_u16(input)?;

    log::debug!("element::attr_count = {attr_count}");

    if attr_size < 20 {
        log::error!("attribute record size {attr_size} below minimum");
        return Err(Error(ResourcesError::from_error_kind(
            input,
            ErrorKind::Verify,
        )));
    }

    let mut attributes = Vec::with_capacity(attr_count as usize);
    for i in 0..attr_count as usize {
        let record = slice_from(body, attr_start as usize + i * attr_size as usize)?;
        let (_, attribute) = xml_attribute_parser(record)?;
        attributes.push(attribute);
    }

    log::debug!("<< xml_start_element_parser");

    Ok((
        input,
        XmlEvent::StartElement {
            ns: optional_index(ns),
            name: StringPoolIndex::new(name as usize),
            attributes,
        },
    ))
}

fn xml_attribute_parser(input: &[u8]) -> IResult<&[u8], XmlAttribute, ResourcesError> {
    let (input, ns) = le_u32(input)?;
    let (input, name) = le_u32(input)?;
    let (input, raw_value) = le_u32(input)?;
    let (input, typed_value) = value_parser(input)?;

    Ok((
        input,
        XmlAttribute {
            ns: optional_index(ns),
            name: StringPoolIndex::new(name as usize),
            raw_value: optional_index(raw_value),
            typed_value,
        },
    ))
}

fn xml_end_element_parser(input: &[u8]) -> IResult<&[u8], XmlEvent, ResourcesError> {
    log::debug!(">> xml_end_element_parser");

    let (input, chunk_header) = chunk_header_parser(input)?;
    let (input, _metadata) = xml_metadata_parser(input)?;
    let (input, _) = take(chunk_header.header_size.saturating_sub(16))(input)?;
    let (input, ns) = le_u32(input)?;
    let (input, name) = le_u32(input)?;

    log::debug!("<< xml_end_element_parser");

    Ok((
        input,
        XmlEvent::EndElement {
            ns: optional_index(ns),
            name: StringPoolIndex::new(name as usize),
        },
    ))
}

fn xml_cdata_parser(input: &[u8]) -> IResult<&[u8], XmlEvent, ResourcesError> {
    log::debug!(">> xml_cdata_parser");

    let (input, chunk_header) = chunk_header_parser(input)?;
    let (input, _metadata) = xml_metadata_parser(input)?;
    let (input, _) = take(chunk_header.header_size.saturating_sub(16))(input)?;
    let (input, data) = le_u32(input)?;
    log::debug!("xml_cdata::data = {data:#x}");
    let (input, _value) = value_parser(input)?;

    log::debug!("<< xml_cdata_parser");

    Ok((
        input,
        XmlEvent::Cdata {
            data: StringPoolIndex::new(data as usize),
        },
    ))
}

fn optional_index(raw: u32) -> Option<StringPoolIndex> {
    (raw != NO_ENTRY).then(|| StringPoolIndex::new(raw as usize))
}

// -- string pool ---------------------------------------------------------

const POOL_FLAG_SORTED: u32 = 1;
const POOL_FLAG_UTF8: u32 = 1 << 8;

fn string_pool_parser(input: &[u8]) -> IResult<&[u8], StringPool, ResourcesError> {
    let input0 = input;

    log::debug!(">> string_pool_parser");

    let (input, chunk_header) = chunk_header_parser(input)?;
    if chunk_header.typ != ChunkType::StringPool || chunk_header.header_size != 0x1c {
        log::error!("invalid string pool chunk header");
        return Err(Error(ResourcesError::from_error_kind(
            input,
            ErrorKind::Verify,
        )));
    }

    let (input, string_count) = le_u32(input)?;
    let (input, style_count) = le_u32(input)?;
    let (input, flags) = le_u32(input)?;

    log::debug!("string_pool::string_count = {string_count}");
    log::debug!("string_pool::style_count = {style_count}");
    log::debug!("string_pool::flags = {flags:#x}");

    let sorted = (flags & POOL_FLAG_SORTED) != 0;
    let utf8 = (flags & POOL_FLAG_UTF8) != 0;

    let (input, strings_start) = le_u32(input)?;
    let (input, _styles_start) = le_u32(input)?;

    log::debug!("string_pool::strings_start = {strings_start:#x}");

    let (_, string_offsets) = count(le_u32, string_count as usize)(input)?;

    let mut strings = Vec::with_capacity(string_count as usize);
    for offset in string_offsets {
        let data = slice_from(input0, strings_start as usize + offset as usize)?;
        let (_, string) = if utf8 {
            utf8_string_parser(data)?
        } else {
            utf16_string_parser(data)?
        };
        strings.push(string);
    }

    // Styles are not interpreted; the declared chunk size skips them.
    let (input, _) = take(chunk_header.chunk_size)(input0)?;

    log::debug!("<< string_pool_parser");

    Ok((
        input,
        StringPool {
            sorted,
            utf8,
            strings,
        },
    ))
}

// UTF-8 pool entries: 1-2 byte UTF-16 length, 1-2 byte byte length, data.
fn utf8_string_parser(input: &[u8]) -> IResult<&[u8], String, ResourcesError> {
    let (input, _utf16_len) = utf8_length_parser(input)?;
    let (input, byte_len) = utf8_length_parser(input)?;
    let (input, raw) = take(byte_len)(input)?;
    match std::str::from_utf8(raw) {
        Ok(s) => Ok((input, s.to_string())),
        Err(_) => Err(Error(ResourcesError::InvalidUtf8(
            "string pool entry".to_string(),
        ))),
    }
}

fn utf8_length_parser(input: &[u8]) -> IResult<&[u8], usize, ResourcesError> {
    let (input, first) = le_u8(input)?;
    if first & 0x80 == 0 {
        Ok((input, first as usize))
    } else {
        let (input, second) = le_u8(input)?;
        Ok((input, ((first as usize & 0x7f) << 8) | second as usize))
    }
}

// UTF-16 pool entries: 1-2 unit length, then UTF-16LE code units.
fn utf16_string_parser(input: &[u8]) -> IResult<&[u8], String, ResourcesError> {
    let (input, first) = le_u16(input)?;
    let (input, len) = if first & 0x8000 == 0 {
        (input, first as usize)
    } else {
        let (input, second) = le_u16(input)?;
        (input, ((first as usize & 0x7fff) << 16) | second as usize)
    };

    let (input, units) = count(le_u16, len)(input)?;
    match String::from_utf16(&units) {
        Ok(s) => Ok((input, s)),
        Err(_) => Err(Error(ResourcesError::InvalidUtf16(
            "string pool entry".to_string(),
        ))),
    }
}

// -- typed values --------------------------------------------------------

fn value_parser(input: &[u8]) -> IResult<&[u8], Value, ResourcesError> {
    let (input, size) = le_u16(input)?;
    let (input, _res0) = le_u8(input)?;
    let (input, vtyp) = le_u8(input)?;
    let (input, data) = le_u32(input)?;

    log::debug!("value::vtyp = {vtyp:#x}");
    log::debug!("value::data = {data:#x}");

    if size < 8 {
        log::error!("value declares size {size}");
        return Err(Error(ResourcesError::from_error_kind(
            input,
            ErrorKind::Verify,
        )));
    }
    // Fields a later revision may append to the value are skipped.
    let (input, _) = take(size as usize - 8)(input)?;

    let value = Value::from_wire(vtyp, data).map_err(Error)?;
    Ok((input, value))
}

// -- resources table -----------------------------------------------------

fn resources_parser(input: &[u8]) -> IResult<&[u8], ResourceTable, ResourcesError> {
    let input_size = input.len();

    log::debug!(">> resources_parser");

    let (input, chunk_header) = chunk_header_parser(input)?;
    if chunk_header.typ != ChunkType::Table || chunk_header.chunk_size != input_size {
        log::error!(
            "unexpected chunk header {} {} {}",
            chunk_header.typ,
            chunk_header.header_size,
            chunk_header.chunk_size
        );
        return Err(Error(ResourcesError::from_error_kind(
            input,
            ErrorKind::Verify,
        )));
    }

    let (input, package_count) = le_u32(input)?;
    let (input, _) = take(chunk_header.header_size.saturating_sub(12))(input)?;
    log::debug!("table::package_count = {package_count}");

    let (input, global_strings) = string_pool_parser(input)?;

    let mut packages = Vec::with_capacity(package_count as usize);
    let mut input_mut = input;
    while !input_mut.is_empty() {
        let (_, next_chunk_header) = chunk_header_parser(input_mut)?;
        match next_chunk_header.typ {
            ChunkType::TablePackage => {
                let (_, package) = table_package_parser(input_mut)?;
                packages.push(package);
            }
            other => {
                log::warn!("skipping unexpected chunk {other} in resource table");
            }
        }
        let (input, _) = take(next_chunk_header.chunk_size)(input_mut)?;
        input_mut = input;
    }

    if packages.len() != package_count as usize {
        log::warn!(
            "table declared {package_count} packages but {} were decoded",
            packages.len()
        );
    }

    log::debug!("<< resources_parser");

    Ok((
        input_mut,
        ResourceTable {
            global_strings,
            packages,
        },
    ))
}

fn table_package_parser(input: &[u8]) -> IResult<&[u8], TablePackage, ResourcesError> {
    let input0 = input;

    log::debug!(">> table_package_parser");

    let (input, chunk_header) = chunk_header_parser(input)?;
    if chunk_header.typ != ChunkType::TablePackage {
        log::error!("unexpected chunk header {}", chunk_header.typ);
        return Err(Error(ResourcesError::from_error_kind(
            input,
            ErrorKind::Verify,
        )));
    }

    let (input, id) = le_u32(input)?;
    let id = u8::try_from(id).map_err(|_| {
        Error(ResourcesError::UnexpectedValue {
            name: "package id".to_string(),
            typ: "not an u8".to_string(),
        })
    })?;
    let (input, name_raw) = count(le_u16, 128)(input)?;
    let first_zero = name_raw.partition_point(|c| *c != 0);
    let name = String::from_utf16(&name_raw[0..first_zero])
        .map_err(|_| Error(ResourcesError::InvalidUtf16("package name".to_string())))?;
    let (input, type_strings_offset) = le_u32(input)?;
    let (input, _last_public_type) = le_u32(input)?;
    let (input, key_strings_offset) = le_u32(input)?;
    let (_, _last_public_key) = le_u32(input)?;

    log::debug!("package::id = {id:#x}");
    log::debug!("package::name = {name:?}");
    log::debug!("package::type_strings_offset = {type_strings_offset:#x}");
    log::debug!("package::key_strings_offset = {key_strings_offset:#x}");

    let chunk = input0.get(..chunk_header.chunk_size).ok_or_else(|| {
        Error(ResourcesError::from_error_kind(input0, ErrorKind::Eof))
    })?;

    // The two pools are reached through the offsets the package header
    // declares, not by stream position.
    let type_strings = if type_strings_offset == 0 {
        StringPool::new()
    } else {
        let (_, pool) = string_pool_parser(slice_from(chunk, type_strings_offset as usize)?)?;
        pool
    };
    let key_strings = if key_strings_offset == 0 {
        StringPool::new()
    } else {
        let (_, pool) = string_pool_parser(slice_from(chunk, key_strings_offset as usize)?)?;
        pool
    };

    let mut type_specs = Vec::new();
    let mut types = Vec::new();

    let mut offset = chunk_header.header_size;
    while offset < chunk.len() {
        let inner = slice_from(chunk, offset)?;
        let (_, inner_header) = chunk_header_parser(inner)?;
        match inner_header.typ {
            // Already decoded through the declared offsets.
            ChunkType::StringPool => {}
            ChunkType::TableTypeSpec => {
                let (_, spec) = table_type_spec_parser(inner)?;
                type_specs.push(spec);
            }
            ChunkType::TableType => {
                let (_, chunk) = table_type_parser(inner)?;
                if let Some(chunk) = chunk {
                    types.push(chunk);
                }
            }
            other => {
                log::debug!("skipping chunk {other} in package");
            }
        }
        offset += inner_header.chunk_size;
    }

    let (input, _) = take(chunk_header.chunk_size)(input0)?;

    log::debug!("<< table_package_parser");

    Ok((
        input,
        TablePackage {
            id,
            name,
            type_strings,
            key_strings,
            type_specs,
            types,
        },
    ))
}

fn table_type_spec_parser(input: &[u8]) -> IResult<&[u8], TypeSpec, ResourcesError> {
    log::debug!(">> table_type_spec_parser");

    let (input, chunk_header) = chunk_header_parser(input)?;
    let (input, id) = le_u8(input)?;
    let (input, _res0) = le_u8(input)?;
    let (input, _res1) = le_u16(input)?;
    let (input, entry_count) = le_u32(input)?;
    let (input, _) = take(chunk_header.header_size.saturating_sub(16))(input)?;

    log::debug!("type_spec::id = {id:#x}");
    log::debug!("type_spec::entry_count = {entry_count}");

    let (input, entry_flags) = count(le_u32, entry_count as usize)(input)?;

    log::debug!("<< table_type_spec_parser");

    Ok((input, TypeSpec { id, entry_flags }))
}

fn table_type_parser(input: &[u8]) -> IResult<&[u8], Option<TypeChunk>, ResourcesError> {
    let input0 = input;

    log::debug!(">> table_type_parser");

    let (input, chunk_header) = chunk_header_parser(input)?;
    let (input, id) = le_u8(input)?;
    let (input, flags) = le_u8(input)?;
    let (input, _reserved) = le_u16(input)?;
    let (input, entry_count) = le_u32(input)?;
    let (input, entries_start) = le_u32(input)?;
    let (_, config) = config_parser(input)?;

    log::debug!("type::id = {id:#x}");
    log::debug!("type::entry_count = {entry_count}");
    log::debug!("type::entries_start = {entries_start:#x}");
    log::debug!("type::config = {config}");

    if flags & TYPE_FLAG_SPARSE != 0 {
        log::warn!("sparse type chunk {id:#04x} is not supported, skipping");
        let (input, _) = take(chunk_header.chunk_size)(input0)?;
        return Ok((input, None));
    }

    // The entry offset array sits right after the declared header, the
    // entries themselves behind `entries_start`-relative offsets.
    let offsets_input = slice_from(input0, chunk_header.header_size)?;
    let (_, entry_offsets) = count(le_u32, entry_count as usize)(offsets_input)?;

    let mut entries = BTreeMap::new();
    for (entry_idx, offset) in entry_offsets.into_iter().enumerate() {
        log::debug!(">> type::entry_offset = {offset:#x}");
        if offset == NO_ENTRY {
            continue;
        }
        let data = slice_from(input0, entries_start as usize + offset as usize)?;
        let (_, entry) = table_entry_parser(data)?;
        entries.insert(entry_idx as u16, entry);
        log::debug!("<< type::entry_offset = {offset:#x}");
    }

    let (input, _) = take(chunk_header.chunk_size)(input0)?;

    log::debug!("<< table_type_parser");

    Ok((
        input,
        Some(TypeChunk {
            id,
            config,
            entries,
        }),
    ))
}

fn table_entry_parser(input: &[u8]) -> IResult<&[u8], TableEntry, ResourcesError> {
    log::debug!(">> table_entry_parser");

    let (input, _size) = le_u16(input)?;
    let (input, flags) = le_u16(input)?;
    let (input, key) = le_u32(input)?;

    log::debug!("entry::flags = {flags:#x}");
    log::debug!("entry::key = {key:#x}");

    let (input, content) = if flags & ENTRY_FLAG_COMPLEX != 0 {
        let (input, parent) = le_u32(input)?;
        let (input, map_count) = le_u32(input)?;

        log::debug!("entry::parent = {parent:#x}");
        log::debug!("entry::map_count = {map_count}");

        let (input, items) = count(table_map_parser, map_count as usize)(input)?;
        (input, EntryContent::Map { parent, items })
    } else {
        let (input, value) = value_parser(input)?;
        (input, EntryContent::Value(value))
    };

    log::debug!("<< table_entry_parser");

    Ok((
        input,
        TableEntry {
            key: StringPoolIndex::new(key as usize),
            content,
        },
    ))
}

fn table_map_parser(input: &[u8]) -> IResult<&[u8], (u32, Value), ResourcesError> {
    log::debug!(">> table_map_parser");

    let (input, name) = le_u32(input)?;
    log::debug!("map::name = {name:#x}");
    let (input, value) = value_parser(input)?;

    log::debug!("<< table_map_parser");

    Ok((input, (name, value)))
}

// -- configuration -------------------------------------------------------

// Reads `ResTable_config` honoring its declared size: any field beyond
// `config_size` is absent and stays "any".
fn config_parser(input: &[u8]) -> IResult<&[u8], Config, ResourcesError> {
    let input0 = input;

    log::debug!(">> config_parser");

    let (input, config_size) = le_u32(input)?;
    let config_size = config_size as usize;
    log::debug!("config::size = {config_size}");

    let mut config = Config::default();
    let mut input_mut = input;

    if config_size >= 8 {
        let (input, mcc) = map(le_u16, opt_value(0))(input_mut)?;
        let (input, mnc) = map(le_u16, opt_value(0))(input)?;
        config.mcc = mcc;
        config.mnc = mnc;
        input_mut = input;
    }
    if config_size >= 12 {
        let (input, language) = count(le_u8, 2)(input_mut)?;
        let (input, country) = count(le_u8, 2)(input)?;
        config.language =
            decode_locale_pair(language[0], language[1]).map(|s| s.to_lowercase());
        config.country = decode_locale_pair(country[0], country[1]).map(|s| s.to_uppercase());
        input_mut = input;
    }
    if config_size >= 16 {
        let (input, orientation) = map(le_u8, opt_value(0))(input_mut)?;
        let (input, touchscreen) = map(le_u8, opt_value(0))(input)?;
        let (input, density) = map(le_u16, opt_value(0))(input)?;
        config.orientation = orientation;
        config.touchscreen = touchscreen;
        config.density = density;
        input_mut = input;
    }
    if config_size >= 20 {
        let (input, keyboard) = map(le_u8, opt_value(0))(input_mut)?;
        let (input, navigation) = map(le_u8, opt_value(0))(input)?;
        let (input, input_flags) = map(le_u8, opt_value(0))(input)?;
        let (input, _pad0) = le_u8(input)?;
        config.keyboard = keyboard;
        config.navigation = navigation;
        config.input_flags = input_flags;
        input_mut = input;
    }
    if config_size >= 24 {
        let (input, screen_width) = map(le_u16, opt_value(0))(input_mut)?;
        let (input, screen_height) = map(le_u16, opt_value(0))(input)?;
        config.screen_width = screen_width;
        config.screen_height = screen_height;
        input_mut = input;
    }
    if config_size >= 28 {
        let (input, sdk_version) = map(le_u16, opt_value(0))(input_mut)?;
        let (input, minor_version) = map(le_u16, opt_value(0))(input)?;
        config.sdk_version = sdk_version;
        config.minor_version = minor_version;
        input_mut = input;
    }
    if config_size >= 32 {
        let (input, screen_layout) = map(le_u8, opt_value(0))(input_mut)?;
        let (input, ui_mode) = map(le_u8, opt_value(0))(input)?;
        let (input, smallest_width_dp) = map(le_u16, opt_value(0))(input)?;
        config.screen_layout = screen_layout;
        config.ui_mode = ui_mode;
        config.smallest_width_dp = smallest_width_dp;
        input_mut = input;
    }
    if config_size >= 36 {
        let (input, screen_width_dp) = map(le_u16, opt_value(0))(input_mut)?;
        let (input, screen_height_dp) = map(le_u16, opt_value(0))(input)?;
        config.screen_width_dp = screen_width_dp;
        config.screen_height_dp = screen_height_dp;
        input_mut = input;
    }
    if config_size >= 48 {
        let (input, locale_script) = count(le_u8, 4)(input_mut)?;
        let (input, locale_variant) = count(le_u8, 8)(input)?;
        config.locale_script = decode_ascii_block(&locale_script);
        config.locale_variant = decode_ascii_block(&locale_variant);
        input_mut = input;
    }

    // Whatever a later revision appended past the known fields is
    // skipped through the declared size.
    let consumed = input0.offset(input_mut);
    if consumed < config_size {
        let (input, _) = take(config_size - consumed)(input_mut)?;
        input_mut = input;
    }

    log::debug!("<< config_parser");

    Ok((input_mut, config))
}

fn decode_locale_pair(a: u8, b: u8) -> Option<String> {
    if a == 0 && b == 0 {
        return None;
    }
    if a & 0x80 != 0 {
        // Packed three-letter codes are rare enough to ignore.
        log::warn!("packed locale code is not supported");
        return None;
    }
    Some(String::from_utf8_lossy(&[a, b]).into_owned())
}

fn decode_ascii_block(raw: &[u8]) -> Option<String> {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    if end == 0 {
        None
    } else {
        Some(String::from_utf8_lossy(&raw[..end]).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::ResolvedValue;

    // Fixture builders assembling chunk streams byte by byte, the same
    // layout the platform tools emit.

    fn push_u16(buf: &mut Vec<u8>, v: u16) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn push_u32(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn utf8_string_pool(strings: &[&str]) -> Vec<u8> {
        let mut bodies = Vec::new();
        let mut offsets = Vec::new();
        for s in strings {
            offsets.push(bodies.len() as u32);
            bodies.push(s.len() as u8);
            bodies.push(s.len() as u8);
            bodies.extend_from_slice(s.as_bytes());
            bodies.push(0);
        }
        while bodies.len() % 4 != 0 {
            bodies.push(0);
        }

        let header_size = 0x1c;
        let strings_start = header_size + 4 * strings.len();
        let chunk_size = strings_start + bodies.len();

        let mut buf = Vec::new();
        push_u16(&mut buf, 0x0001);
        push_u16(&mut buf, header_size as u16);
        push_u32(&mut buf, chunk_size as u32);
        push_u32(&mut buf, strings.len() as u32);
        push_u32(&mut buf, 0); // style count
        push_u32(&mut buf, 1 << 8); // utf-8 flag
        push_u32(&mut buf, strings_start as u32);
        push_u32(&mut buf, 0); // styles start
        for off in offsets {
            push_u32(&mut buf, off);
        }
        buf.extend_from_slice(&bodies);
        buf
    }

    fn attribute(ns: u32, name: u32, vtyp: u8, data: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        push_u32(&mut buf, ns);
        push_u32(&mut buf, name);
        push_u32(&mut buf, 0xffff_ffff); // raw value
        push_u16(&mut buf, 8);
        buf.push(0);
        buf.push(vtyp);
        push_u32(&mut buf, data);
        buf
    }

    fn element_chunk(tag: u16, name: u32, attrs: &[Vec<u8>]) -> Vec<u8> {
        let mut body = Vec::new();
        push_u32(&mut body, 0xffff_ffff); // ns
        push_u32(&mut body, name);
        if tag == 0x0102 {
            push_u16(&mut body, 20); // attr start
            push_u16(&mut body, 20); // attr size
            push_u16(&mut body, attrs.len() as u16);
            push_u16(&mut body, 0); // id index
            push_u16(&mut body, 0); // class index
            push_u16(&mut body, 0); // style index
            for attr in attrs {
                body.extend_from_slice(attr);
            }
        }

        let mut buf = Vec::new();
        push_u16(&mut buf, tag);
        push_u16(&mut buf, 0x10);
        push_u32(&mut buf, (0x10 + body.len()) as u32);
        push_u32(&mut buf, 0); // line number
        push_u32(&mut buf, 0xffff_ffff); // comment
        buf.extend_from_slice(&body);
        buf
    }

    fn xml_document(strings: &[&str], body: &[Vec<u8>]) -> Vec<u8> {
        let pool = utf8_string_pool(strings);
        let body_len: usize = body.iter().map(Vec::len).sum();
        let mut buf = Vec::new();
        push_u16(&mut buf, 0x0003);
        push_u16(&mut buf, 8);
        push_u32(&mut buf, (8 + pool.len() + body_len) as u32);
        buf.extend_from_slice(&pool);
        for chunk in body {
            buf.extend_from_slice(chunk);
        }
        buf
    }

    #[test]
    fn parses_a_small_document() {
        // <manifest package="com.example"><application/></manifest>
        let strings = ["package", "manifest", "application", "com.example"];
        let input = xml_document(
            &strings,
            &[
                element_chunk(0x0102, 1, &[attribute(0xffff_ffff, 0, 0x03, 3)]),
                element_chunk(0x0102, 2, &[]),
                element_chunk(0x0103, 2, &[]),
                element_chunk(0x0103, 1, &[]),
            ],
        );

        let doc = parse_xml(&input).unwrap();
        let root = doc.root().unwrap();
        assert_eq!(root.name, "manifest");
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].name, "application");

        let package = root.attribute(None, "package").unwrap();
        assert_eq!(
            package.value,
            ResolvedValue::String("com.example".to_string())
        );
    }

    #[test]
    fn rejects_unbalanced_documents() {
        let strings = ["manifest"];
        let input = xml_document(&strings, &[element_chunk(0x0102, 0, &[])]);
        let doc = parse_xml(&input).unwrap();
        assert!(doc.root().is_err());
    }

    #[test]
    fn rejects_wrong_outer_chunk() {
        let mut input = utf8_string_pool(&["hello"]);
        // Pretend the pool is a whole document.
        assert!(parse_xml(&input).is_err());
        input.clear();
        assert!(parse_xml(&input).is_err());
    }

    #[test]
    fn string_pool_utf16_roundtrip() {
        let mut buf = Vec::new();
        let body: Vec<u8> = {
            let mut b = Vec::new();
            push_u16(&mut b, 2); // length in units
            push_u16(&mut b, 0x48); // 'H'
            push_u16(&mut b, 0x69); // 'i'
            push_u16(&mut b, 0);
            b
        };
        let header_size = 0x1c;
        let strings_start = header_size + 4;
        push_u16(&mut buf, 0x0001);
        push_u16(&mut buf, header_size as u16);
        push_u32(&mut buf, (strings_start + body.len()) as u32);
        push_u32(&mut buf, 1);
        push_u32(&mut buf, 0);
        push_u32(&mut buf, 0); // utf-16
        push_u32(&mut buf, strings_start as u32);
        push_u32(&mut buf, 0);
        push_u32(&mut buf, 0);
        buf.extend_from_slice(&body);

        let (_, pool) = string_pool_parser(&buf).unwrap();
        assert_eq!(pool.get(StringPoolIndex::new(0)).unwrap(), "Hi");
    }

    #[test]
    fn config_reads_respect_declared_size() {
        // A 16-byte config: locale + orientation/density present, the
        // rest absent.
        let mut buf = vec![0u8; 16];
        buf[0..4].copy_from_slice(&16u32.to_le_bytes());
        buf[8] = b'e';
        buf[9] = b's';
        buf[12] = 1; // portrait
        buf[14..16].copy_from_slice(&240u16.to_le_bytes());

        let (rest, config) = config_parser(&buf).unwrap();
        assert!(rest.is_empty());
        assert_eq!(config.language.as_deref(), Some("es"));
        assert_eq!(config.orientation, Some(1));
        assert_eq!(config.density, Some(240));
        assert_eq!(config.sdk_version, None);
        assert_eq!(config.screen_layout, None);
    }
}
