//! Dex binary parsers.
//!
//! The container is parsed pool by pool from the offsets declared in the
//! header; class-data and code items are folded into their owning class
//! definitions so that the resulting [`Dex`] is self-contained.

use crate::addr::Addr;
use crate::classes::{AccessFlags, ClassDefItem};
use crate::code::{CatchHandler, CodeItem, TryItem};
use crate::errors::{DexError, DexResult};
use crate::fields::{EncodedField, FieldIdItem};
use crate::instrs::{
    AccessType, BinOp, CmpKind, Instr, Instruction, InvokeKind, LabeledInstr, LitOp, Test, UnOp,
};
use crate::methods::{EncodedMethod, MethodIdItem};
use crate::mutf8;
use crate::registers::{Reg, RegList, RegRange};
use crate::strings::StringIdItem;
use crate::types::{ProtoIdItem, TypeIdItem};
use crate::{Dex, HeaderItem, Index};
use dr_utils::leb::{Sleb128, Uleb128};
use nom::bytes::complete::{tag, take};
use nom::multi::count;
use nom::number::complete::{le_u16, le_u32};
use nom::Err::Error;
use nom::IResult;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;

const NO_INDEX: u32 = 0xffff_ffff;

pub fn parse_dex(input: &[u8]) -> DexResult<Dex> {
    let header_item = parse_header(input)?;

    log::debug!("dex::version = {}", header_item.version);
    log::debug!("dex::file_size = {}", header_item.file_size);

    let string_id_items = parse_string_ids(input, &header_item)?;
    let type_id_items = parse_type_ids(input, &header_item)?;
    let proto_id_items = parse_proto_ids(input, &header_item)?;
    let field_id_items = parse_field_ids(input, &header_item)?;
    let method_id_items = parse_method_ids(input, &header_item)?;
    let class_def_items = parse_class_defs(input, &header_item)?;

    Ok(Dex {
        header_item,
        string_id_items,
        type_id_items,
        proto_id_items,
        field_id_items,
        method_id_items,
        class_def_items,
    })
}

fn slice_at(input: &[u8], offset: usize) -> DexResult<&[u8]> {
    input
        .get(offset..)
        .ok_or_else(|| DexError::InvalidOffset(format!("offset {offset:#x}")))
}

fn parse_header(input: &[u8]) -> DexResult<HeaderItem> {
    if input.len() < 112 {
        return Err(DexError::Structure("truncated header".to_string()));
    }
    if &input[0..4] != b"dex\n" || input[7] != 0 {
        return Err(DexError::BadMagic);
    }
    let version: u32 = std::str::from_utf8(&input[4..7])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(DexError::BadMagic)?;

    let (rest, _magic) = take::<_, _, DexError>(8usize)(input).map_err(unwrap_nom)?;
    let (rest, checksum) = le_u32_p(rest)?;
    let (rest, signature) = take::<_, _, DexError>(20usize)(rest).map_err(unwrap_nom)?;
    let (rest, file_size) = le_u32_p(rest)?;
    let (rest, header_size) = le_u32_p(rest)?;
    let (rest, endian_tag) = le_u32_p(rest)?;
    let (rest, _link_size) = le_u32_p(rest)?;
    let (rest, _link_off) = le_u32_p(rest)?;
    let (rest, _map_off) = le_u32_p(rest)?;
    let (rest, string_ids_size) = le_u32_p(rest)?;
    let (rest, string_ids_off) = le_u32_p(rest)?;
    let (rest, type_ids_size) = le_u32_p(rest)?;
    let (rest, type_ids_off) = le_u32_p(rest)?;
    let (rest, proto_ids_size) = le_u32_p(rest)?;
    let (rest, proto_ids_off) = le_u32_p(rest)?;
    let (rest, field_ids_size) = le_u32_p(rest)?;
    let (rest, field_ids_off) = le_u32_p(rest)?;
    let (rest, method_ids_size) = le_u32_p(rest)?;
    let (rest, method_ids_off) = le_u32_p(rest)?;
    let (rest, class_defs_size) = le_u32_p(rest)?;
    let (rest, class_defs_off) = le_u32_p(rest)?;
    let (rest, data_size) = le_u32_p(rest)?;
    let (_, data_off) = le_u32_p(rest)?;

    if header_size != 0x70 {
        return Err(DexError::Structure(format!(
            "unexpected header size {header_size:#x}"
        )));
    }
    if endian_tag != 0x1234_5678 {
        return Err(DexError::Structure(format!(
            "unsupported endian tag {endian_tag:#x}"
        )));
    }

    let computed = adler32::adler32(&input[12..])?;
    if computed != checksum {
        log::warn!("dex checksum mismatch: header {checksum:#x}, computed {computed:#x}");
    }
    let mut hasher = Sha1::new();
    hasher.update(&input[32..]);
    if hasher.finalize().as_slice() != signature {
        log::warn!("dex signature mismatch");
    }

    Ok(HeaderItem {
        version,
        checksum,
        signature: signature.to_vec(),
        file_size: file_size as usize,
        string_ids_size: string_ids_size as usize,
        string_ids_off: string_ids_off as usize,
        type_ids_size: type_ids_size as usize,
        type_ids_off: type_ids_off as usize,
        proto_ids_size: proto_ids_size as usize,
        proto_ids_off: proto_ids_off as usize,
        field_ids_size: field_ids_size as usize,
        field_ids_off: field_ids_off as usize,
        method_ids_size: method_ids_size as usize,
        method_ids_off: method_ids_off as usize,
        class_defs_size: class_defs_size as usize,
        class_defs_off: class_defs_off as usize,
        data_size: data_size as usize,
        data_off: data_off as usize,
    })
}

fn unwrap_nom(err: nom::Err<DexError>) -> DexError {
    match err {
        Error(e) | nom::Err::Failure(e) => e,
        nom::Err::Incomplete(_) => DexError::Structure("incomplete input".to_string()),
    }
}

fn le_u32_p(input: &[u8]) -> DexResult<(&[u8], u32)> {
    le_u32::<_, DexError>(input).map_err(unwrap_nom)
}

fn le_u16_p(input: &[u8]) -> DexResult<(&[u8], u16)> {
    le_u16::<_, DexError>(input).map_err(unwrap_nom)
}

pub(crate) fn uleb128(input: &[u8]) -> IResult<&[u8], Uleb128, DexError> {
    let mut result: u32 = 0;
    let mut shift = 0usize;
    let mut size = 0usize;
    loop {
        let byte = *input.get(size).ok_or_else(|| {
            Error(DexError::Structure("truncated uleb128".to_string()))
        })?;
        result |= u32::from(byte & 0x7f) << shift;
        size += 1;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift > 28 {
            return Err(Error(DexError::Structure("uleb128 too long".to_string())));
        }
    }
    Ok((&input[size..], Uleb128::new(result, Some(size))))
}

pub(crate) fn sleb128(input: &[u8]) -> IResult<&[u8], Sleb128, DexError> {
    let mut result: u32 = 0;
    let mut shift = 0usize;
    let mut size = 0usize;
    let mut byte;
    loop {
        byte = *input.get(size).ok_or_else(|| {
            Error(DexError::Structure("truncated sleb128".to_string()))
        })?;
        result |= u32::from(byte & 0x7f) << shift;
        size += 1;
        shift += 7;
        if byte & 0x80 == 0 {
            break;
        }
        if shift > 28 {
            return Err(Error(DexError::Structure("sleb128 too long".to_string())));
        }
    }
    if shift < 32 && (byte & 0x40) != 0 {
        result |= !0u32 << shift;
    }
    Ok((&input[size..], Sleb128::new(result as i32, Some(size))))
}

fn parse_string_ids(input: &[u8], header: &HeaderItem) -> DexResult<Vec<StringIdItem>> {
    let ids = slice_at(input, header.string_ids_off)?;
    let (_, offsets) =
        count(le_u32::<_, DexError>, header.string_ids_size)(ids).map_err(unwrap_nom)?;

    let mut items = Vec::with_capacity(offsets.len());
    for (idx, offset) in offsets.into_iter().enumerate() {
        let data = slice_at(input, offset as usize)?;
        let (data, _utf16_size) = uleb128(data).map_err(unwrap_nom)?;
        let end = data
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| DexError::Structure("unterminated string data".to_string()))?;
        let value = mutf8::to_string(&data[..end])?;
        items.push(StringIdItem {
            index: Index::new(idx),
            value,
        });
    }
    Ok(items)
}

fn parse_type_ids(input: &[u8], header: &HeaderItem) -> DexResult<Vec<TypeIdItem>> {
    let ids = slice_at(input, header.type_ids_off)?;
    let (_, descriptors) =
        count(le_u32::<_, DexError>, header.type_ids_size)(ids).map_err(unwrap_nom)?;
    Ok(descriptors
        .into_iter()
        .enumerate()
        .map(|(idx, descriptor_idx)| TypeIdItem {
            index: Index::new(idx),
            descriptor_idx: Index::new(descriptor_idx as usize),
        })
        .collect())
}

fn parse_proto_ids(input: &[u8], header: &HeaderItem) -> DexResult<Vec<ProtoIdItem>> {
    let mut ids = slice_at(input, header.proto_ids_off)?;
    let mut items = Vec::with_capacity(header.proto_ids_size);
    for idx in 0..header.proto_ids_size {
        let (rest, shorty_idx) = le_u32_p(ids)?;
        let (rest, return_type_idx) = le_u32_p(rest)?;
        let (rest, parameters_off) = le_u32_p(rest)?;
        ids = rest;

        let parameters = if parameters_off == 0 {
            Vec::new()
        } else {
            parse_type_list(input, parameters_off as usize)?
        };

        items.push(ProtoIdItem {
            index: Index::new(idx),
            shorty_idx: Index::new(shorty_idx as usize),
            return_type_idx: Index::new(return_type_idx as usize),
            parameters,
        });
    }
    Ok(items)
}

fn parse_type_list(input: &[u8], offset: usize) -> DexResult<Vec<Index<TypeIdItem>>> {
    let data = slice_at(input, offset)?;
    let (data, size) = le_u32_p(data)?;
    let (_, entries) =
        count(le_u16::<_, DexError>, size as usize)(data).map_err(unwrap_nom)?;
    Ok(entries
        .into_iter()
        .map(|type_idx| Index::new(type_idx as usize))
        .collect())
}

fn parse_field_ids(input: &[u8], header: &HeaderItem) -> DexResult<Vec<FieldIdItem>> {
    let mut ids = slice_at(input, header.field_ids_off)?;
    let mut items = Vec::with_capacity(header.field_ids_size);
    for idx in 0..header.field_ids_size {
        let (rest, class_idx) = le_u16_p(ids)?;
        let (rest, type_idx) = le_u16_p(rest)?;
        let (rest, name_idx) = le_u32_p(rest)?;
        ids = rest;
        items.push(FieldIdItem {
            index: Index::new(idx),
            class_idx: Index::new(class_idx as usize),
            type_idx: Index::new(type_idx as usize),
            name_idx: Index::new(name_idx as usize),
        });
    }
    Ok(items)
}

fn parse_method_ids(input: &[u8], header: &HeaderItem) -> DexResult<Vec<MethodIdItem>> {
    let mut ids = slice_at(input, header.method_ids_off)?;
    let mut items = Vec::with_capacity(header.method_ids_size);
    for idx in 0..header.method_ids_size {
        let (rest, class_idx) = le_u16_p(ids)?;
        let (rest, proto_idx) = le_u16_p(rest)?;
        let (rest, name_idx) = le_u32_p(rest)?;
        ids = rest;
        items.push(MethodIdItem {
            index: Index::new(idx),
            class_idx: Index::new(class_idx as usize),
            proto_idx: Index::new(proto_idx as usize),
            name_idx: Index::new(name_idx as usize),
        });
    }
    Ok(items)
}

fn parse_class_defs(input: &[u8], header: &HeaderItem) -> DexResult<Vec<ClassDefItem>> {
    let mut defs = slice_at(input, header.class_defs_off)?;
    let mut items = Vec::with_capacity(header.class_defs_size);
    for idx in 0..header.class_defs_size {
        let (rest, class_idx) = le_u32_p(defs)?;
        let (rest, access_flags) = le_u32_p(rest)?;
        let (rest, superclass_idx) = le_u32_p(rest)?;
        let (rest, interfaces_off) = le_u32_p(rest)?;
        let (rest, source_file_idx) = le_u32_p(rest)?;
        let (rest, _annotations_off) = le_u32_p(rest)?;
        let (rest, class_data_off) = le_u32_p(rest)?;
        let (rest, _static_values_off) = le_u32_p(rest)?;
        defs = rest;

        let interfaces = if interfaces_off == 0 {
            Vec::new()
        } else {
            parse_type_list(input, interfaces_off as usize)?
        };

        let (static_fields, instance_fields, direct_methods, virtual_methods) =
            if class_data_off == 0 {
                (Vec::new(), Vec::new(), Vec::new(), Vec::new())
            } else {
                parse_class_data(input, class_data_off as usize)?
            };

        items.push(ClassDefItem {
            index: Index::new(idx),
            class_idx: Index::new(class_idx as usize),
            access_flags: AccessFlags::from_bits_truncate(access_flags),
            superclass_idx: (superclass_idx != NO_INDEX)
                .then(|| Index::new(superclass_idx as usize)),
            interfaces,
            source_file_idx: (source_file_idx != NO_INDEX)
                .then(|| Index::new(source_file_idx as usize)),
            static_fields,
            instance_fields,
            direct_methods,
            virtual_methods,
        });
    }
    Ok(items)
}

type ClassData = (
    Vec<EncodedField>,
    Vec<EncodedField>,
    Vec<EncodedMethod>,
    Vec<EncodedMethod>,
);

fn parse_class_data(input: &[u8], offset: usize) -> DexResult<ClassData> {
    let data = slice_at(input, offset)?;
    let (data, static_fields_size) = uleb128(data).map_err(unwrap_nom)?;
    let (data, instance_fields_size) = uleb128(data).map_err(unwrap_nom)?;
    let (data, direct_methods_size) = uleb128(data).map_err(unwrap_nom)?;
    let (data, virtual_methods_size) = uleb128(data).map_err(unwrap_nom)?;

    let (data, static_fields) = parse_encoded_fields(data, static_fields_size.value() as usize)?;
    let (data, instance_fields) =
        parse_encoded_fields(data, instance_fields_size.value() as usize)?;
    let (data, direct_methods) =
        parse_encoded_methods(input, data, direct_methods_size.value() as usize)?;
    let (_, virtual_methods) =
        parse_encoded_methods(input, data, virtual_methods_size.value() as usize)?;

    Ok((static_fields, instance_fields, direct_methods, virtual_methods))
}

fn parse_encoded_fields(
    mut data: &[u8],
    nb: usize,
) -> DexResult<(&[u8], Vec<EncodedField>)> {
    let mut fields = Vec::with_capacity(nb);
    let mut field_idx = 0usize;
    for _ in 0..nb {
        let (rest, idx_diff) = uleb128(data).map_err(unwrap_nom)?;
        let (rest, access_flags) = uleb128(rest).map_err(unwrap_nom)?;
        data = rest;
        field_idx += idx_diff.value() as usize;
        fields.push(EncodedField {
            field_idx: Index::new(field_idx),
            access_flags: AccessFlags::from_bits_truncate(access_flags.value()),
        });
    }
    Ok((data, fields))
}

fn parse_encoded_methods<'a>(
    input: &[u8],
    mut data: &'a [u8],
    nb: usize,
) -> DexResult<(&'a [u8], Vec<EncodedMethod>)> {
    let mut methods = Vec::with_capacity(nb);
    let mut method_idx = 0usize;
    for _ in 0..nb {
        let (rest, idx_diff) = uleb128(data).map_err(unwrap_nom)?;
        let (rest, access_flags) = uleb128(rest).map_err(unwrap_nom)?;
        let (rest, code_off) = uleb128(rest).map_err(unwrap_nom)?;
        data = rest;
        method_idx += idx_diff.value() as usize;

        let code = if code_off.value() == 0 {
            None
        } else {
            Some(parse_code_item(input, code_off.value() as usize)?)
        };

        methods.push(EncodedMethod {
            method_idx: Index::new(method_idx),
            access_flags: AccessFlags::from_bits_truncate(access_flags.value()),
            code,
        });
    }
    Ok((data, methods))
}

fn parse_code_item(input: &[u8], offset: usize) -> DexResult<CodeItem> {
    let data = slice_at(input, offset)?;
    let (data, registers_size) = le_u16_p(data)?;
    let (data, ins_size) = le_u16_p(data)?;
    let (data, outs_size) = le_u16_p(data)?;
    let (data, tries_size) = le_u16_p(data)?;
    let (data, debug_info_off) = le_u32_p(data)?;
    let (data, insns_size) = le_u32_p(data)?;

    log::trace!(
        "code_item@{offset:#x}: registers={registers_size} ins={ins_size} \
         outs={outs_size} tries={tries_size} insns_units={insns_size}"
    );

    let insns_bytes_len = insns_size as usize * 2;
    let insns_bytes = data
        .get(..insns_bytes_len)
        .ok_or_else(|| DexError::Structure("truncated instruction buffer".to_string()))?;
    let insns = parse_instructions(insns_bytes, insns_size as usize)?;
    let mut data = &data[insns_bytes_len..];

    let mut tries = Vec::with_capacity(tries_size as usize);
    let mut handlers = Vec::new();

    if tries_size > 0 {
        if insns_size % 2 == 1 {
            let (rest, _) = tag::<_, _, DexError>("\x00\x00")(data).map_err(unwrap_nom)?;
            data = rest;
        }

        let mut raw_tries = Vec::with_capacity(tries_size as usize);
        for _ in 0..tries_size {
            let (rest, start_addr) = le_u32_p(data)?;
            let (rest, insn_count) = le_u16_p(rest)?;
            let (rest, handler_off) = le_u16_p(rest)?;
            data = rest;
            raw_tries.push((start_addr as usize, insn_count as usize, handler_off as usize));
        }

        let list_base = data;
        let (mut cursor, list_size) = uleb128(data).map_err(unwrap_nom)?;
        let mut offset_to_index = BTreeMap::new();
        for _ in 0..list_size.value() {
            let off = list_base.len() - cursor.len();
            let (rest, handler) = parse_catch_handler(cursor)?;
            cursor = rest;
            offset_to_index.insert(off, handlers.len());
            handlers.push(handler);
        }

        for (start_addr, insn_count, handler_off) in raw_tries {
            let handler_index = *offset_to_index.get(&handler_off).ok_or_else(|| {
                DexError::InvalidOffset(format!("catch handler at {handler_off:#x}"))
            })?;
            tries.push(TryItem {
                start_addr,
                insn_count,
                handler_index,
            });
        }
    }

    Ok(CodeItem {
        registers_size: registers_size as usize,
        ins_size: ins_size as usize,
        outs_size: outs_size as usize,
        debug_info_off: (debug_info_off != 0).then_some(debug_info_off as usize),
        insns,
        tries,
        handlers,
    })
}

fn parse_catch_handler(data: &[u8]) -> DexResult<(&[u8], CatchHandler)> {
    let (mut data, size) = sleb128(data).map_err(unwrap_nom)?;
    let nb_typed = size.value().unsigned_abs() as usize;

    let mut type_addr_pairs = Vec::with_capacity(nb_typed);
    for _ in 0..nb_typed {
        let (rest, type_idx) = uleb128(data).map_err(unwrap_nom)?;
        let (rest, addr) = uleb128(rest).map_err(unwrap_nom)?;
        data = rest;
        type_addr_pairs.push((Index::new(type_idx.value() as usize), addr.value() as usize));
    }

    let catch_all_addr = if size.value() <= 0 {
        let (rest, addr) = uleb128(data).map_err(unwrap_nom)?;
        data = rest;
        Some(addr.value() as usize)
    } else {
        None
    };

    Ok((
        data,
        CatchHandler {
            type_addr_pairs,
            catch_all_addr,
        },
    ))
}

// -- instruction stream ------------------------------------------------

const UNOPS: [UnOp; 21] = [
    UnOp::NegInt,
    UnOp::NotInt,
    UnOp::NegLong,
    UnOp::NotLong,
    UnOp::NegFloat,
    UnOp::NegDouble,
    UnOp::IntToLong,
    UnOp::IntToFloat,
    UnOp::IntToDouble,
    UnOp::LongToInt,
    UnOp::LongToFloat,
    UnOp::LongToDouble,
    UnOp::FloatToInt,
    UnOp::FloatToLong,
    UnOp::FloatToDouble,
    UnOp::DoubleToInt,
    UnOp::DoubleToLong,
    UnOp::DoubleToFloat,
    UnOp::IntToByte,
    UnOp::IntToChar,
    UnOp::IntToShort,
];

const BINOPS: [BinOp; 32] = [
    BinOp::AddInt,
    BinOp::SubInt,
    BinOp::MulInt,
    BinOp::DivInt,
    BinOp::RemInt,
    BinOp::AndInt,
    BinOp::OrInt,
    BinOp::XorInt,
    BinOp::ShlInt,
    BinOp::ShrInt,
    BinOp::UshrInt,
    BinOp::AddLong,
    BinOp::SubLong,
    BinOp::MulLong,
    BinOp::DivLong,
    BinOp::RemLong,
    BinOp::AndLong,
    BinOp::OrLong,
    BinOp::XorLong,
    BinOp::ShlLong,
    BinOp::ShrLong,
    BinOp::UshrLong,
    BinOp::AddFloat,
    BinOp::SubFloat,
    BinOp::MulFloat,
    BinOp::DivFloat,
    BinOp::RemFloat,
    BinOp::AddDouble,
    BinOp::SubDouble,
    BinOp::MulDouble,
    BinOp::DivDouble,
    BinOp::RemDouble,
];

const LITOPS: [LitOp; 11] = [
    LitOp::Add,
    LitOp::Rsub,
    LitOp::Mul,
    LitOp::Div,
    LitOp::Rem,
    LitOp::And,
    LitOp::Or,
    LitOp::Xor,
    LitOp::Shl,
    LitOp::Shr,
    LitOp::Ushr,
];

const ACCESS_TYPES: [AccessType; 7] = [
    AccessType::Word,
    AccessType::Wide,
    AccessType::Object,
    AccessType::Boolean,
    AccessType::Byte,
    AccessType::Char,
    AccessType::Short,
];

const INVOKE_KINDS: [InvokeKind; 5] = [
    InvokeKind::Virtual,
    InvokeKind::Super,
    InvokeKind::Direct,
    InvokeKind::Static,
    InvokeKind::Interface,
];

const CMP_KINDS: [CmpKind; 5] = [
    CmpKind::LtFloat,
    CmpKind::GtFloat,
    CmpKind::LtDouble,
    CmpKind::GtDouble,
    CmpKind::Long,
];

const TESTS: [Test; 6] = [Test::Eq, Test::Ne, Test::Lt, Test::Ge, Test::Gt, Test::Le];

struct Units<'a> {
    bytes: &'a [u8],
}

impl<'a> Units<'a> {
    fn get(&self, idx: usize) -> DexResult<u16> {
        let off = idx * 2;
        self.bytes
            .get(off..off + 2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .ok_or_else(|| DexError::Structure("truncated instruction stream".to_string()))
    }

    fn get_i32(&self, idx: usize) -> DexResult<i32> {
        let lo = self.get(idx)?;
        let hi = self.get(idx + 1)?;
        Ok((i32::from(hi as i16) << 16) | i32::from(lo))
    }

    fn get_i64(&self, idx: usize) -> DexResult<i64> {
        let lo = self.get_i32(idx)? as u32;
        let hi = self.get_i32(idx + 2)?;
        Ok((i64::from(hi) << 32) | i64::from(lo))
    }
}

pub(crate) fn parse_instructions(bytes: &[u8], unit_count: usize) -> DexResult<Vec<LabeledInstr>> {
    let units = Units { bytes };
    let mut insns = Vec::new();
    let mut pos = 0usize;
    while pos < unit_count {
        let instr = decode_instr(&units, pos)?;
        let size = instr.size();
        insns.push(LabeledInstr {
            addr: Addr(pos),
            instr,
        });
        pos += size;
    }
    if pos != unit_count {
        return Err(DexError::Structure(
            "instruction stream overruns the declared unit count".to_string(),
        ));
    }
    Ok(insns)
}

#[allow(clippy::too_many_lines)]
fn decode_instr(units: &Units, pos: usize) -> DexResult<Instr> {
    let unit = units.get(pos)?;
    let opcode = (unit & 0xff) as u8;
    let hi = (unit >> 8) as u8;

    // 4-bit operand helpers for the nibble-packed formats.
    let nib_a = Reg::from(hi & 0x0f);
    let nib_b = Reg::from(hi >> 4);
    let reg_aa = Reg::from(hi);

    let instr = match opcode {
        0x00 => match hi {
            0x00 => Instr::Nop,
            0x01 => {
                let size = units.get(pos + 1)? as usize;
                let first_key = units.get_i32(pos + 2)?;
                let mut targets = Vec::with_capacity(size);
                for i in 0..size {
                    targets.push(units.get_i32(pos + 4 + 2 * i)?);
                }
                Instr::PackedSwitchPayload { first_key, targets }
            }
            0x02 => {
                let size = units.get(pos + 1)? as usize;
                let mut keys = Vec::with_capacity(size);
                let mut targets = Vec::with_capacity(size);
                for i in 0..size {
                    keys.push(units.get_i32(pos + 2 + 2 * i)?);
                }
                for i in 0..size {
                    targets.push(units.get_i32(pos + 2 + 2 * size + 2 * i)?);
                }
                Instr::SparseSwitchPayload { keys, targets }
            }
            0x03 => {
                let element_width = units.get(pos + 1)?;
                let size = units.get_i32(pos + 2)? as u32 as usize;
                let byte_len = size * element_width as usize;
                let start = (pos + 4) * 2;
                let data = units
                    .bytes
                    .get(start..start + byte_len)
                    .ok_or_else(|| {
                        DexError::Structure("truncated fill-array-data payload".to_string())
                    })?
                    .to_vec();
                Instr::FillArrayDataPayload {
                    element_width,
                    data,
                }
            }
            _ => Instr::Nop,
        },

        0x01 => Instr::Move(nib_a, nib_b),
        0x02 => Instr::MoveFrom16(reg_aa, Reg::from(units.get(pos + 1)?)),
        0x03 => Instr::Move16(
            Reg::from(units.get(pos + 1)?),
            Reg::from(units.get(pos + 2)?),
        ),
        0x04 => Instr::MoveWide(nib_a, nib_b),
        0x05 => Instr::MoveWideFrom16(reg_aa, Reg::from(units.get(pos + 1)?)),
        0x06 => Instr::MoveWide16(
            Reg::from(units.get(pos + 1)?),
            Reg::from(units.get(pos + 2)?),
        ),
        0x07 => Instr::MoveObject(nib_a, nib_b),
        0x08 => Instr::MoveObjectFrom16(reg_aa, Reg::from(units.get(pos + 1)?)),
        0x09 => Instr::MoveObject16(
            Reg::from(units.get(pos + 1)?),
            Reg::from(units.get(pos + 2)?),
        ),
        0x0a => Instr::MoveResult(reg_aa),
        0x0b => Instr::MoveResultWide(reg_aa),
        0x0c => Instr::MoveResultObject(reg_aa),
        0x0d => Instr::MoveException(reg_aa),

        0x0e => Instr::ReturnVoid,
        0x0f => Instr::Return(reg_aa),
        0x10 => Instr::ReturnWide(reg_aa),
        0x11 => Instr::ReturnObject(reg_aa),

        0x12 => {
            // 11n: sign-extend the high nibble.
            let lit = (hi as i8) >> 4;
            Instr::Const4(nib_a, lit)
        }
        0x13 => Instr::Const16(reg_aa, units.get(pos + 1)? as i16),
        0x14 => Instr::Const(reg_aa, units.get_i32(pos + 1)?),
        0x15 => Instr::ConstHigh16(reg_aa, units.get(pos + 1)? as i16),
        0x16 => Instr::ConstWide16(reg_aa, units.get(pos + 1)? as i16),
        0x17 => Instr::ConstWide32(reg_aa, units.get_i32(pos + 1)?),
        0x18 => Instr::ConstWide(reg_aa, units.get_i64(pos + 1)?),
        0x19 => Instr::ConstWideHigh16(reg_aa, units.get(pos + 1)? as i16),
        0x1a => Instr::ConstString(reg_aa, Index::new(units.get(pos + 1)? as usize)),
        0x1b => Instr::ConstStringJumbo(
            reg_aa,
            Index::new(units.get_i32(pos + 1)? as u32 as usize),
        ),
        0x1c => Instr::ConstClass(reg_aa, Index::new(units.get(pos + 1)? as usize)),

        0x1d => Instr::MonitorEnter(reg_aa),
        0x1e => Instr::MonitorExit(reg_aa),

        0x1f => Instr::CheckCast(reg_aa, Index::new(units.get(pos + 1)? as usize)),
        0x20 => Instr::InstanceOf(nib_a, nib_b, Index::new(units.get(pos + 1)? as usize)),
        0x21 => Instr::ArrayLength(nib_a, nib_b),
        0x22 => Instr::NewInstance(reg_aa, Index::new(units.get(pos + 1)? as usize)),
        0x23 => Instr::NewArray(nib_a, nib_b, Index::new(units.get(pos + 1)? as usize)),
        0x24 => {
            let (regs, type_idx) = decode_35c(units, pos, hi)?;
            Instr::FilledNewArray(regs, Index::new(type_idx))
        }
        0x25 => {
            let (range, type_idx) = decode_3rc(units, pos, hi)?;
            Instr::FilledNewArrayRange(range, Index::new(type_idx))
        }
        0x26 => Instr::FillArrayData(reg_aa, units.get_i32(pos + 1)?),

        0x27 => Instr::Throw(reg_aa),
        0x28 => Instr::Goto(hi as i8),
        0x29 => Instr::Goto16(units.get(pos + 1)? as i16),
        0x2a => Instr::Goto32(units.get_i32(pos + 1)?),
        0x2b => Instr::PackedSwitch(reg_aa, units.get_i32(pos + 1)?),
        0x2c => Instr::SparseSwitch(reg_aa, units.get_i32(pos + 1)?),

        0x2d..=0x31 => {
            let second = units.get(pos + 1)?;
            Instr::Cmp(
                CMP_KINDS[(opcode - 0x2d) as usize],
                reg_aa,
                Reg::from((second & 0xff) as u8),
                Reg::from((second >> 8) as u8),
            )
        }

        0x32..=0x37 => Instr::If(
            TESTS[(opcode - 0x32) as usize],
            nib_a,
            nib_b,
            units.get(pos + 1)? as i16,
        ),
        0x38..=0x3d => Instr::IfZ(
            TESTS[(opcode - 0x38) as usize],
            reg_aa,
            units.get(pos + 1)? as i16,
        ),

        0x44..=0x4a => {
            let second = units.get(pos + 1)?;
            Instr::Aget(
                ACCESS_TYPES[(opcode - 0x44) as usize],
                reg_aa,
                Reg::from((second & 0xff) as u8),
                Reg::from((second >> 8) as u8),
            )
        }
        0x4b..=0x51 => {
            let second = units.get(pos + 1)?;
            Instr::Aput(
                ACCESS_TYPES[(opcode - 0x4b) as usize],
                reg_aa,
                Reg::from((second & 0xff) as u8),
                Reg::from((second >> 8) as u8),
            )
        }
        0x52..=0x58 => Instr::Iget(
            ACCESS_TYPES[(opcode - 0x52) as usize],
            nib_a,
            nib_b,
            Index::new(units.get(pos + 1)? as usize),
        ),
        0x59..=0x5f => Instr::Iput(
            ACCESS_TYPES[(opcode - 0x59) as usize],
            nib_a,
            nib_b,
            Index::new(units.get(pos + 1)? as usize),
        ),
        0x60..=0x66 => Instr::Sget(
            ACCESS_TYPES[(opcode - 0x60) as usize],
            reg_aa,
            Index::new(units.get(pos + 1)? as usize),
        ),
        0x67..=0x6d => Instr::Sput(
            ACCESS_TYPES[(opcode - 0x67) as usize],
            reg_aa,
            Index::new(units.get(pos + 1)? as usize),
        ),

        0x6e..=0x72 => {
            let (regs, method_idx) = decode_35c(units, pos, hi)?;
            Instr::Invoke(
                INVOKE_KINDS[(opcode - 0x6e) as usize],
                regs,
                Index::new(method_idx),
            )
        }
        0x74..=0x78 => {
            let (range, method_idx) = decode_3rc(units, pos, hi)?;
            Instr::InvokeRange(
                INVOKE_KINDS[(opcode - 0x74) as usize],
                range,
                Index::new(method_idx),
            )
        }

        0x7b..=0x8f => Instr::Unop(UNOPS[(opcode - 0x7b) as usize], nib_a, nib_b),

        0x90..=0xaf => {
            let second = units.get(pos + 1)?;
            Instr::Binop(
                BINOPS[(opcode - 0x90) as usize],
                reg_aa,
                Reg::from((second & 0xff) as u8),
                Reg::from((second >> 8) as u8),
            )
        }
        0xb0..=0xcf => Instr::Binop2Addr(BINOPS[(opcode - 0xb0) as usize], nib_a, nib_b),
        0xd0..=0xd7 => Instr::BinopLit16(
            LITOPS[(opcode - 0xd0) as usize],
            nib_a,
            nib_b,
            units.get(pos + 1)? as i16,
        ),
        0xd8..=0xe2 => {
            let second = units.get(pos + 1)?;
            Instr::BinopLit8(
                LITOPS[(opcode - 0xd8) as usize],
                reg_aa,
                Reg::from((second & 0xff) as u8),
                (second >> 8) as i8,
            )
        }

        // Method handle and call-site instructions: decoded for stream
        // alignment, rejected at translation.
        0xfa | 0xfb => Instr::NotTranslatable { opcode, units: 4 },
        0xfc | 0xfd => Instr::NotTranslatable { opcode, units: 3 },
        0xfe | 0xff => Instr::NotTranslatable { opcode, units: 2 },

        _ => {
            return Err(DexError::UnknownOpcode { opcode, unit: pos });
        }
    };

    Ok(instr)
}

fn decode_35c(units: &Units, pos: usize, hi: u8) -> DexResult<(RegList, usize)> {
    let nb = (hi >> 4) as usize;
    if nb > 5 {
        return Err(DexError::Structure(format!(
            "35c register count {nb} out of range"
        )));
    }
    let index = units.get(pos + 1)? as usize;
    let third = units.get(pos + 2)?;
    let g = hi & 0x0f;
    let all = [
        (third & 0x0f) as u8,
        ((third >> 4) & 0x0f) as u8,
        ((third >> 8) & 0x0f) as u8,
        ((third >> 12) & 0x0f) as u8,
        g,
    ];
    let regs = all[..nb].iter().map(|r| Reg::from(*r)).collect();
    Ok((RegList(regs), index))
}

fn decode_3rc(units: &Units, pos: usize, hi: u8) -> DexResult<(RegRange, usize)> {
    let index = units.get(pos + 1)? as usize;
    let first = units.get(pos + 2)?;
    Ok((
        RegRange {
            first,
            count: u16::from(hi),
        },
        index,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(words: &[u16]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn uleb128_parser() {
        assert_eq!(0, uleb128(&[0x00]).unwrap().1.value());
        assert_eq!(1, uleb128(&[0x01]).unwrap().1.value());
        assert_eq!(127, uleb128(&[0x7f]).unwrap().1.value());
        assert_eq!(16256, uleb128(&[0x80, 0x7f]).unwrap().1.value());
    }

    #[test]
    fn sleb128_parser() {
        assert_eq!(0, sleb128(&[0x00]).unwrap().1.value());
        assert_eq!(1, sleb128(&[0x01]).unwrap().1.value());
        assert_eq!(-1, sleb128(&[0x7f]).unwrap().1.value());
        assert_eq!(-128, sleb128(&[0x80, 0x7f]).unwrap().1.value());
    }

    #[test]
    fn decode_simple_stream() {
        // const/4 v0, #2 ; return v0
        let bytes = units(&[0x0012 | (2 << 12), 0x000f]);
        let insns = parse_instructions(&bytes, 2).unwrap();
        assert_eq!(insns.len(), 2);
        assert!(matches!(insns[0].instr(), Instr::Const4(r, 2) if r.number() == 0));
        assert!(matches!(insns[1].instr(), Instr::Return(r) if r.number() == 0));
    }

    #[test]
    fn decode_invoke_35c() {
        // invoke-virtual {v1, v2}, method@3
        let bytes = units(&[0x206e, 0x0003, 0x0021]);
        let insns = parse_instructions(&bytes, 3).unwrap();
        match insns[0].instr() {
            Instr::Invoke(InvokeKind::Virtual, regs, idx) => {
                let rs: Vec<u16> = regs.iter().map(Reg::number).collect();
                assert_eq!(rs, vec![1, 2]);
                assert_eq!(idx.as_usize(), 3);
            }
            other => panic!("unexpected instruction {other:?}"),
        }
    }

    #[test]
    fn decode_packed_switch_payload() {
        // packed-switch-payload, 2 entries, first_key = 10
        let bytes = units(&[0x0100, 0x0002, 10, 0, 4, 0, 6, 0]);
        let insns = parse_instructions(&bytes, 8).unwrap();
        match insns[0].instr() {
            Instr::PackedSwitchPayload { first_key, targets } => {
                assert_eq!(*first_key, 10);
                assert_eq!(targets, &vec![4, 6]);
            }
            other => panic!("unexpected instruction {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_opcode() {
        let bytes = units(&[0x0040]);
        assert!(matches!(
            parse_instructions(&bytes, 1),
            Err(DexError::UnknownOpcode { opcode: 0x40, .. })
        ));
    }

    #[test]
    fn stream_overrun_is_an_error() {
        // const v0 needs 3 units but only 2 are declared.
        let bytes = units(&[0x0014, 0x0000, 0x0000]);
        assert!(parse_instructions(&bytes[..4], 2).is_err());
    }
}
