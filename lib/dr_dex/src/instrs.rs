//! Dalvik bytecode instructions definitions.
//!
//! Instructions that differ only by their operand kind (arithmetic,
//! comparisons, array and field accesses, invokes) are grouped under a
//! single variant carrying a kind enum, which keeps the opcode table
//! manageable while preserving a one-to-one mapping with the encoded
//! stream.

use crate::addr::Addr;
use crate::fields::FieldIdItem;
use crate::methods::MethodIdItem;
use crate::registers::{Reg, RegList, RegRange};
use crate::strings::StringIdItem;
use crate::types::TypeIdItem;
use crate::Index;
use std::fmt;

pub trait Instruction {
    fn mnemonic(&self) -> &'static str;
    /// Encoded size, in 16-bit code units.
    fn size(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct LabeledInstr {
    pub(crate) addr: Addr,
    pub(crate) instr: Instr,
}

impl LabeledInstr {
    #[inline]
    #[must_use]
    pub const fn addr(&self) -> Addr {
        self.addr
    }

    #[inline]
    #[must_use]
    pub const fn instr(&self) -> &Instr {
        &self.instr
    }

    #[inline]
    #[must_use]
    pub fn next_addr(&self) -> Addr {
        self.addr.offset(self.instr.size() as i32)
    }
}

impl Instruction for LabeledInstr {
    #[inline]
    fn mnemonic(&self) -> &'static str {
        self.instr.mnemonic()
    }

    #[inline]
    fn size(&self) -> usize {
        self.instr.size()
    }
}

/// Float/long comparison flavors (`cmpl-float` .. `cmp-long`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpKind {
    LtFloat,
    GtFloat,
    LtDouble,
    GtDouble,
    Long,
}

/// Branch test flavors (`if-eq` .. `if-le`, and their `-z` forms).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Test {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

/// Memory access width/kind for array and field instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Word,
    Wide,
    Object,
    Boolean,
    Byte,
    Char,
    Short,
}

impl AccessType {
    pub(crate) const fn suffix(self) -> &'static str {
        match self {
            Self::Word => "",
            Self::Wide => "-wide",
            Self::Object => "-object",
            Self::Boolean => "-boolean",
            Self::Byte => "-byte",
            Self::Char => "-char",
            Self::Short => "-short",
        }
    }

    /// Whether the accessed value occupies a register pair.
    #[inline]
    #[must_use]
    pub const fn is_wide(self) -> bool {
        matches!(self, Self::Wide)
    }
}

/// Invocation flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    Virtual,
    Super,
    Direct,
    Static,
    Interface,
}

impl InvokeKind {
    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::Virtual => "invoke-virtual",
            Self::Super => "invoke-super",
            Self::Direct => "invoke-direct",
            Self::Static => "invoke-static",
            Self::Interface => "invoke-interface",
        }
    }
}

/// Unary operations, including primitive conversions (`0x7b` .. `0x8f`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum UnOp {
    NegInt,
    NotInt,
    NegLong,
    NotLong,
    NegFloat,
    NegDouble,
    IntToLong,
    IntToFloat,
    IntToDouble,
    LongToInt,
    LongToFloat,
    LongToDouble,
    FloatToInt,
    FloatToLong,
    FloatToDouble,
    DoubleToInt,
    DoubleToLong,
    DoubleToFloat,
    IntToByte,
    IntToChar,
    IntToShort,
}

impl UnOp {
    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::NegInt => "neg-int",
            Self::NotInt => "not-int",
            Self::NegLong => "neg-long",
            Self::NotLong => "not-long",
            Self::NegFloat => "neg-float",
            Self::NegDouble => "neg-double",
            Self::IntToLong => "int-to-long",
            Self::IntToFloat => "int-to-float",
            Self::IntToDouble => "int-to-double",
            Self::LongToInt => "long-to-int",
            Self::LongToFloat => "long-to-float",
            Self::LongToDouble => "long-to-double",
            Self::FloatToInt => "float-to-int",
            Self::FloatToLong => "float-to-long",
            Self::FloatToDouble => "float-to-double",
            Self::DoubleToInt => "double-to-int",
            Self::DoubleToLong => "double-to-long",
            Self::DoubleToFloat => "double-to-float",
            Self::IntToByte => "int-to-byte",
            Self::IntToChar => "int-to-char",
            Self::IntToShort => "int-to-short",
        }
    }
}

/// Binary operations (`0x90` .. `0xaf`, and their `/2addr` forms).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    AddInt,
    SubInt,
    MulInt,
    DivInt,
    RemInt,
    AndInt,
    OrInt,
    XorInt,
    ShlInt,
    ShrInt,
    UshrInt,
    AddLong,
    SubLong,
    MulLong,
    DivLong,
    RemLong,
    AndLong,
    OrLong,
    XorLong,
    ShlLong,
    ShrLong,
    UshrLong,
    AddFloat,
    SubFloat,
    MulFloat,
    DivFloat,
    RemFloat,
    AddDouble,
    SubDouble,
    MulDouble,
    DivDouble,
    RemDouble,
}

impl BinOp {
    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::AddInt => "add-int",
            Self::SubInt => "sub-int",
            Self::MulInt => "mul-int",
            Self::DivInt => "div-int",
            Self::RemInt => "rem-int",
            Self::AndInt => "and-int",
            Self::OrInt => "or-int",
            Self::XorInt => "xor-int",
            Self::ShlInt => "shl-int",
            Self::ShrInt => "shr-int",
            Self::UshrInt => "ushr-int",
            Self::AddLong => "add-long",
            Self::SubLong => "sub-long",
            Self::MulLong => "mul-long",
            Self::DivLong => "div-long",
            Self::RemLong => "rem-long",
            Self::AndLong => "and-long",
            Self::OrLong => "or-long",
            Self::XorLong => "xor-long",
            Self::ShlLong => "shl-long",
            Self::ShrLong => "shr-long",
            Self::UshrLong => "ushr-long",
            Self::AddFloat => "add-float",
            Self::SubFloat => "sub-float",
            Self::MulFloat => "mul-float",
            Self::DivFloat => "div-float",
            Self::RemFloat => "rem-float",
            Self::AddDouble => "add-double",
            Self::SubDouble => "sub-double",
            Self::MulDouble => "mul-double",
            Self::DivDouble => "div-double",
            Self::RemDouble => "rem-double",
        }
    }
}

/// Integer operations against an immediate literal (`/lit16`, `/lit8`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitOp {
    Add,
    Rsub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Ushr,
}

impl LitOp {
    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::Add => "add-int",
            Self::Rsub => "rsub-int",
            Self::Mul => "mul-int",
            Self::Div => "div-int",
            Self::Rem => "rem-int",
            Self::And => "and-int",
            Self::Or => "or-int",
            Self::Xor => "xor-int",
            Self::Shl => "shl-int",
            Self::Shr => "shr-int",
            Self::Ushr => "ushr-int",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Instr {
    Nop,

    Move(Reg, Reg),
    MoveFrom16(Reg, Reg),
    Move16(Reg, Reg),
    MoveWide(Reg, Reg),
    MoveWideFrom16(Reg, Reg),
    MoveWide16(Reg, Reg),
    MoveObject(Reg, Reg),
    MoveObjectFrom16(Reg, Reg),
    MoveObject16(Reg, Reg),
    MoveResult(Reg),
    MoveResultWide(Reg),
    MoveResultObject(Reg),
    MoveException(Reg),

    ReturnVoid,
    Return(Reg),
    ReturnWide(Reg),
    ReturnObject(Reg),

    Const4(Reg, i8),
    Const16(Reg, i16),
    Const(Reg, i32),
    ConstHigh16(Reg, i16),
    ConstWide16(Reg, i16),
    ConstWide32(Reg, i32),
    ConstWide(Reg, i64),
    ConstWideHigh16(Reg, i16),
    ConstString(Reg, Index<StringIdItem>),
    ConstStringJumbo(Reg, Index<StringIdItem>),
    ConstClass(Reg, Index<TypeIdItem>),

    MonitorEnter(Reg),
    MonitorExit(Reg),

    CheckCast(Reg, Index<TypeIdItem>),
    InstanceOf(Reg, Reg, Index<TypeIdItem>),
    ArrayLength(Reg, Reg),
    NewInstance(Reg, Index<TypeIdItem>),
    NewArray(Reg, Reg, Index<TypeIdItem>),
    FilledNewArray(RegList, Index<TypeIdItem>),
    FilledNewArrayRange(RegRange, Index<TypeIdItem>),
    FillArrayData(Reg, i32),

    Throw(Reg),
    Goto(i8),
    Goto16(i16),
    Goto32(i32),
    PackedSwitch(Reg, i32),
    SparseSwitch(Reg, i32),

    Cmp(CmpKind, Reg, Reg, Reg),
    If(Test, Reg, Reg, i16),
    IfZ(Test, Reg, i16),

    Aget(AccessType, Reg, Reg, Reg),
    Aput(AccessType, Reg, Reg, Reg),
    Iget(AccessType, Reg, Reg, Index<FieldIdItem>),
    Iput(AccessType, Reg, Reg, Index<FieldIdItem>),
    Sget(AccessType, Reg, Index<FieldIdItem>),
    Sput(AccessType, Reg, Index<FieldIdItem>),

    Invoke(InvokeKind, RegList, Index<MethodIdItem>),
    InvokeRange(InvokeKind, RegRange, Index<MethodIdItem>),

    Unop(UnOp, Reg, Reg),
    Binop(BinOp, Reg, Reg, Reg),
    Binop2Addr(BinOp, Reg, Reg),
    BinopLit16(LitOp, Reg, Reg, i16),
    BinopLit8(LitOp, Reg, Reg, i8),

    /// Switch jump table (packed form): consecutive keys starting at
    /// `first_key`, relative branch targets in code units.
    PackedSwitchPayload { first_key: i32, targets: Vec<i32> },
    /// Switch jump table (sparse form): sorted keys with matching targets.
    SparseSwitchPayload { keys: Vec<i32>, targets: Vec<i32> },
    /// Raw array initialisation data for `fill-array-data`.
    FillArrayDataPayload { element_width: u16, data: Vec<u8> },

    /// A `0xfa`..`0xff` range instruction (method handles, call sites).
    /// Decoded with the correct width so the stream stays aligned, but
    /// carrying no operands; translation reports it as unsupported.
    NotTranslatable { opcode: u8, units: usize },
}

impl Instruction for Instr {
    fn mnemonic(&self) -> &'static str {
        match self {
            Self::Nop => "nop",
            Self::Move(..) => "move",
            Self::MoveFrom16(..) => "move/from16",
            Self::Move16(..) => "move/16",
            Self::MoveWide(..) => "move-wide",
            Self::MoveWideFrom16(..) => "move-wide/from16",
            Self::MoveWide16(..) => "move-wide/16",
            Self::MoveObject(..) => "move-object",
            Self::MoveObjectFrom16(..) => "move-object/from16",
            Self::MoveObject16(..) => "move-object/16",
            Self::MoveResult(..) => "move-result",
            Self::MoveResultWide(..) => "move-result-wide",
            Self::MoveResultObject(..) => "move-result-object",
            Self::MoveException(..) => "move-exception",
            Self::ReturnVoid => "return-void",
            Self::Return(..) => "return",
            Self::ReturnWide(..) => "return-wide",
            Self::ReturnObject(..) => "return-object",
            Self::Const4(..) => "const/4",
            Self::Const16(..) => "const/16",
            Self::Const(..) => "const",
            Self::ConstHigh16(..) => "const/high16",
            Self::ConstWide16(..) => "const-wide/16",
            Self::ConstWide32(..) => "const-wide/32",
            Self::ConstWide(..) => "const-wide",
            Self::ConstWideHigh16(..) => "const-wide/high16",
            Self::ConstString(..) => "const-string",
            Self::ConstStringJumbo(..) => "const-string/jumbo",
            Self::ConstClass(..) => "const-class",
            Self::MonitorEnter(..) => "monitor-enter",
            Self::MonitorExit(..) => "monitor-exit",
            Self::CheckCast(..) => "check-cast",
            Self::InstanceOf(..) => "instance-of",
            Self::ArrayLength(..) => "array-length",
            Self::NewInstance(..) => "new-instance",
            Self::NewArray(..) => "new-array",
            Self::FilledNewArray(..) => "filled-new-array",
            Self::FilledNewArrayRange(..) => "filled-new-array/range",
            Self::FillArrayData(..) => "fill-array-data",
            Self::Throw(..) => "throw",
            Self::Goto(..) => "goto",
            Self::Goto16(..) => "goto/16",
            Self::Goto32(..) => "goto/32",
            Self::PackedSwitch(..) => "packed-switch",
            Self::SparseSwitch(..) => "sparse-switch",
            Self::Cmp(kind, ..) => match kind {
                CmpKind::LtFloat => "cmpl-float",
                CmpKind::GtFloat => "cmpg-float",
                CmpKind::LtDouble => "cmpl-double",
                CmpKind::GtDouble => "cmpg-double",
                CmpKind::Long => "cmp-long",
            },
            Self::If(test, ..) => match test {
                Test::Eq => "if-eq",
                Test::Ne => "if-ne",
                Test::Lt => "if-lt",
                Test::Ge => "if-ge",
                Test::Gt => "if-gt",
                Test::Le => "if-le",
            },
            Self::IfZ(test, ..) => match test {
                Test::Eq => "if-eqz",
                Test::Ne => "if-nez",
                Test::Lt => "if-ltz",
                Test::Ge => "if-gez",
                Test::Gt => "if-gtz",
                Test::Le => "if-lez",
            },
            Self::Aget(t, ..) => match t {
                AccessType::Word => "aget",
                AccessType::Wide => "aget-wide",
                AccessType::Object => "aget-object",
                AccessType::Boolean => "aget-boolean",
                AccessType::Byte => "aget-byte",
                AccessType::Char => "aget-char",
                AccessType::Short => "aget-short",
            },
            Self::Aput(t, ..) => match t {
                AccessType::Word => "aput",
                AccessType::Wide => "aput-wide",
                AccessType::Object => "aput-object",
                AccessType::Boolean => "aput-boolean",
                AccessType::Byte => "aput-byte",
                AccessType::Char => "aput-char",
                AccessType::Short => "aput-short",
            },
            Self::Iget(t, ..) => match t {
                AccessType::Word => "iget",
                AccessType::Wide => "iget-wide",
                AccessType::Object => "iget-object",
                AccessType::Boolean => "iget-boolean",
                AccessType::Byte => "iget-byte",
                AccessType::Char => "iget-char",
                AccessType::Short => "iget-short",
            },
            Self::Iput(t, ..) => match t {
                AccessType::Word => "iput",
                AccessType::Wide => "iput-wide",
                AccessType::Object => "iput-object",
                AccessType::Boolean => "iput-boolean",
                AccessType::Byte => "iput-byte",
                AccessType::Char => "iput-char",
                AccessType::Short => "iput-short",
            },
            Self::Sget(t, ..) => match t {
                AccessType::Word => "sget",
                AccessType::Wide => "sget-wide",
                AccessType::Object => "sget-object",
                AccessType::Boolean => "sget-boolean",
                AccessType::Byte => "sget-byte",
                AccessType::Char => "sget-char",
                AccessType::Short => "sget-short",
            },
            Self::Sput(t, ..) => match t {
                AccessType::Word => "sput",
                AccessType::Wide => "sput-wide",
                AccessType::Object => "sput-object",
                AccessType::Boolean => "sput-boolean",
                AccessType::Byte => "sput-byte",
                AccessType::Char => "sput-char",
                AccessType::Short => "sput-short",
            },
            Self::Invoke(kind, ..) => kind.name(),
            Self::InvokeRange(kind, ..) => match kind {
                InvokeKind::Virtual => "invoke-virtual/range",
                InvokeKind::Super => "invoke-super/range",
                InvokeKind::Direct => "invoke-direct/range",
                InvokeKind::Static => "invoke-static/range",
                InvokeKind::Interface => "invoke-interface/range",
            },
            Self::Unop(op, ..) => op.name(),
            Self::Binop(op, ..) => op.name(),
            Self::Binop2Addr(..) => "binop/2addr",
            Self::BinopLit16(op, ..) => match op {
                LitOp::Rsub => "rsub-int",
                _ => op.name(),
            },
            Self::BinopLit8(..) => "binop/lit8",
            Self::PackedSwitchPayload { .. } => "packed-switch-payload",
            Self::SparseSwitchPayload { .. } => "sparse-switch-payload",
            Self::FillArrayDataPayload { .. } => "fill-array-data-payload",
            Self::NotTranslatable { .. } => "not-translatable",
        }
    }

    fn size(&self) -> usize {
        match self {
            Self::Nop
            | Self::Move(..)
            | Self::MoveWide(..)
            | Self::MoveObject(..)
            | Self::MoveResult(..)
            | Self::MoveResultWide(..)
            | Self::MoveResultObject(..)
            | Self::MoveException(..)
            | Self::ReturnVoid
            | Self::Return(..)
            | Self::ReturnWide(..)
            | Self::ReturnObject(..)
            | Self::Const4(..)
            | Self::MonitorEnter(..)
            | Self::MonitorExit(..)
            | Self::ArrayLength(..)
            | Self::Throw(..)
            | Self::Goto(..)
            | Self::Unop(..)
            | Self::Binop2Addr(..) => 1,

            Self::MoveFrom16(..)
            | Self::MoveWideFrom16(..)
            | Self::MoveObjectFrom16(..)
            | Self::Const16(..)
            | Self::ConstHigh16(..)
            | Self::ConstWide16(..)
            | Self::ConstWideHigh16(..)
            | Self::ConstString(..)
            | Self::ConstClass(..)
            | Self::CheckCast(..)
            | Self::InstanceOf(..)
            | Self::NewInstance(..)
            | Self::NewArray(..)
            | Self::Goto16(..)
            | Self::Cmp(..)
            | Self::If(..)
            | Self::IfZ(..)
            | Self::Aget(..)
            | Self::Aput(..)
            | Self::Iget(..)
            | Self::Iput(..)
            | Self::Sget(..)
            | Self::Sput(..)
            | Self::Binop(..)
            | Self::BinopLit16(..)
            | Self::BinopLit8(..) => 2,

            Self::Move16(..)
            | Self::MoveWide16(..)
            | Self::MoveObject16(..)
            | Self::Const(..)
            | Self::ConstWide32(..)
            | Self::ConstStringJumbo(..)
            | Self::FilledNewArray(..)
            | Self::FilledNewArrayRange(..)
            | Self::FillArrayData(..)
            | Self::Goto32(..)
            | Self::PackedSwitch(..)
            | Self::SparseSwitch(..)
            | Self::Invoke(..)
            | Self::InvokeRange(..) => 3,

            Self::ConstWide(..) => 5,

            Self::PackedSwitchPayload { targets, .. } => 4 + 2 * targets.len(),
            Self::SparseSwitchPayload { keys, targets } => 2 + 2 * (keys.len() + targets.len()),
            Self::FillArrayDataPayload { data, .. } => 4 + (data.len() + 1) / 2,
            Self::NotTranslatable { units, .. } => *units,
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_follow_formats() {
        assert_eq!(Instr::Nop.size(), 1);
        assert_eq!(Instr::Move(Reg::from(0u8), Reg::from(1u8)).size(), 1);
        assert_eq!(Instr::Const16(Reg::from(0u8), 42).size(), 2);
        assert_eq!(Instr::Const(Reg::from(0u8), 42).size(), 3);
        assert_eq!(Instr::ConstWide(Reg::from(0u8), 42).size(), 5);
    }

    #[test]
    fn payload_sizes() {
        let packed = Instr::PackedSwitchPayload {
            first_key: 0,
            targets: vec![4, 6, 8],
        };
        assert_eq!(packed.size(), 10);

        let filled = Instr::FillArrayDataPayload {
            element_width: 1,
            data: vec![1, 2, 3],
        };
        assert_eq!(filled.size(), 6);
    }

    #[test]
    fn grouped_mnemonics() {
        assert_eq!(
            Instr::Cmp(CmpKind::Long, Reg::from(0u8), Reg::from(1u8), Reg::from(2u8)).mnemonic(),
            "cmp-long"
        );
        assert_eq!(
            Instr::IfZ(Test::Eq, Reg::from(0u8), 2).mnemonic(),
            "if-eqz"
        );
    }
}
