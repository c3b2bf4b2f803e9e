//! Dalvik to host-VM lowering.
//!
//! Dalvik is a register machine; the host unit is a stack machine over
//! typed locals. Every Dalvik register maps to one host local (argument
//! registers, which Dalvik places at the top of the frame, are shifted
//! to the head of the local table), and each Dalvik instruction lowers
//! to a short load/operate/store burst that leaves the operand stack
//! empty. Stack and local maxima fall out of that invariant and are
//! computed during emission; no typed frame reconstruction is attempted.

use crate::errors::{LoaderError, LoaderResult};
use crate::host::{
    descriptor_width, descriptor_widths, ArithOp, CmpFlavor, CmpWith, Cond, ConstEntry,
    ConstIndex, ConstPool, HostBody, HostClass, HostField, HostHandler, HostInsn, HostMethod,
    IntTrunc, InvokeFlavor, NumKind, Width,
};
use dr_dex::classes::{AccessFlags, ClassDefItem};
use dr_dex::code::CodeItem;
use dr_dex::errors::DexError;
use dr_dex::instrs::{
    AccessType, BinOp, CmpKind, Instr, InvokeKind, LabeledInstr, LitOp, Test, UnOp,
};
use dr_dex::methods::EncodedMethod;
use dr_dex::registers::Reg;
use dr_dex::{Dex, DexIndex};
use std::collections::BTreeMap;

/// Per-dex translation outcome counts.
#[derive(Debug, Default, Clone, Copy)]
pub struct TranslateStats {
    pub translated: usize,
    pub failed: usize,
}

/// Translates every class of a dex file. A class whose translation fails
/// is skipped and counted; the batch continues.
pub fn translate_dex(dex: &Dex) -> (Vec<HostClass>, TranslateStats) {
    let mut classes = Vec::new();
    let mut stats = TranslateStats::default();

    for def in dex.iter_class_defs() {
        let name = def
            .descriptor(dex)
            .map(descriptor_to_internal)
            .unwrap_or_else(|_| "<unreadable>".to_string());
        match translate_class(dex, def) {
            Ok(class) => {
                stats.translated += 1;
                classes.push(class);
            }
            Err(err) => {
                stats.failed += 1;
                log::warn!("skipping class {name}: {err}");
            }
        }
    }

    log::info!(
        "translated {} classes, {} failed",
        stats.translated,
        stats.failed
    );
    (classes, stats)
}

/// Converts a type descriptor to an internal name: `Lcom/foo/Bar;`
/// becomes `com/foo/Bar`. Array descriptors are kept as-is.
#[must_use]
pub fn descriptor_to_internal(descriptor: &str) -> String {
    descriptor
        .strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
        .map_or_else(|| descriptor.to_string(), str::to_string)
}

fn translate_class(dex: &Dex, def: &ClassDefItem) -> LoaderResult<HostClass> {
    let name = descriptor_to_internal(def.descriptor(dex)?);
    let super_name = def
        .superclass_descriptor(dex)?
        .map(descriptor_to_internal);
    let interfaces = def
        .iter_interfaces()
        .map(|idx| Ok(descriptor_to_internal(idx.get(dex)?.descriptor(dex)?)))
        .collect::<Result<Vec<_>, DexError>>()?;

    let mut pool = ConstPool::new();

    let fields = def
        .iter_fields()
        .map(|field| {
            let id = field.id(dex)?;
            Ok(HostField {
                name: id.name(dex)?.to_string(),
                descriptor: id.type_descriptor(dex)?.to_string(),
                access: field.access_flags().bits(),
            })
        })
        .collect::<Result<Vec<_>, DexError>>()?;

    let methods = def
        .iter_methods()
        .map(|method| translate_method(dex, &name, method, &mut pool))
        .collect::<LoaderResult<Vec<_>>>()?;

    Ok(HostClass {
        name,
        super_name,
        interfaces,
        access: def.access_flags().bits(),
        fields,
        methods,
        pool,
    })
}

fn translate_method(
    dex: &Dex,
    class_name: &str,
    method: &EncodedMethod,
    pool: &mut ConstPool,
) -> LoaderResult<HostMethod> {
    let id = method.id(dex)?;
    let name = id.name(dex)?.to_string();
    let descriptor = id.descriptor(dex)?;
    let access = method.access_flags().bits();

    let bodiless = method
        .access_flags()
        .intersects(AccessFlags::NATIVE | AccessFlags::ABSTRACT);

    let body = match (bodiless, method.code()) {
        (true, _) | (false, None) => None,
        (false, Some(code)) => {
            let translator = MethodTranslator::new(dex, class_name, &name, code, pool);
            Some(translator.run()?)
        }
    };

    Ok(HostMethod {
        name,
        descriptor,
        access,
        body,
    })
}

struct MethodTranslator<'a> {
    dex: &'a Dex,
    class_name: &'a str,
    method_name: &'a str,
    code: &'a CodeItem,
    pool: &'a mut ConstPool,
    insns: Vec<HostInsn>,
    addr_to_index: BTreeMap<usize, usize>,
    depth: u16,
    max_depth: u16,
}

impl<'a> MethodTranslator<'a> {
    fn new(
        dex: &'a Dex,
        class_name: &'a str,
        method_name: &'a str,
        code: &'a CodeItem,
        pool: &'a mut ConstPool,
    ) -> Self {
        Self {
            dex,
            class_name,
            method_name,
            code,
            pool,
            insns: Vec::new(),
            addr_to_index: BTreeMap::new(),
            depth: 0,
            max_depth: 0,
        }
    }

    fn unsupported(&self, reason: impl Into<String>) -> LoaderError {
        LoaderError::Unsupported {
            class: self.class_name.to_string(),
            method: self.method_name.to_string(),
            reason: reason.into(),
        }
    }

    /// Maps a Dalvik register to its host local slot. Dalvik puts the
    /// `ins_size` argument registers at the top of the frame; host
    /// locals put them first.
    fn slot(&self, reg: Reg) -> u16 {
        let r = reg.number() as usize;
        let regs = self.code.registers_size();
        let ins = self.code.ins_size();
        let slot = if r >= regs - ins {
            r - (regs - ins)
        } else {
            r + ins
        };
        slot as u16
    }

    fn emit(&mut self, insn: HostInsn) {
        let (pops, pushes) = self.stack_effect(&insn);
        self.depth = self.depth.saturating_sub(pops);
        self.depth += pushes;
        self.max_depth = self.max_depth.max(self.depth);
        self.insns.push(insn);
    }

    fn load(&mut self, reg: Reg, width: Width) {
        let slot = self.slot(reg);
        self.emit(HostInsn::Load { slot, width });
    }

    fn store(&mut self, reg: Reg, width: Width) {
        let slot = self.slot(reg);
        self.emit(HostInsn::Store { slot, width });
    }

    #[allow(clippy::match_same_arms)]
    fn stack_effect(&self, insn: &HostInsn) -> (u16, u16) {
        match insn {
            HostInsn::PushInt(_) | HostInsn::PushFloat(_) | HostInsn::PushNull => (0, 1),
            HostInsn::PushLong(_) | HostInsn::PushDouble(_) => (0, 2),
            HostInsn::Push(_) => (0, 1),
            HostInsn::Load { width, .. } => (0, width.slots()),
            HostInsn::Store { width, .. } => (width.slots(), 0),
            HostInsn::ArrayGet(t) => (2, if t.is_wide() { 2 } else { 1 }),
            HostInsn::ArrayPut(t) => (2 + if t.is_wide() { 2 } else { 1 }, 0),
            HostInsn::ArrayLength => (1, 1),
            HostInsn::NewInstance(_) => (0, 1),
            HostInsn::NewArray(_) => (1, 1),
            HostInsn::NewFilledArray { count, .. } => (*count, 1),
            HostInsn::FillArray(_) => (1, 0),
            HostInsn::GetField(idx) => (1, self.const_width(*idx)),
            HostInsn::PutField(idx) => (1 + self.const_width(*idx), 0),
            HostInsn::GetStatic(idx) => (0, self.const_width(*idx)),
            HostInsn::PutStatic(idx) => (self.const_width(*idx), 0),
            HostInsn::Invoke { flavor, method } => self.invoke_effect(*flavor, *method),
            HostInsn::Arith { op, kind } => {
                let w = kind.width().slots();
                let pops = match op {
                    ArithOp::Neg | ArithOp::Not => w,
                    ArithOp::Shl | ArithOp::Shr | ArithOp::Ushr => w + 1,
                    _ => 2 * w,
                };
                (pops, w)
            }
            HostInsn::Convert { from, to } => (from.width().slots(), to.width().slots()),
            HostInsn::Truncate(_) => (1, 1),
            HostInsn::Cmp(flavor) => (2 * flavor.operand_width().slots(), 1),
            HostInsn::Goto { .. } => (0, 0),
            HostInsn::BranchIf { with, operand, .. } => {
                let each = operand.slots();
                match with {
                    CmpWith::Zero => (each, 0),
                    CmpWith::Value => (2 * each, 0),
                }
            }
            HostInsn::Switch { .. } => (1, 0),
            HostInsn::CheckCast(_) | HostInsn::InstanceOf(_) => (1, 1),
            HostInsn::Throw | HostInsn::MonitorEnter | HostInsn::MonitorExit => (1, 0),
            HostInsn::Return(width) => (width.map_or(0, Width::slots), 0),
            HostInsn::Pop(width) => (width.slots(), 0),
        }
    }

    fn const_width(&self, idx: ConstIndex) -> u16 {
        match self.pool.get(idx) {
            Some(ConstEntry::FieldRef { descriptor, .. }) => descriptor_width(descriptor).slots(),
            _ => 1,
        }
    }

    fn invoke_effect(&self, flavor: InvokeFlavor, method: ConstIndex) -> (u16, u16) {
        let Some(ConstEntry::MethodRef { descriptor, .. }) = self.pool.get(method) else {
            return (0, 0);
        };
        let Some((params, ret)) = descriptor_widths(descriptor) else {
            return (0, 0);
        };
        let mut pops: u16 = params.iter().map(|w| w.slots()).sum();
        if flavor != InvokeFlavor::Static {
            pops += 1;
        }
        (pops, ret.map_or(0, |w| w.slots()))
    }

    fn run(mut self) -> LoaderResult<HostBody> {
        let insn_list: Vec<&LabeledInstr> = self.code.iter_instructions().collect();

        let mut i = 0;
        while i < insn_list.len() {
            let labeled = insn_list[i];
            self.addr_to_index
                .insert(labeled.addr().0, self.insns.len());
            let next = insn_list.get(i + 1).copied();
            let consumed_next = self.lower(labeled, next)?;
            if consumed_next {
                if let Some(next) = next {
                    self.addr_to_index
                        .insert(next.addr().0, self.insns.len().saturating_sub(1));
                }
                i += 2;
            } else {
                i += 1;
            }
        }

        let total_units: usize = insn_list
            .last()
            .map_or(0, |last| last.next_addr().0);

        self.fixup_branches(total_units)?;
        let handlers = self.build_handlers(total_units)?;

        Ok(HostBody {
            insns: self.insns,
            handlers,
            max_stack: self.max_depth,
            max_locals: self.code.registers_size() as u16,
        })
    }

    /// Lowers one Dalvik instruction. Returns `true` when the following
    /// instruction (a `move-result` variant) was folded in.
    #[allow(clippy::too_many_lines)]
    fn lower(
        &mut self,
        labeled: &LabeledInstr,
        next: Option<&LabeledInstr>,
    ) -> LoaderResult<bool> {
        let addr = labeled.addr().0;

        match labeled.instr() {
            Instr::Nop
            | Instr::PackedSwitchPayload { .. }
            | Instr::SparseSwitchPayload { .. }
            | Instr::FillArrayDataPayload { .. } => {}

            Instr::Move(dst, src) | Instr::MoveFrom16(dst, src) | Instr::Move16(dst, src) => {
                self.load(*src, Width::Single);
                self.store(*dst, Width::Single);
            }
            Instr::MoveWide(dst, src)
            | Instr::MoveWideFrom16(dst, src)
            | Instr::MoveWide16(dst, src) => {
                self.load(*src, Width::Wide);
                self.store(*dst, Width::Wide);
            }
            Instr::MoveObject(dst, src)
            | Instr::MoveObjectFrom16(dst, src)
            | Instr::MoveObject16(dst, src) => {
                self.load(*src, Width::Ref);
                self.store(*dst, Width::Ref);
            }

            Instr::MoveResult(_) | Instr::MoveResultWide(_) | Instr::MoveResultObject(_) => {
                return Err(self.unsupported("move-result without a preceding invoke"));
            }
            Instr::MoveException(reg) => {
                // The handler entry sequence starts with the thrown
                // exception on the stack.
                self.depth = 1;
                self.max_depth = self.max_depth.max(1);
                self.store(*reg, Width::Ref);
            }

            Instr::ReturnVoid => self.emit(HostInsn::Return(None)),
            Instr::Return(reg) => {
                self.load(*reg, Width::Single);
                self.emit(HostInsn::Return(Some(Width::Single)));
            }
            Instr::ReturnWide(reg) => {
                self.load(*reg, Width::Wide);
                self.emit(HostInsn::Return(Some(Width::Wide)));
            }
            Instr::ReturnObject(reg) => {
                self.load(*reg, Width::Ref);
                self.emit(HostInsn::Return(Some(Width::Ref)));
            }

            Instr::Const4(reg, lit) => {
                self.emit(HostInsn::PushInt(i32::from(*lit)));
                self.store(*reg, Width::Single);
            }
            Instr::Const16(reg, lit) => {
                self.emit(HostInsn::PushInt(i32::from(*lit)));
                self.store(*reg, Width::Single);
            }
            Instr::Const(reg, lit) => {
                self.emit(HostInsn::PushInt(*lit));
                self.store(*reg, Width::Single);
            }
            Instr::ConstHigh16(reg, lit) => {
                self.emit(HostInsn::PushInt(i32::from(*lit) << 16));
                self.store(*reg, Width::Single);
            }
            Instr::ConstWide16(reg, lit) => {
                self.emit(HostInsn::PushLong(i64::from(*lit)));
                self.store(*reg, Width::Wide);
            }
            Instr::ConstWide32(reg, lit) => {
                self.emit(HostInsn::PushLong(i64::from(*lit)));
                self.store(*reg, Width::Wide);
            }
            Instr::ConstWide(reg, lit) => {
                self.emit(HostInsn::PushLong(*lit));
                self.store(*reg, Width::Wide);
            }
            Instr::ConstWideHigh16(reg, lit) => {
                self.emit(HostInsn::PushLong(i64::from(*lit) << 48));
                self.store(*reg, Width::Wide);
            }
            Instr::ConstString(reg, idx) | Instr::ConstStringJumbo(reg, idx) => {
                let value = idx.get(self.dex)?.value().to_string();
                let cp = self.pool.intern(ConstEntry::Str(value));
                self.emit(HostInsn::Push(cp));
                self.store(*reg, Width::Ref);
            }
            Instr::ConstClass(reg, idx) => {
                let cp = self.class_ref(*idx)?;
                self.emit(HostInsn::Push(cp));
                self.store(*reg, Width::Ref);
            }

            Instr::MonitorEnter(reg) => {
                self.load(*reg, Width::Ref);
                self.emit(HostInsn::MonitorEnter);
            }
            Instr::MonitorExit(reg) => {
                self.load(*reg, Width::Ref);
                self.emit(HostInsn::MonitorExit);
            }

            Instr::CheckCast(reg, idx) => {
                let cp = self.class_ref(*idx)?;
                self.load(*reg, Width::Ref);
                self.emit(HostInsn::CheckCast(cp));
                self.store(*reg, Width::Ref);
            }
            Instr::InstanceOf(dst, obj, idx) => {
                let cp = self.class_ref(*idx)?;
                self.load(*obj, Width::Ref);
                self.emit(HostInsn::InstanceOf(cp));
                self.store(*dst, Width::Single);
            }
            Instr::ArrayLength(dst, array) => {
                self.load(*array, Width::Ref);
                self.emit(HostInsn::ArrayLength);
                self.store(*dst, Width::Single);
            }
            Instr::NewInstance(reg, idx) => {
                let cp = self.class_ref(*idx)?;
                self.emit(HostInsn::NewInstance(cp));
                self.store(*reg, Width::Ref);
            }
            Instr::NewArray(dst, size, idx) => {
                let cp = self.array_component_ref(*idx)?;
                self.load(*size, Width::Single);
                self.emit(HostInsn::NewArray(cp));
                self.store(*dst, Width::Ref);
            }
            Instr::FilledNewArray(regs, idx) => {
                let cp = self.array_component_ref(*idx)?;
                let regs: Vec<Reg> = regs.iter().collect();
                for reg in &regs {
                    self.load(*reg, Width::Single);
                }
                self.emit(HostInsn::NewFilledArray {
                    component: cp,
                    count: regs.len() as u16,
                });
                return self.finish_result(Some(Width::Ref), next);
            }
            Instr::FilledNewArrayRange(range, idx) => {
                let cp = self.array_component_ref(*idx)?;
                let regs: Vec<Reg> = range.iter().collect();
                for reg in &regs {
                    self.load(*reg, Width::Single);
                }
                self.emit(HostInsn::NewFilledArray {
                    component: cp,
                    count: regs.len() as u16,
                });
                return self.finish_result(Some(Width::Ref), next);
            }
            Instr::FillArrayData(reg, off) => {
                let payload_addr = (addr as i64 + i64::from(*off)) as usize;
                let payload = self.code.instruction_at(dr_dex::Addr(payload_addr))?;
                let Instr::FillArrayDataPayload {
                    element_width,
                    data,
                } = payload.instr()
                else {
                    return Err(LoaderError::Structure(format!(
                        "fill-array-data at {addr:#x} points to a non-payload instruction"
                    )));
                };
                let cp = self.pool.intern(ConstEntry::ArrayData {
                    element_width: *element_width,
                    data: data.clone(),
                });
                self.load(*reg, Width::Ref);
                self.emit(HostInsn::FillArray(cp));
            }

            Instr::Throw(reg) => {
                self.load(*reg, Width::Ref);
                self.emit(HostInsn::Throw);
            }
            Instr::Goto(off) => {
                let target = (addr as i64 + i64::from(*off)) as usize;
                self.emit(HostInsn::Goto { target });
            }
            Instr::Goto16(off) => {
                let target = (addr as i64 + i64::from(*off)) as usize;
                self.emit(HostInsn::Goto { target });
            }
            Instr::Goto32(off) => {
                let target = (addr as i64 + i64::from(*off)) as usize;
                self.emit(HostInsn::Goto { target });
            }

            Instr::PackedSwitch(reg, off) => {
                let payload_addr = (addr as i64 + i64::from(*off)) as usize;
                let payload = self.code.instruction_at(dr_dex::Addr(payload_addr))?;
                let Instr::PackedSwitchPayload { first_key, targets } = payload.instr() else {
                    return Err(LoaderError::Structure(format!(
                        "packed-switch at {addr:#x} points to a non-payload instruction"
                    )));
                };
                let cases = targets
                    .iter()
                    .enumerate()
                    .map(|(k, t)| {
                        (
                            first_key.wrapping_add(k as i32),
                            (addr as i64 + i64::from(*t)) as usize,
                        )
                    })
                    .collect();
                let default = labeled.next_addr().0;
                self.load(*reg, Width::Single);
                self.emit(HostInsn::Switch { cases, default });
            }
            Instr::SparseSwitch(reg, off) => {
                let payload_addr = (addr as i64 + i64::from(*off)) as usize;
                let payload = self.code.instruction_at(dr_dex::Addr(payload_addr))?;
                let Instr::SparseSwitchPayload { keys, targets } = payload.instr() else {
                    return Err(LoaderError::Structure(format!(
                        "sparse-switch at {addr:#x} points to a non-payload instruction"
                    )));
                };
                let cases = keys
                    .iter()
                    .zip(targets)
                    .map(|(k, t)| (*k, (addr as i64 + i64::from(*t)) as usize))
                    .collect();
                let default = labeled.next_addr().0;
                self.load(*reg, Width::Single);
                self.emit(HostInsn::Switch { cases, default });
            }

            Instr::Cmp(kind, dst, a, b) => {
                let (flavor, width) = match kind {
                    CmpKind::LtFloat => (CmpFlavor::FloatL, Width::Single),
                    CmpKind::GtFloat => (CmpFlavor::FloatG, Width::Single),
                    CmpKind::LtDouble => (CmpFlavor::DoubleL, Width::Wide),
                    CmpKind::GtDouble => (CmpFlavor::DoubleG, Width::Wide),
                    CmpKind::Long => (CmpFlavor::LongCmp, Width::Wide),
                };
                self.load(*a, width);
                self.load(*b, width);
                self.emit(HostInsn::Cmp(flavor));
                self.store(*dst, Width::Single);
            }

            Instr::If(test, a, b, off) => {
                let target = (addr as i64 + i64::from(*off)) as usize;
                self.load(*a, Width::Single);
                self.load(*b, Width::Single);
                self.emit(HostInsn::BranchIf {
                    cond: cond_of(*test),
                    with: CmpWith::Value,
                    operand: Width::Single,
                    target,
                });
            }
            Instr::IfZ(test, a, off) => {
                let target = (addr as i64 + i64::from(*off)) as usize;
                self.load(*a, Width::Single);
                self.emit(HostInsn::BranchIf {
                    cond: cond_of(*test),
                    with: CmpWith::Zero,
                    operand: Width::Single,
                    target,
                });
            }

            Instr::Aget(t, value, array, index) => {
                self.load(*array, Width::Ref);
                self.load(*index, Width::Single);
                self.emit(HostInsn::ArrayGet(*t));
                self.store(*value, access_width(*t));
            }
            Instr::Aput(t, value, array, index) => {
                self.load(*array, Width::Ref);
                self.load(*index, Width::Single);
                self.load(*value, access_width(*t));
                self.emit(HostInsn::ArrayPut(*t));
            }

            Instr::Iget(_, dst, obj, idx) => {
                let (cp, width) = self.field_ref(*idx)?;
                self.load(*obj, Width::Ref);
                self.emit(HostInsn::GetField(cp));
                self.store(*dst, width);
            }
            Instr::Iput(_, src, obj, idx) => {
                let (cp, width) = self.field_ref(*idx)?;
                self.load(*obj, Width::Ref);
                self.load(*src, width);
                self.emit(HostInsn::PutField(cp));
            }
            Instr::Sget(_, dst, idx) => {
                let (cp, width) = self.field_ref(*idx)?;
                self.emit(HostInsn::GetStatic(cp));
                self.store(*dst, width);
            }
            Instr::Sput(_, src, idx) => {
                let (cp, width) = self.field_ref(*idx)?;
                self.load(*src, width);
                self.emit(HostInsn::PutStatic(cp));
            }

            Instr::Invoke(kind, regs, idx) => {
                let regs: Vec<Reg> = regs.iter().collect();
                return self.invoke(*kind, &regs, *idx, next);
            }
            Instr::InvokeRange(kind, range, idx) => {
                let regs: Vec<Reg> = range.iter().collect();
                return self.invoke(*kind, &regs, *idx, next);
            }

            Instr::Unop(op, dst, src) => self.unop(*op, *dst, *src),

            Instr::Binop(op, dst, a, b) => {
                let (arith, kind) = binop_parts(*op);
                let shift = matches!(arith, ArithOp::Shl | ArithOp::Shr | ArithOp::Ushr);
                self.load(*a, kind.width());
                self.load(*b, if shift { Width::Single } else { kind.width() });
                self.emit(HostInsn::Arith { op: arith, kind });
                self.store(*dst, kind.width());
            }
            Instr::Binop2Addr(op, a, b) => {
                let (arith, kind) = binop_parts(*op);
                let shift = matches!(arith, ArithOp::Shl | ArithOp::Shr | ArithOp::Ushr);
                self.load(*a, kind.width());
                self.load(*b, if shift { Width::Single } else { kind.width() });
                self.emit(HostInsn::Arith { op: arith, kind });
                self.store(*a, kind.width());
            }
            Instr::BinopLit16(op, dst, src, lit) => {
                self.binop_lit(*op, *dst, *src, i32::from(*lit));
            }
            Instr::BinopLit8(op, dst, src, lit) => {
                self.binop_lit(*op, *dst, *src, i32::from(*lit));
            }

            Instr::NotTranslatable { opcode, .. } => {
                return Err(self.unsupported(format!("opcode {opcode:#04x} has no lowering")));
            }
        }

        Ok(false)
    }

    fn unop(&mut self, op: UnOp, dst: Reg, src: Reg) {
        use NumKind::{Double, Float, Int, Long};

        let (insn, from, to) = match op {
            UnOp::NegInt => (HostInsn::Arith { op: ArithOp::Neg, kind: Int }, Int, Int),
            UnOp::NotInt => (HostInsn::Arith { op: ArithOp::Not, kind: Int }, Int, Int),
            UnOp::NegLong => (HostInsn::Arith { op: ArithOp::Neg, kind: Long }, Long, Long),
            UnOp::NotLong => (HostInsn::Arith { op: ArithOp::Not, kind: Long }, Long, Long),
            UnOp::NegFloat => (HostInsn::Arith { op: ArithOp::Neg, kind: Float }, Float, Float),
            UnOp::NegDouble => {
                (HostInsn::Arith { op: ArithOp::Neg, kind: Double }, Double, Double)
            }
            UnOp::IntToLong => (HostInsn::Convert { from: Int, to: Long }, Int, Long),
            UnOp::IntToFloat => (HostInsn::Convert { from: Int, to: Float }, Int, Float),
            UnOp::IntToDouble => (HostInsn::Convert { from: Int, to: Double }, Int, Double),
            UnOp::LongToInt => (HostInsn::Convert { from: Long, to: Int }, Long, Int),
            UnOp::LongToFloat => (HostInsn::Convert { from: Long, to: Float }, Long, Float),
            UnOp::LongToDouble => (HostInsn::Convert { from: Long, to: Double }, Long, Double),
            UnOp::FloatToInt => (HostInsn::Convert { from: Float, to: Int }, Float, Int),
            UnOp::FloatToLong => (HostInsn::Convert { from: Float, to: Long }, Float, Long),
            UnOp::FloatToDouble => {
                (HostInsn::Convert { from: Float, to: Double }, Float, Double)
            }
            UnOp::DoubleToInt => (HostInsn::Convert { from: Double, to: Int }, Double, Int),
            UnOp::DoubleToLong => (HostInsn::Convert { from: Double, to: Long }, Double, Long),
            UnOp::DoubleToFloat => {
                (HostInsn::Convert { from: Double, to: Float }, Double, Float)
            }
            UnOp::IntToByte => (HostInsn::Truncate(IntTrunc::ToByte), Int, Int),
            UnOp::IntToChar => (HostInsn::Truncate(IntTrunc::ToChar), Int, Int),
            UnOp::IntToShort => (HostInsn::Truncate(IntTrunc::ToShort), Int, Int),
        };

        self.load(src, from.width());
        self.emit(insn);
        self.store(dst, to.width());
    }

    fn binop_lit(&mut self, op: LitOp, dst: Reg, src: Reg, lit: i32) {
        if op == LitOp::Rsub {
            self.emit(HostInsn::PushInt(lit));
            self.load(src, Width::Single);
            self.emit(HostInsn::Arith {
                op: ArithOp::Sub,
                kind: NumKind::Int,
            });
        } else {
            self.load(src, Width::Single);
            self.emit(HostInsn::PushInt(lit));
            self.emit(HostInsn::Arith {
                op: litop_arith(op),
                kind: NumKind::Int,
            });
        }
        self.store(dst, Width::Single);
    }

    fn invoke(
        &mut self,
        kind: InvokeKind,
        regs: &[Reg],
        idx: dr_dex::Index<dr_dex::methods::MethodIdItem>,
        next: Option<&LabeledInstr>,
    ) -> LoaderResult<bool> {
        let id = idx.get(self.dex)?;
        let owner = descriptor_to_internal(id.class_descriptor(self.dex)?);
        let name = id.name(self.dex)?.to_string();
        let descriptor = id.descriptor(self.dex)?;

        let (params, ret) = descriptor_widths(&descriptor)
            .ok_or_else(|| self.unsupported(format!("malformed descriptor {descriptor}")))?;

        let flavor = match kind {
            InvokeKind::Virtual => InvokeFlavor::Virtual,
            InvokeKind::Super | InvokeKind::Direct => InvokeFlavor::Special,
            InvokeKind::Static => InvokeFlavor::Static,
            InvokeKind::Interface => InvokeFlavor::Interface,
        };

        let cp = self.pool.intern(ConstEntry::MethodRef {
            owner,
            name,
            descriptor,
            interface: flavor == InvokeFlavor::Interface,
        });

        let mut cursor = 0usize;
        if flavor != InvokeFlavor::Static {
            let this = *regs.get(cursor).ok_or_else(|| {
                self.unsupported("invoke register list too short for receiver")
            })?;
            self.load(this, Width::Ref);
            cursor += 1;
        }
        for width in &params {
            let reg = *regs.get(cursor).ok_or_else(|| {
                self.unsupported("invoke register list too short for arguments")
            })?;
            self.load(reg, *width);
            cursor += width.slots() as usize;
        }
        if cursor != regs.len() {
            return Err(self.unsupported(format!(
                "invoke register list has {} registers, descriptor consumes {cursor}",
                regs.len()
            )));
        }

        self.emit(HostInsn::Invoke { flavor, method: cp });
        self.finish_result(ret, next)
    }

    /// Binds the produced value (if any) to the following `move-result`,
    /// or drops it. Returns whether the next instruction was consumed.
    fn finish_result(
        &mut self,
        ret: Option<Width>,
        next: Option<&LabeledInstr>,
    ) -> LoaderResult<bool> {
        let Some(ret) = ret else {
            return Ok(false);
        };

        let target = next.map(LabeledInstr::instr);
        match target {
            Some(Instr::MoveResult(reg))
            | Some(Instr::MoveResultWide(reg))
            | Some(Instr::MoveResultObject(reg)) => {
                self.store(*reg, ret);
                Ok(true)
            }
            _ => {
                self.emit(HostInsn::Pop(ret));
                Ok(false)
            }
        }
    }

    fn class_ref(
        &mut self,
        idx: dr_dex::Index<dr_dex::types::TypeIdItem>,
    ) -> LoaderResult<ConstIndex> {
        let descriptor = idx.get(self.dex)?.descriptor(self.dex)?;
        Ok(self
            .pool
            .intern(ConstEntry::ClassRef(descriptor_to_internal(descriptor))))
    }

    /// The component reference of an array type descriptor.
    fn array_component_ref(
        &mut self,
        idx: dr_dex::Index<dr_dex::types::TypeIdItem>,
    ) -> LoaderResult<ConstIndex> {
        let descriptor = idx.get(self.dex)?.descriptor(self.dex)?;
        let component = descriptor.strip_prefix('[').ok_or_else(|| {
            LoaderError::Structure(format!("new-array on non-array type {descriptor}"))
        })?;
        Ok(self
            .pool
            .intern(ConstEntry::ClassRef(component.to_string())))
    }

    fn field_ref(
        &mut self,
        idx: dr_dex::Index<dr_dex::fields::FieldIdItem>,
    ) -> LoaderResult<(ConstIndex, Width)> {
        let id = idx.get(self.dex)?;
        let owner = descriptor_to_internal(id.class_descriptor(self.dex)?);
        let name = id.name(self.dex)?.to_string();
        let descriptor = id.type_descriptor(self.dex)?.to_string();
        let width = descriptor_width(&descriptor);
        let cp = self.pool.intern(ConstEntry::FieldRef {
            owner,
            name,
            descriptor,
        });
        Ok((cp, width))
    }

    fn fixup_branches(&mut self, total_units: usize) -> LoaderResult<()> {
        let insn_count = self.insns.len();
        let addr_to_index = &self.addr_to_index;
        let resolve = |addr: usize| -> LoaderResult<usize> {
            if let Some(index) = addr_to_index.get(&addr) {
                Ok(*index)
            } else if addr == total_units {
                Ok(insn_count)
            } else {
                Err(LoaderError::Structure(format!(
                    "branch into the middle of an instruction at unit {addr:#x}"
                )))
            }
        };

        let mut fixed = Vec::with_capacity(insn_count);
        for insn in self.insns.drain(..) {
            let insn = match insn {
                HostInsn::Goto { target } => HostInsn::Goto {
                    target: resolve(target)?,
                },
                HostInsn::BranchIf {
                    cond,
                    with,
                    operand,
                    target,
                } => HostInsn::BranchIf {
                    cond,
                    with,
                    operand,
                    target: resolve(target)?,
                },
                HostInsn::Switch { cases, default } => HostInsn::Switch {
                    cases: cases
                        .into_iter()
                        .map(|(k, t)| Ok((k, resolve(t)?)))
                        .collect::<LoaderResult<Vec<_>>>()?,
                    default: resolve(default)?,
                },
                other => other,
            };
            fixed.push(insn);
        }
        self.insns = fixed;
        Ok(())
    }

    fn build_handlers(&self, total_units: usize) -> LoaderResult<Vec<HostHandler>> {
        let resolve = |addr: usize| -> LoaderResult<usize> {
            if let Some(index) = self.addr_to_index.get(&addr) {
                Ok(*index)
            } else if addr >= total_units {
                Ok(self.insns.len())
            } else {
                Err(LoaderError::Structure(format!(
                    "handler boundary inside an instruction at unit {addr:#x}"
                )))
            }
        };

        let mut handlers = Vec::new();
        for try_item in self.code.iter_tries() {
            let start = resolve(try_item.start_addr().0)?;
            let end = resolve(try_item.end_addr().0)?;
            let catch = self.code.handler(try_item)?;

            for (descriptor, addr) in catch.typed_handlers(self.dex)? {
                handlers.push(HostHandler {
                    start,
                    end,
                    target: resolve(addr)?,
                    catch_type: Some(descriptor_to_internal(descriptor)),
                });
            }
            if let Some(addr) = catch.catch_all_addr() {
                handlers.push(HostHandler {
                    start,
                    end,
                    target: resolve(addr)?,
                    catch_type: None,
                });
            }
        }
        Ok(handlers)
    }
}

fn cond_of(test: Test) -> Cond {
    match test {
        Test::Eq => Cond::Eq,
        Test::Ne => Cond::Ne,
        Test::Lt => Cond::Lt,
        Test::Ge => Cond::Ge,
        Test::Gt => Cond::Gt,
        Test::Le => Cond::Le,
    }
}

fn access_width(t: AccessType) -> Width {
    match t {
        AccessType::Wide => Width::Wide,
        AccessType::Object => Width::Ref,
        _ => Width::Single,
    }
}

fn litop_arith(op: LitOp) -> ArithOp {
    match op {
        LitOp::Add => ArithOp::Add,
        LitOp::Rsub => ArithOp::Sub,
        LitOp::Mul => ArithOp::Mul,
        LitOp::Div => ArithOp::Div,
        LitOp::Rem => ArithOp::Rem,
        LitOp::And => ArithOp::And,
        LitOp::Or => ArithOp::Or,
        LitOp::Xor => ArithOp::Xor,
        LitOp::Shl => ArithOp::Shl,
        LitOp::Shr => ArithOp::Shr,
        LitOp::Ushr => ArithOp::Ushr,
    }
}

#[allow(clippy::too_many_lines)]
fn binop_parts(op: BinOp) -> (ArithOp, NumKind) {
    use ArithOp::{Add, And, Div, Mul, Or, Rem, Shl, Shr, Sub, Ushr, Xor};
    use NumKind::{Double, Float, Int, Long};

    match op {
        BinOp::AddInt => (Add, Int),
        BinOp::SubInt => (Sub, Int),
        BinOp::MulInt => (Mul, Int),
        BinOp::DivInt => (Div, Int),
        BinOp::RemInt => (Rem, Int),
        BinOp::AndInt => (And, Int),
        BinOp::OrInt => (Or, Int),
        BinOp::XorInt => (Xor, Int),
        BinOp::ShlInt => (Shl, Int),
        BinOp::ShrInt => (Shr, Int),
        BinOp::UshrInt => (Ushr, Int),
        BinOp::AddLong => (Add, Long),
        BinOp::SubLong => (Sub, Long),
        BinOp::MulLong => (Mul, Long),
        BinOp::DivLong => (Div, Long),
        BinOp::RemLong => (Rem, Long),
        BinOp::AndLong => (And, Long),
        BinOp::OrLong => (Or, Long),
        BinOp::XorLong => (Xor, Long),
        BinOp::ShlLong => (Shl, Long),
        BinOp::ShrLong => (Shr, Long),
        BinOp::UshrLong => (Ushr, Long),
        BinOp::AddFloat => (Add, Float),
        BinOp::SubFloat => (Sub, Float),
        BinOp::MulFloat => (Mul, Float),
        BinOp::DivFloat => (Div, Float),
        BinOp::RemFloat => (Rem, Float),
        BinOp::AddDouble => (Add, Double),
        BinOp::SubDouble => (Sub, Double),
        BinOp::MulDouble => (Mul, Double),
        BinOp::DivDouble => (Div, Double),
        BinOp::RemDouble => (Rem, Double),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_names() {
        assert_eq!(
            descriptor_to_internal("Lcom/example/Main;"),
            "com/example/Main"
        );
        assert_eq!(descriptor_to_internal("[I"), "[I");
        assert_eq!(
            descriptor_to_internal("[Ljava/lang/String;"),
            "[Ljava/lang/String;"
        );
    }

    #[test]
    fn binop_table_is_total() {
        // Spot-check the corners of the opcode-ordered table.
        assert_eq!(binop_parts(BinOp::AddInt), (ArithOp::Add, NumKind::Int));
        assert_eq!(binop_parts(BinOp::UshrLong), (ArithOp::Ushr, NumKind::Long));
        assert_eq!(binop_parts(BinOp::RemDouble), (ArithOp::Rem, NumKind::Double));
    }

    #[test]
    fn litop_rsub_maps_to_sub() {
        assert_eq!(litop_arith(LitOp::Rsub), ArithOp::Sub);
    }
}
