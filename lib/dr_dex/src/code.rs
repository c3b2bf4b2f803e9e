//! Dalvik bytecode-related structures.

use crate::addr::Addr;
use crate::errors::{DexError, DexResult};
use crate::instrs::LabeledInstr;
use crate::types::TypeIdItem;
use crate::{Dex, Index};

/// A method body: register frame sizes, the decoded instruction stream
/// and the try/catch table.
#[derive(Debug)]
pub struct CodeItem {
    pub(crate) registers_size: usize,
    pub(crate) ins_size: usize,
    pub(crate) outs_size: usize,
    pub(crate) debug_info_off: Option<usize>,
    pub(crate) insns: Vec<LabeledInstr>,
    pub(crate) tries: Vec<TryItem>,
    pub(crate) handlers: Vec<CatchHandler>,
}

impl CodeItem {
    #[inline]
    #[must_use]
    pub const fn registers_size(&self) -> usize {
        self.registers_size
    }

    #[inline]
    #[must_use]
    pub const fn ins_size(&self) -> usize {
        self.ins_size
    }

    #[inline]
    #[must_use]
    pub const fn outs_size(&self) -> usize {
        self.outs_size
    }

    #[inline]
    #[must_use]
    pub const fn debug_info_off(&self) -> Option<usize> {
        self.debug_info_off
    }

    #[inline]
    #[must_use]
    pub fn instructions_count(&self) -> usize {
        self.insns.len()
    }

    #[inline]
    pub fn iter_instructions(&self) -> impl Iterator<Item = &LabeledInstr> {
        self.insns.iter()
    }

    pub fn instruction_at(&self, addr: Addr) -> DexResult<&LabeledInstr> {
        let index = self
            .insns
            .binary_search_by(|probe| probe.addr().cmp(&addr))
            .map_err(|_| DexError::InvalidOffset(format!("instruction at {addr}")))?;
        Ok(&self.insns[index])
    }

    #[inline]
    pub fn iter_tries(&self) -> impl Iterator<Item = &TryItem> {
        self.tries.iter()
    }

    pub fn handler(&self, try_item: &TryItem) -> DexResult<&CatchHandler> {
        self.handlers
            .get(try_item.handler_index)
            .ok_or_else(|| DexError::ResNotFound("CatchHandler".to_string()))
    }
}

/// A guarded instruction range. `handler_index` points into the owning
/// code item's handler list (resolved from the raw byte offset at parse
/// time).
#[derive(Debug)]
pub struct TryItem {
    pub(crate) start_addr: usize,
    pub(crate) insn_count: usize,
    pub(crate) handler_index: usize,
}

impl TryItem {
    #[inline]
    #[must_use]
    pub const fn start_addr(&self) -> Addr {
        Addr(self.start_addr)
    }

    #[inline]
    #[must_use]
    pub const fn end_addr(&self) -> Addr {
        Addr(self.start_addr + self.insn_count)
    }
}

/// The catch clauses of one guarded range: typed handlers in declaration
/// order, plus an optional catch-all address.
#[derive(Debug)]
pub struct CatchHandler {
    pub(crate) type_addr_pairs: Vec<(Index<TypeIdItem>, usize)>,
    pub(crate) catch_all_addr: Option<usize>,
}

impl CatchHandler {
    #[inline]
    pub fn iter_typed(&self) -> impl Iterator<Item = &(Index<TypeIdItem>, usize)> {
        self.type_addr_pairs.iter()
    }

    #[inline]
    #[must_use]
    pub const fn catch_all_addr(&self) -> Option<usize> {
        self.catch_all_addr
    }

    /// Returns the catch types as descriptors with their handler addresses.
    pub fn typed_handlers<'a>(&self, dex: &'a Dex) -> DexResult<Vec<(&'a str, usize)>> {
        self.type_addr_pairs
            .iter()
            .map(|(type_idx, addr)| {
                use crate::DexIndex;
                Ok((type_idx.get(dex)?.descriptor(dex)?, *addr))
            })
            .collect()
    }
}
