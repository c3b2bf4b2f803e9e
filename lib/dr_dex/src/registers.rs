//! Types definitions to address Dalvik registers.
//!
//! In Dalvik bytecode, registers (or register pairs) are addressed either
//! on 4, 8 or 16 bits depending on the instruction format. The [`Reg`]
//! wrapper over a 16-bit integer unifies them, and registers groups (lists
//! or ranges) cover the invoke-style formats.

use serde::Serialize;
use std::fmt;

/// The register type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Reg(u16);

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u8> for Reg {
    fn from(r: u8) -> Self {
        Self(u16::from(r))
    }
}

impl From<u16> for Reg {
    fn from(r: u16) -> Self {
        Self(r)
    }
}

impl Reg {
    /// Returns the wrapped register slot number.
    #[inline]
    #[must_use]
    pub const fn number(self) -> u16 {
        self.0
    }
}

/// An explicit register list, as carried by `35c`-format instructions
/// (at most 5 registers).
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct RegList(pub(crate) Vec<Reg>);

impl RegList {
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = Reg> + '_ {
        self.0.iter().copied()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RegList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, r) in self.0.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{r}")?;
        }
        write!(f, "}}")
    }
}

/// A contiguous register range, as carried by `3rc`-format instructions.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RegRange {
    pub(crate) first: u16,
    pub(crate) count: u16,
}

impl RegRange {
    #[inline]
    #[must_use]
    pub const fn first(self) -> u16 {
        self.first
    }

    #[inline]
    #[must_use]
    pub const fn count(self) -> u16 {
        self.count
    }

    #[inline]
    pub fn iter(self) -> impl Iterator<Item = Reg> {
        (self.first..self.first + self.count).map(Reg)
    }
}

impl fmt::Display for RegRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.count == 0 {
            write!(f, "{{}}")
        } else {
            write!(
                f,
                "{{v{} .. v{}}}",
                self.first,
                self.first + self.count - 1
            )
        }
    }
}
