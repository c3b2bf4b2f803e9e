//! Dex errors definitions.

use std::{fmt, io};
use thiserror::Error;

/// An alias for result that can be a [`DexError`].
pub type DexResult<T> = Result<T, DexError>;

/// The Dex error type.
#[derive(Debug, Error)]
pub enum DexError {
    /// Error that can be returned when doing [I/O operations](std::io).
    #[error("IO error: {0}")]
    IO(#[from] io::Error),

    /// Error that can be returned when formatting dex parts.
    #[error("Formatting error: {0}")]
    Fmt(#[from] fmt::Error),

    /// Error that can be returned at parsing.
    #[error("parsing error")]
    Parsing(Vec<u8>, nom::error::ErrorKind),

    /// Invalid MUTF-8 string.
    #[error("invalid MUTF-8: {0}")]
    InvalidMutf8(String),

    #[error("dex structure is invalid: {0}")]
    Structure(String),

    #[error("dex file magic is invalid")]
    BadMagic,

    #[error("dex {0} has invalid offset")]
    InvalidOffset(String),

    #[error("resource not found in dex tables: {0}")]
    ResNotFound(String),

    #[error("invalid type descriptor: {0}")]
    InvalidType(String),

    #[error("unknown dalvik opcode {opcode:#04x} at code unit {unit}")]
    UnknownOpcode { opcode: u8, unit: usize },
}

impl nom::error::ParseError<&[u8]> for DexError {
    fn from_error_kind(input: &[u8], kind: nom::error::ErrorKind) -> Self {
        let window = &input[..std::cmp::min(input.len(), 16)];
        Self::Parsing(window.to_vec(), kind)
    }

    fn append(_: &[u8], _: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}
