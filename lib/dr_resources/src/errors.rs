use std::{fmt, io};
use thiserror::Error;

pub type ResourcesResult<T> = Result<T, ResourcesError>;

#[derive(Debug, Error)]
pub enum ResourcesError {
    #[error("IO error: {0}")]
    IO(#[from] io::Error),

    #[error("Format error: {0}")]
    Fmt(#[from] fmt::Error),

    #[error("parsing error")]
    Parsing(Vec<u8>, nom::error::ErrorKind),

    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("invalid UTF-16: {0}")]
    InvalidUtf16(String),

    #[error("resources structure is invalid: {0}")]
    Structure(String),

    #[error("document is not well-formed: {0}")]
    MalformedDocument(String),

    #[error("resource not found in resources tables: {0}")]
    ResNotFound(String),

    #[error("resource reference cycle through @{0:#010x}")]
    ReferenceCycle(u32),

    #[error("unexpected value: {name} is {typ}")]
    UnexpectedValue { name: String, typ: String },

    #[error("value type error: {0}")]
    ValueType(String),
}

impl nom::error::ParseError<&[u8]> for ResourcesError {
    fn from_error_kind(input: &[u8], kind: nom::error::ErrorKind) -> Self {
        let window = &input[..std::cmp::min(input.len(), 16)];
        Self::Parsing(window.to_vec(), kind)
    }

    fn append(_: &[u8], _: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}
