//! Android resources data structures and parsers.
//!
//! Two binary grammars live here: the chunked binary XML stream used for
//! the manifest and compiled layouts, and the `resources.arsc` table with
//! its configuration-qualified entries. On top of the table, the
//! [`config`] module implements qualifier best-match selection and
//! [`tables::ResourceTable::resolve`] chases references with a cycle
//! guard.

mod chunk;
mod parsers;

pub mod config;
pub mod errors;
pub mod manifest;
pub mod strings;
pub mod tables;
pub mod values;
pub mod xml;

pub use crate::parsers::{parse_table, parse_xml};

use crate::errors::ResourcesResult;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Opens and parses a binary XML document from a file.
pub fn open_xml<P: AsRef<Path>>(path: P) -> ResourcesResult<xml::Document> {
    let mut file = File::open(path)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    parse_xml(&contents)
}

/// Opens and parses a `resources.arsc` table from a file.
pub fn open_table<P: AsRef<Path>>(path: P) -> ResourcesResult<tables::ResourceTable> {
    let mut file = File::open(path)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    parse_table(&contents)
}
