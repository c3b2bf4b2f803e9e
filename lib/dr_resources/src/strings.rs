//! Resource string pools.
//!
//! Both the binary XML stream and the resources table carry shared string
//! pools; entries are referenced everywhere else by index. Strings are
//! decoded eagerly at parse time, UTF-8 and UTF-16 flavors included.

use crate::errors::{ResourcesError, ResourcesResult};
use std::fmt;

/// A typed index into a [`StringPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StringPoolIndex(usize);

impl StringPoolIndex {
    pub(crate) const fn new(idx: usize) -> Self {
        Self(idx)
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StringPoolIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct StringPool {
    pub(crate) sorted: bool,
    pub(crate) utf8: bool,
    pub(crate) strings: Vec<String>,
}

impl StringPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, idx: StringPoolIndex) -> ResourcesResult<&str> {
        self.strings
            .get(idx.0)
            .map(String::as_str)
            .ok_or_else(|| ResourcesError::ResNotFound(format!("string pool entry {idx}")))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    #[inline]
    #[must_use]
    pub const fn is_utf8(&self) -> bool {
        self.utf8
    }

    #[inline]
    #[must_use]
    pub const fn is_sorted(&self) -> bool {
        self.sorted
    }
}
