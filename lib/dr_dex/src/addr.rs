use serde::Serialize;
use std::fmt;

/// A bytecode address, in 16-bit code units from the start of a method's
/// instruction buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Addr(pub usize);

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

impl Addr {
    #[must_use]
    pub fn offset(self, diff: i32) -> Self {
        Self((self.0 as i64 + i64::from(diff)) as usize)
    }
}
