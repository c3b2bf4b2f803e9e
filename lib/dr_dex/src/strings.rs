//! Dex string pool items.

use crate::errors::{DexError, DexResult};
use crate::{Dex, DexCollection, DexIndex, Index};

/// An entry of the dex string identifiers pool. The MUTF-8 payload is
/// decoded once at parse time.
#[derive(Debug)]
pub struct StringIdItem {
    pub(crate) index: Index<StringIdItem>,
    pub(crate) value: String,
}

impl DexIndex for Index<StringIdItem> {
    type T = StringIdItem;

    fn get(self, dex: &Dex) -> DexResult<&Self::T> {
        dex.string_id_items
            .get(self.as_usize())
            .ok_or_else(|| DexError::ResNotFound("StringIdItem".to_string()))
    }
}

impl DexCollection for StringIdItem {
    type Idx = Index<Self>;

    fn index(&self) -> Self::Idx {
        self.index
    }
}

impl StringIdItem {
    #[inline]
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}
