//! Loader errors definitions.

use dr_dex::errors::DexError;
use thiserror::Error;

pub type LoaderResult<T> = Result<T, LoaderError>;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error(transparent)]
    Dex(#[from] DexError),

    /// A construct the translator has no lowering for. The owning class
    /// is skipped and counted; the batch continues.
    #[error("unsupported construct in {class}.{method}: {reason}")]
    Unsupported {
        class: String,
        method: String,
        reason: String,
    },

    #[error("inconsistent bytecode structure: {0}")]
    Structure(String),
}
