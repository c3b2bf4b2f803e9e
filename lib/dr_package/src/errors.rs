use dr_dex::errors::DexError;
use dr_resources::errors::ResourcesError;
use std::io;
use thiserror::Error;

pub type PackageResult<T> = Result<T, PackageError>;

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("IO error: {0}")]
    IO(#[from] io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Dex(#[from] DexError),

    #[error(transparent)]
    Resources(#[from] ResourcesError),

    #[error("archive entry has an unusable name: {0}")]
    BadEntryName(String),

    #[error("archive entry not found: {0}")]
    EntryNotFound(String),

    #[error("session is closed")]
    SessionClosed,
}
