//! Global error handling.
//!
//! Each sub-crate of the project defines its own error type; this module
//! unifies them for the driver façade and the command line tools. The
//! driver reports recoverable failures as error values and never aborts
//! the host process.

use dr_dex::errors::DexError;
use dr_loader::errors::LoaderError;
use dr_package::errors::PackageError;
use dr_resources::errors::ResourcesError;
use dr_shim::errors::ShimError;
use std::io;
use thiserror::Error;

/// An alias for result that can be a [`DrError`].
pub type DrResult<T> = Result<T, DrError>;

/// The main error type for error winding at the top-level.
#[derive(Debug, Error)]
pub enum DrError {
    /// Custom error for reporting bad command line arguments usage.
    #[error("bad arguments: {0}")]
    BadArguments(String),

    /// Error that can be returned from [I/O operations](std::io).
    #[error(transparent)]
    IO(#[from] io::Error),

    /// Error that can be returned from regex compilation.
    #[error(transparent)]
    Regex(#[from] regex::Error),

    /// Error that can be returned from [`dr_package`] functions.
    #[error(transparent)]
    Package(#[from] PackageError),

    /// Error that can be returned from [`dr_dex`] functions.
    #[error(transparent)]
    Dex(#[from] DexError),

    /// Error that can be returned from [`dr_resources`] functions.
    #[error(transparent)]
    Resources(#[from] ResourcesError),

    /// Error that can be returned from [`dr_loader`] functions.
    #[error(transparent)]
    Loader(#[from] LoaderError),

    /// Error that can be returned from [`dr_shim`] functions.
    #[error(transparent)]
    Shim(#[from] ShimError),

    /// Error that can be returned when encoding screenshots.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error("no launchable activity declared in the manifest")]
    NoLauncherActivity,

    #[error("activity class {0} is not present in the loaded application")]
    ActivityNotFound(String),

    #[error("no activity has been launched")]
    NotLaunched,

    #[error("no view with id {0:#x} in the window")]
    ViewNotFound(i32),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
