use thiserror::Error;

pub type ShimResult<T> = Result<T, ShimError>;

#[derive(Debug, Error)]
pub enum ShimError {
    /// An operation invalid for the current lifecycle state.
    #[error("lifecycle misuse: {0}")]
    Lifecycle(String),

    /// No variant of a requested resource could be produced.
    #[error("resource missing: {0}")]
    ResourceMissing(String),

    #[error("no container with id {0:#x} in the view hierarchy")]
    MissingContainer(i32),

    #[error("cannot inflate layout: {0}")]
    Inflate(String),
}
