/// Errors that can occur while constructing an index.
///
/// Input-too-small and cancellation are the only two fatal, recoverable
/// build failures; allocation failure is left to panic like everywhere else
/// in Rust, and arithmetic overflow cannot occur by construction (the
/// Mersenne reduction keeps fingerprints bounded).
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("input too short: need at least {needed} bytes, got {len}")]
    InputTooShort { len: usize, needed: usize },
    #[error("build was cancelled")]
    Cancelled,
}

/// Errors that can occur while answering a query against a built index.
#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("index {index} out of range for text of length {len}")]
    OutOfRange { index: u64, len: u64 },
}

pub type BuildResult<T> = Result<T, BuildError>;
pub type QueryResult<T> = Result<T, QueryError>;
