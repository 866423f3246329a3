//! Error types for efficiency I/O and the analysis pass

use thiserror::Error;

/// mtrana error type
#[derive(Error, Debug)]
pub enum Error {
    /// Error raised by the efficiency core
    #[error(transparent)]
    Core(#[from] mtrcore::error::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed line in one of the text formats, lines are counted from 1
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    /// Binary snapshot could not be encoded or decoded
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// No seed configured and the operating system random source failed
    #[error("random source unavailable: {0}")]
    RandomSource(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
