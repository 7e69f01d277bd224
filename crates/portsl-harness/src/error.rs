//! Harness error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    SharedLibrary(#[from] portsl_core::SlError),
    #[error("invalid symbol spec '{0}': expected NAME or NAME:SIGNATURE")]
    SymbolSpec(String),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
