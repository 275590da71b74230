use std::path::Path;

use arrow::error::ArrowError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CtxError>;

#[derive(Debug, Error)]
pub enum CtxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("format error: {0}")]
    Format(String),

    #[error("missing features: rows={rows:?}, columns={columns:?}")]
    MissingFeature {
        rows: Vec<String>,
        columns: Vec<String>,
    },

    #[error("invalid signature {name:?}: {reason}")]
    InvalidSignature { name: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("degenerate AUC distribution for signature {signature:?} (variance {variance:e})")]
    DegenerateInput { signature: String, variance: f64 },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("thread pool error: {0}")]
    ThreadPool(String),
}

impl CtxError {
    pub fn format(path: &Path, reason: impl std::fmt::Display) -> Self {
        CtxError::Format(format!("{}: {}", path.display(), reason))
    }

    pub fn from_arrow(path: &Path, err: ArrowError) -> Self {
        match err {
            ArrowError::IoError(_, io) => CtxError::Io(io),
            other => CtxError::format(path, other),
        }
    }

    pub fn is_format(&self) -> bool {
        matches!(self, CtxError::Format(_))
    }
}
