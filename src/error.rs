use thiserror::Error;

/// Why a single detector produced nothing. Never fatal to an analysis run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectorError {
    #[error("insufficient data: need {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("degenerate series: {0}")]
    Degenerate(&'static str),

    #[error("non-finite value at index {0}")]
    NonFinite(usize),
}
