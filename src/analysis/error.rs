use thiserror::Error;
use validator::ValidationErrors;

/// Input the analyzer cannot work with
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
