use std::path::PathBuf;

/// Failures surfaced by the analysis pipeline.
///
/// Numeric degeneracies (silence, constant loudness) are handled inside the
/// extractors and never show up here.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Audio file not found at: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("Audio signal is empty after loading")]
    EmptySignal,

    #[error("Resampling failed: {0}")]
    Resample(String),

    #[error("Invalid analysis configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
