//! Pipeline stage errors.
//!
//! Plumbing inside each stage returns `anyhow::Result`; the stage boundary
//! wraps the failure in the variant naming the stage, so the poll driver can
//! report which step aborted the iteration.

/// Failure of one pipeline stage. Terminates the current iteration only.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Camera unreachable, non-success status, or undecodable payload.
    #[error("capture failed: {0:#}")]
    Capture(anyhow::Error),

    /// Model unreachable, reply unparsable, or required fields missing.
    #[error("classification failed: {0:#}")]
    Classification(anyhow::Error),

    /// Crop, encode or upload failure.
    #[error("archive failed: {0:#}")]
    Archive(anyhow::Error),

    /// Ledger creation or append failure.
    #[error("ledger write failed: {0:#}")]
    LogWrite(anyhow::Error),
}

impl PipelineError {
    /// Short stage name used in log lines.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Capture(_) => "capture",
            PipelineError::Classification(_) => "classify",
            PipelineError::Archive(_) => "archive",
            PipelineError::LogWrite(_) => "ledger",
        }
    }
}

pub type StageResult<T> = std::result::Result<T, PipelineError>;
