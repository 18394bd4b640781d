use crate::error::StageResult;
use crate::frame::Frame;

use super::result::ClassificationResult;

/// Vision classifier seam.
///
/// Each call is independent: one frame in, one classification out, no
/// conversation state carried between calls. Implementations report every
/// failure as `PipelineError::Classification`.
pub trait Classifier {
    /// Backend identifier, for logs.
    fn name(&self) -> &'static str;

    fn classify(&mut self, frame: &Frame) -> StageResult<ClassificationResult>;
}
