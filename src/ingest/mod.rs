//! Frame ingestion.
//!
//! A source produces one `Frame` per call. The ingestion layer is responsible
//! for bounding every camera request with a timeout and for rejecting
//! payloads that do not decode as images.
//!
//! The ingestion layer MUST NOT:
//! - Store frames to disk
//! - Retain frames beyond handoff to the current iteration

pub mod snapshot;

use crate::error::StageResult;
use crate::frame::Frame;

pub use snapshot::{SnapshotConfig, SnapshotSource, SnapshotStats};

/// Something that can produce a still frame on demand.
pub trait FrameSource {
    /// Capture one frame. Fails with `PipelineError::Capture`.
    fn capture(&mut self) -> StageResult<Frame>;
}
