//! Snapshot archiving.
//!
//! An accepted event's frame is cropped to the lane, shrunk to a thumbnail,
//! re-encoded as JPEG and published through an `ObjectStore`. Stores only ever
//! create new objects; nothing is overwritten or deleted.

pub mod drive;
pub mod local;
pub mod thumbnail;

use anyhow::Result;
use std::fmt;

use crate::classify::ClassificationResult;
use crate::error::{PipelineError, StageResult};
use crate::frame::{encode_jpeg, Frame, DEFAULT_JPEG_QUALITY};

pub use drive::{DriveConfig, DriveStore};
pub use local::LocalStore;
pub use thumbnail::{make_thumbnail, snapshot_file_name};

/// Publicly dereferenceable locator of an archived snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageReference(String);

impl ImageReference {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Destination for archived JPEGs.
pub trait ObjectStore {
    /// Store identifier, for logs.
    fn name(&self) -> &'static str;

    /// Create a new public-read object and return its view URL.
    fn put_public(&mut self, file_name: &str, jpeg: &[u8]) -> Result<ImageReference>;
}

/// Archive stage seam used by the poll driver.
pub trait Archiver {
    fn archive(
        &mut self,
        frame: &Frame,
        result: &ClassificationResult,
    ) -> StageResult<ImageReference>;
}

/// Thumbnail pipeline in front of an object store.
pub struct SnapshotArchiver<S: ObjectStore> {
    store: S,
    jpeg_quality: u8,
}

impl<S: ObjectStore> SnapshotArchiver<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn publish(&mut self, frame: &Frame, result: &ClassificationResult) -> Result<ImageReference> {
        let thumb = make_thumbnail(frame.image());
        let jpeg = encode_jpeg(&thumb, self.jpeg_quality)?;
        let file_name = snapshot_file_name(&result.plate, chrono::Utc::now().timestamp());
        let reference = self.store.put_public(&file_name, &jpeg)?;
        log::debug!(
            "archived {} ({}x{}, {} bytes) via {}",
            file_name,
            thumb.width(),
            thumb.height(),
            jpeg.len(),
            self.store.name()
        );
        Ok(reference)
    }
}

impl<S: ObjectStore> Archiver for SnapshotArchiver<S> {
    fn archive(
        &mut self,
        frame: &Frame,
        result: &ClassificationResult,
    ) -> StageResult<ImageReference> {
        self.publish(frame, result).map_err(PipelineError::Archive)
    }
}

/// Either configured store, chosen at startup.
pub enum AnyStore {
    Drive(DriveStore),
    Local(LocalStore),
}

impl ObjectStore for AnyStore {
    fn name(&self) -> &'static str {
        match self {
            AnyStore::Drive(store) => store.name(),
            AnyStore::Local(store) => store.name(),
        }
    }

    fn put_public(&mut self, file_name: &str, jpeg: &[u8]) -> Result<ImageReference> {
        match self {
            AnyStore::Drive(store) => store.put_public(file_name, jpeg),
            AnyStore::Local(store) => store.put_public(file_name, jpeg),
        }
    }
}
