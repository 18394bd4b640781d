//! In-memory camera frames.
//!
//! A `Frame` lives for exactly one poll iteration. It is never written to
//! disk; the only persisted derivative is the archived thumbnail.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView};

/// Default JPEG quality for images leaving the process.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// One decoded still image and the instant it was captured.
pub struct Frame {
    image: DynamicImage,
    captured_at: DateTime<Local>,
}

// No Clone: a frame is owned by a single iteration and dropped at its end.

impl Frame {
    pub fn new(image: DynamicImage, captured_at: DateTime<Local>) -> Self {
        Self { image, captured_at }
    }

    /// Decode an encoded image payload (JPEG) into a frame.
    pub fn decode(bytes: &[u8], captured_at: DateTime<Local>) -> Result<Self> {
        let image = image::load_from_memory(bytes).context("decode image payload")?;
        Ok(Self::new(image, captured_at))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Encode the full frame as JPEG (for the vision model).
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        encode_jpeg(&self.image, quality)
    }
}

/// Encode an image as baseline JPEG. Alpha is dropped.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    encoder.encode_image(&rgb).context("encode jpeg")?;
    Ok(out)
}

#[cfg(test)]
pub(crate) fn test_frame(width: u32, height: u32) -> Frame {
    let buffer = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    Frame::new(DynamicImage::ImageRgb8(buffer), Local::now())
}
