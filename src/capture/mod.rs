//! Frames and the capture collaborator.
//!
//! This module provides:
//! - `Frame`, a path to one captured image plus the iteration that made it
//! - The `Capture` trait the run loop pulls frames from
//! - `AdbCapture`, the default implementation (`adb exec-out screencap`)

pub mod screenshot;

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::Result;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use tracing::debug;

use crate::error::MatchError;

pub use screenshot::AdbCapture;

/// Attempts made to decode a frame before giving up.
const DECODE_ATTEMPTS: u32 = 3;

/// Reference to one captured image.
///
/// The decoded grayscale image is cached and shared between clones, so every
/// criterion evaluated against the same frame decodes the file at most once.
#[derive(Clone, Debug)]
pub struct Frame {
    path: PathBuf,
    iteration: u64,
    gray: Arc<OnceLock<GrayImage>>,
}

impl Frame {
    pub fn new(path: impl Into<PathBuf>, iteration: u64) -> Self {
        Self {
            path: path.into(),
            iteration,
            gray: Arc::new(OnceLock::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Decodes the frame to grayscale, retrying briefly while the capture
    /// writer may still be flushing the file.
    pub fn load_gray(&self) -> Result<&GrayImage, MatchError> {
        if let Some(gray) = self.gray.get() {
            return Ok(gray);
        }

        let mut attempt = 0;
        let gray = loop {
            attempt += 1;
            match load_gray_file(&self.path) {
                Ok(gray) => break gray,
                Err(MatchError::Decode { .. }) if attempt < DECODE_ATTEMPTS => {
                    debug!(
                        "Decode of {} failed (attempt {}), retrying",
                        self.path.display(),
                        attempt
                    );
                    std::thread::sleep(Duration::from_millis(100 * attempt as u64));
                }
                Err(e) => return Err(e),
            }
        };

        let _ = self.gray.set(gray);
        self.gray
            .get()
            .ok_or_else(|| MatchError::Missing(self.path.clone()))
    }
}

/// Reads an image file and converts it to 8-bit grayscale.
pub fn load_gray_file(path: &Path) -> Result<GrayImage, MatchError> {
    if !path.exists() {
        return Err(MatchError::Missing(path.to_path_buf()));
    }
    let img = image::open(path).map_err(|source| MatchError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(to_luma_bt601(&img))
}

/// Grayscale with BT.601 weights (0.299 R + 0.587 G + 0.114 B), the same
/// conversion screen templates are usually prepared with.
pub fn to_luma_bt601(img: &DynamicImage) -> GrayImage {
    if let DynamicImage::ImageLuma8(gray) = img {
        return gray.clone();
    }
    let rgb = img.to_rgb8();
    ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
        let p = rgb.get_pixel(x, y);
        let luminance = 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32;
        Luma([luminance.round().clamp(0.0, 255.0) as u8])
    })
}

/// Source of frames for the run loop.
pub trait Capture {
    /// Captures the screen for the given 1-based iteration.
    fn capture(&self, iteration: u64) -> Result<Frame>;
}

impl<F> Capture for F
where
    F: Fn(u64) -> Result<Frame>,
{
    fn capture(&self, iteration: u64) -> Result<Frame> {
        self(iteration)
    }
}
