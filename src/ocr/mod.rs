//! Text extraction: preprocessing, the Tesseract engine, and parsing helpers.

pub mod engine;
pub mod extract;
pub mod preprocess;
pub mod setup;

pub use engine::TesseractExtractor;
pub use extract::parse_completion;
pub use preprocess::prepare_for_ocr;
pub use setup::ensure_tesseract;

use anyhow::Result;
use image::GrayImage;

use crate::automation::registry::TextOptions;

/// Turns a preprocessed image into text.
///
/// `options` carries engine settings (page segmentation mode, extra
/// arguments); cropping and binarization have already been applied.
pub trait TextExtractor {
    fn extract_text(&self, img: &GrayImage, options: &TextOptions) -> Result<String>;
}

impl<F> TextExtractor for F
where
    F: Fn(&GrayImage, &TextOptions) -> Result<String>,
{
    fn extract_text(&self, img: &GrayImage, options: &TextOptions) -> Result<String> {
        self(img, options)
    }
}
