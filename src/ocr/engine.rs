use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;
use tracing::debug;

use super::TextExtractor;
use crate::automation::registry::TextOptions;

/// Runs the Tesseract executable on preprocessed images.
#[derive(Clone, Debug)]
pub struct TesseractExtractor {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
    language: String,
}

impl TesseractExtractor {
    pub fn new(executable: impl Into<PathBuf>, tessdata: Option<PathBuf>, language: &str) -> Self {
        Self {
            executable: executable.into(),
            tessdata,
            language: language.to_string(),
        }
    }

    /// Command-line arguments after the input image path.
    fn arguments(&self, options: &TextOptions) -> Vec<String> {
        let mut args = vec!["stdout".to_string()];
        if let Some(tessdata) = &self.tessdata {
            args.push("--tessdata-dir".to_string());
            args.push(tessdata.to_string_lossy().into_owned());
        }
        args.push("-l".to_string());
        args.push(self.language.clone());
        if let Some(psm) = options.psm {
            args.push("--psm".to_string());
            args.push(psm.to_string());
        }
        args.extend(options.extra_args.iter().cloned());
        args
    }
}

impl TextExtractor for TesseractExtractor {
    fn extract_text(&self, img: &GrayImage, options: &TextOptions) -> Result<String> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())
            .context("Failed to write OCR input image")?;

        let output = Command::new(&self.executable)
            .arg(temp_input.path())
            .args(self.arguments(options))
            .output()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("OCR text: {:?}", text.trim());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments() {
        let extractor = TesseractExtractor::new("tesseract", Some(PathBuf::from("/data")), "eng");
        let options = TextOptions {
            psm: Some(6),
            extra_args: vec!["-c".to_string(), "tessedit_char_whitelist=0123456789/".to_string()],
            ..TextOptions::default()
        };
        assert_eq!(
            extractor.arguments(&options),
            vec![
                "stdout",
                "--tessdata-dir",
                "/data",
                "-l",
                "eng",
                "--psm",
                "6",
                "-c",
                "tessedit_char_whitelist=0123456789/"
            ]
        );

        let bare = TesseractExtractor::new("tesseract", None, "jpn");
        assert_eq!(bare.arguments(&TextOptions::default()), vec!["stdout", "-l", "jpn"]);
    }
}
