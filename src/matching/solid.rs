//! Solid-color detection for fade transitions.
//!
//! A frame counts as solid when its luminance is nearly uniform (low standard
//! deviation) and its mean sits close to pure white or pure black.

use image::GrayImage;
use tracing::debug;

use super::CriterionMatcher;
use crate::automation::registry::{Criterion, MatcherOptions, SolidColor, SolidColorOptions};
use crate::capture::Frame;
use crate::error::MatchError;

/// Mean and population standard deviation of the pixel values.
pub fn luminance_stats(img: &GrayImage) -> (f64, f64) {
    let n = (img.width() as u64 * img.height() as u64) as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for &v in img.as_raw() {
        let v = v as f64;
        sum += v;
        sum_sq += v * v;
    }

    let mean = sum / n;
    let variance = (sum_sq / n - mean * mean).max(0.0);
    (mean, variance.sqrt())
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SolidColorMatcher;

impl SolidColorMatcher {
    /// Whether `img` is a solid `color` within `tolerance` of its luminance.
    pub fn is_solid(img: &GrayImage, color: SolidColor, tolerance: f64, max_std_dev: f64) -> bool {
        let (mean, std_dev) = luminance_stats(img);
        debug!(
            "Solid {} check: mean {:.1}, std dev {:.1}",
            color.as_str(),
            mean,
            std_dev
        );
        std_dev <= max_std_dev && (mean - color.luminance()).abs() <= tolerance
    }
}

impl CriterionMatcher for SolidColorMatcher {
    fn evaluate(&self, frame: &Frame, criterion: &Criterion) -> Result<bool, MatchError> {
        let color: SolidColor = criterion
            .pattern
            .parse()
            .map_err(|_| MatchError::InvalidPattern(criterion.pattern.clone()))?;
        let defaults = SolidColorOptions::default();
        let options = match &criterion.options {
            MatcherOptions::SolidColor(options) => options,
            _ => &defaults,
        };

        let gray = frame.load_gray()?;
        let tolerance = criterion.threshold as f64;
        match options.region {
            None => Ok(Self::is_solid(gray, color, tolerance, options.max_std_dev)),
            Some(region) => {
                let (x, y, w, h) = region.bounds(gray.width(), gray.height());
                if w == 0 || h == 0 {
                    return Err(MatchError::EmptyRegion);
                }
                let area = image::imageops::crop_imm(gray, x, y, w, h).to_image();
                Ok(Self::is_solid(&area, color, tolerance, options.max_std_dev))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::registry::Region;
    use image::Luma;
    use tempfile::tempdir;

    fn frame_of(dir: &tempfile::TempDir, name: &str, img: &GrayImage) -> Frame {
        let path = dir.path().join(name);
        img.save(&path).unwrap();
        Frame::new(path, 1)
    }

    #[test]
    fn test_luminance_stats() {
        let img = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 0 } else { 200 }]));
        let (mean, std_dev) = luminance_stats(&img);
        assert_eq!(mean, 100.0);
        assert_eq!(std_dev, 100.0);
    }

    #[test]
    fn test_white_gray_black() {
        let dir = tempdir().unwrap();
        let white = frame_of(&dir, "white.png", &GrayImage::from_pixel(64, 48, Luma([255])));
        let gray = frame_of(&dir, "gray.png", &GrayImage::from_pixel(64, 48, Luma([128])));
        let black = frame_of(&dir, "black.png", &GrayImage::from_pixel(64, 48, Luma([0])));

        let is_white = Criterion::solid_color(SolidColor::White, 30.0);
        let is_black = Criterion::solid_color(SolidColor::Black, 30.0);
        let matcher = SolidColorMatcher;

        assert!(matcher.evaluate(&white, &is_white).unwrap());
        assert!(!matcher.evaluate(&gray, &is_white).unwrap());
        assert!(!matcher.evaluate(&gray, &is_black).unwrap());
        assert!(matcher.evaluate(&black, &is_black).unwrap());
        assert!(!matcher.evaluate(&black, &is_white).unwrap());
    }

    #[test]
    fn test_textured_frame_is_not_solid() {
        let dir = tempdir().unwrap();
        // Bright on average but striped
        let striped = GrayImage::from_fn(64, 48, |x, _| Luma([if x % 2 == 0 { 255 } else { 180 }]));
        let frame = frame_of(&dir, "striped.png", &striped);

        let lenient = Criterion::solid_color(SolidColor::White, 100.0);
        assert!(!SolidColorMatcher.evaluate(&frame, &lenient).unwrap());
    }

    #[test]
    fn test_region_restricts_check() {
        let dir = tempdir().unwrap();
        let half = GrayImage::from_fn(100, 100, |_, y| Luma([if y < 50 { 0 } else { 255 }]));
        let frame = frame_of(&dir, "half.png", &half);

        let bottom = SolidColorOptions {
            region: Some(Region::new(0.5, 1.0, 0.0, 1.0)),
            ..SolidColorOptions::default()
        };
        let criterion = Criterion::solid_color_with(SolidColor::White, 30.0, bottom);
        assert!(SolidColorMatcher.evaluate(&frame, &criterion).unwrap());
        assert!(!SolidColorMatcher
            .evaluate(&frame, &Criterion::solid_color(SolidColor::White, 30.0))
            .unwrap());
    }

    #[test]
    fn test_bad_color_is_an_error() {
        let dir = tempdir().unwrap();
        let frame = frame_of(&dir, "white.png", &GrayImage::from_pixel(4, 4, Luma([255])));
        let mut criterion = Criterion::solid_color(SolidColor::White, 30.0);
        criterion.pattern = "purple".to_string();
        assert!(matches!(
            SolidColorMatcher.evaluate(&frame, &criterion),
            Err(MatchError::InvalidPattern(_))
        ));
    }
}
