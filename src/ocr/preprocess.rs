use image::{GrayImage, Luma};

use crate::automation::registry::{Binarization, Region, TextOptions};
use crate::error::MatchError;

/// Sigma matching an 11x11 Gaussian kernel.
const ADAPTIVE_SIGMA: f32 = 2.0;
/// Constant subtracted from the local mean in adaptive mode.
const ADAPTIVE_OFFSET: f32 = 2.0;

/// Crops a sub-region from an image using relative coordinates.
///
/// Converts the fractional region to absolute pixel coordinates, clamps to
/// image bounds, and returns the cropped sub-image.
pub fn crop_region(img: &GrayImage, region: &Region) -> GrayImage {
    let (x, y, w, h) = region.bounds(img.width(), img.height());
    image::imageops::crop_imm(img, x, y, w, h).to_image()
}

/// Threshold chosen by Otsu's method (maximum between-class variance).
pub fn otsu_threshold(img: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for &v in img.as_raw() {
        histogram[v as usize] += 1;
    }

    let total = img.as_raw().len() as f64;
    if total == 0.0 {
        return 0;
    }
    let weighted_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(v, &count)| v as f64 * count as f64)
        .sum();

    let mut best = (0u8, -1.0f64);
    let mut background = 0.0f64;
    let mut background_sum = 0.0f64;
    for (t, &count) in histogram.iter().enumerate() {
        background += count as f64;
        if background == 0.0 {
            continue;
        }
        let foreground = total - background;
        if foreground == 0.0 {
            break;
        }
        background_sum += t as f64 * count as f64;

        let mean_bg = background_sum / background;
        let mean_fg = (weighted_total - background_sum) / foreground;
        let between = background * foreground * (mean_bg - mean_fg).powi(2);
        if between > best.1 {
            best = (t as u8, between);
        }
    }
    best.0
}

/// Converts to black and white. Pixels above the threshold become white (255).
pub fn binarize(img: &GrayImage, mode: Binarization) -> GrayImage {
    match mode {
        Binarization::Fixed(t) => threshold(img, t),
        Binarization::Otsu => threshold(img, otsu_threshold(img)),
        Binarization::Adaptive => {
            let local_mean = image::imageops::blur(img, ADAPTIVE_SIGMA);
            GrayImage::from_fn(img.width(), img.height(), |x, y| {
                let v = img.get_pixel(x, y)[0] as f32;
                let mean = local_mean.get_pixel(x, y)[0] as f32;
                Luma([if v > mean - ADAPTIVE_OFFSET { 255 } else { 0 }])
            })
        }
    }
}

fn threshold(img: &GrayImage, t: u8) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        Luma([if img.get_pixel(x, y)[0] > t { 255 } else { 0 }])
    })
}

/// Crops, binarizes and optionally inverts a frame as configured for one
/// text criterion.
pub fn prepare_for_ocr(img: &GrayImage, options: &TextOptions) -> Result<GrayImage, MatchError> {
    let area = match &options.region {
        Some(region) => crop_region(img, region),
        None => img.clone(),
    };
    if area.width() == 0 || area.height() == 0 {
        return Err(MatchError::EmptyRegion);
    }

    let mut prepared = binarize(&area, options.binarization);
    if options.invert {
        image::imageops::invert(&mut prepared);
    }
    Ok(prepared)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_region() {
        // 100x200 image
        let img = GrayImage::from_fn(100, 200, |x, y| Luma([(x + y) as u8]));

        let region = Region::new(0.25, 0.375, 0.25, 0.75);
        let cropped = crop_region(&img, &region);

        assert_eq!(cropped.dimensions(), (50, 25));
        // Top-left pixel should be (25, 50) from original
        assert_eq!(cropped.get_pixel(0, 0)[0], 75);
    }

    #[test]
    fn test_fixed_threshold_is_strict() {
        let img = GrayImage::from_fn(3, 1, |x, _| Luma([[179, 180, 181][x as usize]]));
        let result = binarize(&img, Binarization::Fixed(180));
        assert_eq!(result.as_raw(), &vec![0, 0, 255]);
    }

    #[test]
    fn test_otsu_splits_bimodal() {
        let img = GrayImage::from_fn(10, 10, |x, _| Luma([if x < 5 { 40 } else { 200 }]));
        let t = otsu_threshold(&img);
        assert!((40..200).contains(&t), "threshold {}", t);

        let result = binarize(&img, Binarization::Otsu);
        assert_eq!(result.get_pixel(0, 0)[0], 0);
        assert_eq!(result.get_pixel(9, 0)[0], 255);
    }

    #[test]
    fn test_adaptive_marks_dark_strokes() {
        // Dark vertical stroke on a light background
        let img = GrayImage::from_fn(30, 30, |x, _| Luma([if x == 15 { 30 } else { 220 }]));
        let result = binarize(&img, Binarization::Adaptive);
        assert_eq!(result.get_pixel(15, 15)[0], 0);
        assert_eq!(result.get_pixel(2, 15)[0], 255);
    }

    #[test]
    fn test_prepare_for_ocr_inverts_and_rejects_empty() {
        let img = GrayImage::from_pixel(20, 20, Luma([200]));
        let options = TextOptions {
            invert: true,
            ..TextOptions::default()
        };
        let prepared = prepare_for_ocr(&img, &options).unwrap();
        assert_eq!(prepared.get_pixel(0, 0)[0], 0);

        let empty = TextOptions {
            region: Some(Region::new(0.5, 0.5, 0.0, 1.0)),
            ..TextOptions::default()
        };
        assert!(matches!(
            prepare_for_ocr(&img, &empty),
            Err(MatchError::EmptyRegion)
        ));
    }
}
