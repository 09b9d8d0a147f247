//! Template matching by zero-mean normalized cross-correlation.
//!
//! Scores are equivalent to OpenCV's `TM_CCOEFF_NORMED`: 1.0 for a perfect
//! match, around 0 for unrelated content, negative for inverted content.
//! The template/window products come from `imageproc`'s cross-correlation
//! and the window means and variances from integral images. Every alignment
//! is scored.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::integral_image::{integral_image, integral_squared_image, sum_image_pixels};
use imageproc::template_matching::{find_extremes, match_template_parallel, MatchTemplateMethod};
use tracing::debug;

use super::CriterionMatcher;
use crate::automation::registry::{Criterion, Region};
use crate::capture::{load_gray_file, Frame};
use crate::error::MatchError;

/// Per-pixel variance under which a patch counts as flat.
const FLAT_VARIANCE: f64 = 1e-6;

/// Axis-aligned rectangle in frame pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Best placement of a template in a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemplateMatch {
    pub score: f32,
    pub bbox: BoundingBox,
    /// `(x + width / 2, y + height / 2)`
    pub center: (u32, u32),
}

impl TemplateMatch {
    fn new(score: f32, x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            score,
            bbox: BoundingBox {
                x,
                y,
                width,
                height,
            },
            center: (x + width / 2, y + height / 2),
        }
    }

    fn offset(mut self, dx: u32, dy: u32) -> Self {
        self.bbox.x += dx;
        self.bbox.y += dy;
        self.center = (self.center.0 + dx, self.center.1 + dy);
        self
    }
}

/// Template matcher with a shared cache of decoded templates.
///
/// Clones share the cache, so actions and the detector can hold their own
/// handle without decoding the same reference image twice.
#[derive(Clone, Debug, Default)]
pub struct TemplateMatcher {
    cache: Arc<Mutex<HashMap<PathBuf, Arc<GrayImage>>>>,
}

impl TemplateMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a template in grayscale, caching successful decodes.
    pub fn load_template(&self, path: &Path) -> Result<Arc<GrayImage>, MatchError> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tpl) = cache.get(path) {
            return Ok(tpl.clone());
        }
        let tpl = Arc::new(load_gray_file(path)?);
        cache.insert(path.to_path_buf(), tpl.clone());
        Ok(tpl)
    }

    /// Finds `template` in the frame; `None` when the best score is below `threshold`.
    pub fn locate(
        &self,
        frame: &Frame,
        template: &Path,
        threshold: f32,
    ) -> Result<Option<TemplateMatch>, MatchError> {
        self.locate_in_region(frame, template, None, threshold)
    }

    /// Like [`locate`](Self::locate) but restricted to a fractional region.
    /// Coordinates in the result are frame coordinates.
    pub fn locate_in_region(
        &self,
        frame: &Frame,
        template: &Path,
        region: Option<Region>,
        threshold: f32,
    ) -> Result<Option<TemplateMatch>, MatchError> {
        let gray = frame.load_gray()?;
        let tpl = self.load_template(template)?;

        let found = match region {
            None => best_match_in(gray, &tpl)?,
            Some(region) => {
                let (x, y, w, h) = region.bounds(gray.width(), gray.height());
                if w == 0 || h == 0 {
                    return Err(MatchError::EmptyRegion);
                }
                let area = image::imageops::crop_imm(gray, x, y, w, h).to_image();
                best_match_in(&area, &tpl)?.offset(x, y)
            }
        };

        debug!(
            "Template {} best score {:.3} at ({}, {})",
            template.display(),
            found.score,
            found.bbox.x,
            found.bbox.y
        );
        Ok((found.score >= threshold).then_some(found))
    }
}

impl CriterionMatcher for TemplateMatcher {
    fn evaluate(&self, frame: &Frame, criterion: &Criterion) -> Result<bool, MatchError> {
        let found = self.locate_in_region(
            frame,
            Path::new(&criterion.pattern),
            criterion.options.region(),
            criterion.threshold,
        )?;
        Ok(found.is_some())
    }
}

/// Sum of the `w`x`h` window at `(x, y)` from an integral image.
fn window_sum(integral: &Image<Luma<u64>>, x: u32, y: u32, w: u32, h: u32) -> f64 {
    sum_image_pixels(integral, x, y, x + w - 1, y + h - 1)[0] as f64
}

/// Template split into its deviations above and below its rounded mean.
///
/// Correlating the frame with both halves yields the zero-mean product with
/// small partial sums.
struct Deviations {
    above: GrayImage,
    below: GrayImage,
    /// `mean - round(mean)`
    rounding: f64,
    mean: f64,
    /// Sum of squared deviations from the mean
    energy: f64,
}

impl Deviations {
    fn new(template: &GrayImage) -> Self {
        let n = (template.width() * template.height()) as f64;
        let sum: u64 = template.pixels().map(|p| p[0] as u64).sum();
        let sum_sq: u64 = template.pixels().map(|p| (p[0] as u64).pow(2)).sum();
        let mean = sum as f64 / n;
        let level = mean.round() as i32;

        let above = GrayImage::from_fn(template.width(), template.height(), |x, y| {
            Luma([(template.get_pixel(x, y)[0] as i32 - level).max(0) as u8])
        });
        let below = GrayImage::from_fn(template.width(), template.height(), |x, y| {
            Luma([(level - template.get_pixel(x, y)[0] as i32).max(0) as u8])
        });

        Self {
            above,
            below,
            rounding: mean - level as f64,
            mean,
            energy: (sum_sq as f64 - sum as f64 * mean).max(0.0),
        }
    }
}

/// Best placement of `template` in `image`.
///
/// Every alignment is scored; ties go to the first position in row-major
/// order.
pub fn best_match_in(image: &GrayImage, template: &GrayImage) -> Result<TemplateMatch, MatchError> {
    let (iw, ih) = image.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || iw == 0 || ih == 0 {
        return Err(MatchError::EmptyRegion);
    }
    if tw > iw || th > ih {
        return Err(MatchError::TemplateTooLarge {
            template_w: tw,
            template_h: th,
            image_w: iw,
            image_h: ih,
        });
    }

    let tpl = Deviations::new(template);
    let n = (tw * th) as f64;
    let tpl_flat = tpl.energy <= FLAT_VARIANCE * n;

    let above = match_template_parallel(image, &tpl.above, MatchTemplateMethod::CrossCorrelation);
    let below = match_template_parallel(image, &tpl.below, MatchTemplateMethod::CrossCorrelation);
    let sums = integral_image::<_, u64>(image);
    let squares = integral_squared_image::<_, u64>(image);

    let scores: Image<Luma<f32>> = Image::from_fn(iw - tw + 1, ih - th + 1, |x, y| {
        let sum = window_sum(&sums, x, y, tw, th);
        let window_energy = (window_sum(&squares, x, y, tw, th) - sum * sum / n).max(0.0);
        let window_flat = window_energy <= FLAT_VARIANCE * n;

        if tpl_flat || window_flat {
            // Correlation is undefined; two flat patches of the same level match.
            let same_level = (sum / n - tpl.mean).abs() < 0.5;
            let score = if tpl_flat && window_flat && same_level {
                1.0
            } else {
                0.0
            };
            return Luma([score]);
        }

        let cross = above.get_pixel(x, y)[0] as f64 - below.get_pixel(x, y)[0] as f64
            - tpl.rounding * sum;
        let score = (cross / (tpl.energy * window_energy).sqrt()).clamp(-1.0, 1.0);
        Luma([score as f32])
    });

    let best = find_extremes(&scores);
    let (x, y) = best.max_value_location;
    Ok(TemplateMatch::new(best.max_value, x, y, tw, th))
}
