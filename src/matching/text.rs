use std::sync::Arc;

use tracing::debug;

use super::CriterionMatcher;
use crate::automation::registry::{Criterion, MatcherOptions, TextOptions};
use crate::capture::Frame;
use crate::error::MatchError;
use crate::ocr::{prepare_for_ocr, TextExtractor};

/// Matches when the criterion's text appears in the OCR output,
/// ignoring case.
#[derive(Clone)]
pub struct TextMatcher {
    extractor: Arc<dyn TextExtractor>,
}

impl TextMatcher {
    pub fn new(extractor: Arc<dyn TextExtractor>) -> Self {
        Self { extractor }
    }
}

impl CriterionMatcher for TextMatcher {
    fn evaluate(&self, frame: &Frame, criterion: &Criterion) -> Result<bool, MatchError> {
        if criterion.pattern.is_empty() {
            return Err(MatchError::InvalidPattern(criterion.pattern.clone()));
        }
        let defaults = TextOptions::default();
        let options = match &criterion.options {
            MatcherOptions::Text(options) => options,
            _ => &defaults,
        };

        let prepared = prepare_for_ocr(frame.load_gray()?, options)?;
        let text = self
            .extractor
            .extract_text(&prepared, options)
            .map_err(MatchError::Extraction)?;

        let found = text.to_lowercase().contains(&criterion.pattern.to_lowercase());
        debug!("Text {:?} in OCR output: {}", criterion.pattern, found);
        Ok(found)
    }
}
