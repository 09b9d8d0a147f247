//! Matcher adapters: predicates deciding whether a criterion holds for a frame.
//!
//! This module provides:
//! - The `CriterionMatcher` trait every adapter implements
//! - `MatcherTable`, the kind → adapter lookup the detector consults
//! - Template, text and solid-color adapters

pub mod solid;
pub mod template;
pub mod text;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::automation::registry::{Criterion, MatcherKind};
use crate::capture::Frame;
use crate::error::MatchError;
use crate::ocr::TextExtractor;

pub use solid::SolidColorMatcher;
pub use template::{best_match_in, BoundingBox, TemplateMatch, TemplateMatcher};
pub use text::TextMatcher;

/// Decides whether one criterion is satisfied by a frame.
///
/// `Ok(false)` is a confident non-match; `Err` means the criterion could not
/// be evaluated (missing file, OCR failure, ...).
pub trait CriterionMatcher {
    fn evaluate(&self, frame: &Frame, criterion: &Criterion) -> Result<bool, MatchError>;
}

impl<F> CriterionMatcher for F
where
    F: Fn(&Frame, &Criterion) -> Result<bool, MatchError>,
{
    fn evaluate(&self, frame: &Frame, criterion: &Criterion) -> Result<bool, MatchError> {
        self(frame, criterion)
    }
}

/// Adapter bound to each matcher kind.
#[derive(Default)]
pub struct MatcherTable {
    adapters: HashMap<MatcherKind, Box<dyn CriterionMatcher>>,
}

impl MatcherTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds all three built-in adapters.
    pub fn standard(templates: TemplateMatcher, extractor: Arc<dyn TextExtractor>) -> Self {
        let mut table = Self::new();
        table.set(MatcherKind::Template, Box::new(templates));
        table.set(MatcherKind::Text, Box::new(TextMatcher::new(extractor)));
        table.set(MatcherKind::SolidColor, Box::new(SolidColorMatcher));
        table
    }

    /// Binds `adapter` to `kind`, returning the one it replaces.
    pub fn set(
        &mut self,
        kind: MatcherKind,
        adapter: Box<dyn CriterionMatcher>,
    ) -> Option<Box<dyn CriterionMatcher>> {
        self.adapters.insert(kind, adapter)
    }

    pub fn get(&self, kind: MatcherKind) -> Option<&dyn CriterionMatcher> {
        self.adapters.get(&kind).map(|a| a.as_ref())
    }

    pub fn is_bound(&self, kind: MatcherKind) -> bool {
        self.adapters.contains_key(&kind)
    }

    pub fn bound_kinds(&self) -> Vec<MatcherKind> {
        MatcherKind::ALL
            .into_iter()
            .filter(|k| self.is_bound(*k))
            .collect()
    }
}

impl fmt::Debug for MatcherTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatcherTable")
            .field("bound", &self.bound_kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_binding() {
        let mut table = MatcherTable::new();
        assert!(!table.is_bound(MatcherKind::Text));

        let always = |_: &Frame, _: &Criterion| -> Result<bool, MatchError> { Ok(true) };
        assert!(table.set(MatcherKind::Text, Box::new(always)).is_none());
        assert!(table.set(MatcherKind::Text, Box::new(always)).is_some());
        assert_eq!(table.bound_kinds(), vec![MatcherKind::Text]);

        let frame = Frame::new("unused.png", 1);
        let adapter = table.get(MatcherKind::Text).unwrap();
        assert!(adapter.evaluate(&frame, &Criterion::text("x")).unwrap());
        assert!(table.get(MatcherKind::Template).is_none());
    }

    #[test]
    fn test_standard_binds_everything() {
        let extractor = Arc::new(
            |_: &image::GrayImage, _: &crate::automation::registry::TextOptions| -> anyhow::Result<String> {
                Ok(String::new())
            },
        );
        let table = MatcherTable::standard(TemplateMatcher::new(), extractor);
        assert_eq!(table.bound_kinds(), MatcherKind::ALL.to_vec());
    }
}
