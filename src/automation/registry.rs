//! State registry: which screens the bot knows and how to recognize them.
//!
//! Each state owns an ordered list of criteria (any one of which identifies
//! the state) and an ordered list of actions run when the state is entered.
//! Registration order matters: the detector picks the first state with a
//! satisfied criterion.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::automation::action::Action;
use crate::error::ConfigError;

/// Evaluation strategy for a criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatcherKind {
    /// Normalized cross-correlation against a reference image
    Template,
    /// Case-insensitive substring search in OCR output
    Text,
    /// Uniform white or black frame (fade transitions)
    SolidColor,
}

impl MatcherKind {
    pub const ALL: [MatcherKind; 3] = [
        MatcherKind::Template,
        MatcherKind::Text,
        MatcherKind::SolidColor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatcherKind::Template => "template",
            MatcherKind::Text => "text",
            MatcherKind::SolidColor => "solid_color",
        }
    }
}

impl fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatcherKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "template" => Ok(MatcherKind::Template),
            "text" => Ok(MatcherKind::Text),
            "solid_color" | "solid-color" | "solidcolor" => Ok(MatcherKind::SolidColor),
            _ => Err(ConfigError::UnknownMatcherKind(s.to_string())),
        }
    }
}

/// A sub-area of the frame in fractions of its height and width.
///
/// `top`/`bottom` are fractions of the height, `left`/`right` of the width,
/// all in 0.0–1.0.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Region {
    pub const fn new(top: f32, bottom: f32, left: f32, right: f32) -> Self {
        Self {
            top,
            bottom,
            left,
            right,
        }
    }

    /// Absolute pixel rectangle `(x, y, width, height)` in a `w`x`h` image,
    /// clamped to the image bounds.
    pub fn bounds(&self, w: u32, h: u32) -> (u32, u32, u32, u32) {
        let x0 = ((self.left.max(0.0) * w as f32) as u32).min(w);
        let y0 = ((self.top.max(0.0) * h as f32) as u32).min(h);
        let x1 = ((self.right.max(0.0) * w as f32) as u32).min(w);
        let y1 = ((self.bottom.max(0.0) * h as f32) as u32).min(h);

        (x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }
}

/// Binarization applied before OCR.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Binarization {
    /// Pixels brighter than the value become white, the rest black
    Fixed(u8),
    /// Threshold picked by Otsu's method
    Otsu,
    /// Gaussian-weighted local mean over an 11x11 neighbourhood, offset 2
    Adaptive,
}

impl Default for Binarization {
    fn default() -> Self {
        Binarization::Fixed(127)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TemplateOptions {
    /// Restrict the search to this part of the frame
    pub region: Option<Region>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextOptions {
    pub region: Option<Region>,
    /// Tesseract page segmentation mode (`--psm`)
    pub psm: Option<u8>,
    pub binarization: Binarization,
    pub invert: bool,
    /// Extra arguments passed through to the OCR engine (e.g. `-c key=value`)
    pub extra_args: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SolidColorOptions {
    pub region: Option<Region>,
    /// Maximum luminance standard deviation for the frame to count as uniform
    pub max_std_dev: f64,
}

impl Default for SolidColorOptions {
    fn default() -> Self {
        Self {
            region: None,
            max_std_dev: 20.0,
        }
    }
}

/// Kind-specific matcher configuration.
#[derive(Clone, Debug, PartialEq)]
pub enum MatcherOptions {
    Template(TemplateOptions),
    Text(TextOptions),
    SolidColor(SolidColorOptions),
}

impl MatcherOptions {
    pub fn kind(&self) -> MatcherKind {
        match self {
            MatcherOptions::Template(_) => MatcherKind::Template,
            MatcherOptions::Text(_) => MatcherKind::Text,
            MatcherOptions::SolidColor(_) => MatcherKind::SolidColor,
        }
    }

    pub fn default_for(kind: MatcherKind) -> Self {
        match kind {
            MatcherKind::Template => MatcherOptions::Template(TemplateOptions::default()),
            MatcherKind::Text => MatcherOptions::Text(TextOptions::default()),
            MatcherKind::SolidColor => MatcherOptions::SolidColor(SolidColorOptions::default()),
        }
    }

    pub fn region(&self) -> Option<Region> {
        match self {
            MatcherOptions::Template(o) => o.region,
            MatcherOptions::Text(o) => o.region,
            MatcherOptions::SolidColor(o) => o.region,
        }
    }
}

/// Target color of a solid-color criterion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolidColor {
    White,
    Black,
}

impl SolidColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolidColor::White => "white",
            SolidColor::Black => "black",
        }
    }

    /// Luminance of the pure color.
    pub fn luminance(&self) -> f64 {
        match self {
            SolidColor::White => 255.0,
            SolidColor::Black => 0.0,
        }
    }
}

impl FromStr for SolidColor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" => Ok(SolidColor::White),
            "black" => Ok(SolidColor::Black),
            _ => Err(ConfigError::UnknownColor(s.to_string())),
        }
    }
}

/// One piece of evidence that can confirm a state on its own.
#[derive(Clone, Debug, PartialEq)]
pub struct Criterion {
    /// Template path, literal text, or color name depending on `kind`
    pub pattern: String,
    pub kind: MatcherKind,
    /// Minimum correlation for templates, mean tolerance for solid colors,
    /// unused for text
    pub threshold: f32,
    pub options: MatcherOptions,
}

impl Criterion {
    /// Builds a criterion from loosely-typed parts, rejecting unknown kinds,
    /// unknown colors and options that belong to another kind.
    pub fn new(
        kind: &str,
        pattern: impl Into<String>,
        threshold: f32,
        options: Option<MatcherOptions>,
    ) -> Result<Self, ConfigError> {
        let kind: MatcherKind = kind.parse()?;
        let pattern = pattern.into();
        let options = options.unwrap_or_else(|| MatcherOptions::default_for(kind));
        if options.kind() != kind {
            return Err(ConfigError::OptionsMismatch {
                kind,
                options: options.kind(),
            });
        }
        if kind == MatcherKind::SolidColor {
            pattern.parse::<SolidColor>()?;
        }
        Ok(Self {
            pattern,
            kind,
            threshold,
            options,
        })
    }

    pub fn template(path: impl AsRef<Path>, threshold: f32) -> Self {
        Self::template_with(path, threshold, TemplateOptions::default())
    }

    pub fn template_with(path: impl AsRef<Path>, threshold: f32, options: TemplateOptions) -> Self {
        Self {
            pattern: path.as_ref().to_string_lossy().into_owned(),
            kind: MatcherKind::Template,
            threshold,
            options: MatcherOptions::Template(options),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::text_with(text, TextOptions::default())
    }

    pub fn text_with(text: impl Into<String>, options: TextOptions) -> Self {
        Self {
            pattern: text.into(),
            kind: MatcherKind::Text,
            threshold: 0.0,
            options: MatcherOptions::Text(options),
        }
    }

    /// `tolerance` is how far the mean may sit from pure white (255) or black (0).
    pub fn solid_color(color: SolidColor, tolerance: f32) -> Self {
        Self::solid_color_with(color, tolerance, SolidColorOptions::default())
    }

    pub fn solid_color_with(color: SolidColor, tolerance: f32, options: SolidColorOptions) -> Self {
        Self {
            pattern: color.as_str().to_string(),
            kind: MatcherKind::SolidColor,
            threshold: tolerance,
            options: MatcherOptions::SolidColor(options),
        }
    }
}

/// A named screen with its recognition criteria and entry actions.
pub struct StateDefinition {
    id: String,
    criteria: Vec<Criterion>,
    actions: Vec<Box<dyn Action>>,
}

impl StateDefinition {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            criteria: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn actions(&self) -> &[Box<dyn Action>] {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut [Box<dyn Action>] {
        &mut self.actions
    }
}

impl fmt::Debug for StateDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateDefinition")
            .field("id", &self.id)
            .field("criteria", &self.criteria)
            .field(
                "actions",
                &self.actions.iter().map(|a| a.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Ordered collection of state definitions.
#[derive(Debug, Default)]
pub struct StateRegistry {
    states: Vec<StateDefinition>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, state: &str) -> &mut StateDefinition {
        let idx = match self.states.iter().position(|s| s.id == state) {
            Some(idx) => idx,
            None => {
                self.states.push(StateDefinition::new(state));
                self.states.len() - 1
            }
        };
        &mut self.states[idx]
    }

    /// Adds an alternative criterion for `state`, creating the state on first use.
    pub fn register(&mut self, state: &str, criterion: Criterion) {
        debug!(
            state,
            kind = %criterion.kind,
            pattern = %criterion.pattern,
            "registered criterion"
        );
        self.entry(state).criteria.push(criterion);
    }

    /// Appends an action to run when `state` is entered.
    pub fn register_action(&mut self, state: &str, action: Box<dyn Action>) {
        debug!(state, action = action.name(), "registered action");
        self.entry(state).actions.push(action);
    }

    /// Registers a whole state at once. An empty criteria list is allowed but
    /// leaves the state undetectable, so it is reported immediately.
    pub fn define(&mut self, state: &str, criteria: Vec<Criterion>, actions: Vec<Box<dyn Action>>) {
        if criteria.is_empty() {
            warn!(state, "state registered with no criteria");
        }
        self.entry(state);
        for criterion in criteria {
            self.register(state, criterion);
        }
        for action in actions {
            self.register_action(state, action);
        }
    }

    pub fn states(&self) -> impl Iterator<Item = &StateDefinition> {
        self.states.iter()
    }

    pub fn get(&self, state: &str) -> Option<&StateDefinition> {
        self.states.iter().find(|s| s.id == state)
    }

    pub fn get_mut(&mut self, state: &str) -> Option<&mut StateDefinition> {
        self.states.iter_mut().find(|s| s.id == state)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.states.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// States that can never be detected because they have no criteria.
    pub fn undetectable_states(&self) -> Vec<&str> {
        self.states
            .iter()
            .filter(|s| s.criteria.is_empty())
            .map(|s| s.id.as_str())
            .collect()
    }

    /// Matcher kinds referenced by at least one criterion.
    pub fn kinds_in_use(&self) -> BTreeSet<MatcherKind> {
        self.states
            .iter()
            .flat_map(|s| s.criteria.iter().map(|c| c.kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::action::{Context, FnAction};

    #[test]
    fn test_matcher_kind_parse() {
        assert_eq!("template".parse::<MatcherKind>().unwrap(), MatcherKind::Template);
        assert_eq!("TEXT".parse::<MatcherKind>().unwrap(), MatcherKind::Text);
        assert_eq!(
            "solid_color".parse::<MatcherKind>().unwrap(),
            MatcherKind::SolidColor
        );
        assert!(matches!(
            "histogram".parse::<MatcherKind>(),
            Err(ConfigError::UnknownMatcherKind(k)) if k == "histogram"
        ));
    }

    #[test]
    fn test_region_bounds_clamp() {
        let region = Region::new(0.25, 0.375, 0.25, 0.75);
        assert_eq!(region.bounds(100, 200), (25, 50, 50, 25));

        let overflowing = Region::new(0.75, 1.5, 0.75, 2.0);
        assert_eq!(overflowing.bounds(100, 100), (75, 75, 25, 25));

        let inverted = Region::new(0.5, 0.2, 0.0, 1.0);
        assert_eq!(inverted.bounds(100, 100).3, 0);
    }

    #[test]
    fn test_criterion_new_rejects_bad_config() {
        assert!(matches!(
            Criterion::new("pixel", "x", 0.5, None),
            Err(ConfigError::UnknownMatcherKind(_))
        ));
        assert!(matches!(
            Criterion::new("solid_color", "purple", 30.0, None),
            Err(ConfigError::UnknownColor(_))
        ));
        assert!(matches!(
            Criterion::new(
                "text",
                "Loading",
                0.0,
                Some(MatcherOptions::Template(TemplateOptions::default()))
            ),
            Err(ConfigError::OptionsMismatch { .. })
        ));

        let ok = Criterion::new("solid_color", "White", 50.0, None).unwrap();
        assert_eq!(ok.kind, MatcherKind::SolidColor);
        assert_eq!(ok.options, MatcherOptions::SolidColor(SolidColorOptions::default()));
    }

    #[test]
    fn test_register_creates_once_and_appends() {
        let mut registry = StateRegistry::new();
        registry.register("loading", Criterion::text("Loading"));
        registry.register("menu", Criterion::template("menu.png", 0.8));
        registry.register("loading", Criterion::solid_color(SolidColor::Black, 50.0));

        assert_eq!(registry.ids(), vec!["loading", "menu"]);
        let loading = registry.get("loading").unwrap();
        assert_eq!(loading.criteria().len(), 2);
        assert_eq!(loading.criteria()[0].kind, MatcherKind::Text);
        assert_eq!(loading.criteria()[1].kind, MatcherKind::SolidColor);
    }

    #[test]
    fn test_register_action_keeps_order() {
        let mut registry = StateRegistry::new();
        registry.register("menu", Criterion::text("Menu"));
        registry.register_action("menu", Box::new(FnAction::new("first", |_: &mut Context| true)));
        registry.register_action("menu", Box::new(FnAction::new("second", |_: &mut Context| true)));

        let names: Vec<&str> = registry
            .get("menu")
            .unwrap()
            .actions()
            .iter()
            .map(|a| a.name())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_undetectable_states_reported() {
        let mut registry = StateRegistry::new();
        registry.define("fallback", Vec::new(), Vec::new());
        registry.register_action("actions_only", Box::new(FnAction::new("noop", |_: &mut Context| true)));
        registry.register("menu", Criterion::text("Menu"));

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.undetectable_states(), vec!["fallback", "actions_only"]);
        assert_eq!(
            registry.kinds_in_use().into_iter().collect::<Vec<_>>(),
            vec![MatcherKind::Text]
        );
    }
}
