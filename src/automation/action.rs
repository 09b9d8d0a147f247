//! Actions executed when the engine enters a state, and the run context they share.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::automation::input::InputDriver;
use crate::capture::Frame;
use crate::matching::TemplateMatcher;

/// Mutable state shared by the run loop and the actions of one run.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Frame captured by the most recent iteration (or refreshed by an action)
    pub last_frame: Option<Frame>,
    /// 1-based iteration counter
    pub iteration: u64,
    /// Active match threshold for actions that locate templates
    pub threshold: Option<f32>,
    /// Sub-goal the state actions should work towards
    pub target_activity: Option<String>,
    params: HashMap<String, String>,
}

impl Context {
    pub fn new(threshold: Option<f32>, target_activity: Option<String>) -> Self {
        Self {
            threshold,
            target_activity,
            ..Self::default()
        }
    }

    pub fn threshold_or(&self, default: f32) -> f32 {
        self.threshold.unwrap_or(default)
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }
}

/// A named unit of work run on state entry.
///
/// Returns `true` on success. Failures (including panics) are logged by the
/// engine and never stop the actions that follow.
pub trait Action {
    fn name(&self) -> &str;

    fn execute(&mut self, ctx: &mut Context) -> bool;
}

/// Adapts a closure into an action.
pub struct FnAction<F> {
    name: String,
    f: F,
}

impl<F> FnAction<F>
where
    F: FnMut(&mut Context) -> bool,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Action for FnAction<F>
where
    F: FnMut(&mut Context) -> bool,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, ctx: &mut Context) -> bool {
        (self.f)(ctx)
    }
}

impl<F> fmt::Debug for FnAction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAction").field("name", &self.name).finish()
    }
}

/// Blocks for a fixed time so the screen can settle.
#[derive(Debug, Clone)]
pub struct Wait {
    name: String,
    duration: Duration,
}

impl Wait {
    pub fn new(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            duration,
        }
    }
}

impl Action for Wait {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, _ctx: &mut Context) -> bool {
        info!("Waiting {:.1}s", self.duration.as_secs_f32());
        std::thread::sleep(self.duration);
        true
    }
}

/// Finds a template in the last frame and taps its center.
pub struct TapTemplate {
    name: String,
    template: PathBuf,
    default_threshold: f32,
    input: Arc<dyn InputDriver>,
    matcher: TemplateMatcher,
}

impl TapTemplate {
    pub fn new(
        name: impl Into<String>,
        template: impl Into<PathBuf>,
        input: Arc<dyn InputDriver>,
        matcher: TemplateMatcher,
    ) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            default_threshold: 0.8,
            input,
            matcher,
        }
    }

    /// Threshold used when the context does not carry one.
    pub fn with_default_threshold(mut self, threshold: f32) -> Self {
        self.default_threshold = threshold;
        self
    }
}

impl Action for TapTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, ctx: &mut Context) -> bool {
        let Some(frame) = ctx.last_frame.as_ref() else {
            warn!(action = %self.name, "no frame to search");
            return false;
        };
        let threshold = ctx.threshold_or(self.default_threshold);

        match self.matcher.locate(frame, &self.template, threshold) {
            Ok(Some(found)) => {
                let (x, y) = found.center;
                if let Err(e) = self.input.tap(x, y) {
                    warn!(action = %self.name, "tap failed: {e:#}");
                    return false;
                }
                info!(
                    "Tapped {} at ({}, {}) (score {:.3})",
                    self.template.display(),
                    x,
                    y,
                    found.score
                );
                true
            }
            Ok(None) => {
                info!(
                    "{} not found at threshold {:.2}",
                    self.template.display(),
                    threshold
                );
                false
            }
            Err(e) => {
                warn!(action = %self.name, "could not search for template: {e}");
                false
            }
        }
    }
}

/// Closes the game: force-stops the package when known, otherwise sends HOME.
pub struct CloseApp {
    input: Arc<dyn InputDriver>,
    package: Option<String>,
}

/// Android `KEYCODE_HOME`.
const KEYCODE_HOME: u32 = 3;

impl CloseApp {
    pub fn new(input: Arc<dyn InputDriver>, package: Option<String>) -> Self {
        Self { input, package }
    }
}

impl Action for CloseApp {
    fn name(&self) -> &str {
        "close_game"
    }

    fn execute(&mut self, _ctx: &mut Context) -> bool {
        let result = match &self.package {
            Some(package) => self.input.force_stop(package).map(|()| {
                info!("Force-stopped {}", package);
            }),
            None => self.input.key_event(KEYCODE_HOME).map(|()| {
                info!("Closed the game (sent HOME)");
            }),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("close_game failed: {e:#}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::input::tests::RecordingInput;
    use crate::matching::template::tests::noise_image;
    use image::{GrayImage, Luma};
    use tempfile::tempdir;

    #[test]
    fn test_context_params_and_threshold() {
        let mut ctx = Context::new(None, Some("story".to_string()));
        assert_eq!(ctx.threshold_or(0.7), 0.7);
        ctx.threshold = Some(0.9);
        assert_eq!(ctx.threshold_or(0.7), 0.9);

        assert_eq!(ctx.param("mode"), None);
        ctx.set_param("mode", "farm");
        assert_eq!(ctx.param("mode"), Some("farm"));
        assert_eq!(ctx.target_activity.as_deref(), Some("story"));
    }

    #[test]
    fn test_fn_action_mutates_context() {
        let mut action = FnAction::new("flag", |ctx: &mut Context| {
            ctx.set_param("flag", "set");
            true
        });
        let mut ctx = Context::default();
        assert!(action.execute(&mut ctx));
        assert_eq!(action.name(), "flag");
        assert_eq!(ctx.param("flag"), Some("set"));
    }

    #[test]
    fn test_close_app_prefers_force_stop() {
        let input = Arc::new(RecordingInput::default());
        let mut with_pkg = CloseApp::new(input.clone(), Some("com.example.game".to_string()));
        let mut without_pkg = CloseApp::new(input.clone(), None);
        let mut ctx = Context::default();

        assert!(with_pkg.execute(&mut ctx));
        assert!(without_pkg.execute(&mut ctx));
        assert_eq!(
            input.calls(),
            vec!["force_stop com.example.game".to_string(), "key 3".to_string()]
        );
    }

    #[test]
    fn test_tap_template_taps_center() {
        let dir = tempdir().unwrap();
        let frame_path = dir.path().join("frame.png");
        let template_path = dir.path().join("icon.png");

        let frame = noise_image(120, 90);
        frame.save(&frame_path).unwrap();
        image::imageops::crop_imm(&frame, 30, 20, 16, 10)
            .to_image()
            .save(&template_path)
            .unwrap();

        let input = Arc::new(RecordingInput::default());
        let mut action = TapTemplate::new("tap_icon", &template_path, input.clone(), TemplateMatcher::new());
        let mut ctx = Context::default();

        // No frame yet
        assert!(!action.execute(&mut ctx));

        ctx.last_frame = Some(Frame::new(&frame_path, 1));
        assert!(action.execute(&mut ctx));
        assert_eq!(input.calls(), vec!["tap 38 25".to_string()]);
    }

    #[test]
    fn test_tap_template_missing_template_fails() {
        let dir = tempdir().unwrap();
        let frame_path = dir.path().join("frame.png");
        GrayImage::from_pixel(20, 20, Luma([10])).save(&frame_path).unwrap();

        let input = Arc::new(RecordingInput::default());
        let mut action = TapTemplate::new(
            "tap_icon",
            dir.path().join("missing.png"),
            input.clone(),
            TemplateMatcher::new(),
        );
        let mut ctx = Context::default();
        ctx.last_frame = Some(Frame::new(&frame_path, 1));

        assert!(!action.execute(&mut ctx));
        assert!(input.calls().is_empty());
    }
}
