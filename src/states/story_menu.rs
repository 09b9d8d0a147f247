//! Story menu: open the main story.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::automation::action::{Action, Context};
use crate::automation::input::InputDriver;
use crate::automation::registry::Criterion;
use crate::matching::TemplateMatcher;

use super::{template_criteria, PluginEnv, StatePlugin};

pub const STATE: &str = "story_menu";

const FALLBACK_TEXT: &str = "Story";
const MAIN_STORY_BUTTON: &str = "main_story.png";
const BUTTON_THRESHOLD: f32 = 0.7;
/// Where the main story button sits on a 1600x900 screen.
const FALLBACK_TAP: (u32, u32) = (185, 332);

pub struct StoryMenu;

impl StatePlugin for StoryMenu {
    fn name(&self) -> &'static str {
        STATE
    }

    fn criteria(&self, env: &PluginEnv, templates: &[PathBuf]) -> Vec<Criterion> {
        if templates.is_empty() {
            return vec![Criterion::text(FALLBACK_TEXT)];
        }
        template_criteria(templates, env.default_threshold)
    }

    fn actions(&self, env: &PluginEnv, _templates: &[PathBuf]) -> Vec<Box<dyn Action>> {
        vec![Box::new(ClickMainStory {
            button: env.button(STATE, MAIN_STORY_BUTTON),
            input: env.input.clone(),
            matcher: env.templates.clone(),
        })]
    }
}

/// Taps the main story button, or its usual position when it cannot be found.
pub struct ClickMainStory {
    button: PathBuf,
    input: Arc<dyn InputDriver>,
    matcher: TemplateMatcher,
}

impl ClickMainStory {
    fn locate(&self, ctx: &Context) -> Option<(u32, u32)> {
        let frame = ctx.last_frame.as_ref()?;
        let threshold = ctx.threshold_or(BUTTON_THRESHOLD);
        match self.matcher.locate(frame, &self.button, threshold) {
            Ok(found) => found.map(|m| m.center),
            Err(e) => {
                warn!("Main story button unavailable: {e}");
                None
            }
        }
    }
}

impl Action for ClickMainStory {
    fn name(&self) -> &str {
        "click_main_story"
    }

    fn execute(&mut self, ctx: &mut Context) -> bool {
        let (x, y) = match self.locate(ctx) {
            Some(center) => {
                info!("Main story button found at ({}, {})", center.0, center.1);
                center
            }
            None => {
                info!("Main story button not found, tapping its usual position");
                FALLBACK_TAP
            }
        };

        match self.input.tap(x, y) {
            Ok(()) => true,
            Err(e) => {
                warn!("click_main_story tap failed: {e:#}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::input::tests::RecordingInput;
    use crate::capture::Frame;
    use crate::matching::template::tests::noise_image;
    use crate::states::tests::test_env;
    use tempfile::tempdir;

    fn action(env: &PluginEnv) -> Box<dyn Action> {
        StoryMenu.actions(env, &[]).remove(0)
    }

    #[test]
    fn test_text_fallback_without_templates() {
        let dir = tempdir().unwrap();
        let env = test_env(dir.path(), Arc::new(RecordingInput::default()));

        let criteria = StoryMenu.criteria(&env, &[]);
        assert_eq!(criteria, vec![Criterion::text("Story")]);
    }

    #[test]
    fn test_taps_located_button() {
        let dir = tempdir().unwrap();
        let input = Arc::new(RecordingInput::default());
        let env = test_env(dir.path(), input.clone());

        let screen = noise_image(400, 300);
        let frame_path = dir.path().join("screen.png");
        screen.save(&frame_path).unwrap();
        let button = env.button(STATE, MAIN_STORY_BUTTON);
        std::fs::create_dir_all(button.parent().unwrap()).unwrap();
        image::imageops::crop_imm(&screen, 100, 200, 40, 20)
            .to_image()
            .save(&button)
            .unwrap();

        let mut ctx = Context::default();
        ctx.last_frame = Some(Frame::new(&frame_path, 1));
        assert!(action(&env).execute(&mut ctx));
        assert_eq!(input.calls(), vec!["tap 120 210".to_string()]);
    }

    #[test]
    fn test_missing_button_uses_fallback_position() {
        let dir = tempdir().unwrap();
        let input = Arc::new(RecordingInput::default());
        let env = test_env(dir.path(), input.clone());

        let frame_path = dir.path().join("screen.png");
        noise_image(400, 300).save(&frame_path).unwrap();
        let mut ctx = Context::default();
        ctx.last_frame = Some(Frame::new(&frame_path, 1));

        assert!(action(&env).execute(&mut ctx));
        assert_eq!(input.calls(), vec!["tap 185 332".to_string()]);
    }
}
