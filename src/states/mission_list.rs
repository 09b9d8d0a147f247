//! Mission list: open the first mission without a "Complete!" ribbon.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::automation::action::{Action, Context};
use crate::automation::input::InputDriver;
use crate::capture::{Capture, Frame};
use crate::matching::{best_match_in, TemplateMatcher};

use super::{PluginEnv, StatePlugin};

pub const STATE: &str = "mission_list";

const RIBBON_BUTTON: &str = "complete_ribbon.png";
const RIBBON_THRESHOLD: f32 = 0.7;

/// Vertical extent of each row on a 1600x900 screen.
const ROWS: [(u32, u32); 5] = [(110, 310), (320, 520), (530, 730), (740, 940), (950, 1150)];
/// The ribbon sits in the top-left corner of a row.
const RIBBON_X: (u32, u32) = (345, 485);
const RIBBON_HEIGHT: u32 = 100;
const ROW_TAP_X: u32 = 1000;

const SCROLL_FROM: (u32, u32) = (1000, 800);
const SCROLL_TO: (u32, u32) = (1000, 400);
const SCROLL_MS: u32 = 500;

pub struct MissionList;

impl StatePlugin for MissionList {
    fn name(&self) -> &'static str {
        STATE
    }

    fn actions(&self, env: &PluginEnv, _templates: &[PathBuf]) -> Vec<Box<dyn Action>> {
        vec![Box::new(FindIncompleteMission::new(
            env.button(STATE, RIBBON_BUTTON),
            env.input.clone(),
            env.capture.clone(),
            env.templates.clone(),
        ))]
    }
}

pub struct FindIncompleteMission {
    ribbon: PathBuf,
    input: Arc<dyn InputDriver>,
    capture: Arc<dyn Capture>,
    matcher: TemplateMatcher,
    settle: Duration,
}

impl FindIncompleteMission {
    pub fn new(
        ribbon: PathBuf,
        input: Arc<dyn InputDriver>,
        capture: Arc<dyn Capture>,
        matcher: TemplateMatcher,
    ) -> Self {
        Self {
            ribbon,
            input,
            capture,
            matcher,
            settle: Duration::from_secs(2),
        }
    }

    /// Pause after tapping or scrolling so the next screen can load.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Row index of the first visible row without the ribbon.
    fn first_incomplete_row(&self, frame: &Frame) -> Result<Option<usize>> {
        let gray = frame.load_gray()?;
        let ribbon = match self.matcher.load_template(&self.ribbon) {
            Ok(ribbon) => Some(ribbon),
            Err(e) => {
                warn!("Ribbon template unavailable, rows count as incomplete: {e}");
                None
            }
        };

        for (i, &(y1, y2)) in ROWS.iter().enumerate() {
            if y2 > gray.height() || RIBBON_X.1 > gray.width() {
                continue;
            }

            let complete = match &ribbon {
                Some(ribbon) => {
                    let strip = image::imageops::crop_imm(
                        gray,
                        RIBBON_X.0,
                        y1,
                        RIBBON_X.1 - RIBBON_X.0,
                        RIBBON_HEIGHT,
                    )
                    .to_image();
                    match best_match_in(&strip, ribbon) {
                        Ok(found) => found.score >= RIBBON_THRESHOLD,
                        Err(e) => {
                            warn!("Row {} ribbon check failed: {e}", i + 1);
                            false
                        }
                    }
                }
                None => false,
            };

            if complete {
                info!("Row {} is complete (ribbon detected)", i + 1);
            } else {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }
}

impl Action for FindIncompleteMission {
    fn name(&self) -> &str {
        "find_incomplete_mission"
    }

    fn execute(&mut self, ctx: &mut Context) -> bool {
        let frame = match self.capture.capture(ctx.iteration) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Could not capture the mission list: {e:#}");
                return false;
            }
        };
        ctx.last_frame = Some(frame.clone());

        let row = match self.first_incomplete_row(&frame) {
            Ok(row) => row,
            Err(e) => {
                warn!("Could not read the mission list: {e:#}");
                return false;
            }
        };

        if let Some(i) = row {
            let (y1, y2) = ROWS[i];
            let y = (y1 + y2) / 2;
            info!("Mission incomplete in row {}, tapping at y={}", i + 1, y);
            if let Err(e) = self.input.tap(ROW_TAP_X, y) {
                warn!("find_incomplete_mission tap failed: {e:#}");
                return false;
            }
            std::thread::sleep(self.settle);
            return true;
        }

        info!("No incomplete mission on screen, scrolling down");
        if let Err(e) = self.input.swipe(SCROLL_FROM, SCROLL_TO, SCROLL_MS) {
            warn!("Scroll failed: {e:#}");
        }
        std::thread::sleep(self.settle);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::input::tests::RecordingInput;
    use crate::matching::template::tests::noise_image;
    use std::path::Path;
    use tempfile::tempdir;

    fn action(dir: &Path, frame: &Path, input: Arc<RecordingInput>) -> FindIncompleteMission {
        let frame = frame.to_path_buf();
        let capture = move |i: u64| -> Result<Frame> { Ok(Frame::new(&frame, i)) };
        FindIncompleteMission::new(
            dir.join("buttons").join(RIBBON_BUTTON),
            input,
            Arc::new(capture),
            TemplateMatcher::new(),
        )
        .with_settle(Duration::ZERO)
    }

    #[test]
    fn test_skips_rows_with_ribbon() {
        let dir = tempdir().unwrap();
        let screen = noise_image(1600, 900);
        let frame_path = dir.path().join("screen.png");
        screen.save(&frame_path).unwrap();

        // The first row carries the ribbon, the second does not
        std::fs::create_dir_all(dir.path().join("buttons")).unwrap();
        image::imageops::crop_imm(&screen, 360, 130, 60, 40)
            .to_image()
            .save(dir.path().join("buttons").join(RIBBON_BUTTON))
            .unwrap();

        let input = Arc::new(RecordingInput::default());
        let mut ctx = Context::default();
        assert!(action(dir.path(), &frame_path, input.clone()).execute(&mut ctx));
        assert_eq!(input.calls(), vec!["tap 1000 420".to_string()]);
        assert!(ctx.last_frame.is_some());
    }

    #[test]
    fn test_missing_ribbon_taps_first_row() {
        let dir = tempdir().unwrap();
        let frame_path = dir.path().join("screen.png");
        noise_image(1600, 900).save(&frame_path).unwrap();

        let input = Arc::new(RecordingInput::default());
        let mut ctx = Context::default();
        assert!(action(dir.path(), &frame_path, input.clone()).execute(&mut ctx));
        assert_eq!(input.calls(), vec!["tap 1000 210".to_string()]);
    }

    #[test]
    fn test_scrolls_when_no_row_is_visible() {
        let dir = tempdir().unwrap();
        let frame_path = dir.path().join("screen.png");
        noise_image(1600, 300).save(&frame_path).unwrap();

        let input = Arc::new(RecordingInput::default());
        let mut ctx = Context::default();
        assert!(!action(dir.path(), &frame_path, input.clone()).execute(&mut ctx));
        assert_eq!(input.calls(), vec!["swipe 1000 800 1000 400 500".to_string()]);
    }
}
