//! Main story menu: pick the first chapter card that is not fully cleared.
//!
//! Each card shows its progress as `done / total` in a box near the bottom
//! of the card. The action scrolls back to the first card, reads every box
//! and taps the first card with missions left.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::automation::action::{Action, Context};
use crate::automation::input::InputDriver;
use crate::automation::registry::{Binarization, TextOptions};
use crate::capture::{Capture, Frame};
use crate::ocr::extract::{is_incomplete, parse_completion};
use crate::ocr::preprocess::binarize;
use crate::ocr::TextExtractor;

use super::{PluginEnv, StatePlugin};

pub const STATE: &str = "main_story_menu";

/// Horizontal extent of the five visible cards on a 1600x900 screen.
const CARDS: [(u32, u32); 5] = [(35, 305), (338, 610), (642, 915), (945, 1220), (1248, 1525)];
/// Vertical extent of the completion box.
const PROGRESS_ROWS: (u32, u32) = (700, 765);
/// The progress digits are drawn in white.
const DIGIT_THRESHOLD: u8 = 180;
const TAP_Y: u32 = 400;
/// Second card, tapped when no progress box could be read.
const FALLBACK_CARD: usize = 1;

const SCROLL_FROM: (u32, u32) = (300, 500);
const SCROLL_TO: (u32, u32) = (1300, 500);
const SCROLL_MS: u32 = 500;
const SCROLL_COUNT: usize = 3;

pub struct MainStoryMenu;

impl StatePlugin for MainStoryMenu {
    fn name(&self) -> &'static str {
        STATE
    }

    fn actions(&self, env: &PluginEnv, _templates: &[PathBuf]) -> Vec<Box<dyn Action>> {
        vec![Box::new(SelectIncompleteMission::new(
            env.input.clone(),
            env.capture.clone(),
            env.extractor.clone(),
        ))]
    }
}

pub struct SelectIncompleteMission {
    input: Arc<dyn InputDriver>,
    capture: Arc<dyn Capture>,
    extractor: Arc<dyn TextExtractor>,
    settle: Duration,
}

impl SelectIncompleteMission {
    pub fn new(
        input: Arc<dyn InputDriver>,
        capture: Arc<dyn Capture>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            input,
            capture,
            extractor,
            settle: Duration::from_secs(1),
        }
    }

    /// Pause after each scroll.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    fn scroll_to_start(&self) -> Result<()> {
        info!("Scrolling to the first card...");
        for _ in 0..SCROLL_COUNT {
            self.input.swipe(SCROLL_FROM, SCROLL_TO, SCROLL_MS)?;
            std::thread::sleep(self.settle);
        }
        Ok(())
    }

    fn ocr_options() -> TextOptions {
        TextOptions {
            psm: Some(6),
            binarization: Binarization::Fixed(DIGIT_THRESHOLD),
            extra_args: vec![
                "-c".to_string(),
                "tessedit_char_whitelist=0123456789/".to_string(),
            ],
            ..TextOptions::default()
        }
    }

    /// Index of the first card whose progress reads `done < total`.
    fn first_incomplete_card(&self, frame: &Frame) -> Result<Option<usize>> {
        let gray = frame.load_gray()?;
        let options = Self::ocr_options();
        let (y1, y2) = PROGRESS_ROWS;
        if y2 > gray.height() {
            warn!("Frame is {}px tall, progress boxes not visible", gray.height());
            return Ok(None);
        }

        for (i, &(x1, x2)) in CARDS.iter().enumerate() {
            if x2 > gray.width() {
                break;
            }
            let area = image::imageops::crop_imm(gray, x1, y1, x2 - x1, y2 - y1).to_image();
            let digits = binarize(&area, options.binarization);

            let text = match self.extractor.extract_text(&digits, &options) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Card {} OCR failed: {e:#}", i + 1);
                    continue;
                }
            };
            info!("Card {} OCR: '{}'", i + 1, text.trim());

            match parse_completion(&text) {
                Some(progress) if is_incomplete(progress) => {
                    info!("Card {} incomplete ({}/{})", i + 1, progress.0, progress.1);
                    return Ok(Some(i));
                }
                Some(progress) => info!("Card {} complete ({}/{})", i + 1, progress.0, progress.1),
                None => {}
            }
        }
        Ok(None)
    }
}

impl Action for SelectIncompleteMission {
    fn name(&self) -> &str {
        "select_incomplete_mission"
    }

    fn execute(&mut self, ctx: &mut Context) -> bool {
        if let Err(e) = self.scroll_to_start() {
            warn!("Scroll failed: {e:#}");
            return false;
        }

        let frame = match self.capture.capture(ctx.iteration) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Could not capture the story menu: {e:#}");
                return false;
            }
        };
        ctx.last_frame = Some(frame.clone());

        let card = match self.first_incomplete_card(&frame) {
            Ok(Some(card)) => card,
            Ok(None) => {
                info!("No progress could be read, tapping card {}", FALLBACK_CARD + 1);
                FALLBACK_CARD
            }
            Err(e) => {
                warn!("Could not read the story menu: {e:#}");
                return false;
            }
        };

        let (x1, x2) = CARDS[card];
        match self.input.tap((x1 + x2) / 2, TAP_Y) {
            Ok(()) => true,
            Err(e) => {
                warn!("select_incomplete_mission tap failed: {e:#}");
                false
            }
        }
    }
}
