//! Loading screens and the white/black fades between scenes.
//!
//! Nothing is done on entry; recognizing the state keeps loading frames out
//! of the unknown-state archive.

use std::path::PathBuf;

use crate::automation::registry::{
    Binarization, Criterion, Region, SolidColor, TextOptions,
};

use super::{template_criteria, PluginEnv, StatePlugin};

pub const STATE: &str = "game_loading";

const LOADING_TEXTS: [&str; 2] = ["Loading", "Now Loading"];

/// Bottom-right corner where the loading caption is drawn.
const CAPTION_REGION: Region = Region::new(0.80, 1.0, 0.70, 1.0);

/// Near-black and near-white flickers still count as a fade.
const FADE_TOLERANCE: f32 = 50.0;

pub struct GameLoading;

impl GameLoading {
    fn caption_options() -> TextOptions {
        TextOptions {
            region: Some(CAPTION_REGION),
            psm: Some(6),
            binarization: Binarization::Otsu,
            ..TextOptions::default()
        }
    }
}

impl StatePlugin for GameLoading {
    fn name(&self) -> &'static str {
        STATE
    }

    fn criteria(&self, env: &PluginEnv, templates: &[PathBuf]) -> Vec<Criterion> {
        let mut criteria = template_criteria(templates, env.default_threshold);
        criteria.extend(
            LOADING_TEXTS
                .iter()
                .map(|text| Criterion::text_with(*text, Self::caption_options())),
        );
        criteria.push(Criterion::solid_color(SolidColor::White, FADE_TOLERANCE));
        criteria.push(Criterion::solid_color(SolidColor::Black, FADE_TOLERANCE));
        criteria
    }
}
