//! Built-in game states.
//!
//! Each state lives in its own folder under the states directory:
//!
//! ```text
//! states/<name>/templates/*.png   screenshots that identify the state
//! states/<name>/buttons/*.png     images the state's actions look for
//! ```
//!
//! A `StatePlugin` turns that folder into criteria and actions. States whose
//! template folder is empty and which have no other way to be recognized are
//! skipped when installed.

pub mod game_loading;
pub mod launcher;
pub mod main_menu;
pub mod main_story_menu;
pub mod mission_list;
pub mod pvp_menu;
pub mod splash_screen;
pub mod story_menu;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::automation::action::Action;
use crate::automation::input::InputDriver;
use crate::automation::registry::{Criterion, StateRegistry};
use crate::capture::Capture;
use crate::matching::TemplateMatcher;
use crate::ocr::TextExtractor;

const TEMPLATE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Collaborators and settings shared by every plugin.
#[derive(Clone)]
pub struct PluginEnv {
    pub states_dir: PathBuf,
    /// Threshold for template criteria
    pub default_threshold: f32,
    /// Package closed by `close_game`
    pub app_package: Option<String>,
    pub input: Arc<dyn InputDriver>,
    /// Used by actions that need a fresh frame after scrolling
    pub capture: Arc<dyn Capture>,
    pub templates: TemplateMatcher,
    pub extractor: Arc<dyn TextExtractor>,
}

impl PluginEnv {
    pub fn state_dir(&self, state: &str) -> PathBuf {
        self.states_dir.join(state)
    }

    /// Templates that identify `state`.
    pub fn templates_for(&self, state: &str) -> Vec<PathBuf> {
        templates_in_dir(&self.state_dir(state).join("templates"))
    }

    /// Image an action of `state` looks for.
    pub fn button(&self, state: &str, file: &str) -> PathBuf {
        self.state_dir(state).join("buttons").join(file)
    }
}

/// A built-in state: how it is recognized and what happens on entry.
pub trait StatePlugin {
    fn name(&self) -> &'static str;

    /// Criteria for the state. Defaults to one template criterion per file in
    /// the state's template folder.
    fn criteria(&self, env: &PluginEnv, templates: &[PathBuf]) -> Vec<Criterion> {
        template_criteria(templates, env.default_threshold)
    }

    fn actions(&self, _env: &PluginEnv, _templates: &[PathBuf]) -> Vec<Box<dyn Action>> {
        Vec::new()
    }
}

/// Built-in states in detection order.
pub fn builtin_plugins() -> Vec<Box<dyn StatePlugin>> {
    vec![
        Box::new(launcher::Launcher),
        Box::new(game_loading::GameLoading),
        Box::new(splash_screen::SplashScreen),
        Box::new(main_menu::MainMenu),
        Box::new(story_menu::StoryMenu),
        Box::new(main_story_menu::MainStoryMenu),
        Box::new(mission_list::MissionList),
        Box::new(pvp_menu::PvpMenu),
    ]
}

/// Sorted image files in `dir`. A missing folder has no templates.
pub fn templates_in_dir(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut templates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        TEMPLATE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
                    })
        })
        .collect();
    templates.sort();
    templates
}

pub fn template_criteria(templates: &[PathBuf], threshold: f32) -> Vec<Criterion> {
    templates
        .iter()
        .map(|path| Criterion::template(path, threshold))
        .collect()
}

impl StateRegistry {
    /// Registers every plugin that can be recognized, in order.
    ///
    /// Returns how many states were installed.
    pub fn install(&mut self, plugins: &[Box<dyn StatePlugin>], env: &PluginEnv) -> usize {
        let mut installed = 0;
        for plugin in plugins {
            let name = plugin.name();
            let templates = env.templates_for(name);
            let criteria = plugin.criteria(env, &templates);
            if criteria.is_empty() {
                warn!(
                    "No templates found in {}, skipping state {}",
                    env.state_dir(name).join("templates").display(),
                    name
                );
                continue;
            }

            info!(
                state = name,
                templates = templates.len(),
                criteria = criteria.len(),
                "Installed state"
            );
            let actions = plugin.actions(env, &templates);
            self.define(name, criteria, actions);
            installed += 1;
        }
        installed
    }
}
