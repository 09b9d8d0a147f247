use std::path::PathBuf;

use crate::automation::action::{Action, CloseApp};

use super::{PluginEnv, StatePlugin};

pub const STATE: &str = "main_menu";

/// Main menu. Reaching it ends the session by closing the game.
pub struct MainMenu;

impl StatePlugin for MainMenu {
    fn name(&self) -> &'static str {
        STATE
    }

    fn actions(&self, env: &PluginEnv, _templates: &[PathBuf]) -> Vec<Box<dyn Action>> {
        vec![Box::new(CloseApp::new(
            env.input.clone(),
            env.app_package.clone(),
        ))]
    }
}
