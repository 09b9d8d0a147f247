//! Splash screen shown after launch. Entering it closes the game.

use std::path::PathBuf;

use crate::automation::action::{Action, CloseApp};

use super::{PluginEnv, StatePlugin};

pub const STATE: &str = "splash_screen";

pub struct SplashScreen;

impl StatePlugin for SplashScreen {
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
