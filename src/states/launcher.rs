//! App launcher: tap the game icon and give the game time to start.

use std::path::PathBuf;
use std::time::Duration;

use crate::automation::action::{Action, TapTemplate, Wait};

use super::{PluginEnv, StatePlugin};

pub const STATE: &str = "launcher";

const LAUNCH_WAIT: Duration = Duration::from_secs(3);

pub struct Launcher;

impl StatePlugin for Launcher {
    fn name(&self) -> &'static str {
        STATE
    }

    fn actions(&self, env: &PluginEnv, templates: &[PathBuf]) -> Vec<Box<dyn Action>> {
        // The first template is the game icon itself
        let Some(icon) = templates.first() else {
            return Vec::new();
        };
        vec![
            Box::new(
                TapTemplate::new(
                    "tap_game_icon",
                    icon,
                    env.input.clone(),
                    env.templates.clone(),
                )
                .with_default_threshold(env.default_threshold),
            ),
            Box::new(Wait::new("wait_after_launch", LAUNCH_WAIT)),
        ]
    }
}
