//! PvP menu. Recognized so it is not archived; the bot only reports what it
//! was asked to do there.

use std::path::PathBuf;

use tracing::info;

use crate::automation::action::{Action, Context};
use crate::automation::registry::Criterion;

use super::{template_criteria, PluginEnv, StatePlugin};

pub const STATE: &str = "pvp_menu";

const FALLBACK_TEXT: &str = "PvP";

pub struct PvpMenu;

impl StatePlugin for PvpMenu {
    fn name(&self) -> &'static str {
        STATE
    }

    fn criteria(&self, env: &PluginEnv, templates: &[PathBuf]) -> Vec<Criterion> {
        if templates.is_empty() {
            return vec![Criterion::text(FALLBACK_TEXT)];
        }
        template_criteria(templates, env.default_threshold)
    }

    fn actions(&self, _env: &PluginEnv, _templates: &[PathBuf]) -> Vec<Box<dyn Action>> {
        vec![Box::new(PvpIdle)]
    }
}

pub struct PvpIdle;

impl Action for PvpIdle {
    fn name(&self) -> &str {
        "pvp_idle"
    }

    fn execute(&mut self, ctx: &mut Context) -> bool {
        match ctx.target_activity.as_deref() {
            Some(target) => info!("In PvP menu (target: {})", target),
            None => info!("In PvP menu, no target activity set"),
        }
        true
    }
}
