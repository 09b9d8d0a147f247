//! LDPlayer Bot
//!
//! Command-line driver: loads the configuration, wires the adb, template and
//! OCR collaborators into the engine, installs the built-in states and runs
//! until `q` is entered or the iteration budget is used up.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context as _, Result};
use clap::Parser;
use image::GrayImage;
use tracing::{info, warn};

use ldplayer_bot::adb::AdbDevice;
use ldplayer_bot::automation::{AdbInput, BotConfig, InputDriver, StopHandle, TextOptions};
use ldplayer_bot::capture::{AdbCapture, Capture};
use ldplayer_bot::matching::{MatcherTable, TemplateMatcher};
use ldplayer_bot::ocr::{ensure_tesseract, TesseractExtractor, TextExtractor};
use ldplayer_bot::states::{builtin_plugins, PluginEnv};
use ldplayer_bot::{logging, Engine};

#[derive(Parser, Debug)]
#[command(name = "ldplayer-bot")]
#[command(author, version, about = "Screen-state automation for LDPlayer", long_about = None)]
struct Args {
    /// Config file (default: config.json next to the executable)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Stop after this many iterations
    #[arg(long, short = 'n')]
    max_iterations: Option<u64>,

    /// Delay between iterations in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Sub-goal handed to the state actions
    #[arg(long)]
    target: Option<String>,

    /// Match threshold actions locate buttons with
    #[arg(long)]
    threshold: Option<f32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// Print the registered states and exit
    #[arg(long)]
    info_only: bool,
}

impl Args {
    fn apply(&self, config: &mut BotConfig) {
        if let Some(n) = self.max_iterations {
            config.max_iterations = Some(n);
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(target) = &self.target {
            config.target_activity = Some(target.clone());
        }
        if let Some(threshold) = self.threshold {
            config.action_threshold = Some(threshold);
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, source) = BotConfig::load(args.config.as_deref())?;
    args.apply(&mut config);

    logging::init(&args.log_level, &config.logs_path())?;
    source.log();
    config
        .ensure_directories()
        .context("Failed to create output directories")?;
    info!("ldplayer-bot {} starting", env!("CARGO_PKG_VERSION"));

    let device = AdbDevice::new(&config.adb_path, config.device_serial.clone());
    let capture = AdbCapture::new(device.clone(), config.screenshots_path())
        .with_unique_names(config.unique_screenshots);
    let input: Arc<dyn InputDriver> = Arc::new(AdbInput::new(device));
    let templates = TemplateMatcher::new();
    let extractor = text_extractor(&config);

    let mut engine = Engine::new(Box::new(capture.clone()), config.unknown_states_path())
        .with_poll_interval(Duration::from_millis(config.poll_interval_ms))
        .with_matchers(MatcherTable::standard(templates.clone(), extractor.clone()))
        .with_context(config.action_threshold, config.target_activity.clone());

    let env = PluginEnv {
        states_dir: config.states_path(),
        default_threshold: config.default_threshold,
        app_package: config.app_package.clone(),
        input,
        capture: Arc::new(capture) as Arc<dyn Capture>,
        templates,
        extractor,
    };
    let installed = engine.registry_mut().install(&builtin_plugins(), &env);
    info!("{} state(s) installed from {}", installed, env.states_dir.display());

    engine.print_state_info();
    if args.info_only {
        return Ok(());
    }

    watch_stdin(engine.stop_handle());
    println!("Press 'q' then Enter to stop.");

    let summary = engine.run(config.max_iterations)?;

    println!();
    println!("=== Run finished ===");
    println!("Iterations: {}", summary.iterations);
    println!("Stopped by: {:?}", summary.reason);
    println!(
        "Final state: {}",
        summary.final_state.as_deref().unwrap_or("none")
    );
    println!(
        "Previous state: {}",
        summary.previous_state.as_deref().unwrap_or("none")
    );
    println!("Unknown screens archived: {}", summary.unmatched);
    Ok(())
}

/// Tesseract when it can be found, otherwise an extractor that always fails
/// so text criteria are reported and skipped instead of blocking startup.
fn text_extractor(config: &BotConfig) -> Arc<dyn TextExtractor> {
    match ensure_tesseract(config.tesseract_path.as_deref(), &config.ocr_language) {
        Ok(paths) => {
            info!("Tesseract: {}", paths.executable.display());
            Arc::new(TesseractExtractor::new(
                paths.executable,
                Some(paths.tessdata),
                &config.ocr_language,
            ))
        }
        Err(e) => {
            warn!("OCR unavailable, text criteria will not match: {e:#}");
            let reason = format!("{e:#}");
            Arc::new(move |_: &GrayImage, _: &TextOptions| -> Result<String> {
                Err(anyhow!("Tesseract unavailable: {reason}"))
            })
        }
    }
}

/// Stops the engine when `q` is entered on stdin.
fn watch_stdin(stop: StopHandle) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().eq_ignore_ascii_case("q") {
                info!("Stop requested from console");
                stop.stop();
                break;
            }
        }
    });
}
